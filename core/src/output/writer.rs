use crate::output::bucket::BucketKey;
use crate::prelude::{WaterfallError, WaterfallResult};
use crate::scan::{Detection, ScanConfig};
use crate::telemetry::log::LogManager;
use chrono::{DateTime, Utc};
use image::{ImageFormat, RgbImage};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

const DETECTION_HEADER: [&str; 5] = ["timestamp", "start_freq", "end_freq", "db", "type"];

#[derive(Serialize)]
struct DetectionRow<'a> {
    timestamp: f64,
    start_freq: f64,
    end_freq: f64,
    db: f64,
    #[serde(rename = "type")]
    kind: &'a str,
}

/// JSON snapshot of the scan configuration active in a bucket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BucketMetadata {
    pub bucket: String,
    pub updated: DateTime<Utc>,
    pub scan_configs: Vec<ScanConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_vars: Option<BTreeMap<String, String>>,
}

/// Persists detections, metadata and waterfall images into time-keyed
/// bucket directories under `root`.
///
/// Every file handle is opened and closed within a single call.
pub struct OutputWriter {
    root: PathBuf,
    freq_scale: f64,
    opened: HashSet<BucketKey>,
    abandoned: HashSet<BucketKey>,
    next_image: HashMap<BucketKey, usize>,
    logger: LogManager,
}

impl OutputWriter {
    /// `freq_scale` divides Hz before frequencies are written (1e6 → MHz).
    pub fn new(root: impl Into<PathBuf>, freq_scale: f64) -> Self {
        Self {
            root: root.into(),
            freq_scale,
            opened: HashSet::new(),
            abandoned: HashSet::new(),
            next_image: HashMap::new(),
            logger: LogManager::new("output"),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn bucket_dir(&self, key: BucketKey) -> PathBuf {
        self.root.join(key.relative_dir())
    }

    pub fn detections_path(&self, key: BucketKey) -> PathBuf {
        self.bucket_dir(key)
            .join(format!("detections-{}.csv", key.start()))
    }

    pub fn metadata_path(&self, key: BucketKey) -> PathBuf {
        self.bucket_dir(key).join(format!("metadata-{}.json", key.start()))
    }

    pub fn is_abandoned(&self, key: BucketKey) -> bool {
        self.abandoned.contains(&key)
    }

    /// Creates the bucket directory on first use. `Ok(None)` means the bucket
    /// was abandoned earlier and writes to it are skipped.
    fn ensure_bucket(&mut self, key: BucketKey) -> WaterfallResult<Option<PathBuf>> {
        if self.abandoned.contains(&key) {
            return Ok(None);
        }
        let dir = self.bucket_dir(key);
        if self.opened.contains(&key) {
            return Ok(Some(dir));
        }
        if let Err(source) = fs::create_dir_all(&dir) {
            self.abandoned.insert(key);
            return Err(WaterfallError::BucketCreation {
                bucket: key.to_string(),
                source,
            });
        }
        self.opened.insert(key);
        self.logger.record(&format!("opened bucket {}", dir.display()));
        Ok(Some(dir))
    }

    /// Appends detection rows, writing the header when the file is new.
    /// Returns the number of rows written.
    pub fn record_detections(
        &mut self,
        key: BucketKey,
        detections: &[Detection],
    ) -> WaterfallResult<usize> {
        if self.ensure_bucket(key)?.is_none() {
            return Ok(0);
        }
        let path = self.detections_path(key);
        let csv_error = |err: &dyn std::fmt::Display| {
            WaterfallError::output(path.display().to_string(), key, err)
        };

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|err| csv_error(&err))?;
        let is_new = file.metadata().map_err(|err| csv_error(&err))?.len() == 0;

        let mut writer = csv::WriterBuilder::new().has_headers(false).from_writer(file);
        if is_new {
            writer
                .write_record(DETECTION_HEADER)
                .map_err(|err| csv_error(&err))?;
        }
        for detection in detections {
            writer
                .serialize(DetectionRow {
                    timestamp: detection.timestamp,
                    start_freq: detection.start_freq / self.freq_scale,
                    end_freq: detection.end_freq / self.freq_scale,
                    db: detection.power_db,
                    kind: &detection.detector_type,
                })
                .map_err(|err| csv_error(&err))?;
        }
        writer.flush().map_err(|err| csv_error(&err))?;
        Ok(detections.len())
    }

    /// Writes (or replaces) the bucket's metadata document.
    pub fn record_metadata(
        &mut self,
        key: BucketKey,
        scan_configs: &[ScanConfig],
        config_vars: Option<&BTreeMap<String, String>>,
    ) -> WaterfallResult<Option<PathBuf>> {
        if self.ensure_bucket(key)?.is_none() {
            return Ok(None);
        }
        let path = self.metadata_path(key);
        let staging = path.with_extension("json.tmp");
        let json_error = |err: &dyn std::fmt::Display| {
            WaterfallError::output(path.display().to_string(), key, err)
        };

        let metadata = BucketMetadata {
            bucket: key.to_string(),
            updated: Utc::now(),
            scan_configs: scan_configs.to_vec(),
            config_vars: config_vars.cloned(),
        };

        let file = File::create(&staging).map_err(|err| json_error(&err))?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, &metadata).map_err(|err| json_error(&err))?;
        writer.flush().map_err(|err| json_error(&err))?;
        drop(writer);
        fs::rename(&staging, &path).map_err(|err| json_error(&err))?;
        Ok(Some(path))
    }

    /// Writes `image` as the next `waterfall-<start>-<seq>.png` of the bucket.
    pub fn rotate(&mut self, key: BucketKey, image: &RgbImage) -> WaterfallResult<Option<PathBuf>> {
        let Some(dir) = self.ensure_bucket(key)? else {
            return Ok(None);
        };
        let mut seq = self.next_image.get(&key).copied().unwrap_or(0);
        let path = loop {
            let candidate = dir.join(format!("waterfall-{}-{:04}.png", key.start(), seq));
            seq += 1;
            if !candidate.exists() {
                break candidate;
            }
        };
        self.next_image.insert(key, seq);

        write_png(&path, image)
            .map_err(|err| WaterfallError::output(path.display().to_string(), key, err))?;
        Ok(Some(path))
    }

    /// Forgets everything tracked for `key`. Called once its period is over.
    pub fn close(&mut self, key: BucketKey) {
        let was_open = self.opened.remove(&key);
        self.abandoned.remove(&key);
        self.next_image.remove(&key);
        if was_open {
            self.logger.record(&format!("closed bucket {}", self.bucket_dir(key).display()));
        }
    }

    /// Buckets the writer currently holds state for.
    pub fn tracked_buckets(&self) -> usize {
        self.opened.len() + self.abandoned.len()
    }

    /// Writes a single-shot render outside the bucket layout.
    pub fn save_image(path: &Path, image: &RgbImage) -> WaterfallResult<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .map_err(|err| WaterfallError::output(path.display().to_string(), "-", err))?;
        }
        write_png(path, image)
            .map_err(|err| WaterfallError::output(path.display().to_string(), "-", err))
    }
}

fn write_png(path: &Path, image: &RgbImage) -> Result<(), String> {
    let file = File::create(path).map_err(|err| err.to_string())?;
    let mut writer = BufWriter::new(file);
    image
        .write_to(&mut writer, ImageFormat::Png)
        .map_err(|err| err.to_string())?;
    writer.flush().map_err(|err| err.to_string())
}
