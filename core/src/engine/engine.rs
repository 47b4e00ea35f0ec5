use crate::engine::config::EngineConfig;
use crate::engine::source::ScanSource;
use crate::output::{BucketKey, OutputWriter};
use crate::prelude::{WaterfallError, WaterfallResult};
use crate::processing::peak_finder::{get_peak_finder, DetectorConfig, PeakFinder};
use crate::processing::render::RenderEngine;
use crate::processing::WaterfallBuffer;
use crate::scan::{strongest, Detection, ScanBatch, ScanConfig};
use crate::telemetry::status::{HttpStatusReporter, StatusReporter, StatusSummary};
use crate::telemetry::{LogManager, MetricsRecorder, MetricsSnapshot};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::thread;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Running,
    Stopping,
    Stopped,
}

/// Control loop that feeds scan batches through the waterfall buffer and
/// peak finder and persists the results into rotating output buckets.
pub struct WaterfallEngine {
    config: EngineConfig,
    state: EngineState,
    buffer: WaterfallBuffer,
    writer: OutputWriter,
    peak_finder: Box<dyn PeakFinder>,
    detector: DetectorConfig,
    render_engine: RenderEngine,
    reporter: Option<Box<dyn StatusReporter>>,
    config_vars: Option<BTreeMap<String, String>>,
    metrics: MetricsRecorder,
    logger: LogManager,
    current_bucket: Option<BucketKey>,
    active_configs: Vec<ScanConfig>,
    last_rotation: Option<DateTime<Utc>>,
}

impl WaterfallEngine {
    /// Builds an engine using the detector named by `config.peak_finder`.
    pub fn new(config: EngineConfig) -> WaterfallResult<Self> {
        let peak_finder = get_peak_finder(&config.peak_finder)?;
        Self::with_peak_finder(config, peak_finder)
    }

    pub fn with_peak_finder(
        config: EngineConfig,
        peak_finder: Box<dyn PeakFinder>,
    ) -> WaterfallResult<Self> {
        config.validate()?;
        let render_engine: RenderEngine = config.render_engine.parse()?;
        let buffer = WaterfallBuffer::new(
            config.min_freq,
            config.max_freq,
            config.waterfall_height,
            config.waterfall_width,
            config.render_settings()?,
        )?;
        let detector = config
            .detector
            .clone()
            .unwrap_or_else(|| peak_finder.default_config());
        let reporter = match config.api_endpoint.as_deref() {
            Some(endpoint) => {
                Some(Box::new(HttpStatusReporter::new(endpoint)?) as Box<dyn StatusReporter>)
            }
            None => None,
        };
        let config_vars = config.resolve_config_vars()?;
        let writer = OutputWriter::new(config.save_path.clone(), config.freq_scale);

        Ok(Self {
            config,
            state: EngineState::Running,
            buffer,
            writer,
            peak_finder,
            detector,
            render_engine,
            reporter,
            config_vars,
            metrics: MetricsRecorder::new(),
            logger: LogManager::new("engine"),
            current_bucket: None,
            active_configs: Vec::new(),
            last_rotation: None,
        })
    }

    /// Replaces the status reporter built from `api_endpoint`, if any.
    pub fn with_status_reporter(mut self, reporter: Box<dyn StatusReporter>) -> Self {
        self.reporter = Some(reporter);
        self
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    pub fn current_bucket(&self) -> Option<BucketKey> {
        self.current_bucket
    }

    pub fn writer(&self) -> &OutputWriter {
        &self.writer
    }

    /// Runs cycles until the source ends or turns unhealthy.
    pub fn run<S: ScanSource + ?Sized>(&mut self, source: &mut S) -> MetricsSnapshot {
        self.logger.record(&format!(
            "starting: {:.0}..{:.0} Hz, detector {}, render {}, save path {}",
            self.config.min_freq,
            self.config.max_freq,
            self.peak_finder.name(),
            self.render_engine.name(),
            self.config.save_path.display()
        ));
        let refresh = Duration::from_secs_f64(self.config.refresh);
        while self.state == EngineState::Running {
            let cycle_started = Instant::now();
            self.step_at(source, Utc::now());
            if self.state == EngineState::Running && !self.config.batch_mode {
                if let Some(remaining) = refresh.checked_sub(cycle_started.elapsed()) {
                    thread::sleep(remaining);
                }
            }
        }
        self.metrics.snapshot()
    }

    /// Runs one cycle as if the wall clock read `now`.
    pub fn step_at<S: ScanSource + ?Sized>(
        &mut self,
        source: &mut S,
        now: DateTime<Utc>,
    ) -> EngineState {
        if self.state != EngineState::Running {
            return self.state;
        }

        let batch = source.read_batch(self.config.scan_resolution);
        if batch.is_end_of_stream() {
            self.logger.record("end of stream");
            self.shutdown_at(source, now);
        } else if !source.healthy() {
            self.logger.record("source no longer healthy");
            self.shutdown_at(source, now);
        } else {
            self.process(batch, now);
        }
        self.state
    }

    /// Flushes a final image and stops the source. Later calls are no-ops.
    pub fn shutdown_at<S: ScanSource + ?Sized>(&mut self, source: &mut S, now: DateTime<Utc>) {
        if self.state == EngineState::Stopped {
            return;
        }
        self.state = EngineState::Stopping;
        let key = self
            .current_bucket
            .unwrap_or_else(|| BucketKey::for_time(now, self.config.save_time));
        self.rotate(key, now);
        self.writer.close(key);
        source.stop();
        self.state = EngineState::Stopped;

        let metrics = self.metrics.snapshot();
        self.logger.record(&format!(
            "stopped after {} batches: {} detections, {} skipped, {} rotations, {} output errors",
            metrics.batches,
            metrics.detections,
            metrics.skipped_batches,
            metrics.rotations,
            metrics.io_errors
        ));
    }

    fn process(&mut self, batch: ScanBatch, now: DateTime<Utc>) {
        self.metrics.record_batch();
        let timestamp = batch.timestamp();
        let key = BucketKey::for_time(now, self.config.save_time);
        let new_bucket = self.current_bucket != Some(key);
        if new_bucket {
            if let Some(previous) = self.current_bucket {
                self.logger.record(&format!("rolling bucket {} -> {}", previous, key));
                self.writer.close(previous);
            }
            self.current_bucket = Some(key);
        }
        let last_rotation = *self.last_rotation.get_or_insert(now);

        self.buffer.append(&batch);

        let detections = match self.peak_finder.try_find_peaks(&batch, &self.detector) {
            Ok(found) => strongest(found, self.config.n_detect),
            Err(err) => {
                self.metrics.record_skip();
                self.logger
                    .cycle_warning(key, timestamp, format!("detection skipped: {}", err));
                Vec::new()
            }
        };
        self.metrics.record_detections(detections.len());

        if new_bucket || batch.configs != self.active_configs {
            self.active_configs = batch.configs;
            if let Err(err) =
                self.writer
                    .record_metadata(key, &self.active_configs, self.config_vars.as_ref())
            {
                self.output_failure(key, timestamp, err);
            }
        }
        if let Err(err) = self.writer.record_detections(key, &detections) {
            self.output_failure(key, timestamp, err);
        }

        let since_rotation = (now - last_rotation).num_milliseconds() as f64 / 1000.0;
        if since_rotation >= self.config.rotate_secs {
            self.rotate(key, now);
        }

        self.report_status(key, now, &detections);
    }

    fn rotate(&mut self, key: BucketKey, now: DateTime<Utc>) {
        self.last_rotation = Some(now);
        self.metrics.record_rotation();
        if !self.render_engine.enabled() {
            return;
        }

        let image = self.buffer.render();
        match self.writer.rotate(key, &image) {
            Ok(Some(path)) => self
                .logger
                .record(&format!("rotated waterfall to {}", path.display())),
            Ok(None) => {}
            Err(err) => self.output_failure(key, None, err),
        }
        if let Some(path) = self.config.savefig_path.clone() {
            if let Err(err) = OutputWriter::save_image(&path, &image) {
                self.output_failure(key, None, err);
            }
        }
    }

    fn report_status(&mut self, key: BucketKey, now: DateTime<Utc>, detections: &[Detection]) {
        if self.reporter.is_none() {
            return;
        }
        let scale = self.config.freq_scale;
        let summary = StatusSummary {
            timestamp: now.timestamp_millis() as f64 / 1000.0,
            bucket: Some(key.to_string()),
            freq_min: self.config.min_freq / scale,
            freq_max: self.config.max_freq / scale,
            detections: detections
                .iter()
                .map(|d| Detection {
                    start_freq: d.start_freq / scale,
                    end_freq: d.end_freq / scale,
                    ..d.clone()
                })
                .collect(),
            metrics: self.metrics.snapshot(),
            config_vars: self.config_vars.clone(),
        };
        if let Some(reporter) = self.reporter.as_mut() {
            if let Err(err) = reporter.report(&summary) {
                self.metrics.record_status_error();
                self.logger.cycle_warning(key, None, err);
            }
        }
    }

    fn output_failure(&self, key: BucketKey, timestamp: Option<f64>, err: WaterfallError) {
        self.metrics.record_io_error();
        if matches!(err, WaterfallError::BucketCreation { .. }) {
            self.logger
                .cycle_warning(key, timestamp, format!("abandoning bucket: {}", err));
        } else {
            self.logger.cycle_warning(key, timestamp, err);
        }
    }
}
