use crate::generator::profile::{ScanGenerator, SyntheticSource};
use crate::generator::replay::ReplaySource;
use crate::workflow::config::{SourceConfig, WorkflowConfig};
use anyhow::Context;
use std::thread;
use std::time::Duration;
use waterfallcore::engine::{ScanSource, ThreadedSource, WaterfallEngine};
use waterfallcore::telemetry::MetricsSnapshot;

#[derive(Clone)]
pub struct Runner {
    config: WorkflowConfig,
}

impl Runner {
    pub fn new(config: WorkflowConfig) -> Self {
        Self { config }
    }

    /// Builds the engine and source, then runs until the source is done.
    pub fn execute(&self) -> anyhow::Result<MetricsSnapshot> {
        let mut engine =
            WaterfallEngine::new(self.config.engine.clone()).context("building waterfall engine")?;
        let mut source = self.build_source().context("building scan source")?;
        Ok(engine.run(source.as_mut()))
    }

    fn build_source(&self) -> anyhow::Result<Box<dyn ScanSource>> {
        let engine = &self.config.engine;
        let source: Box<dyn ScanSource> = match &self.config.source {
            SourceConfig::Synthetic(generator) if engine.batch_mode => {
                Box::new(SyntheticSource::new(generator.clone()))
            }
            SourceConfig::Synthetic(generator) => {
                // Continuous mode: sweeps arrive from a background thread at the refresh cadence.
                let resolution = engine.scan_resolution;
                let sweep = Duration::from_secs_f64(engine.refresh);
                let run_for = generator.run_secs.map(Duration::from_secs_f64);
                let mut scans = ScanGenerator::new(generator.clone());
                Box::new(ThreadedSource::spawn(run_for, move || {
                    thread::sleep(sweep);
                    scans.next_batch(resolution)
                }))
            }
            SourceConfig::Replay {
                path,
                sample_rate,
                nfft,
            } => {
                let replay = ReplaySource::open(path, *sample_rate, *nfft)?;
                log::info!("replaying {} scans from {}", replay.remaining(), path.display());
                Box::new(replay)
            }
        };
        Ok(source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::profile::{GeneratorConfig, PeakProfile};
    use std::fs;
    use std::path::{Path, PathBuf};
    use waterfallcore::engine::EngineConfig;

    fn engine_config(root: &Path) -> EngineConfig {
        EngineConfig {
            min_freq: 1e6,
            max_freq: 2e6,
            plot_snr: true,
            n_detect: 1,
            save_path: root.to_path_buf(),
            save_time: 1,
            peak_finder: "narrowband".into(),
            render_engine: "agg".into(),
            savefig_path: Some(root.join("test.png")),
            rotate_secs: 60.0,
            width: 10.0,
            height: 5.0,
            waterfall_height: 10,
            waterfall_width: 100,
            refresh: 5.0,
            batch_mode: true,
            scan_resolution: 1e3,
            ..Default::default()
        }
    }

    fn generator(batches: usize) -> GeneratorConfig {
        GeneratorConfig {
            freq_min: 1e6,
            freq_max: 2e6,
            background_db: -20.0,
            noise_db: 0.0,
            peaks: vec![PeakProfile {
                min_freq: 1.50e6,
                max_freq: 1.52e6,
                power_db: -10.0,
            }],
            batches: Some(batches),
            run_secs: Some(90.0),
            ..Default::default()
        }
    }

    /// `<root>/<date>/<bucket>/<file>` paths whose name matches.
    fn bucket_files(root: &Path, prefix: &str, ext: &str) -> Vec<PathBuf> {
        let mut found = Vec::new();
        for date in fs::read_dir(root).unwrap().flatten() {
            if !date.path().is_dir() {
                continue;
            }
            for bucket in fs::read_dir(date.path()).unwrap().flatten() {
                for file in fs::read_dir(bucket.path()).unwrap().flatten() {
                    let name = file.file_name().to_string_lossy().to_string();
                    if name.starts_with(prefix) && name.ends_with(ext) {
                        found.push(file.path());
                    }
                }
            }
        }
        found
    }

    fn assert_peak_rows(root: &Path) {
        let logs = bucket_files(root, "detections", ".csv");
        assert!(!logs.is_empty());
        let mut rows = 0;
        for log in logs {
            let mut reader = csv::Reader::from_path(&log).unwrap();
            for record in reader.records() {
                let record = record.unwrap();
                let start: f64 = record[1].parse().unwrap();
                let end: f64 = record[2].parse().unwrap();
                let db: f64 = record[3].parse().unwrap();
                assert_eq!((start * 10.0).round() / 10.0, 1.5);
                assert_eq!((end * 10.0).round() / 10.0, 1.5);
                assert!((end - 1.52).abs() <= 1e-3);
                assert_eq!(db, -10.0);
                assert_eq!(&record[4], "narrowband");
                rows += 1;
            }
        }
        assert!(rows >= 1);
    }

    #[test]
    fn runner_executes_batch_workflow() {
        let dir = tempfile::tempdir().unwrap();
        let config = WorkflowConfig::from_parts(
            engine_config(dir.path()),
            SourceConfig::Synthetic(generator(1)),
        );
        let metrics = Runner::new(config).execute().unwrap();

        assert_eq!(metrics.batches, 1);
        assert_eq!(metrics.rotations, 1);
        assert!(dir.path().join("test.png").exists());
        let artifacts = [("metadata", ".json"), ("detections", ".csv"), ("waterfall", ".png")];
        for (prefix, ext) in artifacts {
            assert!(!bucket_files(dir.path(), prefix, ext).is_empty(), "{}", prefix);
        }
        assert_peak_rows(dir.path());
    }

    #[test]
    fn runner_executes_continuous_workflow() {
        let dir = tempfile::tempdir().unwrap();
        let mut engine = engine_config(dir.path());
        engine.batch_mode = false;
        engine.refresh = 0.0;
        let config = WorkflowConfig::from_parts(engine, SourceConfig::Synthetic(generator(3)));

        let metrics = Runner::new(config).execute().unwrap();

        assert_eq!(metrics.batches, 3);
        assert_peak_rows(dir.path());
    }

    #[test]
    fn runner_replays_recorded_scans() {
        let dir = tempfile::tempdir().unwrap();
        let recording = dir.path().join("scans.csv");
        let mut writer = csv::Writer::from_path(&recording).unwrap();
        writer.write_record(["ts", "freq", "db", "tune_count"]).unwrap();
        for i in 0..1000u64 {
            let freq = 1e6 + i as f64 * 1e3;
            let db = if (1.50e6..=1.52e6).contains(&freq) { -10.0 } else { -20.0 };
            writer
                .write_record([
                    "42.0".to_string(),
                    freq.to_string(),
                    db.to_string(),
                    i.to_string(),
                ])
                .unwrap();
        }
        writer.flush().unwrap();
        drop(writer);

        let output = dir.path().join("out");
        let config = WorkflowConfig::from_parts(
            engine_config(&output),
            SourceConfig::Replay {
                path: recording,
                sample_rate: 1e6,
                nfft: 256,
            },
        );
        let metrics = Runner::new(config).execute().unwrap();

        assert_eq!(metrics.batches, 1);
        assert_peak_rows(&output);
    }

    #[test]
    fn replay_detects_peaks_in_bins_wider_than_scan_resolution() {
        let dir = tempfile::tempdir().unwrap();
        let recording = dir.path().join("coarse.csv");
        let mut writer = csv::Writer::from_path(&recording).unwrap();
        writer.write_record(["ts", "freq", "db", "tune_count"]).unwrap();
        for i in 0..40u64 {
            let db = if (20..23).contains(&i) { -10.0 } else { -20.0 };
            writer
                .write_record([
                    "7.0".to_string(),
                    (1e6 + i as f64 * 25e3).to_string(),
                    db.to_string(),
                    i.to_string(),
                ])
                .unwrap();
        }
        writer.flush().unwrap();
        drop(writer);

        let output = dir.path().join("out");
        let mut engine = engine_config(&output);
        engine.scan_resolution = 1e4;
        let config = WorkflowConfig::from_parts(
            engine,
            SourceConfig::Replay {
                path: recording,
                sample_rate: 1e6,
                nfft: 256,
            },
        );
        let metrics = Runner::new(config).execute().unwrap();

        assert_eq!(metrics.batches, 1);
        assert_eq!(metrics.detections, 1);
        assert_eq!(metrics.skipped_batches, 0);
    }

    #[test]
    fn unknown_detector_fails_before_running() {
        let dir = tempfile::tempdir().unwrap();
        let mut engine = engine_config(dir.path());
        engine.peak_finder = "bogus".into();
        let config = WorkflowConfig::from_parts(engine, SourceConfig::Synthetic(generator(1)));
        assert!(Runner::new(config).execute().is_err());
    }
}
