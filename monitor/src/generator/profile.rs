use anyhow::{bail, Context};
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use waterfallcore::engine::ScanSource;
use waterfallcore::scan::{PowerReading, ScanBatch, ScanConfig};

/// Flat-topped emission spanning `[min_freq, max_freq]` Hz at `power_db`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeakProfile {
    pub min_freq: f64,
    pub max_freq: f64,
    pub power_db: f64,
}

impl FromStr for PeakProfile {
    type Err = anyhow::Error;

    /// Parses `min:max:db`, e.g. `1.5e6:1.52e6:-10`.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = value.split(':').collect();
        if parts.len() != 3 {
            bail!("peak {:?} must be min:max:db", value);
        }
        let parse = |part: &str| {
            part.trim()
                .parse::<f64>()
                .with_context(|| format!("parsing {:?} in peak {:?}", part, value))
        };
        let peak = PeakProfile {
            min_freq: parse(parts[0])?,
            max_freq: parse(parts[1])?,
            power_db: parse(parts[2])?,
        };
        if peak.max_freq < peak.min_freq {
            bail!("peak {:?} ends before it starts", value);
        }
        Ok(peak)
    }
}

/// Configuration for generating synthetic scans.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    pub freq_min: f64,
    pub freq_max: f64,
    pub background_db: f64,
    /// Uniform jitter amplitude added to every bin.
    pub noise_db: f64,
    pub peaks: Vec<PeakProfile>,
    pub seed: u64,
    pub sample_rate: f64,
    pub nfft: usize,
    /// Emit the end-of-stream sentinel after this many batches.
    pub batches: Option<usize>,
    /// Report unhealthy once this many seconds have passed.
    pub run_secs: Option<f64>,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            freq_min: 1e6,
            freq_max: 2e6,
            background_db: -20.0,
            noise_db: 0.5,
            peaks: vec![PeakProfile {
                min_freq: 1.50e6,
                max_freq: 1.52e6,
                power_db: -10.0,
            }],
            seed: 0,
            sample_rate: 1e6,
            nfft: 256,
            batches: None,
            run_secs: Some(90.0),
        }
    }
}

fn unix_now() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs_f64())
        .unwrap_or_default()
}

/// Deterministic scan generator; identical seeds yield identical power values.
pub struct ScanGenerator {
    config: GeneratorConfig,
    rng: StdRng,
    emitted: usize,
}

impl ScanGenerator {
    pub fn new(config: GeneratorConfig) -> Self {
        let rng = StdRng::seed_from_u64(config.seed);
        Self {
            config,
            rng,
            emitted: 0,
        }
    }

    pub fn exhausted(&self) -> bool {
        self.config.batches.is_some_and(|limit| self.emitted >= limit)
    }

    /// Builds one sweep at `resolution` Hz per bin stamped with `timestamp`.
    pub fn build_batch(&mut self, resolution: f64, timestamp: f64) -> anyhow::Result<ScanBatch> {
        let span = self.config.freq_max - self.config.freq_min;
        if !(resolution > 0.0) || !(span > 0.0) {
            bail!(
                "cannot sweep {}..{} Hz at {} Hz resolution",
                self.config.freq_min,
                self.config.freq_max,
                resolution
            );
        }
        let rows = (span / resolution) as usize;
        let noise = self.config.noise_db.abs();

        let mut readings = Vec::with_capacity(rows);
        for i in 0..rows {
            let freq = self.config.freq_min + i as f64 * resolution;
            let base = self
                .config
                .peaks
                .iter()
                .filter(|peak| freq >= peak.min_freq && freq <= peak.max_freq)
                .map(|peak| peak.power_db)
                .reduce(f64::max)
                .unwrap_or(self.config.background_db);
            let jitter = if noise > 0.0 {
                self.rng.gen_range(-noise..noise)
            } else {
                0.0
            };
            readings.push(PowerReading::new(timestamp, freq, base + jitter, i as u64));
        }
        let last = readings
            .last()
            .map(|r| r.frequency)
            .context("sweep produced no bins")?;

        self.emitted += 1;
        let config = ScanConfig::new(
            self.config.sample_rate,
            self.config.nfft,
            self.config.freq_min,
            last,
            resolution,
            self.config.nfft,
        );
        Ok(ScanBatch::new(vec![config], readings))
    }

    /// Next batch, or `None` once the batch limit is reached.
    pub fn next_batch(&mut self, resolution: f64) -> Option<ScanBatch> {
        if self.exhausted() {
            return None;
        }
        match self.build_batch(resolution, unix_now()) {
            Ok(batch) => Some(batch),
            Err(err) => {
                log::error!("synthetic scan failed: {:#}", err);
                None
            }
        }
    }
}

/// [`ScanSource`] backed by a [`ScanGenerator`] on the calling thread.
pub struct SyntheticSource {
    generator: ScanGenerator,
    started: Instant,
    run_for: Option<Duration>,
    stopped: bool,
}

impl SyntheticSource {
    pub fn new(config: GeneratorConfig) -> Self {
        let run_for = config.run_secs.map(Duration::from_secs_f64);
        Self {
            generator: ScanGenerator::new(config),
            started: Instant::now(),
            run_for,
            stopped: false,
        }
    }
}

impl ScanSource for SyntheticSource {
    fn read_batch(&mut self, scan_resolution: f64) -> ScanBatch {
        if self.stopped {
            return ScanBatch::end_of_stream();
        }
        self.generator
            .next_batch(scan_resolution)
            .unwrap_or_else(ScanBatch::end_of_stream)
    }

    fn healthy(&self) -> bool {
        !self.stopped
            && self
                .run_for
                .map_or(true, |limit| self.started.elapsed() < limit)
    }

    fn stop(&mut self) {
        self.stopped = true;
    }
}
