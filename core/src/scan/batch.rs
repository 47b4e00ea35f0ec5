use crate::prelude::{WaterfallError, WaterfallResult};
use crate::scan::ScanConfig;
use serde::{Deserialize, Serialize};

/// One observed power sample at a frequency bin.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PowerReading {
    pub timestamp: f64,
    pub frequency: f64,
    pub power_db: f64,
    pub tune_count: u64,
}

impl PowerReading {
    pub fn new(timestamp: f64, frequency: f64, power_db: f64, tune_count: u64) -> Self {
        Self {
            timestamp,
            frequency,
            power_db,
            tune_count,
        }
    }
}

/// A delivery of scan configuration plus readings ordered by frequency.
///
/// A batch with no configs and no readings is the end-of-stream sentinel.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScanBatch {
    pub configs: Vec<ScanConfig>,
    pub readings: Vec<PowerReading>,
}

impl ScanBatch {
    pub fn new(configs: Vec<ScanConfig>, readings: Vec<PowerReading>) -> Self {
        Self { configs, readings }
    }

    pub fn end_of_stream() -> Self {
        Self::default()
    }

    pub fn is_end_of_stream(&self) -> bool {
        self.configs.is_empty() && self.readings.is_empty()
    }

    /// Builds a batch from parallel columns as delivered by column-oriented sources.
    pub fn from_columns(
        configs: Vec<ScanConfig>,
        timestamps: &[f64],
        frequencies: &[f64],
        powers: &[f64],
        tune_counts: &[u64],
    ) -> WaterfallResult<Self> {
        let len = frequencies.len();
        if timestamps.len() != len || powers.len() != len || tune_counts.len() != len {
            return Err(WaterfallError::MalformedBatch(format!(
                "column lengths differ: ts {}, freq {}, db {}, tune_count {}",
                timestamps.len(),
                len,
                powers.len(),
                tune_counts.len()
            )));
        }
        let readings = (0..len)
            .map(|i| PowerReading::new(timestamps[i], frequencies[i], powers[i], tune_counts[i]))
            .collect();
        Ok(Self { configs, readings })
    }

    /// Latest reading timestamp, used as the timestamp of every detection.
    pub fn timestamp(&self) -> Option<f64> {
        self.readings
            .iter()
            .map(|r| r.timestamp)
            .reduce(f64::max)
    }

    /// Union of the configured sweep spans.
    pub fn freq_bounds(&self) -> Option<(f64, f64)> {
        let start = self.configs.iter().map(|c| c.freq_start).reduce(f64::min)?;
        let end = self.configs.iter().map(|c| c.freq_end).reduce(f64::max)?;
        Some((start, end))
    }

    fn bin_tolerance(&self) -> f64 {
        self.configs
            .iter()
            .map(|c| c.tune_step_hz.abs())
            .filter(|step| step.is_finite())
            .fold(0.0, f64::max)
            / 2.0
    }

    pub fn validate(&self) -> WaterfallResult<()> {
        if self.configs.is_empty() {
            return Err(WaterfallError::MalformedBatch("batch has no scan config".into()));
        }
        if self.readings.is_empty() {
            return Err(WaterfallError::MalformedBatch("batch has no readings".into()));
        }
        for config in &self.configs {
            if !(config.freq_start.is_finite() && config.freq_end.is_finite())
                || config.freq_end < config.freq_start
            {
                return Err(WaterfallError::MalformedBatch(format!(
                    "invalid config span {}..{}",
                    config.freq_start, config.freq_end
                )));
            }
        }

        let tolerance = self.bin_tolerance();
        let mut previous: Option<f64> = None;
        for (idx, reading) in self.readings.iter().enumerate() {
            if !(reading.frequency.is_finite()
                && reading.power_db.is_finite()
                && reading.timestamp.is_finite())
            {
                return Err(WaterfallError::MalformedBatch(format!(
                    "non-finite reading at index {}",
                    idx
                )));
            }
            if let Some(prev) = previous {
                if reading.frequency <= prev {
                    return Err(WaterfallError::MalformedBatch(format!(
                        "frequency {} at index {} does not ascend from {}",
                        reading.frequency, idx, prev
                    )));
                }
            }
            if !self
                .configs
                .iter()
                .any(|c| c.contains(reading.frequency, tolerance))
            {
                return Err(WaterfallError::MalformedBatch(format!(
                    "frequency {} outside configured sweep",
                    reading.frequency
                )));
            }
            previous = Some(reading.frequency);
        }
        Ok(())
    }
}
