use serde::{Deserialize, Serialize};

/// Describes the frequency sweep that produced a batch of readings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanConfig {
    pub sample_rate: f64,
    pub nfft: usize,
    pub freq_start: f64,
    pub freq_end: f64,
    pub tune_step_hz: f64,
    pub tune_step_fft: usize,
    /// Human-readable span, e.g. `"1000000-2000000"`.
    pub tuning_ranges: String,
}

impl ScanConfig {
    pub fn new(
        sample_rate: f64,
        nfft: usize,
        freq_start: f64,
        freq_end: f64,
        tune_step_hz: f64,
        tune_step_fft: usize,
    ) -> Self {
        Self {
            sample_rate,
            nfft,
            freq_start,
            freq_end,
            tune_step_hz,
            tune_step_fft,
            tuning_ranges: format!("{}-{}", freq_start as i64, freq_end as i64),
        }
    }

    pub fn contains(&self, freq: f64, tolerance: f64) -> bool {
        freq >= self.freq_start - tolerance && freq <= self.freq_end + tolerance
    }
}
