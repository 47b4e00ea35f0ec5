use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Peak emitted by a [`crate::processing::PeakFinder`] for one batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub timestamp: f64,
    pub start_freq: f64,
    pub end_freq: f64,
    pub power_db: f64,
    pub detector_type: String,
}

impl Detection {
    pub fn new(
        timestamp: f64,
        start_freq: f64,
        end_freq: f64,
        power_db: f64,
        detector_type: impl Into<String>,
    ) -> Self {
        Self {
            timestamp,
            start_freq,
            end_freq,
            power_db,
            detector_type: detector_type.into(),
        }
    }

    pub fn bandwidth(&self) -> f64 {
        self.end_freq - self.start_freq
    }

    /// Strongest first; equal power falls back to the lower start frequency.
    pub fn rank(&self, other: &Self) -> Ordering {
        other
            .power_db
            .total_cmp(&self.power_db)
            .then_with(|| self.start_freq.total_cmp(&other.start_freq))
    }
}

/// Orders detections by [`Detection::rank`] and keeps at most `limit`.
pub fn strongest(mut detections: Vec<Detection>, limit: usize) -> Vec<Detection> {
    detections.sort_by(|a, b| a.rank(b));
    detections.truncate(limit);
    detections
}
