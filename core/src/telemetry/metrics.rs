use serde::{Deserialize, Serialize};
use std::sync::Mutex;

pub struct MetricsRecorder {
    inner: Mutex<MetricsSnapshot>,
}

/// Counters accumulated over one engine run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub batches: usize,
    pub detections: usize,
    pub skipped_batches: usize,
    pub io_errors: usize,
    pub rotations: usize,
    pub status_errors: usize,
}

impl MetricsRecorder {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(MetricsSnapshot::default()),
        }
    }

    fn update(&self, apply: impl FnOnce(&mut MetricsSnapshot)) {
        if let Ok(mut metrics) = self.inner.lock() {
            apply(&mut metrics);
        }
    }

    pub fn record_batch(&self) {
        self.update(|m| m.batches += 1);
    }

    pub fn record_detections(&self, count: usize) {
        self.update(|m| m.detections += count);
    }

    pub fn record_skip(&self) {
        self.update(|m| m.skipped_batches += 1);
    }

    pub fn record_io_error(&self) {
        self.update(|m| m.io_errors += 1);
    }

    pub fn record_rotation(&self) {
        self.update(|m| m.rotations += 1);
    }

    pub fn record_status_error(&self) {
        self.update(|m| m.status_errors += 1);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        self.inner.lock().map(|m| *m).unwrap_or_default()
    }
}

impl Default for MetricsRecorder {
    fn default() -> Self {
        Self::new()
    }
}
