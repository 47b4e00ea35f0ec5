use log::{info, warn};
use std::fmt::Display;

/// Component-scoped logging that tags per-cycle failures with the bucket and
/// batch timestamp they belong to.
pub struct LogManager {
    component: &'static str,
}

impl LogManager {
    pub fn new(component: &'static str) -> Self {
        Self { component }
    }

    pub fn record(&self, message: &str) {
        info!("{}: {}", self.component, message);
    }

    pub fn cycle_warning(
        &self,
        bucket: impl Display,
        timestamp: Option<f64>,
        message: impl Display,
    ) {
        match timestamp {
            Some(ts) => warn!(
                "{}: [bucket {} ts {:.3}] {}",
                self.component, bucket, ts, message
            ),
            None => warn!("{}: [bucket {}] {}", self.component, bucket, message),
        }
    }
}

impl Default for LogManager {
    fn default() -> Self {
        Self::new("waterfall")
    }
}
