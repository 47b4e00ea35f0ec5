use serde::{Deserialize, Serialize};
use waterfallcore::telemetry::StatusSummary;

/// Most recent status pushed by a running engine.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StatusModel {
    pub latest: Option<StatusSummary>,
    pub received: usize,
    pub detections_seen: usize,
}

impl StatusModel {
    pub fn record(&mut self, summary: StatusSummary) {
        self.received += 1;
        self.detections_seen += summary.detections.len();
        self.latest = Some(summary);
    }
}
