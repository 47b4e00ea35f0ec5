pub mod log;
pub mod metrics;
pub mod status;

pub use self::log::LogManager;
pub use metrics::{MetricsRecorder, MetricsSnapshot};
pub use status::{HttpStatusReporter, StatusReporter, StatusSummary};
