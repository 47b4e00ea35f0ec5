pub use crate::engine::{EngineConfig, EngineState, ScanSource, WaterfallEngine};
pub use crate::processing::{get_peak_finder, DetectorConfig, PeakFinder, WaterfallBuffer};
pub use crate::scan::{Detection, PowerReading, ScanBatch, ScanConfig};

/// Common error type for the waterfall engine and its collaborators.
///
/// Only `Configuration` is fatal; every other variant is handled inside the
/// cycle that produced it.
#[derive(thiserror::Error, Debug)]
pub enum WaterfallError {
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("malformed batch: {0}")]
    MalformedBatch(String),
    #[error("failed writing {artifact} in bucket {bucket}: {message}")]
    OutputIo {
        artifact: String,
        bucket: String,
        message: String,
    },
    #[error("cannot create bucket {bucket}: {source}")]
    BucketCreation {
        bucket: String,
        #[source]
        source: std::io::Error,
    },
    #[error("status report failed: {0}")]
    Status(String),
}

impl WaterfallError {
    pub(crate) fn output(
        artifact: impl Into<String>,
        bucket: impl ToString,
        message: impl ToString,
    ) -> Self {
        WaterfallError::OutputIo {
            artifact: artifact.into(),
            bucket: bucket.to_string(),
            message: message.to_string(),
        }
    }
}

pub type WaterfallResult<T> = Result<T, WaterfallError>;
