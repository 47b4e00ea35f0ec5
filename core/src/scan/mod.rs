pub mod batch;
pub mod config;
pub mod detection;

pub use batch::{PowerReading, ScanBatch};
pub use config::ScanConfig;
pub use detection::{strongest, Detection};
