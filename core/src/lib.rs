//! Waterfall ingestion and peak-detection engine for RF spectrum monitoring.
//!
//! Scan batches from a radio front end are accumulated into a rolling
//! waterfall, scanned for peaks by a pluggable detector, and persisted into
//! time-bucketed directories of CSV detections, JSON metadata and PNG images.

pub mod engine;
pub mod math;
pub mod output;
pub mod prelude;
pub mod processing;
pub mod scan;
pub mod telemetry;

pub use prelude::{WaterfallError, WaterfallResult};
