pub mod config;
#[allow(clippy::module_inception)]
pub mod engine;
pub mod source;
pub mod threaded;

pub use config::EngineConfig;
pub use engine::{EngineState, WaterfallEngine};
pub use source::ScanSource;
pub use threaded::ThreadedSource;
