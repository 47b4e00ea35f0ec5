pub mod buffer;
pub mod narrowband;
pub mod peak_finder;
pub mod render;
pub mod wideband;

pub use buffer::WaterfallBuffer;
pub use narrowband::NarrowbandFinder;
pub use peak_finder::{get_peak_finder, peak_finder_names, DetectorConfig, PeakFinder};
pub use render::{ColorScale, RenderEngine, RenderSettings, Renderer};
pub use wideband::WidebandFinder;
