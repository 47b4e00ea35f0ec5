use crate::prelude::WaterfallResult;
use crate::processing::peak_finder::{detect_runs, DetectorConfig, PeakFinder};
use crate::scan::{Detection, ScanBatch};

/// Detector for broad emissions; smooths the spectrum before thresholding.
#[derive(Debug, Default, Clone, Copy)]
pub struct WidebandFinder;

impl WidebandFinder {
    pub const NAME: &'static str = "wideband";

    pub fn new() -> Self {
        Self
    }
}

impl PeakFinder for WidebandFinder {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn default_config(&self) -> DetectorConfig {
        DetectorConfig {
            threshold_db: 3.0,
            min_bins: 2,
            min_width_hz: Some(250e3),
            max_width_hz: None,
            smooth_bins: 5,
        }
    }

    fn try_find_peaks(
        &self,
        batch: &ScanBatch,
        config: &DetectorConfig,
    ) -> WaterfallResult<Vec<Detection>> {
        detect_runs(batch, config, Self::NAME)
    }
}
