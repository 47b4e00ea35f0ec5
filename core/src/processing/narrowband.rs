use crate::prelude::WaterfallResult;
use crate::processing::peak_finder::{detect_runs, DetectorConfig, PeakFinder};
use crate::scan::{Detection, ScanBatch};

/// Detector for signals occupying a small contiguous span.
#[derive(Debug, Default, Clone, Copy)]
pub struct NarrowbandFinder;

impl NarrowbandFinder {
    pub const NAME: &'static str = "narrowband";

    pub fn new() -> Self {
        Self
    }
}

impl PeakFinder for NarrowbandFinder {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn default_config(&self) -> DetectorConfig {
        DetectorConfig {
            threshold_db: 6.0,
            min_bins: 2,
            min_width_hz: None,
            max_width_hz: Some(250e3),
            smooth_bins: 1,
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scan::{PowerReading, ScanConfig};

    fn batch_with_peak(peak_min: f64, peak_max: f64, peak_val: f64) -> ScanBatch {
        let (freq_min, freq_max, step) = (1e6, 2e6, 1e3);
        let rows = ((freq_max - freq_min) / step) as usize;
        let readings: Vec<PowerReading> = (0..rows)
            .map(|i| {
                let freq = freq_min + i as f64 * step;
                let db = if freq >= peak_min && freq <= peak_max {
                    peak_val
                } else {
                    peak_val * 2.0
                };
                PowerReading::new(100.0, freq, db, i as u64)
            })
            .collect();
        let last = readings[readings.len() - 1].frequency;
        ScanBatch::new(
            vec![ScanConfig::new(1e6, 256, freq_min, last, step, 256)],
            readings,
        )
    }

    #[test]
    fn narrowband_reports_peak_extent_and_power() {
        let finder = NarrowbandFinder::new();
        let batch = batch_with_peak(1.50e6, 1.52e6, -10.0);
        let detections = finder.find_peaks(&batch, &finder.default_config());

        assert_eq!(detections.len(), 1);
        let detection = &detections[0];
        assert_eq!(detection.start_freq, 1.50e6);
        assert_eq!(detection.end_freq, 1.52e6);
        assert_eq!(detection.power_db, -10.0);
        assert_eq!(detection.timestamp, 100.0);
        assert_eq!(detection.detector_type, "narrowband");
    }

    #[test]
    fn detections_lie_within_config_bounds() {
        let finder = NarrowbandFinder::new();
        // Peak touches the top edge of the sweep.
        let batch = batch_with_peak(1.98e6, 2.5e6, -10.0);
        let (lo, hi) = batch.freq_bounds().unwrap();
        let detections = finder.find_peaks(&batch, &finder.default_config());
        assert!(!detections.is_empty());
        for detection in detections {
            assert!(detection.start_freq <= detection.end_freq);
            assert!(detection.start_freq >= lo && detection.end_freq <= hi);
        }
    }

    #[test]
    fn short_runs_are_discarded() {
        let finder = NarrowbandFinder::new();
        let batch = batch_with_peak(1.5e6, 1.5e6, -10.0);
        assert!(finder.find_peaks(&batch, &finder.default_config()).is_empty());
    }

    #[test]
    fn wide_runs_are_not_narrowband() {
        let finder = NarrowbandFinder::new();
        let batch = batch_with_peak(1.2e6, 1.6e6, -10.0);
        assert!(finder.find_peaks(&batch, &finder.default_config()).is_empty());
    }

    #[test]
    fn malformed_batch_yields_no_detections() {
        let finder = NarrowbandFinder::new();
        let mut batch = batch_with_peak(1.50e6, 1.52e6, -10.0);
        batch.readings.swap(10, 20);
        assert!(finder.try_find_peaks(&batch, &finder.default_config()).is_err());
        assert!(finder.find_peaks(&batch, &finder.default_config()).is_empty());
    }

    #[test]
    fn identical_batches_give_identical_output() {
        let finder = NarrowbandFinder::new();
        let batch = batch_with_peak(1.50e6, 1.52e6, -10.0);
        let config = finder.default_config();
        assert_eq!(
            finder.find_peaks(&batch, &config),
            finder.find_peaks(&batch, &config)
        );
    }
}
