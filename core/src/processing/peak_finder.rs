use crate::math::stats::StatsHelper;
use crate::prelude::{WaterfallError, WaterfallResult};
use crate::processing::narrowband::NarrowbandFinder;
use crate::processing::wideband::WidebandFinder;
use crate::scan::{Detection, ScanBatch};
use log::warn;
use serde::{Deserialize, Serialize};

/// Tuning shared by every detector variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectorConfig {
    /// Margin above the batch noise floor (median power).
    pub threshold_db: f64,
    /// Runs with fewer bins are treated as noise.
    pub min_bins: usize,
    #[serde(default)]
    pub min_width_hz: Option<f64>,
    #[serde(default)]
    pub max_width_hz: Option<f64>,
    /// Moving-average window applied before thresholding; 1 disables smoothing.
    #[serde(default = "default_smooth_bins")]
    pub smooth_bins: usize,
}

fn default_smooth_bins() -> usize {
    1
}

/// Pluggable strategy that turns one batch into detections.
pub trait PeakFinder {
    /// Registry key, also written to the `type` column of detection logs.
    fn name(&self) -> &'static str;

    fn default_config(&self) -> DetectorConfig;

    fn try_find_peaks(
        &self,
        batch: &ScanBatch,
        config: &DetectorConfig,
    ) -> WaterfallResult<Vec<Detection>>;

    /// Like [`PeakFinder::try_find_peaks`] but a malformed batch yields no detections.
    fn find_peaks(&self, batch: &ScanBatch, config: &DetectorConfig) -> Vec<Detection> {
        match self.try_find_peaks(batch, config) {
            Ok(detections) => detections,
            Err(err) => {
                warn!("{}: skipping batch: {}", self.name(), err);
                Vec::new()
            }
        }
    }
}

type FinderFactory = fn() -> Box<dyn PeakFinder>;

fn narrowband() -> Box<dyn PeakFinder> {
    Box::new(NarrowbandFinder::new())
}

fn wideband() -> Box<dyn PeakFinder> {
    Box::new(WidebandFinder::new())
}

static PEAK_FINDERS: &[(&str, FinderFactory)] = &[
    (NarrowbandFinder::NAME, narrowband),
    (WidebandFinder::NAME, wideband),
];

/// Looks up a detector by registry name.
pub fn get_peak_finder(name: &str) -> WaterfallResult<Box<dyn PeakFinder>> {
    PEAK_FINDERS
        .iter()
        .find(|(key, _)| *key == name)
        .map(|(_, factory)| factory())
        .ok_or_else(|| {
            WaterfallError::Configuration(format!(
                "unknown peak finder {:?} (available: {})",
                name,
                peak_finder_names().join(", ")
            ))
        })
}

pub fn peak_finder_names() -> Vec<&'static str> {
    PEAK_FINDERS.iter().map(|(key, _)| *key).collect()
}

/// Emits one detection per run of adjacent bins above `median + threshold_db`.
pub(crate) fn detect_runs(
    batch: &ScanBatch,
    config: &DetectorConfig,
    detector_type: &str,
) -> WaterfallResult<Vec<Detection>> {
    batch.validate()?;
    let (freq_lo, freq_hi) = batch
        .freq_bounds()
        .ok_or_else(|| WaterfallError::MalformedBatch("batch has no scan config".into()))?;
    let timestamp = batch
        .timestamp()
        .ok_or_else(|| WaterfallError::MalformedBatch("batch has no readings".into()))?;

    let freqs: Vec<f64> = batch.readings.iter().map(|r| r.frequency).collect();
    let raw: Vec<f64> = batch.readings.iter().map(|r| r.power_db).collect();
    let levels = StatsHelper::moving_average(&raw, config.smooth_bins);
    let floor = StatsHelper::median(&levels)
        .ok_or_else(|| WaterfallError::MalformedBatch("no finite power values".into()))?;
    let threshold = floor + config.threshold_db;

    // Readings further apart than this belong to different sweeps.
    let max_gap = batch
        .configs
        .iter()
        .map(|c| c.tune_step_hz.abs())
        .filter(|step| step.is_finite() && *step > 0.0)
        .reduce(f64::max)
        .map(|step| step * 1.5);

    let mut runs = Vec::new();
    let mut run_start: Option<usize> = None;
    for idx in 0..levels.len() {
        let above = levels[idx] > threshold;
        let gap = idx > 0 && max_gap.is_some_and(|gap| freqs[idx] - freqs[idx - 1] > gap);
        if let Some(start) = run_start {
            if !above || gap {
                runs.push(start..idx);
                run_start = None;
            }
        }
        if above && run_start.is_none() {
            run_start = Some(idx);
        }
    }
    if let Some(start) = run_start {
        runs.push(start..levels.len());
    }

    let mut detections = Vec::new();
    for run in runs {
        if run.len() < config.min_bins.max(1) {
            continue;
        }
        let start_freq = freqs[run.start].clamp(freq_lo, freq_hi);
        let end_freq = freqs[run.end - 1].clamp(freq_lo, freq_hi);
        let width = end_freq - start_freq;
        if config.min_width_hz.is_some_and(|min| width < min) {
            continue;
        }
        if config.max_width_hz.is_some_and(|max| width > max) {
            continue;
        }
        let power_db = raw[run].iter().copied().fold(f64::NEG_INFINITY, f64::max);
        detections.push(Detection::new(
            timestamp,
            start_freq,
            end_freq,
            power_db,
            detector_type,
        ));
    }
    Ok(detections)
}
