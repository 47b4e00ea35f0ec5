use crate::prelude::{WaterfallError, WaterfallResult};
use crate::processing::peak_finder::DetectorConfig;
use crate::processing::render::{ColorScale, RenderSettings, DPI, MAX_IMAGE_PIXELS};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

/// Every option recognised by the waterfall engine.
///
/// Times are seconds; frequencies are Hz; `width`/`height` are figure inches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub min_freq: f64,
    pub max_freq: f64,
    pub plot_snr: bool,
    /// Maximum detections persisted per cycle.
    pub n_detect: usize,
    pub save_path: PathBuf,
    /// Bucket rollover period.
    pub save_time: u64,
    pub peak_finder: String,
    pub render_engine: String,
    pub savefig_path: Option<PathBuf>,
    /// Image rotation cadence; 0 rotates every cycle.
    pub rotate_secs: f64,
    pub width: f64,
    pub height: f64,
    pub waterfall_height: usize,
    pub waterfall_width: usize,
    pub refresh: f64,
    pub batch_mode: bool,
    pub api_endpoint: Option<String>,
    pub config_vars: Option<BTreeMap<String, String>>,
    pub config_vars_path: Option<PathBuf>,
    /// Bin width requested from the source.
    pub scan_resolution: f64,
    /// Divisor applied to Hz in detection logs and status summaries.
    pub freq_scale: f64,
    pub detector: Option<DetectorConfig>,
    pub color_min_db: Option<f64>,
    pub color_max_db: Option<f64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            min_freq: 300e6,
            max_freq: 6e9,
            plot_snr: false,
            n_detect: 80,
            save_path: PathBuf::from("waterfall"),
            save_time: 60,
            peak_finder: "narrowband".to_string(),
            render_engine: "agg".to_string(),
            savefig_path: None,
            rotate_secs: 900.0,
            width: 28.0,
            height: 10.0,
            waterfall_height: 100,
            waterfall_width: 5000,
            refresh: 5.0,
            batch_mode: false,
            api_endpoint: None,
            config_vars: None,
            config_vars_path: None,
            scan_resolution: 1e4,
            freq_scale: 1e6,
            detector: None,
            color_min_db: None,
            color_max_db: None,
        }
    }
}

fn config_error(message: impl Into<String>) -> WaterfallError {
    WaterfallError::Configuration(message.into())
}

impl EngineConfig {
    pub fn validate(&self) -> WaterfallResult<()> {
        if !(self.min_freq.is_finite() && self.max_freq.is_finite()) {
            return Err(config_error("frequency bounds must be finite"));
        }
        if self.max_freq <= self.min_freq {
            return Err(config_error(format!(
                "max_freq {} must exceed min_freq {}",
                self.max_freq, self.min_freq
            )));
        }
        if self.save_time == 0 {
            return Err(config_error("save_time must be at least one second"));
        }
        if !(self.width.is_finite() && self.height.is_finite())
            || !(self.width > 0.0 && self.height > 0.0)
        {
            return Err(config_error("image width and height must be positive and finite"));
        }
        let pixels = (self.width * DPI).round() * (self.height * DPI).round();
        if pixels > MAX_IMAGE_PIXELS {
            return Err(config_error(format!(
                "{}x{} inch image exceeds {} pixels",
                self.width, self.height, MAX_IMAGE_PIXELS
            )));
        }
        if self.waterfall_height == 0 || self.waterfall_width == 0 {
            return Err(config_error("waterfall dimensions must be non-zero"));
        }
        if !(self.refresh.is_finite() && self.refresh >= 0.0) {
            return Err(config_error("refresh must be a non-negative number of seconds"));
        }
        if !(self.rotate_secs.is_finite() && self.rotate_secs >= 0.0) {
            return Err(config_error("rotate_secs must be a non-negative number of seconds"));
        }
        if !(self.scan_resolution.is_finite() && self.scan_resolution > 0.0) {
            return Err(config_error("scan_resolution must be positive"));
        }
        if !(self.freq_scale.is_finite() && self.freq_scale > 0.0) {
            return Err(config_error("freq_scale must be positive"));
        }
        self.color_scale()?;
        Ok(())
    }

    pub fn color_scale(&self) -> WaterfallResult<ColorScale> {
        match (self.color_min_db, self.color_max_db) {
            (None, None) => Ok(ColorScale::Auto),
            (Some(min_db), Some(max_db)) if max_db > min_db => {
                Ok(ColorScale::Fixed { min_db, max_db })
            }
            (Some(_), Some(_)) => Err(config_error("color_max_db must exceed color_min_db")),
            _ => Err(config_error(
                "color_min_db and color_max_db must be given together",
            )),
        }
    }

    pub fn render_settings(&self) -> WaterfallResult<RenderSettings> {
        Ok(RenderSettings::from_inches(
            self.width,
            self.height,
            self.plot_snr,
            self.color_scale()?,
        ))
    }

    /// Persists `config_vars` to `config_vars_path`, or loads them from it when
    /// only the path is set.
    pub fn resolve_config_vars(&self) -> WaterfallResult<Option<BTreeMap<String, String>>> {
        match (&self.config_vars, &self.config_vars_path) {
            (Some(vars), Some(path)) => {
                let json = serde_json::to_string_pretty(vars)
                    .map_err(|err| config_error(format!("encoding config vars: {}", err)))?;
                if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                    fs::create_dir_all(parent).map_err(|err| {
                        config_error(format!("creating {}: {}", parent.display(), err))
                    })?;
                }
                fs::write(path, json).map_err(|err| {
                    config_error(format!("writing config vars {}: {}", path.display(), err))
                })?;
                Ok(Some(vars.clone()))
            }
            (None, Some(path)) if path.exists() => {
                let contents = fs::read_to_string(path).map_err(|err| {
                    config_error(format!("reading config vars {}: {}", path.display(), err))
                })?;
                let vars = serde_json::from_str(&contents).map_err(|err| {
                    config_error(format!("parsing config vars {}: {}", path.display(), err))
                })?;
                Ok(Some(vars))
            }
            (vars, _) => Ok(vars.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(EngineConfig::default().validate().is_ok());
    }

    #[test]
    fn inverted_bounds_are_rejected() {
        let config = EngineConfig {
            min_freq: 2e6,
            max_freq: 1e6,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(WaterfallError::Configuration(_))
        ));
    }

    #[test]
    fn unbounded_image_size_is_rejected() {
        for (width, height) in [(f64::INFINITY, 10.0), (28.0, f64::NAN), (1e6, 1e6)] {
            let config = EngineConfig {
                width,
                height,
                ..Default::default()
            };
            assert!(
                matches!(config.validate(), Err(WaterfallError::Configuration(_))),
                "{}x{}",
                width,
                height
            );
        }
        let largest = EngineConfig {
            width: 80.0,
            height: 80.0,
            ..Default::default()
        };
        assert!(largest.validate().is_ok());
    }

    #[test]
    fn half_specified_color_scale_is_rejected() {
        let config = EngineConfig {
            color_min_db: Some(-100.0),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn partial_config_fills_defaults() {
        let config: EngineConfig =
            serde_json::from_str(r#"{"min_freq": 1e6, "max_freq": 2e6, "batch_mode": true}"#)
                .unwrap();
        assert_eq!(config.peak_finder, "narrowband");
        assert!(config.batch_mode);
        assert_eq!(config.save_time, 60);
    }

    #[test]
    fn config_vars_round_trip_through_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vars.json");
        let mut vars = BTreeMap::new();
        vars.insert("sdr".to_string(), "ettus".to_string());

        let writer = EngineConfig {
            config_vars: Some(vars.clone()),
            config_vars_path: Some(path.clone()),
            ..Default::default()
        };
        assert_eq!(writer.resolve_config_vars().unwrap(), Some(vars.clone()));

        let reader = EngineConfig {
            config_vars_path: Some(path),
            ..Default::default()
        };
        assert_eq!(reader.resolve_config_vars().unwrap(), Some(vars));
    }
}
