use crate::math::stats::StatsHelper;
use crate::prelude::{WaterfallError, WaterfallResult};
use image::{Rgb, RgbImage};
use ndarray::ArrayView2;
use std::str::FromStr;

/// Pixels per inch of figure size.
pub const DPI: f64 = 100.0;

/// Largest image the renderer will allocate.
pub const MAX_IMAGE_PIXELS: f64 = 64_000_000.0;

const NO_DATA: Rgb<u8> = Rgb([0, 0, 0]);

/// Backend used to turn the waterfall into an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderEngine {
    /// Raster PNG output.
    Agg,
    /// Rendering disabled; rotations write nothing.
    Disabled,
}

impl RenderEngine {
    pub fn name(&self) -> &'static str {
        match self {
            RenderEngine::Agg => "agg",
            RenderEngine::Disabled => "none",
        }
    }

    pub fn enabled(&self) -> bool {
        matches!(self, RenderEngine::Agg)
    }
}

impl FromStr for RenderEngine {
    type Err = WaterfallError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "agg" => Ok(RenderEngine::Agg),
            "none" => Ok(RenderEngine::Disabled),
            other => Err(WaterfallError::Configuration(format!(
                "unknown render engine {:?} (available: agg, none)",
                other
            ))),
        }
    }
}

/// Value range mapped onto the colour map.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ColorScale {
    /// Locked to the 5th/95th percentile of the first non-empty render.
    Auto,
    Fixed { min_db: f64, max_db: f64 },
}

#[derive(Debug, Clone, PartialEq)]
pub struct RenderSettings {
    pub width_px: u32,
    pub height_px: u32,
    /// Subtract each row's median so colours show SNR instead of absolute power.
    pub plot_snr: bool,
    pub scale: ColorScale,
}

impl RenderSettings {
    pub fn from_inches(width: f64, height: f64, plot_snr: bool, scale: ColorScale) -> Self {
        Self {
            width_px: ((width * DPI).round() as u32).max(1),
            height_px: ((height * DPI).round() as u32).max(1),
            plot_snr,
            scale,
        }
    }
}

/// Blue → cyan → green → yellow → red gradient over `[min_db, max_db]`.
pub fn db_to_color(db: f64, min_db: f64, max_db: f64) -> Rgb<u8> {
    let normalized = ((db - min_db) / (max_db - min_db)).clamp(0.0, 1.0);
    let stops: [(f64, [u8; 3]); 5] = [
        (0.0, [0, 0, 128]),
        (0.25, [0, 128, 255]),
        (0.5, [0, 255, 0]),
        (0.75, [255, 255, 0]),
        (1.0, [255, 0, 0]),
    ];

    for pair in stops.windows(2) {
        let (t1, c1) = pair[0];
        let (t2, c2) = pair[1];
        if normalized >= t1 && normalized <= t2 {
            let t = (normalized - t1) / (t2 - t1);
            let lerp = |a: u8, b: u8| (a as f64 + t * (b as f64 - a as f64)).round() as u8;
            return Rgb([lerp(c1[0], c2[0]), lerp(c1[1], c2[1]), lerp(c1[2], c2[2])]);
        }
    }
    Rgb([255, 0, 0])
}

/// Maps a (time, frequency) grid onto pixels, holding the colour scale for the run.
#[derive(Debug, Clone)]
pub struct Renderer {
    settings: RenderSettings,
    locked: Option<(f64, f64)>,
}

impl Renderer {
    pub fn new(settings: RenderSettings) -> Self {
        let locked = match settings.scale {
            ColorScale::Fixed { min_db, max_db } => Some((min_db, max_db)),
            ColorScale::Auto => None,
        };
        Self { settings, locked }
    }

    pub fn scale(&self) -> Option<(f64, f64)> {
        self.locked
    }

    /// Renders `grid` (rows = time, newest first; columns = frequency; NaN = no data).
    pub fn render(&mut self, grid: ArrayView2<f32>) -> RgbImage {
        let (rows, cols) = grid.dim();
        let mut values: Vec<Vec<f64>> = grid
            .rows()
            .into_iter()
            .map(|row| row.iter().map(|&v| v as f64).collect())
            .collect();

        if self.settings.plot_snr {
            for row in values.iter_mut() {
                if let Some(floor) = StatsHelper::median(row) {
                    row.iter_mut().for_each(|v| *v -= floor);
                }
            }
        }

        if self.locked.is_none() {
            let flat: Vec<f64> = values.iter().flatten().copied().collect();
            if let (Some(lo), Some(hi)) = (
                StatsHelper::percentile(&flat, 5.0),
                StatsHelper::percentile(&flat, 95.0),
            ) {
                self.locked = Some(if hi - lo < 1e-9 {
                    (lo - 1.0, hi + 1.0)
                } else {
                    (lo, hi)
                });
            }
        }

        let (width, height) = (self.settings.width_px, self.settings.height_px);
        let scale = self.locked;
        RgbImage::from_fn(width, height, |x, y| {
            if rows == 0 || cols == 0 {
                return NO_DATA;
            }
            let col = ((x as usize * cols) / width as usize).min(cols - 1);
            let row = ((y as usize * rows) / height as usize).min(rows - 1);
            let value = values[row][col];
            match scale {
                Some((min_db, max_db)) if value.is_finite() => db_to_color(value, min_db, max_db),
                _ => NO_DATA,
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn color_map_endpoints() {
        assert_eq!(db_to_color(-100.0, -100.0, 0.0), Rgb([0, 0, 128]));
        assert_eq!(db_to_color(0.0, -100.0, 0.0), Rgb([255, 0, 0]));
        assert_eq!(db_to_color(-50.0, -100.0, 0.0), Rgb([0, 255, 0]));
        assert_eq!(db_to_color(40.0, -100.0, 0.0), Rgb([255, 0, 0]));
    }

    #[test]
    fn render_engine_parses_known_names() {
        assert_eq!("agg".parse::<RenderEngine>().unwrap(), RenderEngine::Agg);
        assert_eq!("none".parse::<RenderEngine>().unwrap(), RenderEngine::Disabled);
        assert!("cairo".parse::<RenderEngine>().is_err());
    }

    #[test]
    fn settings_from_inches_uses_dpi() {
        let settings = RenderSettings::from_inches(10.0, 5.0, false, ColorScale::Auto);
        assert_eq!((settings.width_px, settings.height_px), (1000, 500));
    }

    #[test]
    fn auto_scale_locks_on_first_render() {
        let settings = RenderSettings {
            width_px: 2,
            height_px: 1,
            plot_snr: false,
            scale: ColorScale::Auto,
        };
        let mut renderer = Renderer::new(settings);
        renderer.render(array![[-20.0f32, -10.0]].view());
        let first = renderer.scale().unwrap();
        renderer.render(array![[-80.0f32, 30.0]].view());
        assert_eq!(renderer.scale().unwrap(), first);
    }

    #[test]
    fn missing_cells_render_black() {
        let settings = RenderSettings {
            width_px: 2,
            height_px: 1,
            plot_snr: false,
            scale: ColorScale::Fixed {
                min_db: -20.0,
                max_db: 0.0,
            },
        };
        let mut renderer = Renderer::new(settings);
        let image = renderer.render(array![[f32::NAN, 0.0]].view());
        assert_eq!(*image.get_pixel(0, 0), NO_DATA);
        assert_eq!(*image.get_pixel(1, 0), Rgb([255, 0, 0]));
    }

    #[test]
    fn snr_mode_removes_row_floor() {
        let settings = RenderSettings {
            width_px: 3,
            height_px: 1,
            plot_snr: true,
            scale: ColorScale::Fixed {
                min_db: 0.0,
                max_db: 10.0,
            },
        };
        let mut renderer = Renderer::new(settings);
        let image = renderer.render(array![[-50.0f32, -50.0, -40.0]].view());
        assert_eq!(*image.get_pixel(0, 0), Rgb([0, 0, 128]));
        assert_eq!(*image.get_pixel(2, 0), Rgb([255, 0, 0]));
    }
}
