use crate::prelude::{WaterfallError, WaterfallResult};
use crate::processing::render::{RenderSettings, Renderer};
use crate::scan::ScanBatch;
use image::RgbImage;
use ndarray::{Array1, Array2};

/// Fixed-capacity ring of waterfall rows indexed by (time slot, frequency bin).
///
/// Each appended batch becomes one row; once `height` rows are held the oldest
/// row is overwritten. Cells without readings hold NaN.
pub struct WaterfallBuffer {
    grid: Array2<f32>,
    head: usize,
    filled: usize,
    freq_min: f64,
    freq_max: f64,
    renderer: Renderer,
}

impl WaterfallBuffer {
    pub fn new(
        freq_min: f64,
        freq_max: f64,
        height: usize,
        width: usize,
        settings: RenderSettings,
    ) -> WaterfallResult<Self> {
        if height == 0 || width == 0 {
            return Err(WaterfallError::Configuration(
                "waterfall dimensions must be non-zero".into(),
            ));
        }
        if !(freq_min.is_finite() && freq_max.is_finite()) || freq_max <= freq_min {
            return Err(WaterfallError::Configuration(format!(
                "invalid waterfall span {}..{}",
                freq_min, freq_max
            )));
        }
        Ok(Self {
            grid: Array2::from_elem((height, width), f32::NAN),
            head: 0,
            filled: 0,
            freq_min,
            freq_max,
            renderer: Renderer::new(settings),
        })
    }

    fn column_for(&self, freq: f64) -> Option<usize> {
        if !(self.freq_min..=self.freq_max).contains(&freq) {
            return None;
        }
        let width = self.grid.ncols();
        let position = (freq - self.freq_min) / (self.freq_max - self.freq_min);
        Some(((position * width as f64) as usize).min(width - 1))
    }

    /// Bins the batch into a new row; returns how many readings landed in range.
    pub fn append(&mut self, batch: &ScanBatch) -> usize {
        let mut row = Array1::from_elem(self.grid.ncols(), f32::NAN);
        let mut binned = 0;
        for reading in &batch.readings {
            if !reading.power_db.is_finite() {
                continue;
            }
            if let Some(col) = self.column_for(reading.frequency) {
                let power = reading.power_db as f32;
                let cell = &mut row[col];
                if cell.is_nan() || power > *cell {
                    *cell = power;
                }
                binned += 1;
            }
        }
        if binned == 0 {
            return 0;
        }

        self.grid.row_mut(self.head).assign(&row);
        self.head = (self.head + 1) % self.grid.nrows();
        self.filled = (self.filled + 1).min(self.grid.nrows());
        binned
    }

    /// Number of time rows currently held.
    pub fn depth(&self) -> usize {
        self.filled
    }

    pub fn render(&mut self) -> RgbImage {
        let (height, width) = self.grid.dim();
        let mut ordered = Array2::from_elem((height, width), f32::NAN);
        for age in 0..self.filled {
            let slot = (self.head + height - 1 - age) % height;
            ordered.row_mut(age).assign(&self.grid.row(slot));
        }
        self.renderer.render(ordered.view())
    }
}
