pub struct StatsHelper;

impl StatsHelper {
    pub fn mean(samples: &[f64]) -> Option<f64> {
        if samples.is_empty() {
            return None;
        }
        Some(samples.iter().sum::<f64>() / samples.len() as f64)
    }

    /// Median of the finite values; `None` when there are none.
    pub fn median(samples: &[f64]) -> Option<f64> {
        Self::percentile(samples, 50.0)
    }

    /// Linear-interpolated percentile of the finite values, `pct` in `0..=100`.
    pub fn percentile(samples: &[f64], pct: f64) -> Option<f64> {
        let mut sorted: Vec<f64> = samples.iter().copied().filter(|v| v.is_finite()).collect();
        if sorted.is_empty() {
            return None;
        }
        sorted.sort_by(f64::total_cmp);
        let rank = (pct.clamp(0.0, 100.0) / 100.0) * (sorted.len() - 1) as f64;
        let lower = rank.floor() as usize;
        let upper = rank.ceil() as usize;
        let weight = rank - lower as f64;
        Some(sorted[lower] + (sorted[upper] - sorted[lower]) * weight)
    }

    /// Centered moving average; windows are truncated at the edges.
    pub fn moving_average(samples: &[f64], window: usize) -> Vec<f64> {
        if window <= 1 || samples.is_empty() {
            return samples.to_vec();
        }
        let half = window / 2;
        (0..samples.len())
            .map(|idx| {
                let start = idx.saturating_sub(half);
                let end = (idx + half + 1).min(samples.len());
                let slice = &samples[start..end];
                slice.iter().sum::<f64>() / slice.len() as f64
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn median_of_empty_sequence_is_none() {
        assert_eq!(StatsHelper::median(&[]), None);
        assert_eq!(StatsHelper::mean(&[]), None);
    }

    #[test]
    fn median_handles_odd_and_even_lengths() {
        assert_eq!(StatsHelper::median(&[3.0, 1.0, 2.0]), Some(2.0));
        assert_eq!(StatsHelper::median(&[4.0, 1.0, 2.0, 3.0]), Some(2.5));
    }

    #[test]
    fn percentile_ignores_nan() {
        let values = [f64::NAN, 0.0, 10.0];
        assert_eq!(StatsHelper::percentile(&values, 0.0), Some(0.0));
        assert_eq!(StatsHelper::percentile(&values, 100.0), Some(10.0));
    }

    #[test]
    fn moving_average_smooths_spike() {
        let smoothed = StatsHelper::moving_average(&[0.0, 0.0, 3.0, 0.0, 0.0], 3);
        assert_eq!(smoothed, vec![0.0, 1.0, 1.0, 1.0, 0.0]);
    }
}
