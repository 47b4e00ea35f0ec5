use anyhow::Context;
use serde::Deserialize;
use std::collections::VecDeque;
use std::path::Path;
use waterfallcore::engine::ScanSource;
use waterfallcore::math::StatsHelper;
use waterfallcore::scan::{PowerReading, ScanBatch, ScanConfig};

#[derive(Debug, Deserialize)]
struct ReplayRow {
    ts: f64,
    freq: f64,
    db: f64,
    #[serde(default)]
    tune_count: u64,
}

/// Replays recorded scans from a `ts,freq,db,tune_count` CSV file.
///
/// Consecutive rows sharing a timestamp form one batch.
pub struct ReplaySource {
    pending: VecDeque<Vec<PowerReading>>,
    sample_rate: f64,
    nfft: usize,
    stopped: bool,
}

impl ReplaySource {
    pub fn open<P: AsRef<Path>>(path: P, sample_rate: f64, nfft: usize) -> anyhow::Result<Self> {
        let path_ref = path.as_ref();
        let mut reader = csv::Reader::from_path(path_ref)
            .with_context(|| format!("opening scan recording {}", path_ref.display()))?;

        let mut pending: VecDeque<Vec<PowerReading>> = VecDeque::new();
        for (line, row) in reader.deserialize::<ReplayRow>().enumerate() {
            let row = row.with_context(|| {
                format!("parsing row {} of {}", line + 2, path_ref.display())
            })?;
            let reading = PowerReading::new(row.ts, row.freq, row.db, row.tune_count);
            match pending.back_mut() {
                Some(group) if group.last().is_some_and(|last| last.timestamp == row.ts) => {
                    group.push(reading)
                }
                _ => pending.push_back(vec![reading]),
            }
        }
        Ok(Self {
            pending,
            sample_rate,
            nfft,
            stopped: false,
        })
    }

    pub fn remaining(&self) -> usize {
        self.pending.len()
    }
}

impl ScanSource for ReplaySource {
    fn read_batch(&mut self, scan_resolution: f64) -> ScanBatch {
        if self.stopped {
            return ScanBatch::end_of_stream();
        }
        let Some(readings) = self.pending.pop_front() else {
            return ScanBatch::end_of_stream();
        };
        let start = readings.iter().map(|r| r.frequency).fold(f64::INFINITY, f64::min);
        let end = readings
            .iter()
            .map(|r| r.frequency)
            .fold(f64::NEG_INFINITY, f64::max);
        // Recordings keep their own bin spacing; the requested resolution is only a fallback.
        let steps: Vec<f64> = readings
            .windows(2)
            .map(|pair| pair[1].frequency - pair[0].frequency)
            .filter(|step| *step > 0.0)
            .collect();
        let tune_step = StatsHelper::median(&steps).unwrap_or(scan_resolution);
        let config = ScanConfig::new(self.sample_rate, self.nfft, start, end, tune_step, self.nfft);
        ScanBatch::new(vec![config], readings)
    }

    fn healthy(&self) -> bool {
        !self.stopped
    }

    fn stop(&mut self) {
        self.stopped = true;
        self.pending.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn rows_with_equal_timestamps_form_one_batch() {
        let mut temp = NamedTempFile::new().unwrap();
        temp.write_all(
            b"ts,freq,db,tune_count\n\
              1.0,1000000,-20,0\n\
              1.0,1001000,-10,1\n\
              2.0,1000000,-21,0\n",
        )
        .unwrap();

        let mut source = ReplaySource::open(temp.path(), 1e6, 256).unwrap();
        assert_eq!(source.remaining(), 2);

        let first = source.read_batch(1e3);
        assert_eq!(first.readings.len(), 2);
        assert_eq!(first.freq_bounds(), Some((1e6, 1.001e6)));
        assert!(first.validate().is_ok());

        let second = source.read_batch(1e3);
        assert_eq!(second.timestamp(), Some(2.0));
        assert!(source.read_batch(1e3).is_end_of_stream());
    }

    #[test]
    fn tune_step_follows_recorded_bin_spacing() {
        let mut temp = NamedTempFile::new().unwrap();
        let mut rows = String::from("ts,freq,db,tune_count\n");
        for i in 0..5u64 {
            rows.push_str(&format!("3.0,{},-20,{}\n", 1e6 + i as f64 * 25e3, i));
        }
        temp.write_all(rows.as_bytes()).unwrap();

        let mut source = ReplaySource::open(temp.path(), 1e6, 256).unwrap();
        let batch = source.read_batch(1e4);
        assert_eq!(batch.configs[0].tune_step_hz, 25e3);
        assert!(batch.validate().is_ok());
    }

    #[test]
    fn single_bin_recording_falls_back_to_requested_resolution() {
        let mut temp = NamedTempFile::new().unwrap();
        temp.write_all(b"ts,freq,db,tune_count\n3.0,1000000,-20,0\n")
            .unwrap();
        let mut source = ReplaySource::open(temp.path(), 1e6, 256).unwrap();
        assert_eq!(source.read_batch(1e4).configs[0].tune_step_hz, 1e4);
    }

    #[test]
    fn malformed_rows_are_reported() {
        let mut temp = NamedTempFile::new().unwrap();
        temp.write_all(b"ts,freq,db\n1.0,abc,-20\n").unwrap();
        assert!(ReplaySource::open(temp.path(), 1e6, 256).is_err());
    }
}
