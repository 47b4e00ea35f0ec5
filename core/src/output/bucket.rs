use chrono::{DateTime, Utc};
use std::fmt;
use std::path::PathBuf;

/// Time-keyed output directory covering `[start, start + period)` in UTC seconds.
///
/// Keys for the same period are aligned to multiples of the period, so
/// consecutive buckets are contiguous and never overlap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BucketKey {
    start: i64,
    period: u64,
}

impl BucketKey {
    pub fn for_time(now: DateTime<Utc>, period_secs: u64) -> Self {
        let period = period_secs.max(1);
        let start = now.timestamp().div_euclid(period as i64) * period as i64;
        Self { start, period }
    }

    pub fn start(&self) -> i64 {
        self.start
    }

    pub fn end(&self) -> i64 {
        self.start + self.period as i64
    }

    pub fn contains(&self, time: DateTime<Utc>) -> bool {
        (self.start..self.end()).contains(&time.timestamp())
    }

    fn date(&self) -> String {
        DateTime::<Utc>::from_timestamp(self.start, 0)
            .map(|time| time.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| "undated".to_string())
    }

    /// `<YYYY-MM-DD>/<start>` below the save path.
    pub fn relative_dir(&self) -> PathBuf {
        PathBuf::from(self.date()).join(self.start.to_string())
    }
}

impl fmt::Display for BucketKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.date(), self.start)
    }
}
