//! Time-scale granularity of a timeline.

use chrono::{Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::model::{JobAggregate, Timestamp};

const MS_PER_SECOND: i64 = 1_000;
const MS_PER_MINUTE: i64 = 60 * MS_PER_SECOND;
const MS_PER_HOUR: i64 = 60 * MS_PER_MINUTE;
const MS_PER_DAY: i64 = 24 * MS_PER_HOUR;

/// Largest accepted interval.
pub const MAX_INTERVAL_MS: i64 = 365 * MS_PER_DAY;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IntervalError {
    #[error("interval must be positive, got {0}ms")]
    NotPositive(i64),

    #[error("interval must be at most {MAX_INTERVAL_MS}ms, got {0}ms")]
    TooLarge(i64),

    #[error("unknown interval {0:?}; expected second, minute, hour, day or milliseconds")]
    Unrecognized(String),
}

/// Width in time of one grid interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TimeInterval(i64);

impl TimeInterval {
    pub const SECOND: Self = Self(MS_PER_SECOND);
    pub const MINUTE: Self = Self(MS_PER_MINUTE);
    pub const HOUR: Self = Self(MS_PER_HOUR);
    pub const DAY: Self = Self(MS_PER_DAY);

    pub fn from_millis(ms: i64) -> Result<Self, IntervalError> {
        if ms <= 0 {
            return Err(IntervalError::NotPositive(ms));
        }
        if ms > MAX_INTERVAL_MS {
            return Err(IntervalError::TooLarge(ms));
        }
        Ok(Self(ms))
    }

    pub const fn as_millis(&self) -> i64 {
        self.0
    }

    pub fn as_duration(&self) -> Duration {
        Duration::milliseconds(self.0)
    }

    pub fn as_std(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.0.unsigned_abs())
    }

    /// Time covered by one horizontal pixel when an interval spans `interval_px`.
    pub fn per_pixel(&self, interval_px: u32) -> Duration {
        Duration::microseconds(self.0 * 1_000 / i64::from(interval_px.max(1)))
    }

    /// `n` whole intervals, saturating at the largest representable span.
    pub fn times(&self, n: i64) -> Duration {
        Duration::milliseconds(self.0.saturating_mul(n).clamp(-i64::MAX, i64::MAX))
    }

    /// Round `ts` down to a multiple of the interval on the epoch axis.
    pub fn truncate(&self, ts: Timestamp) -> Timestamp {
        let ms = ts.and_utc().timestamp_millis();
        let excess = ms - ms.div_euclid(self.0) * self.0;
        ts - Duration::milliseconds(excess)
    }

    /// Estimate a readable interval for a single job: the mean gap between
    /// consecutive execution starts and consecutive upcoming runs, rounded to
    /// whole minutes. Jobs with fewer than two data points get one minute.
    pub fn auto_for_job(job: &JobAggregate) -> Self {
        let starts: Vec<Timestamp> = job.executions.values().map(|e| e.start_ts).collect();

        let gaps: Vec<i64> = starts
            .windows(2)
            .chain(job.next_run_times.windows(2))
            .map(|pair| (pair[1] - pair[0]).num_milliseconds())
            .collect();

        if gaps.is_empty() {
            return Self::MINUTE;
        }

        let mean = gaps.iter().sum::<i64>() as f64 / gaps.len() as f64;
        let minutes = (mean / MS_PER_MINUTE as f64).round() as i64;
        Self((minutes.max(1) * MS_PER_MINUTE).min(MAX_INTERVAL_MS))
    }
}

/// `ts + delta`, clamped to the representable range.
pub fn saturating_add(ts: Timestamp, delta: Duration) -> Timestamp {
    ts.checked_add_signed(delta).unwrap_or(if delta < Duration::zero() {
        NaiveDateTime::MIN
    } else {
        NaiveDateTime::MAX
    })
}

/// `ts - delta`, clamped to the representable range.
pub fn saturating_sub(ts: Timestamp, delta: Duration) -> Timestamp {
    ts.checked_sub_signed(delta).unwrap_or(if delta < Duration::zero() {
        NaiveDateTime::MAX
    } else {
        NaiveDateTime::MIN
    })
}

impl Default for TimeInterval {
    fn default() -> Self {
        Self::HOUR
    }
}

impl fmt::Display for TimeInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            MS_PER_SECOND => f.write_str("second"),
            MS_PER_MINUTE => f.write_str("minute"),
            MS_PER_HOUR => f.write_str("hour"),
            MS_PER_DAY => f.write_str("day"),
            ms => write!(f, "{ms}"),
        }
    }
}

impl FromStr for TimeInterval {
    type Err = IntervalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "second" => Ok(Self::SECOND),
            "minute" => Ok(Self::MINUTE),
            "hour" => Ok(Self::HOUR),
            "day" => Ok(Self::DAY),
            other => other
                .trim_end_matches("ms")
                .parse::<i64>()
                .map_err(|_| IntervalError::Unrecognized(s.to_string()))
                .and_then(Self::from_millis),
        }
    }
}

impl TryFrom<String> for TimeInterval {
    type Error = IntervalError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<TimeInterval> for String {
    fn from(value: TimeInterval) -> Self {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{EventKind, SchedulerEvent};
    use chrono::NaiveDate;

    fn at(h: u32, m: u32, s: u32) -> Timestamp {
        NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_opt(h, m, s)
            .unwrap()
    }

    #[test]
    fn test_parse_presets_and_millis() {
        assert_eq!("Hour".parse::<TimeInterval>().unwrap(), TimeInterval::HOUR);
        assert_eq!("minute".parse::<TimeInterval>().unwrap(), TimeInterval::MINUTE);
        assert_eq!("90000".parse::<TimeInterval>().unwrap().as_millis(), 90_000);
        assert_eq!("250ms".parse::<TimeInterval>().unwrap().as_millis(), 250);
        assert!("0".parse::<TimeInterval>().is_err());
        assert!("fortnight".parse::<TimeInterval>().is_err());
    }

    #[test]
    fn test_rejects_interval_beyond_a_year() {
        assert_eq!(
            "10000000000000000".parse::<TimeInterval>(),
            Err(IntervalError::TooLarge(10_000_000_000_000_000))
        );
        assert!(TimeInterval::from_millis(MAX_INTERVAL_MS).is_ok());
        assert!(TimeInterval::from_millis(MAX_INTERVAL_MS + 1).is_err());
    }

    #[test]
    fn test_saturating_shift() {
        assert_eq!(saturating_add(at(10, 0, 0), Duration::hours(1)), at(11, 0, 0));
        assert_eq!(saturating_sub(at(10, 0, 0), Duration::hours(1)), at(9, 0, 0));
        assert_eq!(saturating_add(at(10, 0, 0), TimeInterval::DAY.times(i64::MAX)), NaiveDateTime::MAX);
        assert_eq!(saturating_sub(at(10, 0, 0), TimeInterval::DAY.times(i64::MAX)), NaiveDateTime::MIN);
    }

    #[test]
    fn test_display_round_trips() {
        for interval in [TimeInterval::HOUR, TimeInterval::from_millis(1234).unwrap()] {
            assert_eq!(interval.to_string().parse::<TimeInterval>().unwrap(), interval);
        }
    }

    #[test]
    fn test_truncate_to_interval() {
        assert_eq!(TimeInterval::HOUR.truncate(at(10, 42, 17)), at(10, 0, 0));
        assert_eq!(TimeInterval::MINUTE.truncate(at(10, 42, 17)), at(10, 42, 0));
        assert_eq!(TimeInterval::HOUR.truncate(at(10, 0, 0)), at(10, 0, 0));
    }

    #[test]
    fn test_per_pixel() {
        assert_eq!(TimeInterval::HOUR.per_pixel(60), Duration::minutes(1));
        assert_eq!(TimeInterval::MINUTE.per_pixel(60), Duration::seconds(1));
    }

    #[test]
    fn test_auto_interval_uses_mean_gap() {
        let mut job = JobAggregate::new("a", "a", at(9, 0, 0));
        for minute in [0, 10, 20] {
            let mut event = SchedulerEvent::new(EventKind::JobExecuted, at(10, minute, 0));
            event.job_id = Some("a".into());
            event.scheduled_run_time = Some(at(10, minute, 0));
            job.apply_event(&event);
        }
        assert_eq!(TimeInterval::auto_for_job(&job), TimeInterval::from_millis(10 * 60_000).unwrap());
    }

    #[test]
    fn test_auto_interval_defaults_to_minute() {
        let job = JobAggregate::new("a", "a", at(9, 0, 0));
        assert_eq!(TimeInterval::auto_for_job(&job), TimeInterval::MINUTE);

        let mut fast = JobAggregate::new("b", "b", at(9, 0, 0));
        fast.next_run_times = vec![at(10, 0, 0), at(10, 0, 5), at(10, 0, 10)];
        assert_eq!(TimeInterval::auto_for_job(&fast), TimeInterval::MINUTE);
    }
}
