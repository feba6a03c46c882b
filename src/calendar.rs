//! Calendar arithmetic for GROUP BY time units.
//!
//! Buckets are computed on the local wall clock of the query's timezone and
//! converted back to absolute instants, so a month bucket always starts on the
//! first local midnight of the month no matter how many days or DST shifts it
//! spans. Units finer than a day step by fixed durations; days and coarser
//! units step on the calendar.

use std::fmt::{Display, Formatter};
use std::str::FromStr;

use chrono::{DateTime, Datelike, FixedOffset, LocalResult, Months, NaiveDate, NaiveDateTime, Offset, TimeDelta, TimeZone, Timelike, Utc, Weekday};
use chrono_tz::Tz;
use regex::Regex;

use crate::error::{AppError, AppResult};

/// Upper bound on the number of buckets a single range may expand to.
pub const MAX_RANGE_BUCKETS: usize = 1_000_000;

// Longest DST gap we walk across when a local bucket start does not exist.
const MAX_GAP_MINUTES: u32 = 24 * 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimeUnit {
    Milliseconds,
    Seconds,
    Minutes,
    Hours,
    Days,
    IsoWeeks,
    Months,
    Years,
}

impl TimeUnit {
    /// Case-insensitive duration suffix as written inside `time(...)`.
    pub fn from_suffix(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "ms" => Some(TimeUnit::Milliseconds),
            "s" => Some(TimeUnit::Seconds),
            "m" => Some(TimeUnit::Minutes),
            "h" => Some(TimeUnit::Hours),
            "d" => Some(TimeUnit::Days),
            "w" => Some(TimeUnit::IsoWeeks),
            "n" => Some(TimeUnit::Months),
            "v" => Some(TimeUnit::Years),
            _ => None,
        }
    }

    pub fn suffix(&self) -> &'static str {
        match self {
            TimeUnit::Milliseconds => "ms",
            TimeUnit::Seconds => "s",
            TimeUnit::Minutes => "m",
            TimeUnit::Hours => "h",
            TimeUnit::Days => "d",
            TimeUnit::IsoWeeks => "w",
            TimeUnit::Months => "n",
            TimeUnit::Years => "v",
        }
    }

    /// Months and years: units the datastore cannot bucket natively.
    pub fn is_calendar(&self) -> bool {
        matches!(self, TimeUnit::Months | TimeUnit::Years)
    }

    pub fn fixed_millis(&self) -> Option<i64> {
        match self {
            TimeUnit::Milliseconds => Some(1),
            TimeUnit::Seconds => Some(1_000),
            TimeUnit::Minutes => Some(60_000),
            TimeUnit::Hours => Some(3_600_000),
            _ => None,
        }
    }
}

/// A bucket width: `step` multiples of `unit`, e.g. `3n` is three months.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Interval {
    pub step: i64,
    pub unit: TimeUnit,
}

impl Interval {
    pub fn new(step: i64, unit: TimeUnit) -> Self {
        Interval { step, unit }
    }

    pub fn parse(s: &str) -> AppResult<Self> {
        // e.g. 1d, 3n, 15m
        let re = Regex::new(r"^(\d+)\s*([A-Za-z]+)$")?;
        let caps = re
            .captures(s.trim())
            .ok_or_else(|| AppError::malformed("bad_interval", format!("Invalid time interval: {}", s.trim())))?;
        let step: i64 = caps[1]
            .parse()
            .map_err(|_| AppError::malformed("bad_interval", format!("Invalid interval step: {}", &caps[1])))?;
        if step < 1 {
            return Err(AppError::malformed("bad_interval", format!("Interval step must be positive: {}", s.trim())));
        }
        let unit = TimeUnit::from_suffix(&caps[2]).ok_or_else(|| {
            AppError::unsupported_unit("unsupported_unit", format!("Unsupported time unit '{}' in time({})", &caps[2], s.trim()))
        })?;
        Ok(Interval { step, unit })
    }

    pub fn needs_rewrite(&self) -> bool {
        self.unit.is_calendar()
    }
}

impl FromStr for Interval {
    type Err = AppError;

    fn from_str(s: &str) -> AppResult<Self> {
        Interval::parse(s)
    }
}

impl Display for Interval {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}", self.step, self.unit.suffix())
    }
}

/// Rounds timestamps down to the start of their enclosing bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CalendarBucket {
    pub interval: Interval,
    pub tz: Tz,
}

impl CalendarBucket {
    pub fn new(interval: Interval, tz: Tz) -> Self {
        CalendarBucket { interval, tz }
    }

    pub fn bucket_start(&self, ts_ms: i64) -> AppResult<i64> {
        let local = to_local(ts_ms, self.tz)?;
        let floored = floor_local(local.naive_local(), self.interval)?;
        resolve_local(self.tz, floored, preferred_offset(self.interval.unit, &local))
    }
}

/// Builds the bucketing closure handed to the regrouper.
pub fn make_bucket_fn(interval: Interval, tz: Tz) -> impl Fn(i64) -> AppResult<i64> + Copy + Send + Sync {
    let bucket = CalendarBucket::new(interval, tz);
    move |ts| bucket.bucket_start(ts)
}

/// Every bucket start from `start_ms` (rounded down to its unit) up to `end_ms`,
/// stepping `interval.step` units at a time. `end_ms` itself is only included
/// when `end_inclusive` is set and a bucket starts exactly there.
pub fn generate_range(start_ms: i64, end_ms: i64, end_inclusive: bool, tz: Tz, interval: Interval) -> AppResult<Vec<i64>> {
    if interval.step < 1 {
        return Err(AppError::contract("bad_interval", format!("Interval step must be positive: {}", interval)));
    }
    let start_local = to_local(start_ms, tz)?;
    let base = floor_local(start_local.naive_local(), Interval::new(1, interval.unit))?;
    let base_ms = resolve_local(tz, base, preferred_offset(interval.unit, &start_local))?;

    let mut out = Vec::new();
    let mut i: i64 = 0;
    loop {
        let n = i.checked_mul(interval.step).ok_or_else(|| range_overflow(interval))?;
        let ts = match interval.unit.fixed_millis() {
            Some(unit_ms) => n
                .checked_mul(unit_ms)
                .and_then(|d| base_ms.checked_add(d))
                .ok_or_else(|| range_overflow(interval))?,
            None => {
                let local = add_local(base, interval.unit, n).ok_or_else(|| range_overflow(interval))?;
                resolve_local(tz, local, None)?
            }
        };
        if ts > end_ms || (ts == end_ms && !end_inclusive) {
            break;
        }
        if out.len() >= MAX_RANGE_BUCKETS {
            return Err(AppError::malformed(
                "range_too_large",
                format!("Time range expands to more than {} buckets of {}", MAX_RANGE_BUCKETS, interval),
            ));
        }
        out.push(ts);
        i += 1;
    }
    Ok(out)
}

fn range_overflow(interval: Interval) -> AppError {
    AppError::contract("calendar_range", format!("Bucket arithmetic overflowed while stepping by {}", interval))
}

fn to_local(ts_ms: i64, tz: Tz) -> AppResult<DateTime<Tz>> {
    DateTime::<Utc>::from_timestamp_millis(ts_ms)
        .map(|dt| dt.with_timezone(&tz))
        .ok_or_else(|| AppError::contract("timestamp_range", format!("Timestamp {}ms is out of range", ts_ms)))
}

// Sub-day buckets keep the offset of the instant being bucketed across a
// repeated hour; day and coarser buckets start at the earliest instant.
fn preferred_offset(unit: TimeUnit, local: &DateTime<Tz>) -> Option<FixedOffset> {
    unit.fixed_millis().map(|_| local.offset().fix())
}

fn floor_to(value: u32, step: i64) -> i64 {
    (value as i64).div_euclid(step) * step
}

/// Sets the unit's local field to `floor(value / step) * step` and truncates
/// every finer field. Field values are zero-based within their parent, except
/// years which floor the absolute year.
fn floor_local(naive: NaiveDateTime, interval: Interval) -> AppResult<NaiveDateTime> {
    let step = interval.step;
    if step < 1 {
        return Err(AppError::contract("bad_interval", format!("Interval step must be positive: {}", interval)));
    }
    let date = naive.date();
    let midnight = |d: NaiveDate| d.and_hms_opt(0, 0, 0);
    let floored = match interval.unit {
        TimeUnit::Milliseconds => {
            let ms = (naive.nanosecond() / 1_000_000).min(999);
            naive.with_nanosecond((floor_to(ms, step) * 1_000_000) as u32)
        }
        TimeUnit::Seconds => naive
            .with_second(floor_to(naive.second(), step) as u32)
            .and_then(|n| n.with_nanosecond(0)),
        TimeUnit::Minutes => date.and_hms_opt(naive.hour(), floor_to(naive.minute(), step) as u32, 0),
        TimeUnit::Hours => date.and_hms_opt(floor_to(naive.hour(), step) as u32, 0, 0),
        TimeUnit::Days => {
            NaiveDate::from_ymd_opt(date.year(), date.month(), floor_to(date.day0(), step) as u32 + 1).and_then(midnight)
        }
        TimeUnit::IsoWeeks => {
            let iso = date.iso_week();
            NaiveDate::from_isoywd_opt(iso.year(), floor_to(iso.week0(), step) as u32 + 1, Weekday::Mon).and_then(midnight)
        }
        TimeUnit::Months => {
            NaiveDate::from_ymd_opt(date.year(), floor_to(date.month0(), step) as u32 + 1, 1).and_then(midnight)
        }
        TimeUnit::Years => {
            let year = (date.year() as i64).div_euclid(step) * step;
            i32::try_from(year)
                .ok()
                .and_then(|y| NaiveDate::from_ymd_opt(y, 1, 1))
                .and_then(midnight)
        }
    };
    floored.ok_or_else(|| {
        AppError::contract("calendar_range", format!("Cannot round {} down to a {} bucket", naive, interval))
    })
}

fn add_local(naive: NaiveDateTime, unit: TimeUnit, n: i64) -> Option<NaiveDateTime> {
    match unit {
        TimeUnit::Days => naive.checked_add_signed(TimeDelta::try_days(n)?),
        TimeUnit::IsoWeeks => naive.checked_add_signed(TimeDelta::try_weeks(n)?),
        TimeUnit::Months => naive.checked_add_months(Months::new(u32::try_from(n).ok()?)),
        TimeUnit::Years => naive.checked_add_months(Months::new(u32::try_from(n.checked_mul(12)?).ok()?)),
        fixed => naive.checked_add_signed(TimeDelta::try_milliseconds(n.checked_mul(fixed.fixed_millis()?)?)?),
    }
}

/// Maps a local wall-clock time back to epoch milliseconds. A time inside a
/// DST gap moves forward to the first instant after the gap; an ambiguous time
/// takes `prefer` when it matches one of the candidates, else the earlier one.
fn resolve_local(tz: Tz, naive: NaiveDateTime, prefer: Option<FixedOffset>) -> AppResult<i64> {
    let mut probe = naive;
    for _ in 0..=MAX_GAP_MINUTES {
        match tz.from_local_datetime(&probe) {
            LocalResult::Single(dt) => return Ok(dt.timestamp_millis()),
            LocalResult::Ambiguous(early, late) => {
                let pick = match prefer {
                    Some(off) if late.offset().fix() == off => late,
                    _ => early,
                };
                return Ok(pick.timestamp_millis());
            }
            LocalResult::None => {
                probe = probe.checked_add_signed(TimeDelta::minutes(1)).ok_or_else(|| {
                    AppError::contract("calendar_range", format!("Local time {} overflowed in {}", naive, tz))
                })?;
            }
        }
    }
    Err(AppError::contract("calendar_range", format!("Local time {} does not exist in {}", naive, tz)))
}

#[cfg(test)]
mod tests;
