use regex::Regex;
use tracing::debug;

use crate::error::{AppError, AppResult};

/// One side of the WHERE time predicate, in epoch milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeBound {
    pub millis: i64,
    /// `>=` / `<=` rather than `>` / `<`.
    pub inclusive: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimeRange {
    pub start: Option<TimeBound>,
    pub end: Option<TimeBound>,
}

impl TimeRange {
    pub fn is_bounded(&self) -> bool {
        self.start.is_some() && self.end.is_some()
    }
}

/// Extract `time > x` / `time < y` bounds from a WHERE clause body. The first
/// lower and the first upper bound win; predicates whose right-hand side is not
/// a literal (e.g. `now() - 1d`) are ignored.
pub fn parse_time_range(where_clause: &str) -> AppResult<TimeRange> {
    let re = Regex::new(r#"(?i)(?:^|[^A-Za-z0-9_"])"?time"?\s*(>=|<=|>|<)\s*('[^']*'|-?\d+(?:ns|ms|u|µ|s)?)"#)?;
    let mut range = TimeRange::default();
    for caps in re.captures_iter(where_clause) {
        let (Some(op), Some(lit)) = (caps.get(1), caps.get(2)) else { continue };
        // `time > 10m` is not a literal we understand; leave it alone
        if where_clause[lit.end()..].chars().next().map(|c| c.is_alphanumeric()).unwrap_or(false) {
            continue;
        }
        let millis = parse_time_literal_ms(lit.as_str())?;
        match op.as_str() {
            ">" | ">=" if range.start.is_none() => {
                range.start = Some(TimeBound { millis, inclusive: op.as_str() == ">=" });
            }
            "<" | "<=" if range.end.is_none() => {
                range.end = Some(TimeBound { millis, inclusive: op.as_str() == "<=" });
            }
            _ => {}
        }
    }
    debug!("[WHERE] time range start={:?} end={:?}", range.start, range.end);
    Ok(range)
}

/// Epoch milliseconds of a time literal: an integer with an optional
/// `ns`/`u`/`µ`/`ms`/`s` suffix (bare integers are nanoseconds), or a
/// single-quoted timestamp.
pub fn parse_time_literal_ms(tok: &str) -> AppResult<i64> {
    let t = tok.trim();
    if t.starts_with('\'') {
        return parse_timestamp_str_ms(t)
            .ok_or_else(|| AppError::malformed("bad_time_literal", format!("Invalid time literal: {}", t)));
    }
    let digits_end = t
        .char_indices()
        .find(|(i, c)| !(c.is_ascii_digit() || (*i == 0 && *c == '-')))
        .map(|(i, _)| i)
        .unwrap_or(t.len());
    let (num, suffix) = t.split_at(digits_end);
    let n: i64 = num
        .parse()
        .map_err(|_| AppError::malformed("bad_time_literal", format!("Invalid time literal: {}", t)))?;
    let ms = match suffix {
        "" | "ns" => Some(n.div_euclid(1_000_000)),
        "u" | "µ" => Some(n.div_euclid(1_000)),
        "ms" => Some(n),
        "s" => n.checked_mul(1_000),
        _ => None,
    };
    ms.ok_or_else(|| AppError::malformed("bad_time_literal", format!("Invalid time literal: {}", t)))
}

/// Accept single-quoted RFC3339 timestamps and the common variants without an
/// offset (assumed UTC).
fn parse_timestamp_str_ms(tok: &str) -> Option<i64> {
    let mut s = tok.trim();
    if s.len() >= 2 && s.starts_with('\'') && s.ends_with('\'') {
        s = &s[1..s.len() - 1];
    }
    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(s) {
        return Some(dt.timestamp_millis());
    }
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(ndt.and_utc().timestamp_millis());
    }
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f") {
        return Some(ndt.and_utc().timestamp_millis());
    }
    if let Ok(nd) = chrono::NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return nd.and_hms_opt(0, 0, 0).map(|ndt| ndt.and_utc().timestamp_millis());
    }
    None
}
