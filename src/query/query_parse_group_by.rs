use std::ops::Range;

use chrono_tz::Tz;
use serde_json::{Number, Value};
use tracing::debug;

use crate::calendar::Interval;
use crate::error::{AppError, AppResult};
use crate::query::query_common::{paren_group, split_top_level, unquote};

/// The `time(...)` dimension of a GROUP BY clause.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupByTime {
    pub interval: Interval,
    /// Raw offset argument of `time(interval, offset)`, if any.
    pub offset: Option<String>,
    /// Byte span of the text inside the parentheses, in the normalized query.
    pub span: Range<usize>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FillPolicy {
    /// `fill(none)`: missing buckets are omitted and must stay omitted.
    NoFill,
    /// Placeholder written into every slot of a synthesized bucket row.
    Value(Value),
}

/// Find `time(...)` among the GROUP BY dimensions. `body` is the clause span
/// in `s`; the returned span is absolute so the patcher can splice into `s`.
pub fn parse_group_by_time(s: &str, body: Range<usize>) -> AppResult<Option<GroupByTime>> {
    let clause = &s[body.clone()];
    for piece in split_top_level(clause, ',') {
        let abs = body.start + piece.start..body.start + piece.end;
        let dim = s[abs.clone()].trim_start();
        let lead = s[abs.clone()].len() - dim.len();
        if !dim.get(..4).map(|kw| kw.eq_ignore_ascii_case("time")).unwrap_or(false) {
            continue;
        }
        let after_kw = abs.start + lead + 4..abs.end;
        let Some(inner) = paren_group(s, after_kw) else { continue };
        let args = split_top_level(&s[inner.clone()], ',');
        let interval_text = &s[inner.start + args[0].start..inner.start + args[0].end];
        let interval = Interval::parse(interval_text)?;
        let offset = match args.len() {
            1 => None,
            2 => Some(s[inner.start + args[1].start..inner.start + args[1].end].trim().to_string()),
            _ => {
                return Err(AppError::malformed(
                    "bad_group_by",
                    format!("time() takes an interval and an optional offset: time({})", &s[inner.clone()]),
                ))
            }
        };
        debug!("[GROUP BY] time interval={} offset={:?}", interval, offset);
        return Ok(Some(GroupByTime { interval, offset, span: inner }));
    }
    Ok(None)
}

/// Parse the argument of `fill(...)`. `body` is the clause text after FILL.
pub fn parse_fill(body: &str) -> AppResult<FillPolicy> {
    let inner = paren_group(body, 0..body.len())
        .map(|r| body[r].trim().to_string())
        .ok_or_else(|| AppError::malformed("bad_fill", format!("Invalid FILL clause: FILL{}", body.trim_end())))?;
    let lower = inner.to_ascii_lowercase();
    let policy = match lower.as_str() {
        "none" => FillPolicy::NoFill,
        // With no data at all there is nothing to carry forward or interpolate.
        "null" | "previous" | "linear" => FillPolicy::Value(Value::Null),
        _ => {
            if let Ok(n) = inner.parse::<i64>() {
                FillPolicy::Value(Value::Number(n.into()))
            } else {
                let f = inner
                    .parse::<f64>()
                    .ok()
                    .and_then(Number::from_f64)
                    .ok_or_else(|| AppError::malformed("bad_fill", format!("Unsupported FILL value: {}", inner)))?;
                FillPolicy::Value(Value::Number(f))
            }
        }
    };
    Ok(policy)
}

/// Parse the zone of a `TZ('...')` directive. `body` is the clause text after TZ.
pub fn parse_tz(body: &str) -> AppResult<Tz> {
    let name = paren_group(body, 0..body.len())
        .map(|r| unquote(&body[r]))
        .ok_or_else(|| AppError::malformed("bad_tz", format!("Invalid TZ clause: TZ{}", body.trim_end())))?;
    name.parse::<Tz>()
        .map_err(|_| AppError::malformed("unknown_timezone", format!("Unknown time zone: {}", name)))
}
