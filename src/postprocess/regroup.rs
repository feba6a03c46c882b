use std::collections::BTreeMap;

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::Value;
use tracing::debug;

use crate::error::{AppError, AppResult};
use crate::postprocess::reducers::{Accumulator, Reducer};

/// Re-bucket `rows` (`[timestamp, v1..vk]`) with `bucket_fn` and reduce each
/// value column with the reducer at the same position. Output rows are
/// `[bucket_start, r1..rk]`, ascending by bucket start. A bucket start is
/// written as integer epoch ms, or as an RFC 3339 UTC string when the first
/// row of that bucket carried its timestamp as a string.
///
/// Rows are expected in ascending timestamp order; FIRST and LAST take the
/// order they are given.
pub fn regroup<F>(bucket_fn: F, reducers: &[Reducer], rows: &[Vec<Value>]) -> AppResult<Vec<Vec<Value>>>
where
    F: Fn(i64) -> AppResult<i64>,
{
    let width = reducers.len() + 1;
    let mut buckets: BTreeMap<i64, (bool, Vec<Accumulator>)> = BTreeMap::new();
    for (idx, row) in rows.iter().enumerate() {
        if row.len() != width {
            return Err(AppError::contract(
                "row_width",
                format!("Row {} has {} columns, expected {} (time + {} aggregates)", idx, row.len(), width, reducers.len()),
            ));
        }
        let ts = timestamp_ms(&row[0])?;
        let key = bucket_fn(ts)?;
        let (_, accs) = buckets
            .entry(key)
            .or_insert_with(|| (row[0].is_string(), reducers.iter().map(|r| r.accumulator()).collect()));
        for (acc, v) in accs.iter_mut().zip(&row[1..]) {
            acc.accumulate(v)?;
        }
    }
    debug!("[REGROUP] {} rows into {} buckets", rows.len(), buckets.len());
    buckets
        .into_iter()
        .map(|(start, (as_string, accs))| {
            let mut out = Vec::with_capacity(width);
            out.push(if as_string { rfc3339_cell(start)? } else { Value::Number(start.into()) });
            out.extend(accs.into_iter().map(Accumulator::finalize));
            Ok(out)
        })
        .collect()
}

fn rfc3339_cell(ms: i64) -> AppResult<Value> {
    DateTime::<Utc>::from_timestamp_millis(ms)
        .map(|dt| Value::String(dt.to_rfc3339_opts(SecondsFormat::AutoSi, true)))
        .ok_or_else(|| AppError::contract("timestamp_range", format!("Bucket start {}ms is out of range", ms)))
}

/// Epoch milliseconds of a raw timestamp cell: an integer (`epoch=ms`), a
/// whole float, or an RFC 3339 string.
pub fn timestamp_ms(v: &Value) -> AppResult<i64> {
    let parsed = match v {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.fract() == 0.0 && *f >= i64::MIN as f64 && *f <= i64::MAX as f64)
                .map(|f| f as i64)
        }),
        Value::String(s) => DateTime::parse_from_rfc3339(s).ok().map(|dt| dt.timestamp_millis()),
        _ => None,
    };
    parsed.ok_or_else(|| AppError::contract("bad_timestamp", format!("Unreadable row timestamp: {}", v)))
}
