use chrono_tz::Tz;
use serde_json::Value;
use tracing::debug;

use crate::calendar::{generate_range, Interval};
use crate::error::AppResult;
use crate::query::{FillPolicy, ParsedQuery, TimeBound};
use crate::result::{Series, StatementResult};

/// Rows `[bucket_start, fill_value × column_count]` for every bucket from
/// `start_ms` (rounded down to its unit) up to `end`.
pub fn fill(
    start_ms: i64,
    end: TimeBound,
    fill_value: &Value,
    tz: Tz,
    interval: Interval,
    column_count: usize,
) -> AppResult<Vec<Vec<Value>>> {
    let starts = generate_range(start_ms, end.millis, end.inclusive, tz, interval)?;
    debug!("[FILL] {} buckets of {} from {} to {}", starts.len(), interval, start_ms, end.millis);
    Ok(starts
        .into_iter()
        .map(|ts| {
            let mut row = Vec::with_capacity(column_count + 1);
            row.push(Value::Number(ts.into()));
            row.extend(std::iter::repeat(fill_value.clone()).take(column_count));
            row
        })
        .collect())
}

/// Everything needed to synthesize a series for a statement that returned none.
#[derive(Debug, Clone, PartialEq)]
pub struct FillPlan {
    pub start_ms: i64,
    pub end: TimeBound,
    pub value: Value,
    pub tz: Tz,
    pub interval: Interval,
    /// Output columns, `time` first.
    pub columns: Vec<String>,
    pub measurement: Option<String>,
}

impl FillPlan {
    /// `None` when filling is disabled: no GROUP BY time, no FILL clause,
    /// `fill(none)`, or a missing lower or upper time bound.
    pub fn from_parsed(p: &ParsedQuery) -> Option<FillPlan> {
        let group_by = p.group_by.as_ref()?;
        let value = match p.fill_policy.as_ref()? {
            FillPolicy::NoFill => return None,
            FillPolicy::Value(v) => v.clone(),
        };
        let start = p.time_range.start?;
        let end = p.time_range.end?;
        Some(FillPlan {
            start_ms: start.millis,
            end,
            value,
            tz: p.timezone,
            interval: group_by.interval,
            columns: p.output_column_names.clone(),
            measurement: p.measurement.clone(),
        })
    }

    pub fn rows(&self) -> AppResult<Vec<Vec<Value>>> {
        fill(self.start_ms, self.end, &self.value, self.tz, self.interval, self.columns.len().saturating_sub(1))
    }

    /// Synthesize the series of a statement that came back empty. Statements
    /// that carry series or an error are left alone.
    pub fn apply(&self, result: &mut StatementResult) -> AppResult<()> {
        if result.has_series() || result.error.is_some() {
            return Ok(());
        }
        let values = self.rows()?;
        result.series = Some(vec![Series {
            name: self.measurement.clone(),
            columns: self.columns.clone(),
            values,
            ..Series::default()
        }]);
        Ok(())
    }
}
