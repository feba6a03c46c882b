//! InfluxQL query analysis.
//!
//! `analyze` reads the handful of clauses the patcher cares about (SELECT,
//! FROM, WHERE time bounds, GROUP BY time, FILL and TZ) without building a full
//! syntax tree, and records where the `time(...)` interval sits so it can be
//! rewritten in place.

use chrono_tz::Tz;
use tracing::debug;

pub mod query_common;
pub mod query_parse_group_by;
pub mod query_parse_select_list;
pub mod query_parse_where;

pub use query_common::*;
pub use query_parse_group_by::*;
pub use query_parse_select_list::*;
pub use query_parse_where::*;

use crate::config::FixConfig;
use crate::error::{AppError, AppResult};
use crate::postprocess::reducers::Reducer;

/// Everything derived from one query string. Built once, never mutated.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedQuery {
    /// Text to send to the datastore: newlines normalized and, for calendar
    /// units, the bucket interval replaced by the configured rewrite interval.
    pub rewritten_text: String,
    /// One reducer per selector, in SELECT order (COUNT already mapped to SUM).
    pub selected_aggregates: Vec<Reducer>,
    /// Functions as written, parallel to `selected_aggregates`.
    pub functions: Vec<AggFunc>,
    pub group_by: Option<GroupByTime>,
    pub timezone: Tz,
    /// `None` when the query has no FILL clause.
    pub fill_policy: Option<FillPolicy>,
    pub time_range: TimeRange,
    /// `["time", alias_1, ..., alias_k]`
    pub output_column_names: Vec<String>,
    pub needs_rewrite: bool,
    pub measurement: Option<String>,
}

impl ParsedQuery {
    fn passthrough(text: String, cfg: &FixConfig) -> Self {
        ParsedQuery {
            rewritten_text: text,
            selected_aggregates: Vec::new(),
            functions: Vec::new(),
            group_by: None,
            timezone: cfg.default_timezone,
            fill_policy: None,
            time_range: TimeRange::default(),
            output_column_names: vec!["time".to_string()],
            needs_rewrite: false,
            measurement: None,
        }
    }

    pub fn has_group_by_time(&self) -> bool {
        self.group_by.is_some()
    }
}

/// Insert ` tz('<zone>')` before any trailing whitespace and `;`.
fn append_tz_clause(text: &str, tz: Tz) -> String {
    let body_end = text.trim_end_matches(|c: char| c == ';' || c.is_whitespace()).len();
    format!("{} tz('{}'){}", &text[..body_end], tz.name(), &text[body_end..])
}

pub fn analyze(query_text: &str) -> AppResult<ParsedQuery> {
    analyze_with(query_text, &FixConfig::default())
}

pub fn analyze_with(query_text: &str, cfg: &FixConfig) -> AppResult<ParsedQuery> {
    let text = normalize_newlines(query_text);
    let clauses = scan_clauses(&text);
    debug!("[ANALYZE] clauses={:?}", clauses.items.iter().map(|c| c.kind).collect::<Vec<_>>());

    let group_by = match clauses.get(ClauseKind::GroupBy) {
        Some(c) => parse_group_by_time(&text, c.body.clone())?,
        None => None,
    };
    let Some(group_by) = group_by else {
        debug!("[ANALYZE] Passthrough: no GROUP BY time");
        return Ok(ParsedQuery::passthrough(text, cfg));
    };

    let select_list = clauses
        .body(&text, ClauseKind::Select)
        .ok_or_else(|| AppError::malformed("missing_select", "GROUP BY time query has no SELECT clause"))?;
    let from = clauses
        .body(&text, ClauseKind::From)
        .ok_or_else(|| AppError::malformed("missing_from", "GROUP BY time query has no FROM clause"))?;

    let functions = extract_aggregate_functions(select_list)?;
    let selected_aggregates: Vec<Reducer> = functions.iter().map(|f| f.regroup_reducer()).collect();
    let mut output_column_names = vec!["time".to_string()];
    output_column_names.extend(extract_field_names(select_list));

    let has_tz_clause = clauses.get(ClauseKind::Tz).is_some();
    let timezone = match clauses.body(&text, ClauseKind::Tz) {
        Some(body) => parse_tz(body)?,
        None => cfg.default_timezone,
    };
    let fill_policy = match clauses.body(&text, ClauseKind::Fill) {
        Some(body) => Some(parse_fill(body)?),
        None => None,
    };
    let time_range = match clauses.body(&text, ClauseKind::Where) {
        Some(body) => parse_time_range(body)?,
        None => TimeRange::default(),
    };

    let needs_rewrite = group_by.interval.needs_rewrite();
    if needs_rewrite {
        if let Some(offset) = &group_by.offset {
            return Err(AppError::malformed(
                "unsupported_offset",
                format!("time({}, {}) cannot be rewritten: offsets are not supported on calendar units", group_by.interval, offset),
            ));
        }
    }
    let mut rewritten_text = if needs_rewrite {
        let mut out = String::with_capacity(text.len());
        out.push_str(&text[..group_by.span.start]);
        out.push_str(&cfg.rewrite_interval.to_string());
        out.push_str(&text[group_by.span.end..]);
        out
    } else {
        text.clone()
    };
    // Day buckets must start at local midnight of the zone the regrouper floors in.
    if !has_tz_clause && timezone != Tz::UTC {
        rewritten_text = append_tz_clause(&rewritten_text, timezone);
    }
    debug!(
        "[ANALYZE] interval={} tz={} needs_rewrite={} fill={:?}",
        group_by.interval, timezone, needs_rewrite, fill_policy
    );

    Ok(ParsedQuery {
        rewritten_text,
        selected_aggregates,
        functions,
        measurement: parse_measurement(from),
        group_by: Some(group_by),
        timezone,
        fill_policy,
        time_range,
        output_column_names,
        needs_rewrite,
    })
}

/// Last dotted segment of a single FROM source, unquoted. Subqueries and
/// regex sources have no single name.
pub fn parse_measurement(from: &str) -> Option<String> {
    let parts = split_top_level(from, ',');
    let first = from[parts.first()?.clone()].trim();
    if first.is_empty() || first.starts_with('(') || first.starts_with('/') {
        return None;
    }
    let segments = split_top_level(first, '.');
    let last = unquote(&first[segments.last()?.clone()]);
    if last.is_empty() { None } else { Some(last) }
}

#[cfg(test)]
mod tests;
