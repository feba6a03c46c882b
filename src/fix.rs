//! Query patcher.
//!
//! `fix` analyzes a query once and returns the text to send to the datastore
//! together with the post-processing step for whatever comes back. Calendar
//! units (months, years) are sent as day buckets and regrouped locally; every
//! other GROUP BY time query only gets its empty results filled.

use serde_json::Value;
use tracing::debug;

use crate::calendar::CalendarBucket;
use crate::config::FixConfig;
use crate::error::AppResult;
use crate::postprocess::{regroup, FillPlan, Reducer};
use crate::query::{analyze_with, ParsedQuery};
use crate::result::{QueryResponse, StatementResult};

/// A rewritten query and the post-processing for its response.
#[derive(Debug, Clone, PartialEq)]
pub struct Fix {
    /// Query text to execute.
    pub cql: String,
    pub parsed: ParsedQuery,
    pub post: PostProcess,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PostProcess {
    /// No GROUP BY time, or nothing to fill.
    Passthrough,
    /// Native unit: only statements without series are touched.
    Fill(FillPlan),
    /// Calendar unit: regroup every series, then fill empty statements.
    Regroup { bucket: CalendarBucket, reducers: Vec<Reducer>, fill: Option<FillPlan> },
}

pub fn fix(cql: &str) -> AppResult<Fix> {
    fix_with(cql, &FixConfig::default())
}

pub fn fix_with(cql: &str, cfg: &FixConfig) -> AppResult<Fix> {
    let parsed = analyze_with(cql, cfg)?;
    let post = match &parsed.group_by {
        None => PostProcess::Passthrough,
        Some(group_by) => {
            let fill = FillPlan::from_parsed(&parsed);
            if parsed.needs_rewrite {
                PostProcess::Regroup {
                    bucket: CalendarBucket::new(group_by.interval, parsed.timezone),
                    reducers: parsed.selected_aggregates.clone(),
                    fill,
                }
            } else {
                fill.map(PostProcess::Fill).unwrap_or(PostProcess::Passthrough)
            }
        }
    };
    debug!("[FIX] cql='{}' post={}", parsed.rewritten_text, post.kind());
    Ok(Fix { cql: parsed.rewritten_text.clone(), parsed, post })
}

impl Fix {
    pub fn apply(&self, response: QueryResponse) -> AppResult<QueryResponse> {
        self.post.apply(response)
    }

    pub fn apply_json(&self, response: Value) -> AppResult<Value> {
        self.post.apply_json(response)
    }
}

impl PostProcess {
    pub fn kind(&self) -> &'static str {
        match self {
            PostProcess::Passthrough => "passthrough",
            PostProcess::Fill(_) => "fill",
            PostProcess::Regroup { .. } => "regroup",
        }
    }

    pub fn is_identity(&self) -> bool {
        matches!(self, PostProcess::Passthrough)
    }

    /// Rewrite `response` in place.
    pub fn apply_mut(&self, response: &mut QueryResponse) -> AppResult<()> {
        let fill = match self {
            PostProcess::Passthrough => return Ok(()),
            PostProcess::Fill(plan) => Some(plan),
            PostProcess::Regroup { fill, .. } => fill.as_ref(),
        };
        if response.results.is_empty() && fill.is_some() {
            response.results.push(StatementResult::default());
        }
        for result in response.results.iter_mut() {
            if result.error.is_some() {
                debug!("[APPLY] skipping statement with error: {:?}", result.error);
                continue;
            }
            if let PostProcess::Regroup { bucket, reducers, .. } = self {
                for series in result.series.iter_mut().flatten() {
                    series.values = regroup(|ts| bucket.bucket_start(ts), reducers, &series.values)?;
                }
            }
            if let Some(plan) = fill {
                plan.apply(result)?;
            }
        }
        Ok(())
    }

    pub fn apply(&self, mut response: QueryResponse) -> AppResult<QueryResponse> {
        self.apply_mut(&mut response)?;
        Ok(response)
    }

    /// Same as `apply` over an untyped response. Passthrough returns the value
    /// as given without decoding it.
    pub fn apply_json(&self, response: Value) -> AppResult<Value> {
        if self.is_identity() {
            return Ok(response);
        }
        let typed = QueryResponse::from_json(response)?;
        Ok(self.apply(typed)?.to_json()?)
    }
}
