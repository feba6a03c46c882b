use tracing::debug;

use crate::error::{AppError, AppResult};
use crate::postprocess::reducers::Reducer;
use crate::query::query_common::{split_top_level, top_level_words, unquote};

/// Aggregate keywords accepted in the SELECT list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AggFunc { Count, Mean, Median, Sum, First, Last, Min, Max }

impl AggFunc {
    pub fn from_keyword(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "COUNT" => Some(AggFunc::Count),
            "MEAN" => Some(AggFunc::Mean),
            "MEDIAN" => Some(AggFunc::Median),
            "SUM" => Some(AggFunc::Sum),
            "FIRST" => Some(AggFunc::First),
            "LAST" => Some(AggFunc::Last),
            "MIN" => Some(AggFunc::Min),
            "MAX" => Some(AggFunc::Max),
            _ => None,
        }
    }

    /// Reducer that recombines this function's per-day partial results.
    /// The datastore already returns one count per day, so counts are summed.
    pub fn regroup_reducer(&self) -> Reducer {
        match self {
            AggFunc::Count => Reducer::Sum,
            AggFunc::Mean => Reducer::Avg,
            AggFunc::Median => Reducer::Median,
            AggFunc::Sum => Reducer::Sum,
            AggFunc::First => Reducer::First,
            AggFunc::Last => Reducer::Last,
            AggFunc::Min => Reducer::Min,
            AggFunc::Max => Reducer::Max,
        }
    }
}

/// Split a SELECT list on commas outside parentheses and quotes.
pub fn split_select_list(s: &str) -> Vec<&str> {
    split_top_level(s, ',')
        .into_iter()
        .map(|r| s[r].trim())
        .filter(|p| !p.is_empty())
        .collect()
}

/// Output name of one selector: the text after a top-level `AS`, unquoted.
/// Empty when the selector has no alias.
pub fn field_name(selector: &str) -> String {
    let as_kw = top_level_words(selector).into_iter().rev().find(|w| w.upper == "AS");
    let Some(kw) = as_kw else { return String::new() };
    let alias = selector[kw.end..].trim();
    if alias.starts_with('"') {
        // Take the quoted identifier only; anything after it is not part of the name
        let bytes = alias.as_bytes();
        let mut end = None;
        let mut i = 1usize;
        while i < bytes.len() {
            match bytes[i] {
                b'\\' => i += 2,
                b'"' => {
                    end = Some(i);
                    break;
                }
                _ => i += 1,
            }
        }
        return match end {
            Some(e) => unquote(&alias[..=e]),
            None => String::new(),
        };
    }
    alias.split_whitespace().next().unwrap_or("").to_string()
}

pub fn extract_field_names(select_list: &str) -> Vec<String> {
    split_select_list(select_list).into_iter().map(field_name).collect()
}

/// Aggregate function of every selector, in SELECT order. Anything that is not
/// one of the recognized aggregate calls is rejected before the query runs.
pub fn extract_aggregate_functions(select_list: &str) -> AppResult<Vec<AggFunc>> {
    let selectors = split_select_list(select_list);
    if selectors.is_empty() {
        return Err(AppError::malformed("missing_select", "SELECT list is empty"));
    }
    let mut out = Vec::with_capacity(selectors.len());
    for sel in selectors {
        let name_end = sel.find(|c: char| !(c.is_ascii_alphanumeric() || c == '_')).unwrap_or(sel.len());
        let name = &sel[..name_end];
        let is_call = sel[name_end..].trim_start().starts_with('(');
        if name.is_empty() || !is_call {
            return Err(AppError::unsupported_aggregate(
                "unsupported_aggregate",
                format!("Selector {} is not an aggregate function call", sel),
            ));
        }
        let func = AggFunc::from_keyword(name).ok_or_else(|| {
            AppError::unsupported_aggregate(
                "unsupported_aggregate",
                format!("Function {} is not supported", name.to_ascii_uppercase()),
            )
        })?;
        out.push(func);
    }
    debug!("[SELECT LIST] aggregates={:?}", out);
    Ok(out)
}
