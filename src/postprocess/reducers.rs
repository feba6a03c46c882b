use std::cmp::Ordering;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};

use crate::error::{AppError, AppResult};

/// Per-column strategy for recombining fine-grained partial results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Reducer { Sum, Avg, Count, Min, Max, Median, First, Last }

impl Reducer {
    pub fn tag(&self) -> &'static str {
        match self {
            Reducer::Sum => "SUM",
            Reducer::Avg => "AVG",
            Reducer::Count => "COUNT",
            Reducer::Min => "MIN",
            Reducer::Max => "MAX",
            Reducer::Median => "MEDIAN",
            Reducer::First => "FIRST",
            Reducer::Last => "LAST",
        }
    }

    pub fn accumulator(&self) -> Accumulator {
        match self {
            Reducer::Sum => Accumulator::Sum { int: 0, float: 0.0, all_int: true, seen: false },
            Reducer::Avg => Accumulator::Avg { total: 0.0, n: 0 },
            Reducer::Count => Accumulator::Count(0),
            Reducer::Min => Accumulator::Min(None),
            Reducer::Max => Accumulator::Max(None),
            Reducer::Median => Accumulator::Median(Vec::new()),
            Reducer::First => Accumulator::First(None),
            Reducer::Last => Accumulator::Last(None),
        }
    }
}

impl FromStr for Reducer {
    type Err = AppError;

    fn from_str(s: &str) -> AppResult<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "SUM" => Ok(Reducer::Sum),
            "AVG" | "MEAN" => Ok(Reducer::Avg),
            "COUNT" => Ok(Reducer::Count),
            "MIN" => Ok(Reducer::Min),
            "MAX" => Ok(Reducer::Max),
            "MEDIAN" => Ok(Reducer::Median),
            "FIRST" => Ok(Reducer::First),
            "LAST" => Ok(Reducer::Last),
            other => Err(AppError::contract("unknown_reducer", format!("Unknown reducer tag: {}", other))),
        }
    }
}

impl Display for Reducer {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.tag())
    }
}

/// Running state of one reducer over one bucket. LAST takes every row's value,
/// nulls included; every other reducer skips nulls, and a bucket that saw no
/// non-null value finalizes to null (COUNT to 0).
#[derive(Debug, Clone, PartialEq)]
pub enum Accumulator {
    Sum { int: i64, float: f64, all_int: bool, seen: bool },
    Avg { total: f64, n: u64 },
    Count(u64),
    Min(Option<(f64, Value)>),
    Max(Option<(f64, Value)>),
    Median(Vec<(f64, Value)>),
    First(Option<Value>),
    Last(Option<Value>),
}

fn numeric(v: &Value, reducer: &str) -> AppResult<f64> {
    v.as_f64().ok_or_else(|| {
        AppError::contract("non_numeric", format!("{} cannot aggregate non-numeric value {}", reducer, v))
    })
}

fn float_value(f: f64) -> Value {
    Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null)
}

impl Accumulator {
    pub fn accumulate(&mut self, v: &Value) -> AppResult<()> {
        if let Accumulator::Last(cur) = self {
            *cur = Some(v.clone());
            return Ok(());
        }
        if v.is_null() {
            return Ok(());
        }
        match self {
            Accumulator::Sum { int, float, all_int, seen } => {
                let f = numeric(v, "SUM")?;
                *float += f;
                if *all_int {
                    match v.as_i64().and_then(|i| int.checked_add(i)) {
                        Some(next) => *int = next,
                        None => *all_int = false,
                    }
                }
                *seen = true;
            }
            Accumulator::Avg { total, n } => {
                *total += numeric(v, "AVG")?;
                *n += 1;
            }
            Accumulator::Count(n) => *n += 1,
            Accumulator::Min(cur) => {
                let f = numeric(v, "MIN")?;
                if cur.as_ref().map(|(m, _)| f < *m).unwrap_or(true) {
                    *cur = Some((f, v.clone()));
                }
            }
            Accumulator::Max(cur) => {
                let f = numeric(v, "MAX")?;
                if cur.as_ref().map(|(m, _)| f > *m).unwrap_or(true) {
                    *cur = Some((f, v.clone()));
                }
            }
            Accumulator::Median(vals) => vals.push((numeric(v, "MEDIAN")?, v.clone())),
            Accumulator::First(cur) => {
                if cur.is_none() {
                    *cur = Some(v.clone());
                }
            }
            Accumulator::Last(_) => {}
        }
        Ok(())
    }

    pub fn finalize(self) -> Value {
        match self {
            Accumulator::Sum { seen: false, .. } => Value::Null,
            Accumulator::Sum { int, all_int: true, .. } => Value::Number(int.into()),
            Accumulator::Sum { float, .. } => float_value(float),
            Accumulator::Avg { n: 0, .. } => Value::Null,
            Accumulator::Avg { total, n } => float_value(total / n as f64),
            Accumulator::Count(n) => Value::Number(n.into()),
            Accumulator::Min(cur) | Accumulator::Max(cur) => cur.map(|(_, v)| v).unwrap_or(Value::Null),
            Accumulator::Median(mut vals) => {
                if vals.is_empty() {
                    return Value::Null;
                }
                vals.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(Ordering::Equal));
                let mid = vals.len() / 2;
                if vals.len() % 2 == 1 {
                    vals.swap_remove(mid).1
                } else {
                    float_value((vals[mid - 1].0 + vals[mid].0) / 2.0)
                }
            }
            Accumulator::First(cur) | Accumulator::Last(cur) => cur.unwrap_or(Value::Null),
        }
    }
}
