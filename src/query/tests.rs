use super::*;
use crate::calendar::{Interval, TimeUnit};
use serde_json::json;

#[test]
fn no_group_by_time_is_passthrough() {
    let q = "SELECT mean(v)\r\nFROM cpu\nWHERE host = 'a'";
    let p = analyze(q).unwrap();
    assert_eq!(p.rewritten_text, "SELECT mean(v) FROM cpu WHERE host = 'a'");
    assert!(!p.needs_rewrite);
    assert!(p.group_by.is_none());
    assert!(p.selected_aggregates.is_empty());
    assert_eq!(p.output_column_names, vec!["time".to_string()]);
}

#[test]
fn group_by_tags_only_is_passthrough() {
    let p = analyze("SELECT last(v) FROM cpu GROUP BY host").unwrap();
    assert!(!p.has_group_by_time());
}

#[test]
fn native_unit_keeps_text() {
    let q = "SELECT mean(v) FROM cpu WHERE time > 1000ms GROUP BY time(1h) fill(null)";
    let p = analyze(q).unwrap();
    assert_eq!(p.rewritten_text, q);
    assert!(!p.needs_rewrite);
    assert_eq!(p.group_by.as_ref().unwrap().interval, Interval::new(1, TimeUnit::Hours));
    assert_eq!(p.fill_policy, Some(FillPolicy::Value(json!(null))));
}

#[test]
fn month_bucket_rewritten_to_one_day() {
    let q = "SELECT MAX(v) FROM m WHERE time >= 1000ms AND time < 1000000000ms GROUP BY time(1n) FILL(null)";
    let p = analyze(q).unwrap();
    assert_eq!(
        p.rewritten_text,
        "SELECT MAX(v) FROM m WHERE time >= 1000ms AND time < 1000000000ms GROUP BY time(1d) FILL(null)"
    );
    assert!(p.needs_rewrite);
    assert_eq!(p.selected_aggregates, vec![Reducer::Max]);
    assert_eq!(p.time_range.start, Some(TimeBound { millis: 1000, inclusive: true }));
    assert_eq!(p.time_range.end, Some(TimeBound { millis: 1_000_000_000, inclusive: false }));
    assert_eq!(p.measurement.as_deref(), Some("m"));
    assert_eq!(p.timezone, chrono_tz::UTC);
}

#[test]
fn step_is_dropped_from_rewritten_text_only() {
    let q = "SELECT sum(v) FROM m GROUP BY \"host\", time( 3n ) fill(none)";
    let p = analyze(q).unwrap();
    assert_eq!(p.rewritten_text, "SELECT sum(v) FROM m GROUP BY \"host\", time(1d) fill(none)");
    assert_eq!(p.group_by.unwrap().interval, Interval::new(3, TimeUnit::Months));
    assert_eq!(p.fill_policy, Some(FillPolicy::NoFill));
}

#[test]
fn year_bucket_rewritten_and_case_insensitive() {
    let p = analyze("select count(v) from m group by TIME(2V)").unwrap();
    assert_eq!(p.rewritten_text, "select count(v) from m group by TIME(1d)");
    assert_eq!(p.group_by.unwrap().interval, Interval::new(2, TimeUnit::Years));
}

#[test]
fn rewrite_target_comes_from_config() {
    let cfg = FixConfig { rewrite_interval: Interval::new(12, TimeUnit::Hours), ..FixConfig::default() };
    let p = analyze_with("SELECT sum(v) FROM m GROUP BY time(1n)", &cfg).unwrap();
    assert_eq!(p.rewritten_text, "SELECT sum(v) FROM m GROUP BY time(12h)");
}

#[test]
fn count_regroups_as_sum() {
    let p = analyze("SELECT count(a), mean(b), median(c), first(d), last(e), min(f) FROM m GROUP BY time(1n)").unwrap();
    assert_eq!(
        p.selected_aggregates,
        vec![Reducer::Sum, Reducer::Avg, Reducer::Median, Reducer::First, Reducer::Last, Reducer::Min]
    );
    assert_eq!(p.functions[0], AggFunc::Count);
}

#[test]
fn aliases_become_output_columns() {
    let p = analyze("SELECT mean(x) AS \"avg_x\", count(y) AS \"cnt_y\", max(z) FROM t GROUP BY time(1n)").unwrap();
    assert_eq!(p.output_column_names, vec!["time", "avg_x", "cnt_y", ""]);
    assert_eq!(p.output_column_names.len(), p.selected_aggregates.len() + 1);
}

#[test]
fn field_names_from_select_list() {
    assert_eq!(
        extract_field_names("mean(x) AS \"avg_x\", count(y) AS \"cnt_y\""),
        vec!["avg_x".to_string(), "cnt_y".to_string()]
    );
    assert_eq!(extract_field_names("mean(x)"), vec![String::new()]);
    assert_eq!(field_name("sum(\"a b\") as total"), "total");
    assert_eq!(field_name("sum(x) AS \"has \\\" quote\""), "has \" quote");
}

#[test]
fn commas_inside_parens_and_quotes_do_not_split() {
    let p = analyze("SELECT sum(\"x,y\") AS \"s,1\", max(round(v, 2)) AS r FROM m GROUP BY time(1n)").unwrap();
    assert_eq!(p.selected_aggregates, vec![Reducer::Sum, Reducer::Max]);
    assert_eq!(p.output_column_names, vec!["time", "s,1", "r"]);
}

#[test]
fn unsupported_aggregate_is_rejected() {
    let err = analyze("SELECT stddev(v) FROM m GROUP BY time(1n)").unwrap_err();
    assert!(matches!(err, AppError::UnsupportedAggregate { .. }));
    assert_eq!(err.message(), "Function STDDEV is not supported");

    let err = analyze("SELECT v FROM m GROUP BY time(1n)").unwrap_err();
    assert!(matches!(err, AppError::UnsupportedAggregate { .. }));
}

#[test]
fn unsupported_unit_is_rejected() {
    let err = analyze("SELECT sum(v) FROM m GROUP BY time(1q)").unwrap_err();
    assert!(matches!(err, AppError::UnsupportedUnit { .. }));
}

#[test]
fn missing_from_is_malformed() {
    let err = analyze("SELECT sum(v) GROUP BY time(1n)").unwrap_err();
    assert_eq!(err.code_str(), "missing_from");
}

#[test]
fn timezone_directive() {
    let p = analyze("SELECT sum(v) FROM m GROUP BY time(1n) fill(0) tz('Europe/Amsterdam')").unwrap();
    assert_eq!(p.timezone, chrono_tz::Europe::Amsterdam);
    assert_eq!(p.fill_policy, Some(FillPolicy::Value(json!(0))));
    // TZ is left in the rewritten query
    assert!(p.rewritten_text.ends_with("tz('Europe/Amsterdam')"));

    let err = analyze("SELECT sum(v) FROM m GROUP BY time(1n) tz('Mars/Olympus')").unwrap_err();
    assert_eq!(err.code_str(), "unknown_timezone");
}

#[test]
fn default_timezone_comes_from_config() {
    let cfg = FixConfig { default_timezone: chrono_tz::America::New_York, ..FixConfig::default() };
    let p = analyze_with("SELECT sum(v) FROM m GROUP BY time(1n)", &cfg).unwrap();
    assert_eq!(p.timezone, chrono_tz::America::New_York);
    assert_eq!(p.rewritten_text, "SELECT sum(v) FROM m GROUP BY time(1d) tz('America/New_York')");

    let p = analyze_with("SELECT sum(v) FROM m GROUP BY time(1h) fill(0);  ", &cfg).unwrap();
    assert_eq!(p.rewritten_text, "SELECT sum(v) FROM m GROUP BY time(1h) fill(0) tz('America/New_York');  ");

    // An explicit zone wins and nothing is appended.
    let p = analyze_with("SELECT sum(v) FROM m GROUP BY time(1n) tz('Europe/Paris')", &cfg).unwrap();
    assert_eq!(p.timezone, chrono_tz::Europe::Paris);
    assert_eq!(p.rewritten_text, "SELECT sum(v) FROM m GROUP BY time(1d) tz('Europe/Paris')");

    // Passthrough queries are left alone.
    let p = analyze_with("SELECT v FROM m", &cfg).unwrap();
    assert_eq!(p.rewritten_text, "SELECT v FROM m");
}

#[test]
fn fill_literals() {
    assert_eq!(parse_fill("(none)").unwrap(), FillPolicy::NoFill);
    assert_eq!(parse_fill("( NULL )").unwrap(), FillPolicy::Value(json!(null)));
    assert_eq!(parse_fill("(previous)").unwrap(), FillPolicy::Value(json!(null)));
    assert_eq!(parse_fill("(linear)").unwrap(), FillPolicy::Value(json!(null)));
    assert_eq!(parse_fill("(-3)").unwrap(), FillPolicy::Value(json!(-3)));
    assert_eq!(parse_fill("(1.5)").unwrap(), FillPolicy::Value(json!(1.5)));
    assert_eq!(parse_fill("(banana)").unwrap_err().code_str(), "bad_fill");
    assert_eq!(parse_fill(" none").unwrap_err().code_str(), "bad_fill");
}

#[test]
fn where_bound_literals() {
    let r = parse_time_range(" \"time\" > '2020-01-01T00:00:00Z' AND time <= 1600000000s").unwrap();
    assert_eq!(r.start, Some(TimeBound { millis: 1_577_836_800_000, inclusive: false }));
    assert_eq!(r.end, Some(TimeBound { millis: 1_600_000_000_000, inclusive: true }));
    assert!(r.is_bounded());

    assert_eq!(parse_time_literal_ms("1500000000000000000").unwrap(), 1_500_000_000_000);
    assert_eq!(parse_time_literal_ms("2000000u").unwrap(), 2_000);
    assert_eq!(parse_time_literal_ms("'2020-03-01'").unwrap(), 1_583_020_800_000);
    assert_eq!(parse_time_literal_ms("'yesterday'").unwrap_err().code_str(), "bad_time_literal");
}

#[test]
fn relative_bounds_are_ignored() {
    let r = parse_time_range(" time > now() - 30d AND host = 'a' ").unwrap();
    assert!(r.start.is_none());
    assert!(r.end.is_none());

    let r = parse_time_range(" runtime > 5 AND time < 10m ").unwrap();
    assert_eq!(r, TimeRange::default());
}

#[test]
fn first_bound_of_each_side_wins() {
    let r = parse_time_range(" time >= 10ms AND time >= 20ms AND time < 30ms AND time < 40ms").unwrap();
    assert_eq!(r.start.unwrap().millis, 10);
    assert_eq!(r.end.unwrap().millis, 30);
}

#[test]
fn offset_on_calendar_unit_is_malformed() {
    let err = analyze("SELECT sum(v) FROM m GROUP BY time(1n, 2h)").unwrap_err();
    assert_eq!(err.code_str(), "unsupported_offset");

    let p = analyze("SELECT sum(v) FROM m GROUP BY time(1h, 15m)").unwrap();
    assert_eq!(p.group_by.unwrap().offset.as_deref(), Some("15m"));
}

#[test]
fn measurement_names() {
    assert_eq!(parse_measurement(" \"telegraf\".\"autogen\".\"cpu\" ").as_deref(), Some("cpu"));
    assert_eq!(parse_measurement(" cpu, mem").as_deref(), Some("cpu"));
    assert_eq!(parse_measurement(" /^cpu/ "), None);
    assert_eq!(parse_measurement(" (SELECT sum(v) FROM m) "), None);
}

#[test]
fn clause_scanner_ignores_keywords_in_strings() {
    let s = "SELECT sum(v) FROM m WHERE host = 'group by time(1n)' GROUP BY time(1d)";
    let clauses = scan_clauses(s);
    assert_eq!(clauses.body(s, ClauseKind::Where), Some(" host = 'group by time(1n)' "));
    let p = analyze(s).unwrap();
    assert!(!p.needs_rewrite);
    assert_eq!(p.rewritten_text, s);
}
