use super::*;

fn ms(rfc3339: &str) -> i64 {
    DateTime::parse_from_rfc3339(rfc3339).expect("valid rfc3339").timestamp_millis()
}

fn tz(name: &str) -> Tz {
    name.parse().expect("known zone")
}

#[test]
fn interval_parse_and_display() {
    let i = Interval::parse("3n").unwrap();
    assert_eq!(i, Interval::new(3, TimeUnit::Months));
    assert!(i.needs_rewrite());
    assert_eq!(i.to_string(), "3n");

    let i = Interval::parse(" 15M ").unwrap();
    assert_eq!(i.unit, TimeUnit::Minutes);
    assert!(!i.needs_rewrite());
    assert_eq!(Interval::parse("250ms").unwrap().unit, TimeUnit::Milliseconds);
    assert_eq!("1v".parse::<Interval>().unwrap().unit, TimeUnit::Years);
}

#[test]
fn interval_parse_errors() {
    assert!(matches!(Interval::parse("1q"), Err(AppError::UnsupportedUnit { .. })));
    assert!(matches!(Interval::parse("10u"), Err(AppError::UnsupportedUnit { .. })));
    assert!(matches!(Interval::parse("0d"), Err(AppError::MalformedQuery { .. })));
    assert!(matches!(Interval::parse("d"), Err(AppError::MalformedQuery { .. })));
    assert!(matches!(Interval::parse("1h30m"), Err(AppError::MalformedQuery { .. })));
}

#[test]
fn month_bucket_utc() {
    let b = CalendarBucket::new(Interval::new(1, TimeUnit::Months), Tz::UTC);
    assert_eq!(b.bucket_start(ms("2019-03-15T12:34:56.789Z")).unwrap(), ms("2019-03-01T00:00:00Z"));
    assert_eq!(b.bucket_start(ms("2019-03-31T23:59:59.999Z")).unwrap(), ms("2019-03-01T00:00:00Z"));
    assert_eq!(b.bucket_start(ms("2019-04-01T00:00:00Z")).unwrap(), ms("2019-04-01T00:00:00Z"));
}

#[test]
fn month_bucket_follows_local_calendar() {
    // 03:00Z on March 1st is still February 28th in New York
    let b = CalendarBucket::new(Interval::new(1, TimeUnit::Months), tz("America/New_York"));
    assert_eq!(b.bucket_start(ms("2019-03-01T03:00:00Z")).unwrap(), ms("2019-02-01T00:00:00-05:00"));
    assert_eq!(b.bucket_start(ms("2019-03-01T06:00:00Z")).unwrap(), ms("2019-03-01T00:00:00-05:00"));
    // April starts in daylight time
    assert_eq!(b.bucket_start(ms("2019-04-20T12:00:00Z")).unwrap(), ms("2019-04-01T00:00:00-04:00"));
}

#[test]
fn month_step_floors_zero_based_month() {
    let b = CalendarBucket::new(Interval::new(3, TimeUnit::Months), Tz::UTC);
    assert_eq!(b.bucket_start(ms("2019-05-10T00:00:00Z")).unwrap(), ms("2019-04-01T00:00:00Z"));
    assert_eq!(b.bucket_start(ms("2019-03-31T00:00:00Z")).unwrap(), ms("2019-01-01T00:00:00Z"));
    assert_eq!(b.bucket_start(ms("2019-12-31T00:00:00Z")).unwrap(), ms("2019-10-01T00:00:00Z"));
}

#[test]
fn year_buckets() {
    let b = CalendarBucket::new(Interval::new(1, TimeUnit::Years), tz("Europe/Amsterdam"));
    assert_eq!(b.bucket_start(ms("2019-07-01T00:00:00Z")).unwrap(), ms("2019-01-01T00:00:00+01:00"));
    // 23:30Z on Dec 31st is already next year in Amsterdam
    assert_eq!(b.bucket_start(ms("2019-12-31T23:30:00Z")).unwrap(), ms("2020-01-01T00:00:00+01:00"));

    let b2 = CalendarBucket::new(Interval::new(2, TimeUnit::Years), Tz::UTC);
    assert_eq!(b2.bucket_start(ms("2019-07-01T00:00:00Z")).unwrap(), ms("2018-01-01T00:00:00Z"));
}

#[test]
fn iso_week_starts_monday() {
    let b = CalendarBucket::new(Interval::new(1, TimeUnit::IsoWeeks), Tz::UTC);
    // Wednesday 2019-01-02 belongs to ISO week 1 of 2019, which starts Monday 2018-12-31
    assert_eq!(b.bucket_start(ms("2019-01-02T10:00:00Z")).unwrap(), ms("2018-12-31T00:00:00Z"));
    assert_eq!(b.bucket_start(ms("2019-01-06T23:59:59Z")).unwrap(), ms("2018-12-31T00:00:00Z"));
    assert_eq!(b.bucket_start(ms("2019-01-07T00:00:00Z")).unwrap(), ms("2019-01-07T00:00:00Z"));
}

#[test]
fn day_bucket_across_spring_forward() {
    // Amsterdam switches to +02:00 at 02:00 local on 2019-03-31
    let b = CalendarBucket::new(Interval::new(1, TimeUnit::Days), tz("Europe/Amsterdam"));
    assert_eq!(b.bucket_start(ms("2019-03-31T12:00:00Z")).unwrap(), ms("2019-03-31T00:00:00+01:00"));
    assert_eq!(b.bucket_start(ms("2019-04-01T12:00:00Z")).unwrap(), ms("2019-04-01T00:00:00+02:00"));
}

#[test]
fn day_bucket_in_midnight_gap_moves_forward() {
    // Sao Paulo skipped 00:00-01:00 local on 2018-11-04
    let b = CalendarBucket::new(Interval::new(1, TimeUnit::Days), tz("America/Sao_Paulo"));
    assert_eq!(b.bucket_start(ms("2018-11-04T12:00:00Z")).unwrap(), ms("2018-11-04T01:00:00-02:00"));
}

#[test]
fn hour_bucket_keeps_offset_in_repeated_hour() {
    // 01:00-02:00 local happens twice in New York on 2019-11-03
    let b = CalendarBucket::new(Interval::new(1, TimeUnit::Hours), tz("America/New_York"));
    assert_eq!(b.bucket_start(ms("2019-11-03T05:30:00Z")).unwrap(), ms("2019-11-03T05:00:00Z"));
    assert_eq!(b.bucket_start(ms("2019-11-03T06:30:00Z")).unwrap(), ms("2019-11-03T06:00:00Z"));
}

#[test]
fn sub_day_steps() {
    let b = CalendarBucket::new(Interval::new(15, TimeUnit::Minutes), Tz::UTC);
    assert_eq!(b.bucket_start(ms("2019-01-01T10:44:59Z")).unwrap(), ms("2019-01-01T10:30:00Z"));
    let b = CalendarBucket::new(Interval::new(250, TimeUnit::Milliseconds), Tz::UTC);
    assert_eq!(b.bucket_start(ms("2019-01-01T10:44:59.499Z")).unwrap(), ms("2019-01-01T10:44:59.250Z"));
    let b = CalendarBucket::new(Interval::new(10, TimeUnit::Seconds), Tz::UTC);
    assert_eq!(b.bucket_start(ms("2019-01-01T10:44:59.499Z")).unwrap(), ms("2019-01-01T10:44:50Z"));
}

#[test]
fn bucket_fn_closure_is_monotonic_over_sorted_input() {
    let f = make_bucket_fn(Interval::new(1, TimeUnit::Months), tz("Australia/Sydney"));
    let day = 86_400_000i64;
    let start = ms("2019-01-01T00:00:00Z");
    let mut prev = i64::MIN;
    for i in 0..400 {
        let key = f(start + i * day).unwrap();
        assert!(key >= prev);
        prev = key;
    }
}

#[test]
fn range_months_excludes_end() {
    let r = generate_range(ms("2019-01-15T00:00:00Z"), ms("2019-04-01T00:00:00Z"), false, Tz::UTC, Interval::new(1, TimeUnit::Months)).unwrap();
    assert_eq!(r, vec![ms("2019-01-01T00:00:00Z"), ms("2019-02-01T00:00:00Z"), ms("2019-03-01T00:00:00Z")]);
}

#[test]
fn range_inclusive_end_keeps_boundary_bucket() {
    let r = generate_range(ms("2019-01-15T00:00:00Z"), ms("2019-04-01T00:00:00Z"), true, Tz::UTC, Interval::new(1, TimeUnit::Months)).unwrap();
    assert_eq!(r.len(), 4);
    assert_eq!(r[3], ms("2019-04-01T00:00:00Z"));
}

#[test]
fn range_days_across_dst_is_calendar_correct() {
    let ams = tz("Europe/Amsterdam");
    let r = generate_range(ms("2019-03-30T23:00:00Z"), ms("2019-04-01T23:00:00Z"), false, ams, Interval::new(1, TimeUnit::Days)).unwrap();
    assert_eq!(r, vec![ms("2019-03-31T00:00:00+01:00"), ms("2019-04-01T00:00:00+02:00"), ms("2019-04-02T00:00:00+02:00")]);
    assert_eq!(r[1] - r[0], 23 * 3_600_000);
}

#[test]
fn range_years_with_step() {
    let r = generate_range(ms("2010-06-01T00:00:00Z"), ms("2016-01-01T00:00:00Z"), false, Tz::UTC, Interval::new(2, TimeUnit::Years)).unwrap();
    assert_eq!(r, vec![ms("2010-01-01T00:00:00Z"), ms("2012-01-01T00:00:00Z"), ms("2014-01-01T00:00:00Z")]);
}

#[test]
fn range_hours_fixed_duration() {
    let r = generate_range(ms("2019-01-01T10:20:00Z"), ms("2019-01-01T13:00:00Z"), false, Tz::UTC, Interval::new(1, TimeUnit::Hours)).unwrap();
    assert_eq!(r, vec![ms("2019-01-01T10:00:00Z"), ms("2019-01-01T11:00:00Z"), ms("2019-01-01T12:00:00Z")]);
}

#[test]
fn range_empty_when_start_after_end() {
    let r = generate_range(ms("2019-05-01T00:00:00Z"), ms("2019-01-01T00:00:00Z"), false, Tz::UTC, Interval::new(1, TimeUnit::Days)).unwrap();
    assert!(r.is_empty());
}

#[test]
fn range_refuses_runaway_expansion() {
    let err = generate_range(0, 10_000_000_000, false, Tz::UTC, Interval::new(1, TimeUnit::Milliseconds)).unwrap_err();
    assert_eq!(err.code_str(), "range_too_large");
}
