//! Tests of percentile queries and the percentile distribution report.

use hdrhist::Histogram;

#[test]
fn value_at_percentile_internal_count_exceeds_bucket_type() {
    let mut h = Histogram::new_with_bounds_and_store(1, 2, 3, hdrhist::StoreKind::U8).unwrap();
    h.set_auto_resize(true);

    for _ in 0..200 {
        h.record(100).unwrap();
    }
    for _ in 0..200 {
        h.record(100_000).unwrap();
    }

    // we won't get back the original input because of bucketing
    assert_eq!(h.highest_equivalent(100_000), h.value_at_quantile(1.0));
}

#[test]
fn value_at_percentile_2_values() {
    let mut h = Histogram::new_with_bounds(1, u64::max_value(), 3).unwrap();

    h.record(1).unwrap();
    h.record(2).unwrap();

    assert_eq!(1, h.value_at_percentile(25.0));
    assert_eq!(1, h.value_at_percentile(50.0));
    assert_eq!(2, h.value_at_percentile(50.1));
    assert_eq!(2, h.value_at_percentile(100.0));
}

#[test]
fn value_at_percentile_5_values() {
    let mut h = Histogram::new_with_bounds(1, u64::max_value(), 3).unwrap();

    h.record(1).unwrap();
    for _ in 0..4 {
        h.record(2).unwrap();
    }

    assert_eq!(1, h.value_at_percentile(20.0));
    assert_eq!(2, h.value_at_percentile(25.0));
    assert_eq!(2, h.value_at_percentile(30.0));
}

#[test]
fn value_at_percentile_20k() {
    let mut h = Histogram::new_with_bounds(1, u64::max_value(), 3).unwrap();

    for i in 1..20_001 {
        h.record(i).unwrap();
    }

    assert_eq!(20_000, h.len());
    assert!(h.equivalent(19961, h.value_at_percentile(99.805)));
}

#[test]
fn value_at_percentile_out_of_range_percentiles_clamp() {
    let mut h = Histogram::new_with_bounds(1, u64::max_value(), 3).unwrap();
    h.record(10).unwrap();
    h.record(20).unwrap();

    assert_eq!(h.value_at_percentile(0.0), h.value_at_percentile(-5.0));
    assert_eq!(h.value_at_percentile(100.0), h.value_at_percentile(250.0));
}

#[test]
fn value_at_quantile_matches_percentile_form() {
    let mut h = Histogram::new_with_bounds(1, u64::max_value(), 3).unwrap();
    for i in 1..=5_000 {
        h.record(i).unwrap();
    }

    for q in [0.0, 0.1, 0.25, 0.5, 0.75, 0.9375, 1.0] {
        assert_eq!(h.value_at_quantile(q), h.value_at_percentile(q * 100.0));
    }
}

#[test]
fn percentile_output_report_shape() {
    let mut h = Histogram::new_with_bounds(1, 3_600_000, 3).unwrap();
    for v in [25_u64, 50, 50, 75, 100, 10_000, 10_000, 30_000] {
        h.record(v).unwrap();
    }

    let mut out = Vec::new();
    h.output_percentile_distribution(&mut out, 5, 1.0).unwrap();
    let report = String::from_utf8(out).unwrap();
    let lines: Vec<&str> = report.lines().collect();

    assert_eq!(
        "       Value     Percentile TotalCount 1/(1-Percentile)",
        lines[0]
    );
    assert_eq!("", lines[1]);

    // one data line per iterator step, each starting with a value column
    let tick_count = h.iter_percentiles(5).count();
    // 3 trailer lines
    assert_eq!(2 + tick_count + 3, lines.len());

    let first_data = lines[2];
    assert!(first_data.starts_with("      25.000 0.000000000000"));

    // the last data line is the 100% point and drops the 1/(1-p) column
    let last_data = lines[lines.len() - 4];
    assert!(last_data.contains(" 1.000000000000 "));
    assert!(last_data.trim_end().ends_with(&h.len().to_string()));

    assert!(lines[lines.len() - 3].starts_with("#[Mean    = "));
    assert!(lines[lines.len() - 3].contains(", StdDeviation   = "));
    assert!(lines[lines.len() - 2].starts_with("#[Max     = "));
    assert!(lines[lines.len() - 2].contains(", Total count    = "));
    assert!(lines[lines.len() - 1].starts_with("#[Buckets = "));
    assert!(lines[lines.len() - 1].contains(", SubBuckets     = "));
}

#[test]
fn percentile_output_applies_value_scale() {
    let mut h = Histogram::new_with_bounds(1, 3_600_000, 2).unwrap();
    h.record(20_000).unwrap();

    let mut out = Vec::new();
    h.output_percentile_distribution(&mut out, 5, 1000.0).unwrap();
    let report = String::from_utf8(out).unwrap();

    // 20_000 raw scales down to 20.xx; the raw value must not appear
    assert!(report.contains("20."));
    assert!(!report.contains("20000"));
}
