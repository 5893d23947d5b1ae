// Distribution values: scalar companion fields plus a sparse bucket histogram.

use super::grouper::LockedSeriesGrouper;
use crate::models::{BucketOptions, Distribution, Metric, MetricKind, MetricType, Tags};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

/// Upper bound reported for the overflow bucket.
pub const OVERFLOW_UPPER_BOUND: f64 = 1e128;

/// Tag naming the measurement a histogram belongs to.
pub const METRIC_GROUP_TAG: &str = "input_metric_group";

/// Formatted upper bound -> count of that bucket. Empty buckets are absent.
pub type BucketHistogram = BTreeMap<String, i64>;

/// Number of buckets described by the layout, underflow and overflow included.
pub fn bucket_count(options: Option<&BucketOptions>) -> usize {
    match options {
        Some(BucketOptions::Linear {
            num_finite_buckets, ..
        })
        | Some(BucketOptions::Exponential {
            num_finite_buckets, ..
        }) => usize::try_from(*num_finite_buckets).unwrap_or(0) + 2,
        Some(BucketOptions::Explicit { bounds }) => bounds.len() + 1,
        None => 1,
    }
}

/// Upper bound of bucket `index` out of `num_buckets`.
pub fn upper_bound(options: Option<&BucketOptions>, index: usize, num_buckets: usize) -> f64 {
    if index == 0 {
        return 0.0;
    }
    if index + 1 == num_buckets {
        return OVERFLOW_UPPER_BOUND;
    }
    match options {
        Some(BucketOptions::Linear { width, offset, .. }) => offset + width * index as f64,
        Some(BucketOptions::Exponential {
            growth_factor,
            scale,
            ..
        }) => scale * growth_factor.powf(index as f64),
        Some(BucketOptions::Explicit { bounds }) => {
            bounds.get(index).copied().unwrap_or(OVERFLOW_UPPER_BOUND)
        }
        None => OVERFLOW_UPPER_BOUND,
    }
}

/// Scientific notation with six fractional mantissa digits, trailing zeros
/// trimmed down to one, and a signed exponent of at least two digits:
/// `1.0e+00`, `2.5e+01`, `1.054135e+01`, `1.0e+128`.
pub fn format_bound(value: f64) -> String {
    let formatted = format!("{:.6e}", value);
    let Some((mantissa, exponent)) = formatted.split_once('e') else {
        return formatted;
    };
    let Ok(exponent) = exponent.parse::<i32>() else {
        return formatted;
    };
    let mantissa = mantissa.trim_end_matches('0');
    let mantissa = mantissa.strip_suffix('.').unwrap_or(mantissa);
    let sign = if exponent < 0 { '-' } else { '+' };
    if mantissa.contains('.') {
        format!("{}e{}{:02}", mantissa, sign, exponent.abs())
    } else {
        format!("{}.0e{}{:02}", mantissa, sign, exponent.abs())
    }
}

/// Sparse histogram of the distribution's local bucket counts.
pub fn to_histogram(dist: &Distribution) -> BucketHistogram {
    let options = dist.bucket_options.as_ref();
    let num_buckets = bucket_count(options);
    dist.bucket_counts
        .iter()
        .take(num_buckets)
        .enumerate()
        .filter(|(_, count)| **count > 0)
        .map(|(i, count)| (format_bound(upper_bound(options, i, num_buckets)), *count))
        .collect()
}

/// Writes the scalar companion fields to the grouper and returns the
/// histogram metric, if any bucket is non-empty.
pub fn add_distribution(
    grouper: &LockedSeriesGrouper,
    measurement: &str,
    field_key: &str,
    tags: &Tags,
    timestamp: DateTime<Utc>,
    dist: &Distribution,
    kind: MetricKind,
) -> Option<Metric> {
    let field = |suffix: &str| format!("{}_{}", field_key, suffix);
    grouper.add(measurement, tags, timestamp, &field("count"), dist.count.into());
    grouper.add(measurement, tags, timestamp, &field("mean"), dist.mean.into());
    grouper.add(
        measurement,
        tags,
        timestamp,
        &field("sum_of_squared_deviation"),
        dist.sum_of_squared_deviation.into(),
    );
    if let Some(range) = dist.range {
        grouper.add(measurement, tags, timestamp, &field("range_min"), range.min.into());
        grouper.add(measurement, tags, timestamp, &field("range_max"), range.max.into());
    }

    let histogram = to_histogram(dist);
    if histogram.is_empty() {
        return None;
    }

    let mut histogram_tags = tags.clone();
    histogram_tags.insert(METRIC_GROUP_TAG.to_string(), measurement.to_string());
    let metric_type = match kind {
        MetricKind::Cumulative => MetricType::CumulativeHistogram,
        _ => MetricType::Histogram,
    };
    let mut metric = Metric::new(field_key, histogram_tags, timestamp, metric_type);
    for (bound, count) in histogram {
        metric.add_field(bound, count);
    }
    Some(metric)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FieldValue, Range};
    use chrono::TimeZone;

    fn linear(num_finite_buckets: i32, width: f64, offset: f64) -> Option<BucketOptions> {
        Some(BucketOptions::Linear {
            num_finite_buckets,
            width,
            offset,
        })
    }

    #[test]
    fn linear_layout_bucket_math() {
        let options = linear(3, 10.0, 0.0);
        let n = bucket_count(options.as_ref());
        assert_eq!(n, 5);
        assert_eq!(upper_bound(options.as_ref(), 0, n), 0.0);
        assert_eq!(upper_bound(options.as_ref(), 2, n), 20.0);
        assert_eq!(upper_bound(options.as_ref(), 4, n), OVERFLOW_UPPER_BOUND);
    }

    #[test]
    fn exponential_layout_bucket_math() {
        let options = Some(BucketOptions::Exponential {
            num_finite_buckets: 4,
            growth_factor: 2.0,
            scale: 3.0,
        });
        let n = bucket_count(options.as_ref());
        assert_eq!(n, 6);
        assert_eq!(upper_bound(options.as_ref(), 3, n), 24.0);
    }

    #[test]
    fn explicit_layout_bucket_math() {
        let options = Some(BucketOptions::Explicit {
            bounds: vec![1.0, 5.0, 10.0],
        });
        let n = bucket_count(options.as_ref());
        assert_eq!(n, 4);
        assert_eq!(upper_bound(options.as_ref(), 1, n), 5.0);
        assert_eq!(upper_bound(options.as_ref(), 2, n), 10.0);
        assert_eq!(upper_bound(options.as_ref(), 3, n), OVERFLOW_UPPER_BOUND);
    }

    #[test]
    fn formats_bounds_in_scientific_notation() {
        assert_eq!(format_bound(0.0), "0.0e+00");
        assert_eq!(format_bound(1.0), "1.0e+00");
        assert_eq!(format_bound(20.0), "2.0e+01");
        assert_eq!(format_bound(0.125), "1.25e-01");
        assert_eq!(format_bound(OVERFLOW_UPPER_BOUND), "1.0e+128");
        assert_eq!(format_bound(256.0), "2.56e+02");
    }

    #[test]
    fn linear_bounds_hide_float_noise() {
        let options = linear(10, 0.1, 0.0);
        let n = bucket_count(options.as_ref());
        // 0.1 * 3 is 0.30000000000000004
        assert_eq!(format_bound(upper_bound(options.as_ref(), 3, n)), "3.0e-01");
        assert_eq!(format_bound(upper_bound(options.as_ref(), 7, n)), "7.0e-01");
        assert_eq!(format_bound(upper_bound(options.as_ref(), 10, n)), "1.0e+00");
    }

    #[test]
    fn exponential_bounds_use_six_fraction_digits() {
        let options = Some(BucketOptions::Exponential {
            num_finite_buckets: 64,
            growth_factor: 1.4,
            scale: 1.0,
        });
        let n = bucket_count(options.as_ref());
        assert_eq!(format_bound(upper_bound(options.as_ref(), 1, n)), "1.4e+00");
        assert_eq!(format_bound(upper_bound(options.as_ref(), 7, n)), "1.054135e+01");
        assert_eq!(format_bound(upper_bound(options.as_ref(), 40, n)), "7.000377e+05");
    }

    #[test]
    fn histogram_is_sparse() {
        let dist = Distribution {
            count: 9,
            bucket_options: linear(3, 10.0, 0.0),
            bucket_counts: vec![0, 4, 0, 0, 5],
            ..Default::default()
        };
        let histogram = to_histogram(&dist);
        assert_eq!(histogram.len(), 2);
        assert_eq!(histogram.get("1.0e+01"), Some(&4));
        assert_eq!(histogram.get("1.0e+128"), Some(&5));
        assert!(!histogram.contains_key("2.0e+01"));
    }

    #[test]
    fn missing_trailing_counts_are_empty_buckets() {
        let dist = Distribution {
            bucket_options: linear(3, 10.0, 0.0),
            bucket_counts: vec![2],
            ..Default::default()
        };
        let histogram = to_histogram(&dist);
        assert_eq!(histogram.len(), 1);
        assert_eq!(histogram.get("0.0e+00"), Some(&2));
    }

    #[test]
    fn add_distribution_writes_companions_and_histogram() {
        let grouper = LockedSeriesGrouper::new();
        let ts = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        let mut tags = Tags::new();
        tags.insert("zone".into(), "a".into());
        let dist = Distribution {
            count: 5,
            mean: 2.0,
            sum_of_squared_deviation: 0.5,
            range: Some(Range { min: 1.0, max: 3.0 }),
            bucket_options: linear(1, 1.0, 0.0),
            bucket_counts: vec![0, 3, 2],
        };

        let histogram = add_distribution(
            &grouper,
            "svc.googleapis.com/rpc",
            "latencies",
            &tags,
            ts,
            &dist,
            MetricKind::Delta,
        )
        .unwrap();
        assert_eq!(histogram.name, "latencies");
        assert_eq!(histogram.metric_type, MetricType::Histogram);
        assert_eq!(histogram.tag(METRIC_GROUP_TAG), Some("svc.googleapis.com/rpc"));
        assert_eq!(histogram.field("1.0e+00"), Some(&FieldValue::Int(3)));
        assert_eq!(histogram.field("1.0e+128"), Some(&FieldValue::Int(2)));

        let scalars = grouper.take_metrics();
        assert_eq!(scalars.len(), 1);
        let m = &scalars[0];
        assert_eq!(m.tag(METRIC_GROUP_TAG), None);
        assert_eq!(m.field("latencies_count"), Some(&FieldValue::Int(5)));
        assert_eq!(m.field("latencies_mean"), Some(&FieldValue::Float(2.0)));
        assert_eq!(
            m.field("latencies_sum_of_squared_deviation"),
            Some(&FieldValue::Float(0.5))
        );
        assert_eq!(m.field("latencies_range_min"), Some(&FieldValue::Float(1.0)));
        assert_eq!(m.field("latencies_range_max"), Some(&FieldValue::Float(3.0)));
    }

    #[test]
    fn empty_histogram_emits_only_companions() {
        let grouper = LockedSeriesGrouper::new();
        let ts = Utc.timestamp_opt(0, 0).unwrap();
        let dist = Distribution::default();
        let out = add_distribution(&grouper, "m", "f", &Tags::new(), ts, &dist, MetricKind::Gauge);
        assert!(out.is_none());
        let scalars = grouper.take_metrics();
        assert_eq!(scalars[0].fields.len(), 3);
    }
}
