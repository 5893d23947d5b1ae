use serde::{Deserialize, Serialize};

/// Observed minimum and maximum of a distribution's population.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Range {
    pub min: f64,
    pub max: f64,
}

/// Bucket layout. Linear and exponential layouts have `num_finite_buckets`
/// finite buckets plus an underflow and an overflow bucket; an explicit
/// layout with N bounds has N + 1 buckets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BucketOptions {
    Linear {
        num_finite_buckets: i32,
        width: f64,
        offset: f64,
    },
    Exponential {
        num_finite_buckets: i32,
        growth_factor: f64,
        scale: f64,
    },
    Explicit {
        bounds: Vec<f64>,
    },
}

/// Histogram-like value: summary statistics plus per-bucket counts.
/// Trailing empty buckets may be omitted from `bucket_counts`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Distribution {
    pub count: i64,
    pub mean: f64,
    #[serde(default)]
    pub sum_of_squared_deviation: f64,
    #[serde(default)]
    pub range: Option<Range>,
    #[serde(default)]
    pub bucket_options: Option<BucketOptions>,
    #[serde(default)]
    pub bucket_counts: Vec<i64>,
}
