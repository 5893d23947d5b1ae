use super::{Distribution, MetricKind};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A point's value. Closed set of the remote API's value types.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypedValue {
    Bool(bool),
    Int64(i64),
    Double(f64),
    String(String),
    Distribution(Distribution),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Point {
    /// End of the point's interval; used as the sample timestamp.
    pub end_time: DateTime<Utc>,
    pub value: TypedValue,
}

impl Point {
    pub fn new(end_time: DateTime<Utc>, value: TypedValue) -> Self {
        Self { end_time, value }
    }
}

/// One series returned by a time-series listing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TimeSeries {
    #[serde(default)]
    pub resource_type: String,
    #[serde(default)]
    pub resource_labels: BTreeMap<String, String>,
    #[serde(default)]
    pub metric_labels: BTreeMap<String, String>,
    #[serde(default)]
    pub metric_kind: MetricKind,
    #[serde(default)]
    pub points: Vec<Point>,
}
