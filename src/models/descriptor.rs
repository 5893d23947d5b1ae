use serde::{Deserialize, Serialize};

/// How the remote API relates successive points of a series.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MetricKind {
    #[default]
    Unspecified,
    Gauge,
    Delta,
    Cumulative,
}

impl MetricKind {
    /// Value of the `metric_kind` tag.
    pub fn as_tag(self) -> &'static str {
        match self {
            MetricKind::Unspecified => "unspecified",
            MetricKind::Gauge => "gauge",
            MetricKind::Delta => "delta",
            MetricKind::Cumulative => "cumulative",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ValueType {
    #[default]
    Unspecified,
    Bool,
    Int64,
    Double,
    String,
    Distribution,
    Money,
}

/// One entry of the remote metric-descriptor listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricDescriptor {
    #[serde(rename = "type")]
    pub metric_type: String,
    #[serde(default)]
    pub value_type: ValueType,
}

impl MetricDescriptor {
    pub fn new(metric_type: impl Into<String>, value_type: ValueType) -> Self {
        Self {
            metric_type: metric_type.into(),
            value_type,
        }
    }
}
