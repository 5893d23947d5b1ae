// Request types for the monitoring API listings.

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Alignment period used for every aggregated distribution request.
pub const ALIGNMENT_PERIOD: Duration = Duration::from_secs(60);

/// Half-open `[start, end)` range, second precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeInterval {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeInterval {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            start: start.trunc_subsecs(0),
            end: end.trunc_subsecs(0),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown aggregation aligner {0:?}")]
pub struct UnknownAligner(pub String);

/// Per-series aligner understood by the remote API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Aligner {
    None,
    Delta,
    Rate,
    Interpolate,
    NextOlder,
    Min,
    Max,
    Mean,
    Count,
    Sum,
    Stddev,
    CountTrue,
    CountFalse,
    FractionTrue,
    Percentile99,
    Percentile95,
    Percentile50,
    Percentile05,
    PercentChange,
}

impl Aligner {
    pub const ALL: [Aligner; 19] = [
        Aligner::None,
        Aligner::Delta,
        Aligner::Rate,
        Aligner::Interpolate,
        Aligner::NextOlder,
        Aligner::Min,
        Aligner::Max,
        Aligner::Mean,
        Aligner::Count,
        Aligner::Sum,
        Aligner::Stddev,
        Aligner::CountTrue,
        Aligner::CountFalse,
        Aligner::FractionTrue,
        Aligner::Percentile99,
        Aligner::Percentile95,
        Aligner::Percentile50,
        Aligner::Percentile05,
        Aligner::PercentChange,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Aligner::None => "ALIGN_NONE",
            Aligner::Delta => "ALIGN_DELTA",
            Aligner::Rate => "ALIGN_RATE",
            Aligner::Interpolate => "ALIGN_INTERPOLATE",
            Aligner::NextOlder => "ALIGN_NEXT_OLDER",
            Aligner::Min => "ALIGN_MIN",
            Aligner::Max => "ALIGN_MAX",
            Aligner::Mean => "ALIGN_MEAN",
            Aligner::Count => "ALIGN_COUNT",
            Aligner::Sum => "ALIGN_SUM",
            Aligner::Stddev => "ALIGN_STDDEV",
            Aligner::CountTrue => "ALIGN_COUNT_TRUE",
            Aligner::CountFalse => "ALIGN_COUNT_FALSE",
            Aligner::FractionTrue => "ALIGN_FRACTION_TRUE",
            Aligner::Percentile99 => "ALIGN_PERCENTILE_99",
            Aligner::Percentile95 => "ALIGN_PERCENTILE_95",
            Aligner::Percentile50 => "ALIGN_PERCENTILE_50",
            Aligner::Percentile05 => "ALIGN_PERCENTILE_05",
            Aligner::PercentChange => "ALIGN_PERCENT_CHANGE",
        }
    }

    /// Suffix appended (after `_`) to the field key of an aligned config.
    pub fn field_suffix(self) -> String {
        self.as_str().to_lowercase()
    }
}

impl fmt::Display for Aligner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Aligner {
    type Err = UnknownAligner;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Aligner::ALL
            .into_iter()
            .find(|a| a.as_str() == s)
            .ok_or_else(|| UnknownAligner(s.to_string()))
    }
}

impl TryFrom<String> for Aligner {
    type Error = UnknownAligner;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Aligner> for String {
    fn from(a: Aligner) -> Self {
        a.as_str().to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Aggregation {
    pub alignment_period: Duration,
    pub per_series_aligner: Aligner,
}

impl Aggregation {
    pub fn aligned(aligner: Aligner) -> Self {
        Self {
            alignment_period: ALIGNMENT_PERIOD,
            per_series_aligner: aligner,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListMetricDescriptorsRequest {
    /// Scope, e.g. `projects/<id>`.
    pub name: String,
    /// Empty string lists everything.
    pub filter: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListTimeSeriesRequest {
    pub name: String,
    pub filter: String,
    pub interval: TimeInterval,
    pub aggregation: Option<Aggregation>,
}

/// Scope name for a project id.
pub fn project_scope(project: &str) -> String {
    format!("projects/{}", project)
}
