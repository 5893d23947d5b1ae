// In-memory monitoring client. Serves descriptors and series from memory or
// from a JSON fixture recorded from the real API.

use super::{
    Aligner, Connector, DescriptorStream, ListMetricDescriptorsRequest, ListTimeSeriesRequest,
    MetricClient, SeriesStream,
};
use crate::error::ClientError;
use crate::models::{MetricDescriptor, TimeSeries};
use async_trait::async_trait;
use futures_util::StreamExt;
use futures_util::stream;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Series returned for `metric_type`, optionally only for aggregated
/// requests using `aligner`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FixtureSeries {
    pub metric_type: String,
    #[serde(default)]
    pub aligner: Option<Aligner>,
    pub series: TimeSeries,
}

/// On-disk fixture layout.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Fixture {
    #[serde(default)]
    pub descriptors: Vec<MetricDescriptor>,
    #[serde(default)]
    pub series: Vec<FixtureSeries>,
}

#[derive(Debug, Default)]
pub struct MemoryClient {
    descriptors: Vec<MetricDescriptor>,
    series: Vec<FixtureSeries>,
}

impl MemoryClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_fixture(fixture: Fixture) -> Self {
        Self {
            descriptors: fixture.descriptors,
            series: fixture.series,
        }
    }

    pub fn with_descriptor(mut self, descriptor: MetricDescriptor) -> Self {
        self.descriptors.push(descriptor);
        self
    }

    pub fn with_series(mut self, metric_type: &str, series: TimeSeries) -> Self {
        self.series.push(FixtureSeries {
            metric_type: metric_type.to_string(),
            aligner: None,
            series,
        });
        self
    }

    pub fn with_aligned_series(
        mut self,
        metric_type: &str,
        aligner: Aligner,
        series: TimeSeries,
    ) -> Self {
        self.series.push(FixtureSeries {
            metric_type: metric_type.to_string(),
            aligner: Some(aligner),
            series,
        });
        self
    }
}

/// Prefix from a `metric.type = starts_with("...")` filter.
fn starts_with_prefix(filter: &str) -> Option<&str> {
    filter
        .strip_prefix("metric.type = starts_with(")?
        .strip_suffix(')')?
        .strip_prefix('"')?
        .strip_suffix('"')
}

/// Metric type from the leading `metric.type = "..."` clause.
fn metric_type_clause(filter: &str) -> Option<&str> {
    let rest = filter.strip_prefix("metric.type = \"")?;
    rest.split('"').next()
}

#[async_trait]
impl MetricClient for MemoryClient {
    async fn list_metric_descriptors(
        &self,
        req: &ListMetricDescriptorsRequest,
        cancel: &CancellationToken,
    ) -> Result<DescriptorStream, ClientError> {
        let prefix = if req.filter.is_empty() {
            ""
        } else {
            starts_with_prefix(&req.filter).ok_or_else(|| {
                ClientError::request(
                    "list_metric_descriptors",
                    format!("unsupported filter {:?}", req.filter),
                )
            })?
        };
        let items: Vec<_> = self
            .descriptors
            .iter()
            .filter(|d| d.metric_type.starts_with(prefix))
            .cloned()
            .map(Ok)
            .collect();

        Ok(stream::iter(items)
            .take_until(cancel.clone().cancelled_owned())
            .boxed())
    }

    async fn list_time_series(
        &self,
        req: &ListTimeSeriesRequest,
        cancel: &CancellationToken,
    ) -> Result<SeriesStream, ClientError> {
        let metric_type = metric_type_clause(&req.filter).ok_or_else(|| {
            ClientError::request(
                "list_time_series",
                format!("unsupported filter {:?}", req.filter),
            )
        })?;

        let aligner = req.aggregation.map(|a| a.per_series_aligner);
        let items: Vec<Result<TimeSeries, ClientError>> = self
            .series
            .iter()
            .filter(|s| s.metric_type == metric_type && s.aligner == aligner)
            .map(|s| Ok(s.series.clone()))
            .collect();

        Ok(stream::iter(items)
            .take_until(cancel.clone().cancelled_owned())
            .boxed())
    }
}

/// Loads a JSON `Fixture` from disk when the engine first connects.
pub struct FixtureConnector {
    path: PathBuf,
}

impl FixtureConnector {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl Connector for FixtureConnector {
    async fn connect(&self) -> Result<Arc<dyn MetricClient>, ClientError> {
        let raw = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| ClientError::Connect(format!("{}: {}", self.path.display(), e)))?;
        let fixture: Fixture = serde_json::from_str(&raw)
            .map_err(|e| ClientError::Connect(format!("{}: {}", self.path.display(), e)))?;
        tracing::info!(
            path = %self.path.display(),
            descriptors = fixture.descriptors.len(),
            series = fixture.series.len(),
            "fixture client loaded"
        );
        Ok(Arc::new(MemoryClient::from_fixture(fixture)))
    }
}
