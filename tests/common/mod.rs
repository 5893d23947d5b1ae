// Shared test helpers

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use cloudmon::client::{
    DescriptorStream, ListMetricDescriptorsRequest, ListTimeSeriesRequest, MemoryClient,
    MetricClient, SeriesStream, StaticConnector,
};
use cloudmon::config::HarvestConfig;
use cloudmon::models::*;
use cloudmon::{ClientError, Harvester};
use futures_util::{StreamExt, stream};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

pub const PROJECT: &str = "test-project";

pub fn ts(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(secs, 0).unwrap()
}

pub fn gauge_series(instance: &str, points: Vec<Point>) -> TimeSeries {
    TimeSeries {
        resource_type: "gce_instance".into(),
        resource_labels: BTreeMap::from([("instance_id".to_string(), instance.to_string())]),
        metric_labels: BTreeMap::new(),
        metric_kind: MetricKind::Gauge,
        points,
    }
}

pub fn settings() -> HarvestConfig {
    let mut settings = HarvestConfig::new(PROJECT);
    // keep the limiter out of the way unless a test is about it
    settings.rate_limit = 1000;
    settings
}

/// Harvester over a shared client so tests can inspect it afterwards.
pub fn harvester<C: MetricClient + 'static>(client: &Arc<C>, settings: HarvestConfig) -> Harvester {
    let client: Arc<dyn MetricClient> = client.clone();
    Harvester::new(settings, Arc::new(StaticConnector(client)))
}

fn listed_metric_type(filter: &str) -> &str {
    filter
        .strip_prefix("metric.type = \"")
        .and_then(|rest| rest.split('"').next())
        .unwrap_or_default()
}

/// Wraps a `MemoryClient` with call accounting and injected failures.
pub struct TestClient {
    inner: MemoryClient,
    fail_descriptors: bool,
    failing_types: HashSet<String>,
    interrupted_types: HashMap<String, usize>,
    latency: Option<Duration>,
    descriptor_calls: AtomicU64,
    series_calls: AtomicU64,
    series_call_starts: Mutex<Vec<Instant>>,
}

impl TestClient {
    pub fn new(inner: MemoryClient) -> Self {
        Self {
            inner,
            fail_descriptors: false,
            failing_types: HashSet::new(),
            interrupted_types: HashMap::new(),
            latency: None,
            descriptor_calls: AtomicU64::new(0),
            series_calls: AtomicU64::new(0),
            series_call_starts: Mutex::new(Vec::new()),
        }
    }

    /// Descriptor listing requests fail outright.
    pub fn failing_descriptors(mut self) -> Self {
        self.fail_descriptors = true;
        self
    }

    /// Time-series listing requests for `metric_type` fail outright.
    pub fn failing_series(mut self, metric_type: &str) -> Self {
        self.failing_types.insert(metric_type.to_string());
        self
    }

    /// Listing for `metric_type` yields `after` series, then a paging error.
    pub fn interrupted_series(mut self, metric_type: &str, after: usize) -> Self {
        self.interrupted_types.insert(metric_type.to_string(), after);
        self
    }

    /// Every time-series listing waits this long before returning.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn descriptor_calls(&self) -> u64 {
        self.descriptor_calls.load(Ordering::Relaxed)
    }

    pub fn time_series_calls(&self) -> u64 {
        self.series_calls.load(Ordering::Relaxed)
    }

    /// Instants at which time-series listings started, in call order.
    pub fn time_series_call_starts(&self) -> Vec<Instant> {
        self.series_call_starts.lock().unwrap().clone()
    }
}

#[async_trait]
impl MetricClient for TestClient {
    async fn list_metric_descriptors(
        &self,
        req: &ListMetricDescriptorsRequest,
        cancel: &CancellationToken,
    ) -> Result<DescriptorStream, ClientError> {
        self.descriptor_calls.fetch_add(1, Ordering::Relaxed);
        if self.fail_descriptors {
            return Err(ClientError::request(
                "list_metric_descriptors",
                "service unavailable",
            ));
        }
        self.inner.list_metric_descriptors(req, cancel).await
    }

    async fn list_time_series(
        &self,
        req: &ListTimeSeriesRequest,
        cancel: &CancellationToken,
    ) -> Result<SeriesStream, ClientError> {
        self.series_calls.fetch_add(1, Ordering::Relaxed);
        self.series_call_starts.lock().unwrap().push(Instant::now());
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        let metric_type = listed_metric_type(&req.filter);
        if self.failing_types.contains(metric_type) {
            return Err(ClientError::request(
                "list_time_series",
                format!("permission denied for {}", metric_type),
            ));
        }

        let listing = self.inner.list_time_series(req, cancel).await?;
        match self.interrupted_types.get(metric_type) {
            Some(&after) => {
                let reset = ClientError::request("list_time_series", "next page: connection reset");
                Ok(listing
                    .take(after)
                    .chain(stream::once(async move { Err(reset) }))
                    .boxed())
            }
            None => Ok(listing),
        }
    }
}
