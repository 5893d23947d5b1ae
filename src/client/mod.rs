// Consumed monitoring API: paginated listings of descriptors and series.
// Transport lives behind `MetricClient`; the engine only sees lazy streams.

mod memory;
mod request;

pub use memory::{Fixture, FixtureConnector, FixtureSeries, MemoryClient};
pub use request::{
    ALIGNMENT_PERIOD, Aggregation, Aligner, ListMetricDescriptorsRequest, ListTimeSeriesRequest,
    TimeInterval, UnknownAligner, project_scope,
};

use crate::error::ClientError;
use crate::models::{MetricDescriptor, TimeSeries};
use async_trait::async_trait;
use futures_util::stream::BoxStream;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Lazy, finite listing. `None` is end of listing; `Some(Err(_))` is a
/// failure while paging.
pub type DescriptorStream = BoxStream<'static, Result<MetricDescriptor, ClientError>>;
pub type SeriesStream = BoxStream<'static, Result<TimeSeries, ClientError>>;

#[async_trait]
pub trait MetricClient: Send + Sync {
    /// Starts a descriptor listing. An `Err` here means the request itself failed.
    async fn list_metric_descriptors(
        &self,
        req: &ListMetricDescriptorsRequest,
        cancel: &CancellationToken,
    ) -> Result<DescriptorStream, ClientError>;

    /// Starts a time-series listing. The stream ends early once `cancel` fires.
    async fn list_time_series(
        &self,
        req: &ListTimeSeriesRequest,
        cancel: &CancellationToken,
    ) -> Result<SeriesStream, ClientError>;
}

/// Establishes the client on the first cycle.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self) -> Result<Arc<dyn MetricClient>, ClientError>;
}

/// Hands out an already constructed client.
pub struct StaticConnector(pub Arc<dyn MetricClient>);

#[async_trait]
impl Connector for StaticConnector {
    async fn connect(&self) -> Result<Arc<dyn MetricClient>, ClientError> {
        Ok(Arc::clone(&self.0))
    }
}
