// Collection cycle: window -> discovery (cache-gated) -> rate-limited fan-out
// of fetch tasks -> join -> grouped metrics to the accumulator.

pub mod cache;
pub mod discovery;
pub mod distribution;
pub mod fetcher;
pub mod grouper;
pub mod limiter;
pub mod stats;
pub mod window;

pub use cache::ConfigCache;
pub use discovery::TimeSeriesConfig;
pub use grouper::{LockedSeriesGrouper, SeriesGrouper};
pub use limiter::RateLimiter;
pub use stats::{HarvestStats, StatsSnapshot};
pub use window::WindowScheduler;

use crate::accumulator::Accumulator;
use crate::client::{Connector, MetricClient, TimeInterval};
use crate::config::HarvestConfig;
use crate::error::HarvestError;
use crate::models::Metric;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// Long-lived engine. Holds the state carried between cycles: the client,
/// the previous window end and the config cache.
pub struct Harvester {
    settings: HarvestConfig,
    connector: Arc<dyn Connector>,
    client: Option<Arc<dyn MetricClient>>,
    scheduler: WindowScheduler,
    previous_end: Option<DateTime<Utc>>,
    cache: Option<ConfigCache>,
    stats: Arc<HarvestStats>,
}

impl Harvester {
    pub fn new(settings: HarvestConfig, connector: Arc<dyn Connector>) -> Self {
        let scheduler = WindowScheduler::new(settings.delay(), settings.window());
        Self {
            settings,
            connector,
            client: None,
            scheduler,
            previous_end: None,
            cache: None,
            stats: Arc::new(HarvestStats::default()),
        }
    }

    pub fn stats(&self) -> Arc<HarvestStats> {
        Arc::clone(&self.stats)
    }

    /// End of the last window requested, if any cycle has run.
    pub fn previous_end(&self) -> Option<DateTime<Utc>> {
        self.previous_end
    }

    pub fn cache(&self) -> Option<&ConfigCache> {
        self.cache.as_ref()
    }

    async fn client(&mut self) -> Result<Arc<dyn MetricClient>, HarvestError> {
        if let Some(client) = &self.client {
            return Ok(Arc::clone(client));
        }
        let client = self.connector.connect().await.map_err(HarvestError::Init)?;
        self.client = Some(Arc::clone(&client));
        Ok(client)
    }

    /// Runs one collection cycle.
    ///
    /// Per-fetch failures go to `acc` next to the metrics that were collected;
    /// only client initialization and discovery failures return `Err`.
    #[instrument(skip_all, fields(project = %self.settings.project))]
    pub async fn gather(
        &mut self,
        acc: &mut dyn Accumulator,
        cancel: &CancellationToken,
    ) -> Result<(), HarvestError> {
        let client = self.client().await?;
        self.stats.record_cycle();

        let now = Utc::now();
        let (start, end) = self.scheduler.next_window(self.previous_end, now);
        self.previous_end = Some(end);
        let interval = TimeInterval::new(start, end);

        let configs = self
            .time_series_configs(client.as_ref(), interval, now, cancel)
            .await?;

        let grouper = Arc::new(LockedSeriesGrouper::new());
        let histograms = self.dispatch(client, configs, &grouper, acc, cancel).await;

        let grouped = grouper.take_metrics();
        let emitted = grouped.len() + histograms.len();
        for metric in grouped.into_iter().chain(histograms) {
            acc.add_metric(metric);
        }
        self.stats.record_metrics(emitted);
        debug!(
            start = %interval.start,
            end = %interval.end,
            metrics = emitted,
            "collection cycle complete"
        );
        Ok(())
    }

    /// Cached configs with a refreshed interval, or a fresh discovery.
    async fn time_series_configs(
        &mut self,
        client: &dyn MetricClient,
        interval: TimeInterval,
        now: DateTime<Utc>,
        cancel: &CancellationToken,
    ) -> Result<Vec<TimeSeriesConfig>, HarvestError> {
        if let Some(cache) = self.cache.as_mut()
            && cache.is_valid_at(now)
        {
            debug!(configs = cache.len(), "using cached time series configs");
            return Ok(cache.refresh(interval));
        }

        let configs =
            discovery::discover(client, &self.settings, interval, cancel, &self.stats).await?;
        info!(configs = configs.len(), "discovered time series configs");
        self.cache = Some(ConfigCache::new(
            now,
            self.settings.cache_ttl(),
            configs.clone(),
        ));
        Ok(configs)
    }

    /// Spawns one fetch task per config, `rate_limit` per second, then waits
    /// for all of them. Returns the histogram metrics the tasks produced.
    async fn dispatch(
        &self,
        client: Arc<dyn MetricClient>,
        configs: Vec<TimeSeriesConfig>,
        grouper: &Arc<LockedSeriesGrouper>,
        acc: &mut dyn Accumulator,
        cancel: &CancellationToken,
    ) -> Vec<Metric> {
        let mut limiter = RateLimiter::per_second(self.settings.rate_limit);
        let mut tasks: Vec<(String, JoinHandle<_>)> = Vec::with_capacity(configs.len());

        for config in configs {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    debug!(dispatched = tasks.len(), "cycle cancelled; dispatch stopped");
                    break;
                }
                _ = limiter.acquire() => {}
            }

            self.stats.record_series_listing();
            let client = Arc::clone(&client);
            let grouper = Arc::clone(grouper);
            let cancel = cancel.clone();
            let project = self.settings.project.clone();
            let metric_type = config.metric_type.clone();
            tasks.push((
                metric_type,
                tokio::spawn(async move {
                    fetcher::gather_time_series(
                        client.as_ref(),
                        &project,
                        &config,
                        &grouper,
                        &cancel,
                    )
                    .await
                }),
            ));
        }

        let mut histograms = Vec::new();
        for (metric_type, task) in tasks {
            match task.await {
                Ok(Ok(outcome)) => histograms.extend(outcome.histograms),
                Ok(Err(e)) => {
                    self.stats.record_fetch_error();
                    warn!(error = %e, operation = "gather_time_series", "fetch failed");
                    acc.add_error(e);
                }
                Err(e) => {
                    self.stats.record_fetch_error();
                    warn!(error = %e, metric_type = %metric_type, "fetch task failed");
                    acc.add_error(HarvestError::Task {
                        metric_type,
                        message: e.to_string(),
                    });
                }
            }
        }
        histograms
    }
}
