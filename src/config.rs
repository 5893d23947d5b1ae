use crate::client::Aligner;
use chrono::TimeDelta;
use serde::Deserialize;

/// Upper bound for any configured duration (one year).
const MAX_DURATION_SECS: u64 = 366 * 24 * 3600;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub collector: CollectorConfig,
    pub harvest: HarvestConfig,
    pub source: SourceConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CollectorConfig {
    /// Seconds between collection cycles.
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    /// How often to log harvest stats at INFO level.
    #[serde(default = "default_stats_log_interval_secs")]
    pub stats_log_interval_secs: u64,
    /// Finished batches queued for the emitter before the worker waits.
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            stats_log_interval_secs: default_stats_log_interval_secs(),
            channel_capacity: default_channel_capacity(),
        }
    }
}

fn default_interval_secs() -> u64 {
    60
}

fn default_stats_log_interval_secs() -> u64 {
    300
}

fn default_channel_capacity() -> usize {
    16
}

/// A `key = value` label filter. `value` is either a literal or one of the
/// filter functions, e.g. `starts_with("prod")`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LabelFilter {
    pub key: String,
    pub value: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LabelFilters {
    #[serde(default)]
    pub resource_labels: Vec<LabelFilter>,
    #[serde(default)]
    pub metric_labels: Vec<LabelFilter>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HarvestConfig {
    pub project: String,
    /// Time-series listings started per second.
    #[serde(default = "default_rate_limit")]
    pub rate_limit: usize,
    #[serde(default = "default_delay_secs")]
    pub delay_secs: u64,
    /// Fixed window length. Unset or 0 spans the time since the last cycle.
    #[serde(default)]
    pub window_secs: Option<u64>,
    /// Max age of the discovered metric types before they are listed again.
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,
    #[serde(default = "default_true")]
    pub gather_raw_distribution_buckets: bool,
    #[serde(default)]
    pub distribution_aggregation_aligners: Vec<Aligner>,
    #[serde(default)]
    pub metric_type_prefix_include: Vec<String>,
    #[serde(default)]
    pub metric_type_prefix_exclude: Vec<String>,
    #[serde(default)]
    pub filter: LabelFilters,
}

fn default_rate_limit() -> usize {
    14
}

fn default_delay_secs() -> u64 {
    300
}

fn default_cache_ttl_secs() -> u64 {
    3600
}

fn default_true() -> bool {
    true
}

impl HarvestConfig {
    /// Defaults for everything but the project.
    pub fn new(project: impl Into<String>) -> Self {
        Self {
            project: project.into(),
            rate_limit: default_rate_limit(),
            delay_secs: default_delay_secs(),
            window_secs: None,
            cache_ttl_secs: default_cache_ttl_secs(),
            gather_raw_distribution_buckets: true,
            distribution_aggregation_aligners: Vec::new(),
            metric_type_prefix_include: Vec::new(),
            metric_type_prefix_exclude: Vec::new(),
            filter: LabelFilters::default(),
        }
    }

    pub fn delay(&self) -> TimeDelta {
        secs(self.delay_secs)
    }

    pub fn window(&self) -> Option<TimeDelta> {
        self.window_secs.filter(|&w| w > 0).map(secs)
    }

    pub fn cache_ttl(&self) -> TimeDelta {
        secs(self.cache_ttl_secs)
    }
}

fn secs(s: u64) -> TimeDelta {
    TimeDelta::seconds(s.min(MAX_DURATION_SECS) as i64)
}

#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    /// JSON fixture of recorded API responses replayed by the client.
    pub fixture_path: String,
}

impl AppConfig {
    pub fn load() -> anyhow::Result<Self> {
        let path = std::env::var("CONFIG_FILE").unwrap_or_else(|_| "config.toml".into());
        let s = std::fs::read_to_string(&path)?;
        Self::load_from_str(&s)
    }

    /// Parse and validate config from a string (e.g. for tests).
    pub fn load_from_str(s: &str) -> anyhow::Result<Self> {
        let config: AppConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            self.collector.interval_secs > 0,
            "collector.interval_secs must be > 0, got {}",
            self.collector.interval_secs
        );
        anyhow::ensure!(
            self.collector.stats_log_interval_secs > 0,
            "collector.stats_log_interval_secs must be > 0, got {}",
            self.collector.stats_log_interval_secs
        );
        anyhow::ensure!(
            self.collector.channel_capacity > 0,
            "collector.channel_capacity must be > 0, got {}",
            self.collector.channel_capacity
        );
        anyhow::ensure!(
            !self.harvest.project.is_empty(),
            "harvest.project must be non-empty"
        );
        anyhow::ensure!(
            self.harvest.rate_limit > 0,
            "harvest.rate_limit must be > 0, got {}",
            self.harvest.rate_limit
        );
        anyhow::ensure!(
            self.harvest.delay_secs <= MAX_DURATION_SECS,
            "harvest.delay_secs must be <= {}, got {}",
            MAX_DURATION_SECS,
            self.harvest.delay_secs
        );
        if let Some(window) = self.harvest.window_secs {
            anyhow::ensure!(
                window <= MAX_DURATION_SECS,
                "harvest.window_secs must be <= {}, got {}",
                MAX_DURATION_SECS,
                window
            );
        }
        anyhow::ensure!(
            self.harvest.cache_ttl_secs <= MAX_DURATION_SECS,
            "harvest.cache_ttl_secs must be <= {}, got {}",
            MAX_DURATION_SECS,
            self.harvest.cache_ttl_secs
        );
        for label in self
            .harvest
            .filter
            .resource_labels
            .iter()
            .chain(&self.harvest.filter.metric_labels)
        {
            anyhow::ensure!(
                !label.key.is_empty(),
                "harvest.filter label key must be non-empty"
            );
        }
        anyhow::ensure!(
            !self.source.fixture_path.is_empty(),
            "source.fixture_path must be non-empty"
        );
        Ok(())
    }
}
