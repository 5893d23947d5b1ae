// TTL cache of the request configs built by discovery.

use super::discovery::TimeSeriesConfig;
use crate::client::TimeInterval;
use chrono::{DateTime, TimeDelta, Utc};

#[derive(Debug, Clone)]
pub struct ConfigCache {
    generated: DateTime<Utc>,
    ttl: TimeDelta,
    configs: Vec<TimeSeriesConfig>,
}

impl ConfigCache {
    pub fn new(generated: DateTime<Utc>, ttl: TimeDelta, configs: Vec<TimeSeriesConfig>) -> Self {
        Self {
            generated,
            ttl,
            configs,
        }
    }

    /// Valid while less than `ttl` has passed since generation.
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        now - self.generated < self.ttl
    }

    pub fn len(&self) -> usize {
        self.configs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.configs.is_empty()
    }

    /// Points every cached config at `interval` and returns them for dispatch.
    pub fn refresh(&mut self, interval: TimeInterval) -> Vec<TimeSeriesConfig> {
        for config in &mut self.configs {
            config.set_interval(interval);
        }
        self.configs.clone()
    }
}
