// Per-engine call accounting, logged periodically by the worker.

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct HarvestStats {
    cycles: AtomicU64,
    descriptor_listings: AtomicU64,
    series_listings: AtomicU64,
    fetch_errors: AtomicU64,
    metrics_emitted: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub cycles: u64,
    pub descriptor_listings: u64,
    pub series_listings: u64,
    pub fetch_errors: u64,
    pub metrics_emitted: u64,
}

impl HarvestStats {
    pub(crate) fn record_cycle(&self) {
        self.cycles.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_descriptor_listing(&self) {
        self.descriptor_listings.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_series_listing(&self) {
        self.series_listings.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_fetch_error(&self) {
        self.fetch_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_metrics(&self, n: usize) {
        self.metrics_emitted.fetch_add(n as u64, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            cycles: self.cycles.load(Ordering::Relaxed),
            descriptor_listings: self.descriptor_listings.load(Ordering::Relaxed),
            series_listings: self.series_listings.load(Ordering::Relaxed),
            fetch_errors: self.fetch_errors.load(Ordering::Relaxed),
            metrics_emitted: self.metrics_emitted.load(Ordering::Relaxed),
        }
    }
}
