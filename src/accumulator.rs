// Sink boundary: finished metrics and per-fetch errors leave the engine here.

use crate::error::HarvestError;
use crate::models::Metric;

pub trait Accumulator: Send {
    fn add_metric(&mut self, metric: Metric);
    fn add_error(&mut self, error: HarvestError);
}

/// Everything one cycle produced.
#[derive(Debug, Default)]
pub struct MetricBatch {
    pub metrics: Vec<Metric>,
    pub errors: Vec<HarvestError>,
}

impl MetricBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.metrics.is_empty() && self.errors.is_empty()
    }

    /// Metrics with the given name, in emission order.
    pub fn named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Metric> + 'a {
        self.metrics.iter().filter(move |m| m.name == name)
    }
}

impl Accumulator for MetricBatch {
    fn add_metric(&mut self, metric: Metric) {
        self.metrics.push(metric);
    }

    fn add_error(&mut self, error: HarvestError) {
        self.errors.push(error);
    }
}
