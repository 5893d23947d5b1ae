// Merges scalar fields from every fetch task into one metric per
// (measurement, tags, timestamp).

use crate::models::{FieldValue, Metric, MetricType, Tags};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct SeriesKey {
    measurement: String,
    tags: Tags,
    timestamp: DateTime<Utc>,
}

/// Unsynchronized grouper; metrics come out in first-seen order.
#[derive(Debug, Default)]
pub struct SeriesGrouper {
    index: HashMap<SeriesKey, usize>,
    metrics: Vec<Metric>,
}

impl SeriesGrouper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets `field` on the metric for the tuple, creating it on first use.
    /// A repeated field for the same tuple keeps the last value.
    pub fn add(
        &mut self,
        measurement: &str,
        tags: &Tags,
        timestamp: DateTime<Utc>,
        field: &str,
        value: FieldValue,
    ) {
        let key = SeriesKey {
            measurement: measurement.to_string(),
            tags: tags.clone(),
            timestamp,
        };
        let idx = match self.index.get(&key) {
            Some(&idx) => idx,
            None => {
                let idx = self.metrics.len();
                self.metrics.push(Metric::new(
                    measurement,
                    tags.clone(),
                    timestamp,
                    MetricType::Untyped,
                ));
                self.index.insert(key, idx);
                idx
            }
        };
        self.metrics[idx].add_field(field, value);
    }

    pub fn len(&self) -> usize {
        self.metrics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.metrics.is_empty()
    }

    pub fn into_metrics(self) -> Vec<Metric> {
        self.metrics
    }
}

/// Shared grouper for concurrent fetch tasks; every write takes the lock.
#[derive(Debug, Default)]
pub struct LockedSeriesGrouper {
    inner: Mutex<SeriesGrouper>,
}

impl LockedSeriesGrouper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(
        &self,
        measurement: &str,
        tags: &Tags,
        timestamp: DateTime<Utc>,
        field: &str,
        value: FieldValue,
    ) {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .add(measurement, tags, timestamp, field, value);
    }

    /// Takes the grouped metrics, leaving the grouper empty.
    pub fn take_metrics(&self) -> Vec<Metric> {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        std::mem::take(&mut *inner).into_metrics()
    }
}
