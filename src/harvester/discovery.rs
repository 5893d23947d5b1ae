// Metric-type discovery and per-type request configs.
// One descriptor yields one scalar config, or for distributions a raw-bucket
// config and/or one aligned config per configured aligner.

use super::stats::HarvestStats;
use crate::client::{
    Aggregation, Aligner, ListMetricDescriptorsRequest, ListTimeSeriesRequest, MetricClient,
    TimeInterval, project_scope,
};
use crate::config::{HarvestConfig, LabelFilter, LabelFilters};
use crate::error::HarvestError;
use crate::models::{MetricDescriptor, ValueType};
use futures_util::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};

/// Filter functions a label value may use instead of a quoted literal.
pub const FILTER_FUNCTIONS: [&str; 4] = ["starts_with", "ends_with", "has_substring", "one_of"];

/// Field key used when a metric type has no `/`.
pub const DEFAULT_FIELD_KEY: &str = "value";

/// Everything needed to fetch one remote time series and name its output.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeSeriesConfig {
    pub metric_type: String,
    pub measurement: String,
    /// Field name for scalar values; prefix of the distribution fields.
    pub field_key: String,
    pub request: ListTimeSeriesRequest,
}

impl TimeSeriesConfig {
    pub fn new(project: &str, metric_type: &str, filter: String, interval: TimeInterval) -> Self {
        let (measurement, field_key) = split_metric_type(metric_type);
        Self {
            metric_type: metric_type.to_string(),
            measurement: measurement.to_string(),
            field_key: field_key.to_string(),
            request: ListTimeSeriesRequest {
                name: project_scope(project),
                filter,
                interval,
                aggregation: None,
            },
        }
    }

    /// Turns this into an aggregated request aligned by `aligner` over 60s.
    pub fn with_aligner(mut self, aligner: Aligner) -> Self {
        self.field_key = format!("{}_{}", self.field_key, aligner.field_suffix());
        self.request.aggregation = Some(Aggregation::aligned(aligner));
        self
    }

    pub fn set_interval(&mut self, interval: TimeInterval) {
        self.request.interval = interval;
    }
}

/// Splits at the last `/`: `("a/b", "c")` for `"a/b/c"`. A type with no
/// separator (or only a leading one) keeps its whole name as measurement.
pub fn split_metric_type(metric_type: &str) -> (&str, &str) {
    match metric_type.rfind('/') {
        Some(idx) if idx > 0 => (&metric_type[..idx], &metric_type[idx + 1..]),
        _ => (metric_type, DEFAULT_FIELD_KEY),
    }
}

fn has_prefix(key: &str, prefixes: &[impl AsRef<str>]) -> bool {
    prefixes.iter().any(|p| key.starts_with(p.as_ref()))
}

/// Include prefixes win when present; otherwise anything not excluded passes.
pub fn include_metric_type(metric_type: &str, include: &[String], exclude: &[String]) -> bool {
    if !include.is_empty() {
        return has_prefix(metric_type, include);
    }
    !has_prefix(metric_type, exclude)
}

/// True for values like `starts_with("x")`; a bare `one_office` is a literal.
fn is_function_call(value: &str) -> bool {
    FILTER_FUNCTIONS.iter().any(|name| {
        value
            .strip_prefix(name)
            .is_some_and(|rest| rest.starts_with('('))
    })
}

fn label_clause(scope: &str, label: &LabelFilter) -> String {
    if is_function_call(&label.value) {
        format!("{}.labels.{} = {}", scope, label.key, label.value)
    } else {
        format!("{}.labels.{} = \"{}\"", scope, label.key, label.value)
    }
}

fn push_label_group(filter: &mut String, scope: &str, labels: &[LabelFilter]) {
    match labels {
        [] => {}
        [label] => {
            filter.push_str(" AND ");
            filter.push_str(&label_clause(scope, label));
        }
        labels => {
            let clauses: Vec<String> = labels.iter().map(|l| label_clause(scope, l)).collect();
            filter.push_str(" AND (");
            filter.push_str(&clauses.join(" OR "));
            filter.push(')');
        }
    }
}

/// Filter for a time-series listing of `metric_type`, narrowed by the
/// configured resource labels and then metric labels.
pub fn list_time_series_filter(metric_type: &str, labels: &LabelFilters) -> String {
    let mut filter = format!("metric.type = \"{}\"", metric_type);
    push_label_group(&mut filter, "resource", &labels.resource_labels);
    push_label_group(&mut filter, "metric", &labels.metric_labels);
    filter
}

/// One server-side descriptor filter per include prefix; empty when none.
pub fn descriptor_filters(include: &[String]) -> Vec<String> {
    include
        .iter()
        .map(|prefix| format!("metric.type = starts_with({:?})", prefix))
        .collect()
}

pub struct ConfigBuilder<'a> {
    settings: &'a HarvestConfig,
}

impl<'a> ConfigBuilder<'a> {
    pub fn new(settings: &'a HarvestConfig) -> Self {
        Self { settings }
    }

    fn config(&self, metric_type: &str, interval: TimeInterval) -> TimeSeriesConfig {
        let filter = list_time_series_filter(metric_type, &self.settings.filter);
        TimeSeriesConfig::new(&self.settings.project, metric_type, filter, interval)
    }

    pub fn build(
        &self,
        descriptor: &MetricDescriptor,
        interval: TimeInterval,
    ) -> Vec<TimeSeriesConfig> {
        let metric_type = descriptor.metric_type.as_str();
        if descriptor.value_type != ValueType::Distribution {
            return vec![self.config(metric_type, interval)];
        }

        let mut configs = Vec::with_capacity(1 + self.settings.distribution_aggregation_aligners.len());
        if self.settings.gather_raw_distribution_buckets {
            configs.push(self.config(metric_type, interval));
        }
        for &aligner in &self.settings.distribution_aggregation_aligners {
            configs.push(self.config(metric_type, interval).with_aligner(aligner));
        }
        configs
    }
}

/// Lists descriptors and builds the request configs for every accepted type.
/// Any listing failure fails discovery as a whole.
#[instrument(skip_all, fields(project = %settings.project))]
pub async fn discover(
    client: &dyn MetricClient,
    settings: &HarvestConfig,
    interval: TimeInterval,
    cancel: &CancellationToken,
    stats: &HarvestStats,
) -> Result<Vec<TimeSeriesConfig>, HarvestError> {
    let builder = ConfigBuilder::new(settings);
    let mut filters = descriptor_filters(&settings.metric_type_prefix_include);
    let server_filtered = !filters.is_empty();
    if !server_filtered {
        filters.push(String::new());
    }

    let mut configs = Vec::new();
    for filter in filters {
        let req = ListMetricDescriptorsRequest {
            name: project_scope(&settings.project),
            filter,
        };
        stats.record_descriptor_listing();
        let mut descriptors = client
            .list_metric_descriptors(&req, cancel)
            .await
            .map_err(HarvestError::Discovery)?;

        while let Some(item) = descriptors.next().await {
            let descriptor = item.map_err(HarvestError::Discovery)?;
            if !server_filtered
                && !include_metric_type(
                    &descriptor.metric_type,
                    &settings.metric_type_prefix_include,
                    &settings.metric_type_prefix_exclude,
                )
            {
                continue;
            }
            configs.extend(builder.build(&descriptor, interval));
            if cancel.is_cancelled() {
                break;
            }
        }
        if cancel.is_cancelled() {
            return Err(HarvestError::Cancelled);
        }
    }

    debug!(configs = configs.len(), "time series configs built");
    Ok(configs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn label(key: &str, value: &str) -> LabelFilter {
        LabelFilter {
            key: key.into(),
            value: value.into(),
        }
    }

    fn interval() -> TimeInterval {
        TimeInterval::new(
            Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
            Utc.timestamp_opt(1_700_000_060, 0).unwrap(),
        )
    }

    #[test]
    fn filter_without_labels_is_base_clause() {
        let filter = list_time_series_filter("a.googleapis.com/x", &LabelFilters::default());
        assert_eq!(filter, r#"metric.type = "a.googleapis.com/x""#);
    }

    #[test]
    fn single_resource_label_is_unparenthesized() {
        let labels = LabelFilters {
            resource_labels: vec![label("k", "v")],
            metric_labels: vec![],
        };
        assert_eq!(
            list_time_series_filter("X", &labels),
            r#"metric.type = "X" AND resource.labels.k = "v""#
        );
    }

    #[test]
    fn multiple_metric_labels_are_or_grouped() {
        let labels = LabelFilters {
            resource_labels: vec![],
            metric_labels: vec![label("device", "sda"), label("device", "sdb")],
        };
        assert_eq!(
            list_time_series_filter("X", &labels),
            r#"metric.type = "X" AND (metric.labels.device = "sda" OR metric.labels.device = "sdb")"#
        );
    }

    #[test]
    fn function_values_are_not_quoted() {
        let labels = LabelFilters {
            resource_labels: vec![label("instance_name", r#"starts_with("localhost")"#)],
            metric_labels: vec![label("device", r#"one_of("a","b")"#)],
        };
        assert_eq!(
            list_time_series_filter("X", &labels),
            r#"metric.type = "X" AND resource.labels.instance_name = starts_with("localhost") AND metric.labels.device = one_of("a","b")"#
        );
    }

    #[test]
    fn literal_sharing_a_function_prefix_is_quoted() {
        let labels = LabelFilters {
            resource_labels: vec![label("team", "one_office")],
            metric_labels: vec![label("path", "starts_with_slash")],
        };
        assert_eq!(
            list_time_series_filter("X", &labels),
            r#"metric.type = "X" AND resource.labels.team = "one_office" AND metric.labels.path = "starts_with_slash""#
        );
    }

    #[test]
    fn split_at_last_slash() {
        assert_eq!(
            split_metric_type("custom.googleapis.com/foo/bar"),
            ("custom.googleapis.com/foo", "bar")
        );
        assert_eq!(split_metric_type("plain"), ("plain", "value"));
        assert_eq!(split_metric_type("/leading"), ("/leading", "value"));
    }

    #[test]
    fn include_wins_over_exclude() {
        let include = vec!["compute.".to_string()];
        let exclude = vec!["compute.".to_string()];
        assert!(include_metric_type("compute.googleapis.com/x", &include, &exclude));
        assert!(!include_metric_type("storage.googleapis.com/x", &include, &exclude));
        assert!(!include_metric_type("compute.googleapis.com/x", &[], &exclude));
        assert!(include_metric_type("storage.googleapis.com/x", &[], &exclude));
        assert!(include_metric_type("anything", &[], &[]));
    }

    #[test]
    fn descriptor_filters_use_starts_with() {
        let filters = descriptor_filters(&["compute.googleapis.com/".to_string()]);
        assert_eq!(
            filters,
            vec![r#"metric.type = starts_with("compute.googleapis.com/")"#.to_string()]
        );
        assert!(descriptor_filters(&[]).is_empty());
    }

    #[test]
    fn scalar_descriptor_builds_one_config() {
        let settings = HarvestConfig::new("proj");
        let builder = ConfigBuilder::new(&settings);
        let configs = builder.build(
            &MetricDescriptor::new("custom.googleapis.com/foo/bar", ValueType::Int64),
            interval(),
        );
        assert_eq!(configs.len(), 1);
        assert_eq!(configs[0].measurement, "custom.googleapis.com/foo");
        assert_eq!(configs[0].field_key, "bar");
        assert_eq!(configs[0].request.name, "projects/proj");
        assert_eq!(configs[0].request.aggregation, None);
    }

    #[test]
    fn distribution_descriptor_builds_raw_and_aligned_configs() {
        let mut settings = HarvestConfig::new("proj");
        settings.distribution_aggregation_aligners =
            vec![Aligner::Percentile99, Aligner::Percentile50];
        let builder = ConfigBuilder::new(&settings);
        let configs = builder.build(
            &MetricDescriptor::new("x.googleapis.com/latencies", ValueType::Distribution),
            interval(),
        );
        let keys: Vec<_> = configs.iter().map(|c| c.field_key.as_str()).collect();
        assert_eq!(
            keys,
            ["latencies", "latencies_align_percentile_99", "latencies_align_percentile_50"]
        );
        let aggregation = configs[1].request.aggregation.unwrap();
        assert_eq!(aggregation.per_series_aligner, Aligner::Percentile99);
        assert_eq!(aggregation.alignment_period.as_secs(), 60);
    }

    #[test]
    fn raw_buckets_can_be_disabled() {
        let mut settings = HarvestConfig::new("proj");
        settings.gather_raw_distribution_buckets = false;
        let builder = ConfigBuilder::new(&settings);
        let configs = builder.build(
            &MetricDescriptor::new("x.googleapis.com/latencies", ValueType::Distribution),
            interval(),
        );
        assert!(configs.is_empty());
    }
}
