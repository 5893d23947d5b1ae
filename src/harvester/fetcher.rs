// Per-config fetch: streams a time-series listing as samples and merges them
// into the grouper. Distributions go through the converter.

use super::discovery::TimeSeriesConfig;
use super::distribution::add_distribution;
use super::grouper::LockedSeriesGrouper;
use crate::client::MetricClient;
use crate::error::HarvestError;
use crate::models::{FieldValue, Metric, MetricKind, Tags, TimeSeries, TypedValue};
use chrono::{DateTime, SubsecRound, Utc};
use futures_util::stream::{self, BoxStream};
use futures_util::{StreamExt, future};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::warn;

pub const PROJECT_ID_TAG: &str = "project_id";
pub const RESOURCE_TYPE_TAG: &str = "resource_type";
pub const METRIC_CATEGORY_TAG: &str = "metric_category";
pub const METRIC_KIND_TAG: &str = "metric_kind";

/// One remote point with the tags of its series.
#[derive(Debug, Clone)]
pub struct Sample {
    pub timestamp: DateTime<Utc>,
    pub tags: Arc<Tags>,
    pub metric_kind: MetricKind,
    pub value: TypedValue,
}

#[derive(Debug, Default)]
pub struct FetchOutcome {
    pub samples: usize,
    pub histograms: Vec<Metric>,
}

/// Tags shared by every point of `series`. Remote labels override the fixed
/// `resource_type`/`project_id` tags; category and kind are always ours.
pub fn series_tags(project: &str, measurement: &str, series: &TimeSeries) -> Tags {
    let mut tags = Tags::new();
    tags.insert(RESOURCE_TYPE_TAG.to_string(), series.resource_type.clone());
    tags.insert(PROJECT_ID_TAG.to_string(), project.to_string());
    for (k, v) in series.resource_labels.iter().chain(&series.metric_labels) {
        tags.insert(k.clone(), v.clone());
    }

    // category keeps series from different metric families apart
    let category = match measurement.rfind('/') {
        Some(idx) if idx > 0 => &measurement[idx + 1..],
        _ => measurement,
    };
    tags.insert(METRIC_CATEGORY_TAG.to_string(), category.to_string());
    tags.insert(
        METRIC_KIND_TAG.to_string(),
        series.metric_kind.as_tag().to_string(),
    );
    tags
}

fn samples_of(
    project: &str,
    measurement: &str,
    series: TimeSeries,
) -> impl Iterator<Item = Sample> + use<> {
    let tags = Arc::new(series_tags(project, measurement, &series));
    let metric_kind = series.metric_kind;
    series.points.into_iter().map(move |point| Sample {
        timestamp: point.end_time.trunc_subsecs(0),
        tags: Arc::clone(&tags),
        metric_kind,
        value: point.value,
    })
}

/// Starts the listing for `config` and returns its samples as a lazy stream.
///
/// A failed request is an error; a failure while paging is logged and ends
/// the stream. The stream also ends as soon as `cancel` fires.
pub async fn fetch(
    client: &dyn MetricClient,
    project: &str,
    config: &TimeSeriesConfig,
    cancel: &CancellationToken,
) -> Result<BoxStream<'static, Sample>, HarvestError> {
    let listing = client
        .list_time_series(&config.request, cancel)
        .await
        .map_err(|source| HarvestError::Fetch {
            metric_type: config.metric_type.clone(),
            source,
        })?;

    let metric_type = config.metric_type.clone();
    let project = project.to_string();
    let measurement = config.measurement.clone();
    Ok(listing
        .take_until(cancel.clone().cancelled_owned())
        .scan((), move |_, item| {
            future::ready(match item {
                Ok(series) => Some(series),
                Err(e) => {
                    warn!(
                        error = %e,
                        metric_type = %metric_type,
                        operation = "list_time_series",
                        "time series paging failed; dropping rest of listing"
                    );
                    None
                }
            })
        })
        .flat_map(move |series| stream::iter(samples_of(&project, &measurement, series)))
        .take_until(cancel.clone().cancelled_owned())
        .boxed())
}

/// Fetches one config and merges its samples into `grouper`. Histograms
/// built from distribution points are returned rather than grouped.
pub async fn gather_time_series(
    client: &dyn MetricClient,
    project: &str,
    config: &TimeSeriesConfig,
    grouper: &LockedSeriesGrouper,
    cancel: &CancellationToken,
) -> Result<FetchOutcome, HarvestError> {
    let mut samples = fetch(client, project, config, cancel).await?;
    let mut outcome = FetchOutcome::default();

    while let Some(sample) = samples.next().await {
        outcome.samples += 1;
        let value = match sample.value {
            TypedValue::Distribution(dist) => {
                if let Some(histogram) = add_distribution(
                    grouper,
                    &config.measurement,
                    &config.field_key,
                    &sample.tags,
                    sample.timestamp,
                    &dist,
                    sample.metric_kind,
                ) {
                    outcome.histograms.push(histogram);
                }
                continue;
            }
            TypedValue::Bool(v) => FieldValue::from(v),
            TypedValue::Int64(v) => FieldValue::from(v),
            TypedValue::Double(v) => FieldValue::from(v),
            TypedValue::String(v) => FieldValue::from(v),
        };
        grouper.add(
            &config.measurement,
            &sample.tags,
            sample.timestamp,
            &config.field_key,
            value,
        );
    }

    Ok(outcome)
}
