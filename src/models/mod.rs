// Domain models: remote descriptors and series, and the metrics we emit.

mod descriptor;
mod distribution;
mod metric;
mod series;

pub use descriptor::{MetricDescriptor, MetricKind, ValueType};
pub use distribution::{BucketOptions, Distribution, Range};
pub use metric::{FieldValue, Metric, MetricType, Tags};
pub use series::{Point, TimeSeries, TypedValue};
