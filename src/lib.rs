// Library for tests to access modules

pub mod accumulator;
pub mod client;
pub mod config;
pub mod error;
pub mod harvester;
pub mod models;
pub mod worker;

pub use accumulator::{Accumulator, MetricBatch};
pub use error::{ClientError, HarvestError};
pub use harvester::Harvester;
