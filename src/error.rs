// Error taxonomy for the monitoring client and the harvest engine.

use thiserror::Error;

/// Errors surfaced by a `MetricClient` or its `Connector`.
#[derive(Debug, Clone, Error)]
pub enum ClientError {
    #[error("connect: {0}")]
    Connect(String),

    #[error("{operation}: {message}")]
    Request {
        operation: &'static str,
        message: String,
    },
}

impl ClientError {
    pub fn request(operation: &'static str, message: impl Into<String>) -> Self {
        ClientError::Request {
            operation,
            message: message.into(),
        }
    }
}

/// Errors produced while running a collection cycle.
///
/// `Init` and `Discovery` abort the cycle; the others are per-fetch and are
/// reported through the accumulator next to whatever metrics were collected.
#[derive(Debug, Clone, Error)]
pub enum HarvestError {
    #[error("failed to create monitoring client: {0}")]
    Init(#[source] ClientError),

    #[error("list metric descriptors: {0}")]
    Discovery(#[source] ClientError),

    #[error("list time series {metric_type}: {source}")]
    Fetch {
        metric_type: String,
        #[source]
        source: ClientError,
    },

    #[error("fetch task for {metric_type} failed: {message}")]
    Task {
        metric_type: String,
        message: String,
    },

    #[error("collection cycle cancelled")]
    Cancelled,
}

impl HarvestError {
    /// True for errors that stop the whole cycle rather than a single fetch.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            HarvestError::Init(_) | HarvestError::Discovery(_) | HarvestError::Cancelled
        )
    }
}
