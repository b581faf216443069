use std::sync::Arc;

use thiserror::Error;
use virality_core::{LifecycleError, ValidationError};

/// Errors surfaced by [`crate::AnalysisClient`].
///
/// `Clone` so a single failed fetch can be delivered to every reader that
/// shared it.
#[derive(Debug, Clone, Error)]
pub enum ClientError {
    /// The request was rejected locally before anything was sent.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The patch is not a legal lifecycle step from the analysis' current state.
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),

    #[error("{0}")]
    NotFound(String),

    /// Non-success response from the API; `message` is the endpoint's own
    /// error text, unmodified.
    #[error("{message}")]
    Api { status: u16, message: String },

    #[error("HTTP error: {0}")]
    Http(#[source] Arc<reqwest::Error>),

    #[error("invalid API base URL '{url}': {reason}")]
    InvalidBaseUrl { url: String, reason: String },

    #[error("JSON deserialization error for {context}: {message}")]
    Deserialize { context: String, message: String },
}

impl From<reqwest::Error> for ClientError {
    fn from(e: reqwest::Error) -> Self {
        Self::Http(Arc::new(e))
    }
}
