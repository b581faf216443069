use thiserror::Error;

/// Errors returned by the auth service client.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Network or TLS failure from the underlying HTTP client.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The auth service answered with a status other than success or an
    /// expected rejection.
    #[error("auth service returned {status}: {body}")]
    Status { status: u16, body: String },

    /// The configured store URL could not be parsed.
    #[error("invalid auth base URL '{url}': {reason}")]
    InvalidBaseUrl { url: String, reason: String },

    /// The response body could not be deserialized into the expected type.
    #[error("JSON deserialization error for {context}: {source}")]
    Deserialize {
        context: String,
        #[source]
        source: serde_json::Error,
    },
}
