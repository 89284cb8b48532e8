use crate::credential::CredentialError;
use hyper::StatusCode;
use thiserror::Error;

/// Result type alias for aggregator operations
pub type Result<T, E = AggregatorError> = std::result::Result<T, E>;

/// Errors that can occur while expanding, fanning out and merging a request
#[derive(Error, Debug)]
pub enum AggregatorError {
    /// A required inbound parameter is missing or empty.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A route template placeholder could not be resolved against an identifier.
    #[error("Parameter '{name}' could not be resolved from '{identifier}'")]
    ParameterUnresolved { name: String, identifier: String },

    /// The upstream returned a non-2xx status, or the call failed in transport.
    #[error("Upstream request failed for {route}: {reason}")]
    UpstreamCallFailed {
        route: String,
        status: Option<StatusCode>,
        reason: String,
    },

    #[error("Upstream timeout for {0}")]
    UpstreamTimeout(String),

    /// An upstream body did not have the expected JSON shape.
    #[error("Failed to merge responses: {0}")]
    MergeFailed(String),

    #[error("Failed to read request body: {0}")]
    RequestBodyError(String),

    #[error("Credential error: {0}")]
    Credential(#[from] CredentialError),

    #[error("Response serialization error: {0}")]
    ResponseSerializationError(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    InternalError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl AggregatorError {
    /// Status code returned to the caller for this error.
    ///
    /// Only `InvalidInput` and unreadable request bodies are client errors; everything
    /// else is reported as an opaque server-side failure.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AggregatorError::InvalidInput(_) | AggregatorError::RequestBodyError(_) => {
                StatusCode::BAD_REQUEST
            }
            AggregatorError::UpstreamCallFailed { .. } => StatusCode::BAD_GATEWAY,
            AggregatorError::UpstreamTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Detail that may be shown to the caller. Server-side failures stay in the logs.
    pub fn client_detail(&self) -> Option<String> {
        match self {
            AggregatorError::InvalidInput(_) | AggregatorError::RequestBodyError(_) => {
                Some(self.to_string())
            }
            _ => None,
        }
    }
}
