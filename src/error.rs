//! Error types for command dispatch, pagination, polling and batched writes.
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Cap the number of structured service errors kept in a single `Service` error.
pub const MAX_SERVICE_ERRORS: usize = 20;

/// Crate-wide result alias.
pub type Result<T, E = DataApiError> = std::result::Result<T, E>;

/// One entry of the `errors` array returned by the Data API or the DevOps API.
///
/// The DevOps API reports `description` and `ID` rather than `message` and
/// `errorCode`; both spellings decode into the same fields.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiErrorDetail {
    #[serde(default, alias = "description")]
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub family: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, rename = "ID", alias = "id", skip_serializing_if = "Option::is_none")]
    pub id: Option<serde_json::Value>,
}

impl fmt::Display for ApiErrorDetail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.error_code {
            Some(code) => write!(f, "[{}] {}", code, self.message),
            None => write!(f, "{}", self.message),
        }
    }
}

/// Failure raised by a transport before any response body was interpreted.
#[derive(Debug, thiserror::Error)]
#[error("{message}")]
pub struct TransportError {
    message: String,
    timed_out: bool,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
}

impl TransportError {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into(), timed_out: false, source: None }
    }

    pub fn timed_out(message: impl Into<String>) -> Self {
        Self { message: message.into(), timed_out: true, source: None }
    }

    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        self.source = Some(Box::new(source));
        self
    }

    /// True when the request hit its connect or request timeout.
    pub fn is_timeout(&self) -> bool {
        self.timed_out
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        let timed_out = err.is_timeout();
        Self { message: err.to_string(), timed_out, source: Some(Box::new(err)) }
    }
}

/// A chunk of a batched write that did not complete.
#[derive(Debug)]
pub struct ChunkFailure {
    pub chunk: usize,
    pub error: DataApiError,
}

/// Unified error type for every operation in this crate.
#[derive(Debug, thiserror::Error)]
pub enum DataApiError {
    /// Network or timeout failure at the HTTP layer.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// The service answered with a structured `errors` array or a non-2xx status.
    #[error("service error (HTTP {status}): {}", join_messages(.errors))]
    Service {
        status: u16,
        errors: Vec<ApiErrorDetail>,
        warnings: Vec<serde_json::Value>,
        /// Any `status` or `data` payload returned alongside the errors.
        partial: Option<serde_json::Value>,
    },

    /// The response body did not match the expected shape.
    #[error("decode error: {message}")]
    Decode {
        message: String,
        #[source]
        source: Option<serde_json::Error>,
    },

    /// A payload could not be serialized to JSON.
    #[error("serialization error: {0}")]
    Serialize(#[source] serde_json::Error),

    /// A precondition was violated before any request was issued.
    #[error("usage error: {0}")]
    Usage(String),

    /// A polled condition did not become true in time.
    #[error("timed out after {waited:?} waiting for {condition}")]
    Timeout { condition: String, waited: Duration },

    /// The cancellation token fired.
    #[error("operation cancelled")]
    Cancelled,

    /// Some chunks of a batched write failed or were skipped.
    #[error(
        "batched write incomplete: {} chunk(s) succeeded, {} failed, {} skipped",
        .succeeded.len(),
        .failed.len(),
        .skipped.len()
    )]
    PartialBatch {
        succeeded: Vec<usize>,
        failed: Vec<ChunkFailure>,
        skipped: Vec<usize>,
        /// Results merged from the chunks that succeeded.
        completed: Vec<serde_json::Value>,
    },
}

fn join_messages(errors: &[ApiErrorDetail]) -> String {
    if errors.is_empty() {
        return "no error details".to_string();
    }
    errors.iter().map(ToString::to_string).collect::<Vec<_>>().join("; ")
}

impl DataApiError {
    pub(crate) fn usage(message: impl Into<String>) -> Self {
        Self::Usage(message.into())
    }

    pub(crate) fn decode(message: impl Into<String>, source: Option<serde_json::Error>) -> Self {
        Self::Decode { message: message.into(), source }
    }

    pub(crate) fn service(
        status: u16,
        mut errors: Vec<ApiErrorDetail>,
        warnings: Vec<serde_json::Value>,
        partial: Option<serde_json::Value>,
    ) -> Self {
        errors.truncate(MAX_SERVICE_ERRORS);
        Self::Service { status, errors, warnings, partial }
    }

    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_))
    }

    pub fn is_service(&self) -> bool {
        matches!(self, Self::Service { .. })
    }

    pub fn is_decode(&self) -> bool {
        matches!(self, Self::Decode { .. })
    }

    pub fn is_usage(&self) -> bool {
        matches!(self, Self::Usage(_))
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Structured service errors, if this is a `Service` error.
    pub fn service_errors(&self) -> Option<&[ApiErrorDetail]> {
        match self {
            Self::Service { errors, .. } => Some(errors.as_slice()),
            _ => None,
        }
    }

    /// Error codes reported by the service, in order.
    pub fn error_codes(&self) -> Vec<&str> {
        self.service_errors()
            .map(|errors| errors.iter().filter_map(|e| e.error_code.as_deref()).collect())
            .unwrap_or_default()
    }
}
