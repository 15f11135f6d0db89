//! Error types for the finrank engine.
//!
//! Uses `thiserror` for structured error handling with automatic `From` implementations.
//! Errors scoped to one unit of work (page, record, author) are non-fatal to a run;
//! [`StoreError`] and [`SyncError`] abort it.

use std::time::Duration;

/// Errors from the HTTP client layer.
#[derive(thiserror::Error, Debug)]
pub enum ClientError {
    /// HTTP transport error (connection, DNS, TLS, etc.)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Connection dropped or stalled while the response body was read
    #[error("Truncated response body: {0}")]
    Body(#[source] reqwest::Error),

    /// Middleware error
    #[error("Middleware error: {0}")]
    Middleware(#[from] reqwest_middleware::Error),

    /// Rate limited by the API (429 response)
    #[error("Rate limited, retry after {retry_after:?}")]
    RateLimited {
        /// Server-advised wait before retrying
        retry_after: Duration,
    },

    /// Resource not found (404 response)
    #[error("Resource not found: {resource}")]
    NotFound {
        /// Description of the missing resource
        resource: String,
    },

    /// Invalid request parameters (400 response)
    #[error("Bad request: {message}")]
    BadRequest {
        /// Error message from API
        message: String,
    },

    /// JSON parsing error
    #[error("Failed to parse response: {0}")]
    Parse(#[from] serde_json::Error),

    /// Server error (5xx response)
    #[error("Server error ({status}): {message}")]
    Server {
        /// HTTP status code
        status: u16,
        /// Error message
        message: String,
    },

    /// Unexpected HTTP status
    #[error("Unexpected status {status}: {message}")]
    UnexpectedStatus {
        /// HTTP status code
        status: u16,
        /// Response body or message
        message: String,
    },
}

impl ClientError {
    /// Create a rate limited error with retry-after duration.
    #[must_use]
    pub fn rate_limited(seconds: u64) -> Self {
        Self::RateLimited { retry_after: Duration::from_secs(seconds) }
    }

    /// Create a not found error.
    #[must_use]
    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::NotFound { resource: resource.into() }
    }

    /// Create a bad request error.
    #[must_use]
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest { message: message.into() }
    }

    /// Create a server error.
    #[must_use]
    pub fn server(status: u16, message: impl Into<String>) -> Self {
        Self::Server { status, message: message.into() }
    }

    /// Returns true if retrying the same request may succeed.
    ///
    /// Rate limiting is reported separately through [`Self::retry_after`].
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Http(e) => is_transient_transport(e),
            Self::Middleware(reqwest_middleware::Error::Reqwest(e)) => is_transient_transport(e),
            Self::Body(_) | Self::Server { .. } => true,
            _ => false,
        }
    }

    /// Get the retry-after duration if this is a rate limit error.
    #[must_use]
    pub const fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited { retry_after } => Some(*retry_after),
            _ => None,
        }
    }
}

fn is_transient_transport(e: &reqwest::Error) -> bool {
    e.is_timeout() || e.is_connect() || e.is_request()
}

/// A fetch scope exhausted its retries or hit a non-retryable error.
///
/// Aborts only the scope it names; other scopes in the same run continue.
#[derive(thiserror::Error, Debug)]
#[error("Fetch failed for {scope} at page {page}: {cause}")]
pub struct FetchError {
    /// Scope label (e.g. `jf/2024`).
    pub scope: String,
    /// 1-based page number that failed.
    pub page: u32,
    /// Cursor of the failed page; resuming from it repeats no committed page.
    pub cursor: String,
    /// Underlying client failure.
    #[source]
    pub cause: ClientError,
}

/// A raw record could not be mapped to a work.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("Malformed record {}: {reason}", record_id.as_deref().unwrap_or("<no id>"))]
pub struct NormalizationError {
    /// External id of the record, when one could be read.
    pub record_id: Option<String>,
    /// What was wrong with it.
    pub reason: String,
}

impl NormalizationError {
    /// Create a normalization error.
    #[must_use]
    pub fn new(record_id: Option<String>, reason: impl Into<String>) -> Self {
        Self { record_id, reason: reason.into() }
    }
}

/// Errors from the local store.
#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    /// SQLite error
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error (lock file handling)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Concurrent writer detected; single-writer discipline was violated
    #[error("Store conflict: {0}")]
    Conflict(String),

    /// The connection mutex was poisoned by a panicking holder
    #[error("Store connection lock poisoned")]
    LockPoisoned,
}

impl StoreError {
    /// Create a conflict error.
    #[must_use]
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }
}

/// Errors from the research agenda text-transform service.
#[derive(thiserror::Error, Debug)]
pub enum AgendaError {
    /// HTTP transport error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-success status from the service
    #[error("Service returned {status}: {message}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Response body
        message: String,
    },

    /// The service answered without usable text
    #[error("Service returned an empty summary")]
    EmptyResponse,

    /// No credentials configured
    #[error("Missing API key for {0}")]
    MissingApiKey(&'static str),
}

/// Fatal errors that abort a sync run.
#[derive(thiserror::Error, Debug)]
pub enum SyncError {
    /// Store integrity failure
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

/// Invalid user-supplied scope or option.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("Invalid {field}: {message}")]
pub struct InputError {
    /// Field that failed validation
    pub field: String,
    /// Validation error message
    pub message: String,
}

impl InputError {
    /// Create a validation error.
    #[must_use]
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self { field: field.into(), message: message.into() }
    }
}

/// Errors while writing tabular exports.
#[derive(thiserror::Error, Debug)]
pub enum ExportError {
    /// CSV writer error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Writer produced invalid UTF-8
    #[error("Invalid UTF-8 in export: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

/// Result type alias for client operations.
pub type ClientResult<T> = Result<T, ClientError>;

/// Result type alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
