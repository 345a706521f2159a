//! Error taxonomy for the execution client.
//!
//! Every failure surfaced by this crate is one of these variants. Callers
//! branch on [`ExecutorError::kind`], never on message text.

use serde::Serialize;
use std::fmt;

pub type Result<T> = std::result::Result<T, ExecutorError>;

pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, thiserror::Error)]
pub enum ExecutorError {
    /// DNS, connection, or body decoding failure. Safe to retry.
    #[error("Network error: {message}")]
    Network {
        message: String,
        #[source]
        source: BoxError,
    },

    /// Non-2xx response, with the best message the body offered
    #[error("{message}")]
    Server { status: u16, message: String },

    /// Overall wall-clock budget spent while waiting on the job.
    /// The remote job is left running.
    #[error("Execution timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    /// Cancelled by the caller or by scope teardown
    #[error("Execution was cancelled")]
    Aborted,

    /// The service reported an error status for the job
    #[error("Job execution failed: {message}")]
    Job { message: String },

    /// The service answered with something outside the protocol
    #[error("Invalid response: {message}")]
    InvalidResponse { message: String },
}

/// Stable error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    NetworkError,
    ServerError,
    TimeoutError,
    AbortError,
    JobError,
    InvalidResponse,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::NetworkError => "NETWORK_ERROR",
            ErrorKind::ServerError => "SERVER_ERROR",
            ErrorKind::TimeoutError => "TIMEOUT_ERROR",
            ErrorKind::AbortError => "ABORT_ERROR",
            ErrorKind::JobError => "JOB_ERROR",
            ErrorKind::InvalidResponse => "INVALID_RESPONSE",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ExecutorError {
    pub fn network(message: impl Into<String>, source: impl Into<BoxError>) -> Self {
        ExecutorError::Network {
            message: message.into(),
            source: source.into(),
        }
    }

    pub fn invalid_response(message: impl Into<String>) -> Self {
        ExecutorError::InvalidResponse {
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            ExecutorError::Network { .. } => ErrorKind::NetworkError,
            ExecutorError::Server { .. } => ErrorKind::ServerError,
            ExecutorError::Timeout { .. } => ErrorKind::TimeoutError,
            ExecutorError::Aborted => ErrorKind::AbortError,
            ExecutorError::Job { .. } => ErrorKind::JobError,
            ExecutorError::InvalidResponse { .. } => ErrorKind::InvalidResponse,
        }
    }

    /// HTTP status for server errors
    pub fn status_code(&self) -> Option<u16> {
        match self {
            ExecutorError::Server { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_abort(&self) -> bool {
        matches!(self, ExecutorError::Aborted)
    }

    /// Hint for callers that wrap the client in their own retry policy.
    /// Nothing in this crate retries.
    pub fn is_retryable(&self) -> bool {
        match self {
            ExecutorError::Network { .. } => true,
            ExecutorError::Server { status, .. } => {
                *status >= 500 || *status == 408 || *status == 429
            }
            _ => false,
        }
    }
}
