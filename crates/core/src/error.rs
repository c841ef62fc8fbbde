//! Status codes and error types for rsu
//!
//! Every remote attempt reports failure as a [`Status`]. The retry executor
//! wraps the last status into an [`Error`] that says whether the service
//! refused the request or kept failing until the retry budget ran out.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failure category of a single attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StatusCode {
    Ok,
    Cancelled,
    Unknown,
    InvalidArgument,
    DeadlineExceeded,
    NotFound,
    AlreadyExists,
    PermissionDenied,
    Unauthenticated,
    ResourceExhausted,
    FailedPrecondition,
    Aborted,
    OutOfRange,
    Unimplemented,
    Internal,
    Unavailable,
    DataLoss,
}

impl StatusCode {
    /// All codes, in declaration order
    pub const ALL: [StatusCode; 17] = [
        StatusCode::Ok,
        StatusCode::Cancelled,
        StatusCode::Unknown,
        StatusCode::InvalidArgument,
        StatusCode::DeadlineExceeded,
        StatusCode::NotFound,
        StatusCode::AlreadyExists,
        StatusCode::PermissionDenied,
        StatusCode::Unauthenticated,
        StatusCode::ResourceExhausted,
        StatusCode::FailedPrecondition,
        StatusCode::Aborted,
        StatusCode::OutOfRange,
        StatusCode::Unimplemented,
        StatusCode::Internal,
        StatusCode::Unavailable,
        StatusCode::DataLoss,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StatusCode::Ok => "OK",
            StatusCode::Cancelled => "CANCELLED",
            StatusCode::Unknown => "UNKNOWN",
            StatusCode::InvalidArgument => "INVALID_ARGUMENT",
            StatusCode::DeadlineExceeded => "DEADLINE_EXCEEDED",
            StatusCode::NotFound => "NOT_FOUND",
            StatusCode::AlreadyExists => "ALREADY_EXISTS",
            StatusCode::PermissionDenied => "PERMISSION_DENIED",
            StatusCode::Unauthenticated => "UNAUTHENTICATED",
            StatusCode::ResourceExhausted => "RESOURCE_EXHAUSTED",
            StatusCode::FailedPrecondition => "FAILED_PRECONDITION",
            StatusCode::Aborted => "ABORTED",
            StatusCode::OutOfRange => "OUT_OF_RANGE",
            StatusCode::Unimplemented => "UNIMPLEMENTED",
            StatusCode::Internal => "INTERNAL",
            StatusCode::Unavailable => "UNAVAILABLE",
            StatusCode::DataLoss => "DATA_LOSS",
        }
    }
}

impl std::fmt::Display for StatusCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for StatusCode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let wanted = s.trim().to_uppercase().replace('-', "_");
        StatusCode::ALL
            .into_iter()
            .find(|code| code.as_str() == wanted)
            .ok_or_else(|| format!("Invalid status code: {s}"))
    }
}

/// Outcome of one remote attempt: a code and a human-readable message
///
/// A `Status` is immutable once built. `StatusCode::Ok` is the only success
/// code, and the retry machinery never sees it because successful attempts
/// return their value instead.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{code}: {message}")]
pub struct Status {
    code: StatusCode,
    message: String,
}

impl Status {
    pub fn new(code: StatusCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn code(&self) -> StatusCode {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn is_ok(&self) -> bool {
        self.code == StatusCode::Ok
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::new(StatusCode::InvalidArgument, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NotFound, message)
    }

    pub fn failed_precondition(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FailedPrecondition, message)
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(StatusCode::Unavailable, message)
    }

    pub fn deadline_exceeded(message: impl Into<String>) -> Self {
        Self::new(StatusCode::DeadlineExceeded, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::Internal, message)
    }

    pub fn permission_denied(message: impl Into<String>) -> Self {
        Self::new(StatusCode::PermissionDenied, message)
    }
}

/// Error type for rsu operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// A single attempt failed, or the request was rejected before any
    /// network traffic (bad arguments)
    #[error("{0}")]
    Status(Status),

    /// The service reported an error that retrying cannot fix
    #[error("Permanent error in {operation}: {status}")]
    Permanent {
        operation: String,
        status: Status,
    },

    /// The service kept failing until the retry budget was spent
    #[error("Retry policy exhausted in {operation} after {attempts} attempts: {status}")]
    RetryExhausted {
        operation: String,
        attempts: u32,
        status: Status,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl Error {
    /// The last underlying status, verbatim
    pub fn status(&self) -> Status {
        match self {
            Error::Status(status)
            | Error::Permanent { status, .. }
            | Error::RetryExhausted { status, .. } => status.clone(),
            Error::Config(msg) | Error::Serialization(msg) => Status::invalid_argument(msg.clone()),
        }
    }

    pub fn code(&self) -> StatusCode {
        match self {
            Error::Status(status)
            | Error::Permanent { status, .. }
            | Error::RetryExhausted { status, .. } => status.code(),
            Error::Config(_) | Error::Serialization(_) => StatusCode::InvalidArgument,
        }
    }

    /// Whether the retry budget ran out, as opposed to the service saying no
    pub fn is_exhausted(&self) -> bool {
        matches!(self, Error::RetryExhausted { .. })
    }

    pub fn is_permanent(&self) -> bool {
        matches!(self, Error::Permanent { .. })
    }
}

impl From<Status> for Error {
    fn from(status: Status) -> Self {
        Error::Status(status)
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

/// Result type alias for rsu operations
pub type Result<T> = std::result::Result<T, Error>;
