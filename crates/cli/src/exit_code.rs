//! Process exit codes
//!
//! Scripts rely on these values; do not renumber them.

use rsu_core::{Error, StatusCode};

/// Exit code of the `rsu` process
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
    Success = 0,
    GeneralError = 1,
    /// Bad arguments or an invalid request
    UsageError = 2,
    /// The service was unreachable or kept failing
    NetworkError = 3,
    AuthError = 4,
    NotFound = 5,
    /// A precondition failed or the resource already exists
    Conflict = 6,
    /// Ctrl-C; a resumable upload was suspended
    Interrupted = 130,
}

impl ExitCode {
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    pub fn from_status(code: StatusCode) -> Self {
        match code {
            StatusCode::Ok => ExitCode::Success,
            StatusCode::InvalidArgument | StatusCode::OutOfRange => ExitCode::UsageError,
            StatusCode::Unauthenticated | StatusCode::PermissionDenied => ExitCode::AuthError,
            StatusCode::NotFound => ExitCode::NotFound,
            StatusCode::AlreadyExists | StatusCode::FailedPrecondition | StatusCode::Aborted => {
                ExitCode::Conflict
            }
            StatusCode::Unavailable
            | StatusCode::DeadlineExceeded
            | StatusCode::ResourceExhausted
            | StatusCode::Cancelled => ExitCode::NetworkError,
            StatusCode::Unknown
            | StatusCode::Unimplemented
            | StatusCode::Internal
            | StatusCode::DataLoss => ExitCode::GeneralError,
        }
    }
}

impl From<&Error> for ExitCode {
    fn from(error: &Error) -> Self {
        match error {
            Error::Config(_) | Error::Serialization(_) => ExitCode::GeneralError,
            Error::RetryExhausted { .. } => ExitCode::NetworkError,
            _ => ExitCode::from_status(error.code()),
        }
    }
}

impl From<ExitCode> for std::process::ExitCode {
    fn from(code: ExitCode) -> Self {
        std::process::ExitCode::from(code.as_i32() as u8)
    }
}
