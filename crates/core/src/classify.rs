//! Transient/permanent classification of failed attempts

use std::collections::BTreeSet;

use crate::error::{Status, StatusCode};

/// Whether retrying a failed attempt can help
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Transient,
    Permanent,
}

/// Default transient codes. Everything else, including codes the service
/// invents later, is permanent.
pub const DEFAULT_TRANSIENT_CODES: [StatusCode; 4] = [
    StatusCode::Unavailable,
    StatusCode::DeadlineExceeded,
    StatusCode::Internal,
    StatusCode::ResourceExhausted,
];

/// Maps a status code to a [`FailureKind`]
///
/// The table is immutable once built and can be shared by any number of
/// concurrent operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classifier {
    transient: BTreeSet<StatusCode>,
}

impl Classifier {
    /// Build a classifier that treats exactly `codes` as transient
    ///
    /// `StatusCode::Ok` is dropped from the table since it never describes a
    /// failure.
    pub fn with_transient_codes(codes: impl IntoIterator<Item = StatusCode>) -> Self {
        let transient = codes
            .into_iter()
            .filter(|code| *code != StatusCode::Ok)
            .collect();
        Self { transient }
    }

    pub fn classify(&self, code: StatusCode) -> FailureKind {
        if self.transient.contains(&code) {
            FailureKind::Transient
        } else {
            FailureKind::Permanent
        }
    }

    pub fn is_transient(&self, status: &Status) -> bool {
        self.classify(status.code()) == FailureKind::Transient
    }

    pub fn transient_codes(&self) -> impl Iterator<Item = StatusCode> + '_ {
        self.transient.iter().copied()
    }
}

impl Default for Classifier {
    fn default() -> Self {
        Self::with_transient_codes(DEFAULT_TRANSIENT_CODES)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_partition() {
        let classifier = Classifier::default();
        let transient = [
            StatusCode::Unavailable,
            StatusCode::DeadlineExceeded,
            StatusCode::Internal,
            StatusCode::ResourceExhausted,
        ];
        let permanent = [
            StatusCode::InvalidArgument,
            StatusCode::NotFound,
            StatusCode::FailedPrecondition,
            StatusCode::PermissionDenied,
            StatusCode::Unauthenticated,
            StatusCode::AlreadyExists,
            StatusCode::OutOfRange,
            StatusCode::Unknown,
            StatusCode::Cancelled,
            StatusCode::Aborted,
            StatusCode::Unimplemented,
            StatusCode::DataLoss,
        ];

        for code in transient {
            assert_eq!(classifier.classify(code), FailureKind::Transient, "{code}");
        }
        for code in permanent {
            assert_eq!(classifier.classify(code), FailureKind::Permanent, "{code}");
        }

        // The two lists above cover every failure code.
        assert_eq!(transient.len() + permanent.len() + 1, StatusCode::ALL.len());
    }

    #[test]
    fn test_custom_table() {
        let classifier =
            Classifier::with_transient_codes([StatusCode::Aborted, StatusCode::Ok]);
        assert!(classifier.is_transient(&Status::new(StatusCode::Aborted, "conflict")));
        assert!(!classifier.is_transient(&Status::unavailable("down")));
        assert_eq!(classifier.classify(StatusCode::Ok), FailureKind::Permanent);
        assert_eq!(
            classifier.transient_codes().collect::<Vec<_>>(),
            vec![StatusCode::Aborted]
        );
    }
}
