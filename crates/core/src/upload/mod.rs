//! Resumable uploads
//!
//! [`ResumableSession`] tracks the server-side session, [`ObjectWriteStream`]
//! buffers caller bytes into chunks for it.

mod session;
mod stream;

pub use session::{ResumableSession, SessionState, SuspendedUpload};
pub use stream::ObjectWriteStream;

/// Non-final chunks must be a multiple of this many bytes
pub const UPLOAD_QUANTUM: usize = 256 * 1024;

/// Default chunk size for streaming uploads
pub const DEFAULT_CHUNK_SIZE: usize = 8 * 1024 * 1024;

/// Round `size` up to the next multiple of [`UPLOAD_QUANTUM`] (at least one)
pub fn aligned_chunk_size(size: usize) -> usize {
    size.max(1).div_ceil(UPLOAD_QUANTUM) * UPLOAD_QUANTUM
}

/// How to open a streaming upload
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadOptions {
    restore: Option<String>,
    chunk_size: Option<usize>,
}

impl UploadOptions {
    /// Start a new resumable session
    pub fn new() -> Self {
        Self::default()
    }

    /// Continue the session identified by `session_id`
    pub fn restore(session_id: impl Into<String>) -> Self {
        Self {
            restore: Some(session_id.into()),
            chunk_size: None,
        }
    }

    /// Chunk size for this upload, rounded up to [`UPLOAD_QUANTUM`]
    pub fn with_chunk_size(mut self, size: usize) -> Self {
        self.chunk_size = Some(aligned_chunk_size(size));
        self
    }

    pub fn restore_session(&self) -> Option<&str> {
        self.restore.as_deref()
    }

    pub fn chunk_size(&self) -> Option<usize> {
        self.chunk_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aligned_chunk_size() {
        assert_eq!(aligned_chunk_size(0), UPLOAD_QUANTUM);
        assert_eq!(aligned_chunk_size(1), UPLOAD_QUANTUM);
        assert_eq!(aligned_chunk_size(UPLOAD_QUANTUM), UPLOAD_QUANTUM);
        assert_eq!(aligned_chunk_size(UPLOAD_QUANTUM + 1), 2 * UPLOAD_QUANTUM);
        assert_eq!(aligned_chunk_size(2 * 1024 * 1024), 2 * 1024 * 1024);
    }

    #[test]
    fn test_upload_options() {
        let options = UploadOptions::restore("session-1").with_chunk_size(1000);
        assert_eq!(options.restore_session(), Some("session-1"));
        assert_eq!(options.chunk_size(), Some(UPLOAD_QUANTUM));
        assert_eq!(UploadOptions::new().restore_session(), None);
    }
}
