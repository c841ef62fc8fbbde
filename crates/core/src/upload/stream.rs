//! Buffered writer over a resumable session
//!
//! Collects caller bytes into chunks of a fixed, quantum-aligned size and
//! hands each full chunk to the session. Closing sends whatever is left as
//! the final chunk.

use bytes::BytesMut;

use super::session::{ResumableSession, SessionState, SuspendedUpload};
use crate::error::{Result, Status};
use crate::types::ObjectMetadata;

/// Streaming upload of one object
#[derive(Debug)]
pub struct ObjectWriteStream {
    session: ResumableSession,
    buffer: BytesMut,
    chunk_size: usize,
    outcome: Option<Result<ObjectMetadata>>,
}

impl ObjectWriteStream {
    /// Wrap an already started session
    pub(crate) fn new(session: ResumableSession, chunk_size: usize) -> Self {
        let outcome = session.metadata().cloned().map(Ok);
        Self {
            session,
            buffer: BytesMut::with_capacity(chunk_size),
            chunk_size,
            outcome,
        }
    }

    /// Identifier to pass to [`UploadOptions::restore`](super::UploadOptions::restore)
    pub fn session_id(&self) -> &str {
        self.session.session_id().unwrap_or_default()
    }

    /// Offset of the next byte the service expects
    ///
    /// After resuming, the caller continues writing from this offset.
    pub fn next_expected_byte(&self) -> u64 {
        self.session.committed_size() + self.buffer.len() as u64
    }

    pub fn state(&self) -> SessionState {
        self.session.state()
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Bytes buffered locally and not yet sent
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Append bytes, uploading every full chunk
    pub async fn write(&mut self, data: &[u8]) -> Result<()> {
        self.ensure_writable()?;
        self.buffer.extend_from_slice(data);

        while self.buffer.len() >= self.chunk_size {
            let chunk = self.buffer.split_to(self.chunk_size).freeze();
            if let Err(e) = self.session.upload_chunk(chunk).await {
                self.buffer.clear();
                self.outcome = Some(Err(e.clone()));
                return Err(e);
            }
        }
        Ok(())
    }

    /// Finalize the upload and return the object metadata
    ///
    /// Calling it again returns the same outcome without contacting the
    /// service.
    pub async fn close(&mut self) -> Result<ObjectMetadata> {
        if let Some(outcome) = &self.outcome {
            return outcome.clone();
        }

        let last = self.buffer.split().freeze();
        let outcome = self.session.finalize(last).await;
        self.outcome = Some(outcome.clone());
        outcome
    }

    /// Terminal metadata, finalizing the upload first if it is still open
    pub async fn metadata(&mut self) -> Result<ObjectMetadata> {
        self.close().await
    }

    /// Terminal outcome, if the upload has reached one
    pub fn outcome(&self) -> Option<&Result<ObjectMetadata>> {
        self.outcome.as_ref()
    }

    /// Stop uploading and keep only what is needed to resume later
    ///
    /// Locally buffered bytes are dropped; the resuming side sends them again
    /// starting from the committed offset it gets from the service.
    pub fn suspend(mut self) -> Result<SuspendedUpload> {
        let suspended = self.session.suspend()?;
        if !self.buffer.is_empty() {
            tracing::debug!(
                discarded = self.buffer.len(),
                "Dropping uncommitted bytes on suspend"
            );
        }
        Ok(suspended)
    }

    fn ensure_writable(&self) -> Result<()> {
        match &self.outcome {
            Some(Err(e)) => Err(Status::failed_precondition(format!(
                "upload already failed: {}",
                e.status()
            ))
            .into()),
            Some(Ok(_)) => Err(Status::failed_precondition("upload is already closed").into()),
            None => Ok(()),
        }
    }
}
