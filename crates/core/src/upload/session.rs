//! Resumable upload session state machine
//!
//! The session owns the identifier issued by the service and the committed
//! offset. Each chunk goes through the retry executor. After a failed attempt
//! the next attempt first asks the service how much it kept, and sends only
//! the rest. The service's committed offset is the only one trusted.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::classify::Classifier;
use crate::error::{Error, Result, Status};
use crate::request::{ResumableUploadRequest, UploadChunkRequest, UploadStatus};
use crate::retry::{RetryConfig, retry_with_backoff};
use crate::traits::StorageTransport;
use crate::types::ObjectMetadata;

/// Rounds without progress tolerated before the upload is declared stuck
const MAX_STALLED_ROUNDS: u32 = 3;

/// Lifecycle of a resumable upload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    /// Built, nothing sent yet
    Created,
    /// Session identifier known, accepting chunks
    Active,
    /// Detached; only the identifier and committed offset survive
    Suspended,
    /// Final chunk in flight
    Finalizing,
    /// Object finalized, metadata available
    Closed,
    /// Terminal error
    Failed,
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SessionState::Created => "created",
            SessionState::Active => "active",
            SessionState::Suspended => "suspended",
            SessionState::Finalizing => "finalizing",
            SessionState::Closed => "closed",
            SessionState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// What survives a suspended upload
///
/// This value is all another process needs to resume, together with the
/// bytes from `committed_size` onwards. The offset is informational: a resumed
/// session always asks the service again.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuspendedUpload {
    pub session_id: String,
    pub committed_size: u64,
}

/// Server-side resumable upload driven through the retry executor
pub struct ResumableSession {
    transport: Arc<dyn StorageTransport>,
    retry: RetryConfig,
    classifier: Classifier,
    request: ResumableUploadRequest,
    session_id: Option<String>,
    committed: u64,
    state: SessionState,
    metadata: Option<ObjectMetadata>,
}

impl std::fmt::Debug for ResumableSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResumableSession")
            .field("bucket", &self.request.bucket())
            .field("object", &self.request.object())
            .field("session_id", &self.session_id)
            .field("committed", &self.committed)
            .field("state", &self.state)
            .finish()
    }
}

impl ResumableSession {
    /// A session for a new upload, or for resuming `restore` when given
    pub fn new(
        transport: Arc<dyn StorageTransport>,
        retry: RetryConfig,
        classifier: Classifier,
        request: ResumableUploadRequest,
        restore: Option<String>,
    ) -> Self {
        Self {
            transport,
            retry,
            classifier,
            request,
            session_id: restore,
            committed: 0,
            state: SessionState::Created,
            metadata: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    /// Bytes the service has acknowledged
    pub fn committed_size(&self) -> u64 {
        self.committed
    }

    /// Final metadata, once the service has finalized the object
    pub fn metadata(&self) -> Option<&ObjectMetadata> {
        self.metadata.as_ref()
    }

    /// Move from `Created` to `Active`
    ///
    /// Without an identifier a new session is created. With one, the service
    /// is asked for the committed offset, which may be ahead of whatever the
    /// suspending side last saw.
    pub async fn start(&mut self) -> Result<()> {
        if self.state != SessionState::Created {
            return Err(Status::failed_precondition(format!(
                "cannot start a session in state {}",
                self.state
            ))
            .into());
        }

        let result = match self.session_id.clone() {
            None => self.create().await,
            Some(session_id) => self.resume(&session_id).await,
        };
        if let Err(e) = result {
            self.state = SessionState::Failed;
            return Err(e);
        }
        Ok(())
    }

    async fn create(&mut self) -> Result<()> {
        self.request.validate()?;

        let transport = self.transport.clone();
        let request = &self.request;
        let session_id = retry_with_backoff(
            "CreateResumableSession",
            &self.retry,
            &self.classifier,
            || transport.create_resumable_session(request),
        )
        .await?;

        tracing::info!(
            bucket = %self.request.bucket(),
            object = %self.request.object(),
            "Created resumable upload session"
        );
        self.session_id = Some(session_id);
        self.state = SessionState::Active;
        Ok(())
    }

    async fn resume(&mut self, session_id: &str) -> Result<()> {
        let transport = self.transport.clone();
        let status = retry_with_backoff(
            "QueryResumableSession",
            &self.retry,
            &self.classifier,
            || transport.query_resumable_session(session_id),
        )
        .await?;

        self.committed = status.committed_size;
        match status.metadata {
            Some(metadata) => {
                tracing::info!(
                    object = %metadata.name,
                    size = metadata.size,
                    "Restored session was already finalized"
                );
                self.metadata = Some(metadata);
                self.state = SessionState::Closed;
            }
            None => {
                tracing::info!(
                    committed = self.committed,
                    "Restored resumable upload session"
                );
                self.state = SessionState::Active;
            }
        }
        Ok(())
    }

    /// Upload a non-final chunk starting at the committed offset
    ///
    /// Returns once every byte of `data` is acknowledged.
    pub async fn upload_chunk(&mut self, data: Bytes) -> Result<()> {
        self.require_active()?;
        match self.send(data, None).await {
            Ok(_) => Ok(()),
            Err(e) => {
                self.state = SessionState::Failed;
                Err(e)
            }
        }
    }

    /// Upload the last chunk and finalize the object
    ///
    /// The total size sent to the service is the committed offset plus
    /// `data.len()`, so a zero-length upload finalizes with an empty chunk.
    pub async fn finalize(&mut self, data: Bytes) -> Result<ObjectMetadata> {
        if self.state == SessionState::Closed {
            return match (&self.metadata, data.is_empty()) {
                (Some(metadata), true) => Ok(metadata.clone()),
                _ => Err(Status::failed_precondition("upload is already finalized").into()),
            };
        }
        self.require_active()?;

        self.state = SessionState::Finalizing;
        let total = self.committed + data.len() as u64;
        let result = match self.send(data, Some(total)).await {
            Ok(status) => status.metadata.ok_or_else(|| {
                Error::from(Status::internal(format!(
                    "service committed {} of {total} bytes but did not finalize the object",
                    status.committed_size
                )))
            }),
            Err(e) => Err(e),
        };

        match &result {
            Ok(metadata) => {
                tracing::info!(
                    object = %metadata.name,
                    generation = metadata.generation,
                    size = total,
                    "Finalized resumable upload"
                );
                self.metadata = Some(metadata.clone());
                self.state = SessionState::Closed;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Resumable upload failed");
                self.state = SessionState::Failed;
            }
        }
        result
    }

    /// Detach from the session, keeping only its identifier and offset
    ///
    /// No remote call is made. Bytes not yet committed are the caller's to
    /// send again after resuming.
    pub fn suspend(&mut self) -> Result<SuspendedUpload> {
        self.require_active()?;
        let session_id = self
            .session_id
            .clone()
            .ok_or_else(|| Error::from(Status::internal("active session without identifier")))?;

        self.state = SessionState::Suspended;
        tracing::debug!(
            session_id = %session_id,
            committed = self.committed,
            "Suspended resumable upload"
        );
        Ok(SuspendedUpload {
            session_id,
            committed_size: self.committed,
        })
    }

    fn require_active(&self) -> Result<()> {
        if self.state == SessionState::Active {
            return Ok(());
        }
        Err(Status::failed_precondition(format!(
            "upload session is {}, expected active",
            self.state
        ))
        .into())
    }

    /// Send `data`, which starts at the committed offset, until the service
    /// acknowledges all of it (or finalizes, when `total` is set)
    #[tracing::instrument(
        name = "upload.session.send",
        skip(self, data),
        fields(offset = self.committed, bytes = data.len(), last = total.is_some()),
        err
    )]
    async fn send(&mut self, data: Bytes, total: Option<u64>) -> Result<UploadStatus> {
        let session_id = self
            .session_id
            .clone()
            .ok_or_else(|| Error::from(Status::internal("session has no identifier")))?;
        let base = self.committed;
        let end = base + data.len() as u64;
        let mut stalled = 0;

        loop {
            let offset = self.committed;
            let status = self
                .send_remaining(&session_id, &data, base, end, offset, total)
                .await?;

            if let Some(metadata) = &status.metadata {
                self.committed = self.committed.max(status.committed_size);
                self.metadata = Some(metadata.clone());
                return Ok(status);
            }
            if status.committed_size > end {
                return Err(Status::internal(format!(
                    "service reported {} committed bytes but only {end} were sent",
                    status.committed_size
                ))
                .into());
            }
            if status.committed_size < offset {
                return Err(Status::internal(format!(
                    "service reported {} committed bytes, below the {offset} acknowledged before",
                    status.committed_size
                ))
                .into());
            }

            self.committed = status.committed_size;
            if total.is_none() && self.committed == end {
                return Ok(status);
            }

            if self.committed == offset {
                stalled += 1;
                if stalled >= MAX_STALLED_ROUNDS {
                    return Err(Status::internal(format!(
                        "upload made no progress past offset {offset} after {stalled} rounds"
                    ))
                    .into());
                }
            } else {
                stalled = 0;
            }
            tracing::debug!(
                committed = self.committed,
                end,
                "Service kept part of the chunk, sending the rest"
            );
        }
    }

    /// One retried round: send `data[offset - base..]`, re-querying the
    /// committed offset before every attempt after a failure
    async fn send_remaining(
        &self,
        session_id: &str,
        data: &Bytes,
        base: u64,
        end: u64,
        offset: u64,
        total: Option<u64>,
    ) -> Result<UploadStatus> {
        let transport = self.transport.clone();
        let from = AtomicU64::new(offset);
        let after_failure = AtomicBool::new(false);

        let status = retry_with_backoff("UploadChunk", &self.retry, &self.classifier, || {
            let transport = &transport;
            let from = &from;
            let after_failure = &after_failure;
            async move {
                if after_failure.swap(true, Ordering::SeqCst) {
                    // The failed attempt may still have committed some bytes.
                    match transport.query_resumable_session(session_id).await {
                        Ok(current) => {
                            let committed = current.committed_size;
                            let chunk_kept = total.is_none() && committed == end;
                            let acknowledged = from.load(Ordering::SeqCst);
                            if current.is_done()
                                || chunk_kept
                                || committed < acknowledged
                                || committed > end
                            {
                                return Ok(current);
                            }
                            from.store(committed, Ordering::SeqCst);
                        }
                        Err(status) => return Err(status),
                    }
                }

                let start = from.load(Ordering::SeqCst);
                let request = UploadChunkRequest {
                    session_id: session_id.to_string(),
                    offset: start,
                    payload: data.slice((start - base) as usize..),
                    total_size: total,
                };
                tracing::debug!(offset = start, bytes = request.payload.len(), "Uploading chunk");
                transport.upload_chunk(&request).await
            }
        })
        .await?;

        let acknowledged = from.load(Ordering::SeqCst);
        if !status.is_done() && status.committed_size < acknowledged {
            return Err(Status::internal(format!(
                "service reported {} committed bytes, below the {acknowledged} acknowledged before",
                status.committed_size
            ))
            .into());
        }
        Ok(status)
    }
}
