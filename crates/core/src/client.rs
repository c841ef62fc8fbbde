//! Storage client
//!
//! Every logical operation is a single-attempt closure over its request run
//! through [`retry_with_backoff`]. Mutating operations accept preconditions
//! so callers can make retries safe; the client never adds any itself.

use std::future::Future;
use std::sync::Arc;

use bytes::{Bytes, BytesMut};

use crate::classify::Classifier;
use crate::config::{Config, UploadConfig};
use crate::error::{Result, Status};
use crate::request::{
    CreateObjectAclRequest, InsertObjectRequest, ObjectAclRequest, ObjectRequest,
    PatchObjectAclRequest, ReadObjectRequest, ResumableUploadRequest,
};
use crate::retry::{RetryConfig, retry_with_backoff};
use crate::traits::StorageTransport;
use crate::types::{ObjectAccessControl, ObjectMetadata};
use crate::upload::{ObjectWriteStream, ResumableSession, UploadOptions};

/// Reads that return no new bytes before the object is complete
const MAX_EMPTY_READS: u32 = 3;

/// Retried operations over a [`StorageTransport`]
#[derive(Clone)]
pub struct Client {
    transport: Arc<dyn StorageTransport>,
    retry: RetryConfig,
    classifier: Classifier,
    upload: UploadConfig,
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("retry", &self.retry)
            .field("classifier", &self.classifier)
            .field("upload", &self.upload)
            .finish_non_exhaustive()
    }
}

impl Client {
    /// Client with the default retry policy and classifier
    pub fn new(transport: Arc<dyn StorageTransport>) -> Self {
        Self {
            transport,
            retry: RetryConfig::default(),
            classifier: Classifier::default(),
            upload: UploadConfig::default(),
        }
    }

    /// Client configured from a loaded [`Config`]
    pub fn from_config(transport: Arc<dyn StorageTransport>, config: &Config) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            transport,
            retry: config.retry.clone(),
            classifier: config.classifier(),
            upload: config.upload.clone(),
        })
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_classifier(mut self, classifier: Classifier) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn with_upload_config(mut self, upload: UploadConfig) -> Self {
        self.upload = upload;
        self
    }

    pub fn retry_config(&self) -> &RetryConfig {
        &self.retry
    }

    pub fn classifier(&self) -> &Classifier {
        &self.classifier
    }

    async fn call<T, F, Fut>(&self, operation: &str, attempt: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = std::result::Result<T, Status>>,
    {
        retry_with_backoff(operation, &self.retry, &self.classifier, attempt).await
    }

    pub async fn list_object_acl(&self, request: ObjectRequest) -> Result<Vec<ObjectAccessControl>> {
        request.validate()?;
        self.call("ListObjectAcl", || self.transport.list_object_acl(&request))
            .await
    }

    pub async fn create_object_acl(
        &self,
        request: CreateObjectAclRequest,
    ) -> Result<ObjectAccessControl> {
        request.validate()?;
        self.call("CreateObjectAcl", || {
            self.transport.create_object_acl(&request)
        })
        .await
    }

    pub async fn get_object_acl(&self, request: ObjectAclRequest) -> Result<ObjectAccessControl> {
        request.validate()?;
        self.call("GetObjectAcl", || self.transport.get_object_acl(&request))
            .await
    }

    pub async fn update_object_acl(
        &self,
        request: CreateObjectAclRequest,
    ) -> Result<ObjectAccessControl> {
        request.validate()?;
        self.call("UpdateObjectAcl", || {
            self.transport.update_object_acl(&request)
        })
        .await
    }

    pub async fn patch_object_acl(
        &self,
        request: PatchObjectAclRequest,
    ) -> Result<ObjectAccessControl> {
        request.validate()?;
        self.call("PatchObjectAcl", || self.transport.patch_object_acl(&request))
            .await
    }

    pub async fn delete_object_acl(&self, request: ObjectAclRequest) -> Result<()> {
        request.validate()?;
        self.call("DeleteObjectAcl", || {
            self.transport.delete_object_acl(&request)
        })
        .await
    }

    /// Upload a small object in one request
    pub async fn insert_object(&self, request: InsertObjectRequest) -> Result<ObjectMetadata> {
        request.validate()?;
        self.call("InsertObject", || self.transport.insert_object(&request))
            .await
    }

    pub async fn get_object_metadata(&self, request: ObjectRequest) -> Result<ObjectMetadata> {
        request.validate()?;
        self.call("GetObjectMetadata", || {
            self.transport.get_object_metadata(&request)
        })
        .await
    }

    pub async fn delete_object(&self, request: ObjectRequest) -> Result<()> {
        request.validate()?;
        self.call("DeleteObject", || self.transport.delete_object(&request))
            .await
    }

    /// Download a whole object
    ///
    /// When a read stops early, the next read asks only for the missing
    /// bytes, pinned to the generation of the first read.
    pub async fn read_object(&self, request: ReadObjectRequest) -> Result<Bytes> {
        request.validate()?;

        let mut contents = BytesMut::new();
        let mut pinned = request.clone();
        let mut empty_reads = 0;

        loop {
            pinned.offset = request.offset + contents.len() as u64;
            let chunk = self
                .call("ReadObject", || self.transport.read_object(&pinned))
                .await?;

            if pinned.generation.is_none() {
                pinned.generation = chunk.generation;
            }
            let received = chunk.data.len();
            contents.extend_from_slice(&chunk.data);

            let expected = match chunk.object_size {
                Some(size) => size.saturating_sub(request.offset),
                None => return Ok(contents.freeze()),
            };
            let have = contents.len() as u64;
            if have == expected {
                return Ok(contents.freeze());
            }
            if have > expected {
                return Err(Status::internal(format!(
                    "read {have} bytes but the object only has {expected} after offset {}",
                    request.offset
                ))
                .into());
            }

            if received == 0 {
                empty_reads += 1;
                if empty_reads >= MAX_EMPTY_READS {
                    return Err(Status::unavailable(format!(
                        "download stalled at {have} of {expected} bytes"
                    ))
                    .into());
                }
            } else {
                empty_reads = 0;
            }
            tracing::debug!(received = have, expected, "Resuming interrupted download");
        }
    }

    /// Open a streaming resumable upload
    ///
    /// The session is created (or, when restoring, queried) before this
    /// returns, so [`ObjectWriteStream::session_id`] and
    /// [`ObjectWriteStream::next_expected_byte`] are valid right away.
    pub async fn write_object(
        &self,
        request: ResumableUploadRequest,
        options: UploadOptions,
    ) -> Result<ObjectWriteStream> {
        if options.restore_session().is_none() {
            request.validate()?;
        }

        let chunk_size = options
            .chunk_size()
            .unwrap_or_else(|| self.upload.aligned_chunk_size());
        let mut session = ResumableSession::new(
            self.transport.clone(),
            self.retry.clone(),
            self.classifier.clone(),
            request,
            options.restore_session().map(str::to_string),
        );
        session.start().await?;

        Ok(ObjectWriteStream::new(session, chunk_size))
    }

    /// Upload `contents` through a resumable session
    pub async fn upload_object(
        &self,
        request: ResumableUploadRequest,
        contents: &[u8],
        options: UploadOptions,
    ) -> Result<ObjectMetadata> {
        let mut stream = self.write_object(request, options).await?;
        stream.write(contents).await?;
        stream.close().await
    }
}
