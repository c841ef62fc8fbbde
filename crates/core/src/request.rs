//! Request and response types for single remote attempts

use bytes::Bytes;

use crate::error::Status;
use crate::types::{AclPatch, ObjectMetadata, Preconditions};

fn require(field: &str, value: &str) -> Result<(), Status> {
    if value.trim().is_empty() {
        return Err(Status::invalid_argument(format!("{field} cannot be empty")));
    }
    Ok(())
}

/// Identifies one object, optionally a specific generation of it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectRequest {
    pub bucket: String,
    pub object: String,
    pub generation: Option<i64>,
    pub preconditions: Preconditions,
}

impl ObjectRequest {
    pub fn new(bucket: impl Into<String>, object: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            object: object.into(),
            generation: None,
            preconditions: Preconditions::default(),
        }
    }

    pub fn with_generation(mut self, generation: i64) -> Self {
        self.generation = Some(generation);
        self
    }

    pub fn with_preconditions(mut self, preconditions: Preconditions) -> Self {
        self.preconditions = preconditions;
        self
    }

    pub fn validate(&self) -> Result<(), Status> {
        require("bucket name", &self.bucket)?;
        require("object name", &self.object)
    }
}

/// Targets one ACL entity on an object (get, delete)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectAclRequest {
    pub bucket: String,
    pub object: String,
    pub entity: String,
    pub generation: Option<i64>,
    pub preconditions: Preconditions,
}

impl ObjectAclRequest {
    pub fn new(
        bucket: impl Into<String>,
        object: impl Into<String>,
        entity: impl Into<String>,
    ) -> Self {
        Self {
            bucket: bucket.into(),
            object: object.into(),
            entity: entity.into(),
            generation: None,
            preconditions: Preconditions::default(),
        }
    }

    pub fn with_preconditions(mut self, preconditions: Preconditions) -> Self {
        self.preconditions = preconditions;
        self
    }

    pub fn validate(&self) -> Result<(), Status> {
        require("bucket name", &self.bucket)?;
        require("object name", &self.object)?;
        require("entity", &self.entity)
    }
}

/// Sets `entity` to `role` on an object (create, update)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateObjectAclRequest {
    pub bucket: String,
    pub object: String,
    pub entity: String,
    pub role: String,
    pub generation: Option<i64>,
    pub preconditions: Preconditions,
}

impl CreateObjectAclRequest {
    pub fn new(
        bucket: impl Into<String>,
        object: impl Into<String>,
        entity: impl Into<String>,
        role: impl Into<String>,
    ) -> Self {
        Self {
            bucket: bucket.into(),
            object: object.into(),
            entity: entity.into(),
            role: role.into(),
            generation: None,
            preconditions: Preconditions::default(),
        }
    }

    pub fn with_preconditions(mut self, preconditions: Preconditions) -> Self {
        self.preconditions = preconditions;
        self
    }

    pub fn validate(&self) -> Result<(), Status> {
        require("bucket name", &self.bucket)?;
        require("object name", &self.object)?;
        require("entity", &self.entity)?;
        require("role", &self.role)
    }
}

/// Changes selected fields of an ACL entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchObjectAclRequest {
    pub bucket: String,
    pub object: String,
    pub entity: String,
    pub patch: AclPatch,
    pub generation: Option<i64>,
    pub preconditions: Preconditions,
}

impl PatchObjectAclRequest {
    pub fn new(
        bucket: impl Into<String>,
        object: impl Into<String>,
        entity: impl Into<String>,
        patch: AclPatch,
    ) -> Self {
        Self {
            bucket: bucket.into(),
            object: object.into(),
            entity: entity.into(),
            patch,
            generation: None,
            preconditions: Preconditions::default(),
        }
    }

    pub fn with_preconditions(mut self, preconditions: Preconditions) -> Self {
        self.preconditions = preconditions;
        self
    }

    pub fn validate(&self) -> Result<(), Status> {
        require("bucket name", &self.bucket)?;
        require("object name", &self.object)?;
        require("entity", &self.entity)
    }
}

/// Reads object contents starting at `offset`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadObjectRequest {
    pub bucket: String,
    pub object: String,
    pub generation: Option<i64>,
    pub offset: u64,
}

impl ReadObjectRequest {
    pub fn new(bucket: impl Into<String>, object: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            object: object.into(),
            generation: None,
            offset: 0,
        }
    }

    pub fn validate(&self) -> Result<(), Status> {
        require("bucket name", &self.bucket)?;
        require("object name", &self.object)
    }
}

/// Single-shot upload of a small object
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InsertObjectRequest {
    /// Bucket, name, content type and custom attributes of the new object
    pub metadata: ObjectMetadata,
    pub contents: Bytes,
    pub preconditions: Preconditions,
}

impl InsertObjectRequest {
    pub fn new(
        bucket: impl Into<String>,
        object: impl Into<String>,
        contents: impl Into<Bytes>,
    ) -> Self {
        Self {
            metadata: ObjectMetadata::new(bucket, object),
            contents: contents.into(),
            preconditions: Preconditions::default(),
        }
    }

    pub fn with_metadata(mut self, metadata: ObjectMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn with_preconditions(mut self, preconditions: Preconditions) -> Self {
        self.preconditions = preconditions;
        self
    }

    pub fn validate(&self) -> Result<(), Status> {
        require("bucket name", &self.metadata.bucket)?;
        require("object name", &self.metadata.name)
    }
}

/// Opens a resumable upload session for a new object
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResumableUploadRequest {
    /// Bucket, name, content type and custom attributes of the new object
    pub metadata: ObjectMetadata,
    pub preconditions: Preconditions,
}

impl ResumableUploadRequest {
    pub fn new(bucket: impl Into<String>, object: impl Into<String>) -> Self {
        Self {
            metadata: ObjectMetadata::new(bucket, object),
            preconditions: Preconditions::default(),
        }
    }

    pub fn bucket(&self) -> &str {
        &self.metadata.bucket
    }

    pub fn object(&self) -> &str {
        &self.metadata.name
    }

    pub fn with_metadata(mut self, metadata: ObjectMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.metadata.content_type = Some(content_type.into());
        self
    }

    pub fn with_preconditions(mut self, preconditions: Preconditions) -> Self {
        self.preconditions = preconditions;
        self
    }

    pub fn validate(&self) -> Result<(), Status> {
        require("bucket name", &self.metadata.bucket)?;
        require("object name", &self.metadata.name)
    }
}

/// One PUT of bytes into a resumable session
///
/// `payload` holds the bytes for `[offset, offset + payload.len())`. Setting
/// `total_size` marks this as the final chunk and finalizes the object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadChunkRequest {
    pub session_id: String,
    pub offset: u64,
    pub payload: Bytes,
    pub total_size: Option<u64>,
}

impl UploadChunkRequest {
    pub fn is_final(&self) -> bool {
        self.total_size.is_some()
    }

    /// Offset one past the last byte in this chunk
    pub fn end(&self) -> u64 {
        self.offset + self.payload.len() as u64
    }
}

/// Server view of a resumable session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadStatus {
    /// Bytes the service has durably received
    pub committed_size: u64,
    /// Present once the upload is finalized
    pub metadata: Option<ObjectMetadata>,
}

impl UploadStatus {
    pub fn in_progress(committed_size: u64) -> Self {
        Self {
            committed_size,
            metadata: None,
        }
    }

    pub fn done(metadata: ObjectMetadata) -> Self {
        Self {
            committed_size: metadata.size.max(0) as u64,
            metadata: Some(metadata),
        }
    }

    pub fn is_done(&self) -> bool {
        self.metadata.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StatusCode;

    #[test]
    fn test_validation() {
        assert!(CreateObjectAclRequest::new("b", "o", "user-x", "READER").validate().is_ok());

        let err = CreateObjectAclRequest::new("b", "o", "user-x", "")
            .validate()
            .unwrap_err();
        assert_eq!(err.code(), StatusCode::InvalidArgument);
        assert_eq!(err.message(), "role cannot be empty");

        assert!(ObjectAclRequest::new("", "o", "user-x").validate().is_err());
        assert!(ResumableUploadRequest::new("b", " ").validate().is_err());
    }

    #[test]
    fn test_upload_chunk_bounds() {
        let chunk = UploadChunkRequest {
            session_id: "s".to_string(),
            offset: 512,
            payload: Bytes::from_static(b"abcd"),
            total_size: None,
        };
        assert_eq!(chunk.end(), 516);
        assert!(!chunk.is_final());
    }

    #[test]
    fn test_upload_status_done() {
        let mut meta = ObjectMetadata::new("b", "o");
        meta.size = 42;
        let status = UploadStatus::done(meta);
        assert!(status.is_done());
        assert_eq!(status.committed_size, 42);
    }
}
