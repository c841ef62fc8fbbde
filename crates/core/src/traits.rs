//! Transport trait implemented by the HTTP layer
//!
//! Every method performs exactly one network round trip and reports failure
//! as a [`Status`]. Retrying is the caller's business, never the transport's.

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::Status;
use crate::request::{
    CreateObjectAclRequest, InsertObjectRequest, ObjectAclRequest, ObjectRequest,
    PatchObjectAclRequest, ReadObjectRequest, ResumableUploadRequest, UploadChunkRequest,
    UploadStatus,
};
use crate::types::{ObjectAccessControl, ObjectMetadata};

/// Single-attempt operations against the storage service
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait StorageTransport: Send + Sync {
    async fn list_object_acl(
        &self,
        request: &ObjectRequest,
    ) -> Result<Vec<ObjectAccessControl>, Status>;

    async fn get_object_acl(
        &self,
        request: &ObjectAclRequest,
    ) -> Result<ObjectAccessControl, Status>;

    async fn create_object_acl(
        &self,
        request: &CreateObjectAclRequest,
    ) -> Result<ObjectAccessControl, Status>;

    async fn update_object_acl(
        &self,
        request: &CreateObjectAclRequest,
    ) -> Result<ObjectAccessControl, Status>;

    async fn patch_object_acl(
        &self,
        request: &PatchObjectAclRequest,
    ) -> Result<ObjectAccessControl, Status>;

    async fn delete_object_acl(&self, request: &ObjectAclRequest) -> Result<(), Status>;

    /// Start a resumable session and return its opaque identifier
    async fn create_resumable_session(
        &self,
        request: &ResumableUploadRequest,
    ) -> Result<String, Status>;

    /// Ask the service how many bytes of a session it has committed
    async fn query_resumable_session(&self, session_id: &str) -> Result<UploadStatus, Status>;

    /// Send one chunk; the final chunk carries the total object size
    async fn upload_chunk(&self, request: &UploadChunkRequest) -> Result<UploadStatus, Status>;

    async fn insert_object(&self, request: &InsertObjectRequest)
    -> Result<ObjectMetadata, Status>;

    async fn get_object_metadata(&self, request: &ObjectRequest)
    -> Result<ObjectMetadata, Status>;

    async fn delete_object(&self, request: &ObjectRequest) -> Result<(), Status>;

    /// Read the object from `request.offset` to the end
    ///
    /// A transport may return fewer bytes than remain when the connection
    /// drops mid-body. The caller asks again for the rest.
    async fn read_object(&self, request: &ReadObjectRequest) -> Result<ReadChunk, Status>;
}

/// Bytes returned by one read attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadChunk {
    pub data: Bytes,
    /// Full object size, when the service reported it
    pub object_size: Option<u64>,
    /// Generation the bytes came from, used to pin follow-up reads
    pub generation: Option<i64>,
}
