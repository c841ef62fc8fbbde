//! rsu-core: Core library for the rsu storage client
//!
//! This crate provides the core functionality for rsu, including:
//! - Status codes and the error model
//! - Transient/permanent failure classification
//! - Retry executor with exponential backoff
//! - Object ACL and object operations with retries
//! - Resumable, suspendable streaming uploads
//! - Configuration management
//!
//! This crate is independent of any HTTP stack. The network side plugs in
//! through the [`StorageTransport`] trait, which keeps everything here
//! testable against in-memory fakes.

pub mod backoff;
pub mod classify;
pub mod client;
pub mod config;
pub mod error;
pub mod request;
pub mod retry;
pub mod traits;
pub mod types;
pub mod upload;

pub use backoff::ExponentialBackoff;
pub use classify::{Classifier, FailureKind};
pub use client::Client;
pub use config::{Config, ConfigManager, UploadConfig};
pub use error::{Error, Result, Status, StatusCode};
pub use request::{
    CreateObjectAclRequest, InsertObjectRequest, ObjectAclRequest, ObjectRequest,
    PatchObjectAclRequest, ReadObjectRequest, ResumableUploadRequest, UploadChunkRequest,
    UploadStatus,
};
pub use retry::{RetryBuilder, RetryConfig, retry_with_backoff};
pub use traits::{ReadChunk, StorageTransport};
pub use types::{AclPatch, ObjectAccessControl, ObjectMetadata, Preconditions};
pub use upload::{
    ObjectWriteStream, ResumableSession, SessionState, SuspendedUpload, UploadOptions,
};
