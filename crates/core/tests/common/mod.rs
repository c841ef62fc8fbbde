//! In-memory storage service for integration tests
//!
//! Implements the transport trait over plain maps, with hooks to inject
//! failures, partial commits and bogus offsets, and counters for every call.

#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;
use bytes::Bytes;

use rsu_core::{
    CreateObjectAclRequest, InsertObjectRequest, ObjectAccessControl, ObjectAclRequest,
    ObjectMetadata, ObjectRequest, PatchObjectAclRequest, Preconditions, ReadChunk,
    ReadObjectRequest, ResumableUploadRequest, RetryBuilder, RetryConfig, Status,
    StorageTransport, UploadChunkRequest, UploadStatus,
};

/// Retry policy with millisecond backoff so tests stay fast
pub fn fast_retry(max_attempts: u32) -> RetryConfig {
    RetryBuilder::new()
        .max_attempts(max_attempts)
        .initial_backoff_ms(1)
        .max_backoff_ms(4)
        .build()
}

/// Deterministic test payload
pub fn payload(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

#[derive(Debug, Clone)]
struct StoredObject {
    metadata: ObjectMetadata,
    contents: Bytes,
    acl: Vec<ObjectAccessControl>,
}

#[derive(Debug)]
struct Session {
    request: ResumableUploadRequest,
    data: Vec<u8>,
    done: Option<ObjectMetadata>,
}

/// How the next matching upload attempt misbehaves
#[derive(Debug, Clone)]
struct UploadFault {
    /// Bytes of the payload the service keeps before failing
    partial_commit: usize,
    status: Status,
}

#[derive(Debug, Default)]
struct State {
    objects: BTreeMap<(String, String), StoredObject>,
    sessions: HashMap<String, Session>,
    next_generation: i64,
    next_session: u64,
    calls: HashMap<&'static str, usize>,
    failures: HashMap<&'static str, VecDeque<Status>>,
    upload_faults: HashMap<usize, UploadFault>,
    upload_offsets: Vec<u64>,
    inflate_committed: Option<u64>,
    reported_committed: HashMap<usize, u64>,
    query_reports: HashMap<usize, u64>,
    truncate_reads: VecDeque<usize>,
}

/// Fake storage service
#[derive(Debug, Default)]
pub struct FakeServer {
    state: Mutex<State>,
}

impl FakeServer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of calls made to `operation` (transport method name)
    pub fn calls(&self, operation: &str) -> usize {
        let state = self.state.lock().unwrap();
        state.calls.get(operation).copied().unwrap_or(0)
    }

    /// Fail the next call to `operation` with `status`
    ///
    /// Injected failures queue up, one per call.
    pub fn fail_next(&self, operation: &'static str, status: Status) {
        let mut state = self.state.lock().unwrap();
        state.failures.entry(operation).or_default().push_back(status);
    }

    /// Fail the `call`-th (1-based) `upload_chunk` call without committing
    pub fn fail_upload_call(&self, call: usize, status: Status) {
        self.fail_upload_call_after(call, 0, status);
    }

    /// Make the `call`-th `upload_chunk` call keep `partial_commit` bytes of
    /// its payload and then fail with `status`
    pub fn fail_upload_call_after(&self, call: usize, partial_commit: usize, status: Status) {
        let mut state = self.state.lock().unwrap();
        state.upload_faults.insert(
            call,
            UploadFault {
                partial_commit,
                status,
            },
        );
    }

    /// Report `extra` more committed bytes than received on the next chunk
    pub fn inflate_next_committed(&self, extra: u64) {
        self.state.lock().unwrap().inflate_committed = Some(extra);
    }

    /// Answer the `call`-th `upload_chunk` call with `committed` as the
    /// persisted size, whatever the session actually holds
    pub fn report_committed(&self, call: usize, committed: u64) {
        let mut state = self.state.lock().unwrap();
        state.reported_committed.insert(call, committed);
    }

    /// Answer the `call`-th `query_resumable_session` call with `committed`
    pub fn report_query_committed(&self, call: usize, committed: u64) {
        let mut state = self.state.lock().unwrap();
        state.query_reports.insert(call, committed);
    }

    /// Append `bytes` to a session as if an earlier attempt had delivered them
    pub fn commit_extra(&self, session_id: &str, bytes: &[u8]) {
        let mut state = self.state.lock().unwrap();
        if let Some(session) = state.sessions.get_mut(session_id) {
            session.data.extend_from_slice(bytes);
        }
    }

    /// Offsets of every `upload_chunk` call, in order
    pub fn upload_offsets(&self) -> Vec<u64> {
        self.state.lock().unwrap().upload_offsets.clone()
    }

    pub fn committed(&self, session_id: &str) -> Option<u64> {
        let state = self.state.lock().unwrap();
        state
            .sessions
            .get(session_id)
            .map(|session| session.data.len() as u64)
    }

    /// Return at most `len` bytes on the next read
    pub fn truncate_next_read(&self, len: usize) {
        self.state.lock().unwrap().truncate_reads.push_back(len);
    }

    /// Store an object directly, bypassing uploads
    pub fn put_object(&self, bucket: &str, name: &str, contents: &[u8]) -> ObjectMetadata {
        let mut state = self.state.lock().unwrap();
        state.store(ObjectMetadata::new(bucket, name), contents.to_vec())
    }

    pub fn object(&self, bucket: &str, name: &str) -> Option<(ObjectMetadata, Bytes)> {
        let state = self.state.lock().unwrap();
        state
            .objects
            .get(&(bucket.to_string(), name.to_string()))
            .map(|object| (object.metadata.clone(), object.contents.clone()))
    }

    /// Count the call and pop an injected failure, if any
    fn enter(&self, operation: &'static str) -> Result<(), Status> {
        let mut state = self.state.lock().unwrap();
        *state.calls.entry(operation).or_default() += 1;
        match state.failures.get_mut(operation).and_then(VecDeque::pop_front) {
            Some(status) => Err(status),
            None => Ok(()),
        }
    }
}

impl State {
    fn store(&mut self, mut metadata: ObjectMetadata, contents: Vec<u8>) -> ObjectMetadata {
        self.next_generation += 1;
        metadata.generation = self.next_generation;
        metadata.metageneration = 1;
        metadata.size = contents.len() as i64;
        metadata.etag = Some(format!("etag-{}", self.next_generation));
        metadata.storage_class = Some("STANDARD".to_string());

        let key = (metadata.bucket.clone(), metadata.name.clone());
        let owner = ObjectAccessControl {
            bucket: metadata.bucket.clone(),
            object: metadata.name.clone(),
            generation: metadata.generation,
            etag: "acl-1".to_string(),
            ..ObjectAccessControl::new("project-owners-123", "OWNER")
        };
        self.objects.insert(
            key,
            StoredObject {
                metadata: metadata.clone(),
                contents: Bytes::from(contents),
                acl: vec![owner],
            },
        );
        metadata
    }

    fn check_preconditions(
        &self,
        bucket: &str,
        name: &str,
        preconditions: &Preconditions,
    ) -> Result<(), Status> {
        let live = self
            .objects
            .get(&(bucket.to_string(), name.to_string()))
            .map(|object| object.metadata.generation)
            .unwrap_or(0);
        if preconditions
            .if_generation_match
            .is_some_and(|expected| expected != live)
        {
            return Err(Status::failed_precondition("Precondition Failed"));
        }
        if preconditions
            .if_generation_not_match
            .is_some_and(|unexpected| unexpected == live)
        {
            return Err(Status::failed_precondition("Precondition Failed"));
        }
        Ok(())
    }

    fn object_mut(&mut self, bucket: &str, name: &str) -> Result<&mut StoredObject, Status> {
        self.objects
            .get_mut(&(bucket.to_string(), name.to_string()))
            .ok_or_else(|| Status::not_found(format!("No such object: {bucket}/{name}")))
    }

    fn acl_entry(
        &mut self,
        bucket: &str,
        name: &str,
        entity: &str,
    ) -> Result<&mut ObjectAccessControl, Status> {
        self.object_mut(bucket, name)?
            .acl
            .iter_mut()
            .find(|acl| acl.entity == entity)
            .ok_or_else(|| Status::not_found(format!("No such entity: {entity}")))
    }
}

fn check_etag(acl: &ObjectAccessControl, preconditions: &Preconditions) -> Result<(), Status> {
    match &preconditions.if_match_etag {
        Some(etag) if *etag != acl.etag => Err(Status::failed_precondition("Precondition Failed")),
        _ => Ok(()),
    }
}

fn bump_etag(acl: &mut ObjectAccessControl) {
    let version = acl
        .etag
        .strip_prefix("acl-")
        .and_then(|n| n.parse::<u64>().ok())
        .unwrap_or(0);
    acl.etag = format!("acl-{}", version + 1);
}

#[async_trait]
impl StorageTransport for FakeServer {
    async fn list_object_acl(
        &self,
        request: &ObjectRequest,
    ) -> Result<Vec<ObjectAccessControl>, Status> {
        self.enter("list_object_acl")?;
        let mut state = self.state.lock().unwrap();
        Ok(state.object_mut(&request.bucket, &request.object)?.acl.clone())
    }

    async fn get_object_acl(
        &self,
        request: &ObjectAclRequest,
    ) -> Result<ObjectAccessControl, Status> {
        self.enter("get_object_acl")?;
        let mut state = self.state.lock().unwrap();
        Ok(state
            .acl_entry(&request.bucket, &request.object, &request.entity)?
            .clone())
    }

    async fn create_object_acl(
        &self,
        request: &CreateObjectAclRequest,
    ) -> Result<ObjectAccessControl, Status> {
        self.enter("create_object_acl")?;
        let mut state = self.state.lock().unwrap();
        let object = state.object_mut(&request.bucket, &request.object)?;
        if let Some(existing) = object.acl.iter_mut().find(|acl| acl.entity == request.entity) {
            existing.role = request.role.clone();
            bump_etag(existing);
            return Ok(existing.clone());
        }

        let acl = ObjectAccessControl {
            bucket: request.bucket.clone(),
            object: request.object.clone(),
            generation: object.metadata.generation,
            etag: "acl-1".to_string(),
            ..ObjectAccessControl::new(&request.entity, &request.role)
        };
        object.acl.push(acl.clone());
        Ok(acl)
    }

    async fn update_object_acl(
        &self,
        request: &CreateObjectAclRequest,
    ) -> Result<ObjectAccessControl, Status> {
        self.enter("update_object_acl")?;
        let mut state = self.state.lock().unwrap();
        let acl = state.acl_entry(&request.bucket, &request.object, &request.entity)?;
        check_etag(acl, &request.preconditions)?;
        acl.role = request.role.clone();
        bump_etag(acl);
        Ok(acl.clone())
    }

    async fn patch_object_acl(
        &self,
        request: &PatchObjectAclRequest,
    ) -> Result<ObjectAccessControl, Status> {
        self.enter("patch_object_acl")?;
        let mut state = self.state.lock().unwrap();
        let acl = state.acl_entry(&request.bucket, &request.object, &request.entity)?;
        check_etag(acl, &request.preconditions)?;
        if let Some(role) = request.patch.role() {
            acl.role = role.to_string();
        }
        bump_etag(acl);
        Ok(acl.clone())
    }

    async fn delete_object_acl(&self, request: &ObjectAclRequest) -> Result<(), Status> {
        self.enter("delete_object_acl")?;
        let mut state = self.state.lock().unwrap();
        let acl = state.acl_entry(&request.bucket, &request.object, &request.entity)?;
        check_etag(acl, &request.preconditions)?;
        let object = state.object_mut(&request.bucket, &request.object)?;
        object.acl.retain(|acl| acl.entity != request.entity);
        Ok(())
    }

    async fn create_resumable_session(
        &self,
        request: &ResumableUploadRequest,
    ) -> Result<String, Status> {
        self.enter("create_resumable_session")?;
        let mut state = self.state.lock().unwrap();
        state.next_session += 1;
        let session_id = format!("session-{}", state.next_session);
        state.sessions.insert(
            session_id.clone(),
            Session {
                request: request.clone(),
                data: Vec::new(),
                done: None,
            },
        );
        Ok(session_id)
    }

    async fn query_resumable_session(&self, session_id: &str) -> Result<UploadStatus, Status> {
        self.enter("query_resumable_session")?;
        let mut state = self.state.lock().unwrap();
        let call = state.calls["query_resumable_session"];
        let reported = state.query_reports.remove(&call);
        let session = state
            .sessions
            .get(session_id)
            .ok_or_else(|| Status::not_found(format!("No such upload session: {session_id}")))?;
        Ok(match &session.done {
            Some(metadata) => UploadStatus::done(metadata.clone()),
            None => UploadStatus::in_progress(reported.unwrap_or(session.data.len() as u64)),
        })
    }

    async fn upload_chunk(&self, request: &UploadChunkRequest) -> Result<UploadStatus, Status> {
        self.enter("upload_chunk")?;
        let mut state = self.state.lock().unwrap();
        state.upload_offsets.push(request.offset);
        let call = state.upload_offsets.len();
        let fault = state.upload_faults.remove(&call);
        let inflate = state.inflate_committed.take().unwrap_or(0);
        let reported = state.reported_committed.remove(&call);

        let session = state
            .sessions
            .get_mut(&request.session_id)
            .ok_or_else(|| {
                Status::not_found(format!("No such upload session: {}", request.session_id))
            })?;
        if let Some(metadata) = &session.done {
            return Ok(UploadStatus::done(metadata.clone()));
        }

        let committed = session.data.len() as u64;
        if request.offset > committed {
            return Ok(UploadStatus::in_progress(committed));
        }
        let skip = (committed - request.offset) as usize;
        let fresh = request.payload.get(skip..).unwrap_or_default();

        if let Some(fault) = fault {
            let kept = fault.partial_commit.min(fresh.len());
            session.data.extend_from_slice(&fresh[..kept]);
            return Err(fault.status);
        }
        session.data.extend_from_slice(fresh);

        let received = session.data.len() as u64;
        if request.total_size != Some(received) {
            return Ok(UploadStatus::in_progress(
                reported.unwrap_or(received + inflate),
            ));
        }

        let upload = session.request.clone();
        let contents = session.data.clone();
        state.check_preconditions(upload.bucket(), upload.object(), &upload.preconditions)?;
        let metadata = state.store(upload.metadata, contents);
        if let Some(session) = state.sessions.get_mut(&request.session_id) {
            session.done = Some(metadata.clone());
        }
        Ok(UploadStatus::done(metadata))
    }

    async fn insert_object(
        &self,
        request: &InsertObjectRequest,
    ) -> Result<ObjectMetadata, Status> {
        self.enter("insert_object")?;
        let mut state = self.state.lock().unwrap();
        state.check_preconditions(
            &request.metadata.bucket,
            &request.metadata.name,
            &request.preconditions,
        )?;
        Ok(state.store(request.metadata.clone(), request.contents.to_vec()))
    }

    async fn get_object_metadata(
        &self,
        request: &ObjectRequest,
    ) -> Result<ObjectMetadata, Status> {
        self.enter("get_object_metadata")?;
        let mut state = self.state.lock().unwrap();
        Ok(state
            .object_mut(&request.bucket, &request.object)?
            .metadata
            .clone())
    }

    async fn delete_object(&self, request: &ObjectRequest) -> Result<(), Status> {
        self.enter("delete_object")?;
        let mut state = self.state.lock().unwrap();
        state.check_preconditions(&request.bucket, &request.object, &request.preconditions)?;
        state.object_mut(&request.bucket, &request.object)?;
        state
            .objects
            .remove(&(request.bucket.clone(), request.object.clone()));
        Ok(())
    }

    async fn read_object(&self, request: &ReadObjectRequest) -> Result<ReadChunk, Status> {
        self.enter("read_object")?;
        let mut state = self.state.lock().unwrap();
        let limit = state.truncate_reads.pop_front();
        let object = state.object_mut(&request.bucket, &request.object)?;
        if request
            .generation
            .is_some_and(|generation| generation != object.metadata.generation)
        {
            return Err(Status::not_found("No such object generation"));
        }

        let size = object.contents.len() as u64;
        if request.offset > size {
            return Err(Status::new(
                rsu_core::StatusCode::OutOfRange,
                "Requested range not satisfiable",
            ));
        }
        let mut data = object.contents.slice(request.offset as usize..);
        if let Some(limit) = limit {
            data.truncate(limit);
        }
        Ok(ReadChunk {
            data,
            object_size: Some(size),
            generation: Some(object.metadata.generation),
        })
    }
}
