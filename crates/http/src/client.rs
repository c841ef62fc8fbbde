//! JSON API client implementation
//!
//! Wraps reqwest and implements the StorageTransport trait from rsu-core.
//! Every method is exactly one HTTP exchange; retries live in rsu-core.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use bytes::BytesMut;
use http::header::{CONTENT_RANGE, CONTENT_TYPE, IF_MATCH, IF_NONE_MATCH, LOCATION, RANGE};
use reqwest::{Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use url::Url;

use rsu_core::{
    CreateObjectAclRequest, Error, InsertObjectRequest, ObjectAccessControl, ObjectAclRequest,
    ObjectMetadata, ObjectRequest, PatchObjectAclRequest, Preconditions, ReadChunk,
    ReadObjectRequest, Result, ResumableUploadRequest, Status, StatusCode, StorageTransport,
    UploadChunkRequest, UploadStatus,
};

/// Per-request timeout unless configured otherwise
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

const GENERATION_HEADER: &str = "x-goog-generation";
const UPLOAD_CONTENT_TYPE_HEADER: &str = "x-upload-content-type";
const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Map an HTTP status to the canonical status code
pub fn status_code_for(status: http::StatusCode) -> StatusCode {
    match status.as_u16() {
        200..=299 => StatusCode::Ok,
        400 => StatusCode::InvalidArgument,
        401 => StatusCode::Unauthenticated,
        403 => StatusCode::PermissionDenied,
        404 => StatusCode::NotFound,
        408 => StatusCode::DeadlineExceeded,
        409 => StatusCode::AlreadyExists,
        412 => StatusCode::FailedPrecondition,
        416 => StatusCode::OutOfRange,
        429 => StatusCode::ResourceExhausted,
        499 => StatusCode::Cancelled,
        500 => StatusCode::Internal,
        501 => StatusCode::Unimplemented,
        502 | 503 => StatusCode::Unavailable,
        504 => StatusCode::DeadlineExceeded,
        _ => StatusCode::Unknown,
    }
}

/// Status for a request that never produced an HTTP response
fn status_from_reqwest(error: reqwest::Error) -> Status {
    let code = if error.is_timeout() {
        StatusCode::DeadlineExceeded
    } else if error.is_builder() {
        StatusCode::InvalidArgument
    } else if error.is_decode() {
        StatusCode::Internal
    } else {
        StatusCode::Unavailable
    };
    Status::new(code, error.to_string())
}

#[derive(Deserialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: String,
}

/// Status for a non-success response, using `error.message` from the body
async fn status_from_response(response: Response) -> Status {
    let status = response.status();
    let code = status_code_for(status);
    let body = response.text().await.unwrap_or_default();

    let message = match serde_json::from_str::<ErrorBody>(&body) {
        Ok(parsed) => parsed.error.message,
        Err(_) if !body.trim().is_empty() => body.trim().to_string(),
        Err(_) => status
            .canonical_reason()
            .unwrap_or("unknown HTTP status")
            .to_string(),
    };
    Status::new(code, message)
}

async fn decode<T: DeserializeOwned>(response: Response) -> std::result::Result<T, Status> {
    let body = response.bytes().await.map_err(status_from_reqwest)?;
    serde_json::from_slice(&body)
        .map_err(|e| Status::internal(format!("cannot decode response body: {e}")))
}

/// Committed size from a `Range: bytes=0-N` header
fn parse_committed_range(value: &str) -> std::result::Result<u64, Status> {
    value
        .strip_prefix("bytes=")
        .and_then(|range| range.split_once('-'))
        .and_then(|(_, last)| last.parse::<u64>().ok())
        .map(|last| last + 1)
        .ok_or_else(|| Status::internal(format!("invalid Range header in upload status: {value}")))
}

/// Object size from a `Content-Range: bytes a-b/total` header
fn parse_content_range_total(value: &str) -> Option<u64> {
    value.rsplit_once('/').and_then(|(_, total)| total.parse().ok())
}

/// `Content-Range` value for one chunk of a resumable upload
pub fn content_range(request: &UploadChunkRequest) -> String {
    let total = request
        .total_size
        .map(|total| total.to_string())
        .unwrap_or_else(|| "*".to_string());
    if request.payload.is_empty() {
        format!("bytes */{total}")
    } else {
        format!("bytes {}-{}/{total}", request.offset, request.end() - 1)
    }
}

/// Body of an object insert or resumable session creation
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct NewObject<'a> {
    name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    content_type: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    storage_class: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    metadata: Option<&'a BTreeMap<String, String>>,
}

impl<'a> From<&'a ObjectMetadata> for NewObject<'a> {
    fn from(metadata: &'a ObjectMetadata) -> Self {
        Self {
            name: &metadata.name,
            content_type: metadata.content_type.as_deref(),
            storage_class: metadata.storage_class.as_deref(),
            metadata: (!metadata.metadata.is_empty()).then_some(&metadata.metadata),
        }
    }
}

#[derive(Serialize)]
struct AclEntry<'a> {
    entity: &'a str,
    role: &'a str,
}

#[derive(Deserialize)]
struct AclList {
    #[serde(default)]
    items: Vec<ObjectAccessControl>,
}

/// JSON API transport
#[derive(Clone)]
pub struct HttpTransport {
    http: reqwest::Client,
    endpoint: Url,
    token: Option<String>,
}

impl std::fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpTransport")
            .field("endpoint", &self.endpoint.as_str())
            .field("authenticated", &self.token.is_some())
            .finish()
    }
}

impl HttpTransport {
    /// Create a transport for `endpoint`, sending `token` as a bearer token
    pub fn new(endpoint: &str, token: Option<String>) -> Result<Self> {
        Self::with_timeout(endpoint, token, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(endpoint: &str, token: Option<String>, timeout: Duration) -> Result<Self> {
        let endpoint = Url::parse(endpoint)
            .map_err(|e| Error::Config(format!("invalid endpoint '{endpoint}': {e}")))?;
        if endpoint.cannot_be_a_base() {
            return Err(Error::Config(format!(
                "invalid endpoint '{endpoint}': not a base URL"
            )));
        }

        // Resumable uploads answer 308 without a Location; never follow it.
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::none())
            .user_agent(concat!("rsu/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            endpoint,
            token,
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    fn url(&self, segments: &[&str]) -> std::result::Result<Url, Status> {
        let mut url = self.endpoint.clone();
        url.path_segments_mut()
            .map_err(|_| Status::invalid_argument("endpoint cannot be a base URL"))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn object_url(
        &self,
        bucket: &str,
        object: &str,
        tail: &[&str],
    ) -> std::result::Result<Url, Status> {
        let mut segments = vec!["storage", "v1", "b", bucket, "o", object];
        segments.extend_from_slice(tail);
        self.url(&segments)
    }

    fn upload_url(&self, bucket: &str) -> std::result::Result<Url, Status> {
        self.url(&["upload", "storage", "v1", "b", bucket, "o"])
    }

    fn request(&self, method: Method, url: impl reqwest::IntoUrl) -> RequestBuilder {
        let builder = self.http.request(method, url);
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn send(&self, builder: RequestBuilder) -> std::result::Result<Response, Status> {
        let response = builder.send().await.map_err(status_from_reqwest)?;
        let status = response.status();
        tracing::debug!(
            status = status.as_u16(),
            url = %response.url().path(),
            "HTTP response"
        );

        if status.is_success() || status == http::StatusCode::PERMANENT_REDIRECT {
            Ok(response)
        } else {
            Err(status_from_response(response).await)
        }
    }

    async fn upload_status(response: Response) -> std::result::Result<UploadStatus, Status> {
        if response.status() == http::StatusCode::PERMANENT_REDIRECT {
            let committed = match response.headers().get(RANGE) {
                Some(value) => {
                    let value = value
                        .to_str()
                        .map_err(|_| Status::internal("non-ASCII Range header"))?;
                    parse_committed_range(value)?
                }
                None => 0,
            };
            return Ok(UploadStatus::in_progress(committed));
        }
        let metadata: ObjectMetadata = decode(response).await?;
        Ok(UploadStatus::done(metadata))
    }
}

/// Attach generation and precondition parameters to a request
fn with_preconditions(
    mut builder: RequestBuilder,
    generation: Option<i64>,
    preconditions: &Preconditions,
) -> RequestBuilder {
    let mut query = preconditions.query_parameters();
    if let Some(generation) = generation {
        query.push(("generation", generation.to_string()));
    }
    if !query.is_empty() {
        builder = builder.query(&query);
    }
    if let Some(etag) = &preconditions.if_match_etag {
        builder = builder.header(IF_MATCH, etag);
    }
    if let Some(etag) = &preconditions.if_none_match_etag {
        builder = builder.header(IF_NONE_MATCH, etag);
    }
    builder
}

#[async_trait]
impl StorageTransport for HttpTransport {
    async fn list_object_acl(
        &self,
        request: &ObjectRequest,
    ) -> std::result::Result<Vec<ObjectAccessControl>, Status> {
        let url = self.object_url(&request.bucket, &request.object, &["acl"])?;
        let builder = with_preconditions(
            self.request(Method::GET, url),
            request.generation,
            &request.preconditions,
        );
        let list: AclList = decode(self.send(builder).await?).await?;
        Ok(list.items)
    }

    async fn get_object_acl(
        &self,
        request: &ObjectAclRequest,
    ) -> std::result::Result<ObjectAccessControl, Status> {
        let url = self.object_url(&request.bucket, &request.object, &["acl", &request.entity])?;
        let builder = with_preconditions(
            self.request(Method::GET, url),
            request.generation,
            &request.preconditions,
        );
        decode(self.send(builder).await?).await
    }

    async fn create_object_acl(
        &self,
        request: &CreateObjectAclRequest,
    ) -> std::result::Result<ObjectAccessControl, Status> {
        let url = self.object_url(&request.bucket, &request.object, &["acl"])?;
        let builder = with_preconditions(
            self.request(Method::POST, url),
            request.generation,
            &request.preconditions,
        )
        .json(&AclEntry {
            entity: &request.entity,
            role: &request.role,
        });
        decode(self.send(builder).await?).await
    }

    async fn update_object_acl(
        &self,
        request: &CreateObjectAclRequest,
    ) -> std::result::Result<ObjectAccessControl, Status> {
        let url = self.object_url(&request.bucket, &request.object, &["acl", &request.entity])?;
        let builder = with_preconditions(
            self.request(Method::PUT, url),
            request.generation,
            &request.preconditions,
        )
        .json(&AclEntry {
            entity: &request.entity,
            role: &request.role,
        });
        decode(self.send(builder).await?).await
    }

    async fn patch_object_acl(
        &self,
        request: &PatchObjectAclRequest,
    ) -> std::result::Result<ObjectAccessControl, Status> {
        let url = self.object_url(&request.bucket, &request.object, &["acl", &request.entity])?;
        let builder = with_preconditions(
            self.request(Method::PATCH, url),
            request.generation,
            &request.preconditions,
        )
        .json(&request.patch.payload());
        decode(self.send(builder).await?).await
    }

    async fn delete_object_acl(
        &self,
        request: &ObjectAclRequest,
    ) -> std::result::Result<(), Status> {
        let url = self.object_url(&request.bucket, &request.object, &["acl", &request.entity])?;
        let builder = with_preconditions(
            self.request(Method::DELETE, url),
            request.generation,
            &request.preconditions,
        );
        self.send(builder).await?;
        Ok(())
    }

    async fn create_resumable_session(
        &self,
        request: &ResumableUploadRequest,
    ) -> std::result::Result<String, Status> {
        let url = self.upload_url(request.bucket())?;
        let mut builder = with_preconditions(
            self.request(Method::POST, url),
            None,
            &request.preconditions,
        )
        .query(&[("uploadType", "resumable"), ("name", request.object())])
        .json(&NewObject::from(&request.metadata));
        if let Some(content_type) = &request.metadata.content_type {
            builder = builder.header(UPLOAD_CONTENT_TYPE_HEADER, content_type);
        }

        let response = self.send(builder).await?;
        let location = response
            .headers()
            .get(LOCATION)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| Status::internal("resumable upload response has no Location header"))?;
        Ok(location.to_string())
    }

    async fn query_resumable_session(
        &self,
        session_id: &str,
    ) -> std::result::Result<UploadStatus, Status> {
        let builder = self
            .request(Method::PUT, session_id)
            .header(CONTENT_RANGE, "bytes */*")
            .body(Vec::new());
        Self::upload_status(self.send(builder).await?).await
    }

    async fn upload_chunk(
        &self,
        request: &UploadChunkRequest,
    ) -> std::result::Result<UploadStatus, Status> {
        let builder = self
            .request(Method::PUT, request.session_id.as_str())
            .header(CONTENT_RANGE, content_range(request))
            .body(request.payload.clone());
        Self::upload_status(self.send(builder).await?).await
    }

    async fn insert_object(
        &self,
        request: &InsertObjectRequest,
    ) -> std::result::Result<ObjectMetadata, Status> {
        let url = self.upload_url(&request.metadata.bucket)?;
        let content_type = request
            .metadata
            .content_type
            .as_deref()
            .unwrap_or(DEFAULT_CONTENT_TYPE);
        let builder = with_preconditions(
            self.request(Method::POST, url),
            None,
            &request.preconditions,
        )
        .query(&[("uploadType", "media"), ("name", request.metadata.name.as_str())])
        .header(CONTENT_TYPE, content_type)
        .body(request.contents.clone());
        decode(self.send(builder).await?).await
    }

    async fn get_object_metadata(
        &self,
        request: &ObjectRequest,
    ) -> std::result::Result<ObjectMetadata, Status> {
        let url = self.object_url(&request.bucket, &request.object, &[])?;
        let builder = with_preconditions(
            self.request(Method::GET, url),
            request.generation,
            &request.preconditions,
        );
        decode(self.send(builder).await?).await
    }

    async fn delete_object(&self, request: &ObjectRequest) -> std::result::Result<(), Status> {
        let url = self.object_url(&request.bucket, &request.object, &[])?;
        let builder = with_preconditions(
            self.request(Method::DELETE, url),
            request.generation,
            &request.preconditions,
        );
        self.send(builder).await?;
        Ok(())
    }

    async fn read_object(
        &self,
        request: &ReadObjectRequest,
    ) -> std::result::Result<ReadChunk, Status> {
        let url = self.object_url(&request.bucket, &request.object, &[])?;
        let mut builder = self.request(Method::GET, url).query(&[("alt", "media")]);
        if let Some(generation) = request.generation {
            builder = builder.query(&[("generation", generation.to_string())]);
        }
        if request.offset > 0 {
            builder = builder.header(RANGE, format!("bytes={}-", request.offset));
        }

        let mut response = self.send(builder).await?;
        let partial = response.status() == http::StatusCode::PARTIAL_CONTENT;
        let generation = response
            .headers()
            .get(GENERATION_HEADER)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.parse().ok());
        let object_size = if partial {
            response
                .headers()
                .get(CONTENT_RANGE)
                .and_then(|value| value.to_str().ok())
                .and_then(parse_content_range_total)
        } else {
            response.content_length()
        };
        // A full response to a ranged request starts at byte zero.
        let mut skip = if partial { 0 } else { request.offset as usize };

        let mut data = BytesMut::new();
        loop {
            match response.chunk().await {
                Ok(Some(mut chunk)) => {
                    let dropped = skip.min(chunk.len());
                    skip -= dropped;
                    data.extend_from_slice(&chunk.split_off(dropped));
                }
                Ok(None) => break,
                Err(e) if !data.is_empty() => {
                    tracing::debug!(
                        error = %e,
                        received = data.len(),
                        "Download interrupted, returning partial data"
                    );
                    break;
                }
                Err(e) => return Err(status_from_reqwest(e)),
            }
        }

        Ok(ReadChunk {
            data: data.freeze(),
            object_size,
            generation,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    #[test]
    fn test_status_code_mapping() {
        let cases = [
            (400, StatusCode::InvalidArgument),
            (401, StatusCode::Unauthenticated),
            (403, StatusCode::PermissionDenied),
            (404, StatusCode::NotFound),
            (408, StatusCode::DeadlineExceeded),
            (409, StatusCode::AlreadyExists),
            (412, StatusCode::FailedPrecondition),
            (416, StatusCode::OutOfRange),
            (429, StatusCode::ResourceExhausted),
            (499, StatusCode::Cancelled),
            (500, StatusCode::Internal),
            (501, StatusCode::Unimplemented),
            (502, StatusCode::Unavailable),
            (503, StatusCode::Unavailable),
            (504, StatusCode::DeadlineExceeded),
            (418, StatusCode::Unknown),
            (200, StatusCode::Ok),
        ];
        for (http_status, expected) in cases {
            let status = http::StatusCode::from_u16(http_status).unwrap();
            assert_eq!(status_code_for(status), expected, "HTTP {http_status}");
        }
    }

    #[test]
    fn test_parse_committed_range() {
        assert_eq!(parse_committed_range("bytes=0-262143").unwrap(), 262_144);
        assert_eq!(parse_committed_range("bytes=0-0").unwrap(), 1);
        let err = parse_committed_range("0-12").unwrap_err();
        assert_eq!(err.code(), StatusCode::Internal);
    }

    #[test]
    fn test_content_range() {
        let mut chunk = UploadChunkRequest {
            session_id: "s".to_string(),
            offset: 262_144,
            payload: Bytes::from(vec![0u8; 1024]),
            total_size: None,
        };
        assert_eq!(content_range(&chunk), "bytes 262144-263167/*");

        chunk.total_size = Some(263_168);
        assert_eq!(content_range(&chunk), "bytes 262144-263167/263168");

        chunk.payload = Bytes::new();
        chunk.total_size = Some(0);
        assert_eq!(content_range(&chunk), "bytes */0");
    }

    #[test]
    fn test_object_urls_escape_names() {
        let transport = HttpTransport::new("http://localhost:9000/", None).unwrap();
        let url = transport
            .object_url("bkt", "dir/file name.txt", &["acl", "user-a@example.com"])
            .unwrap();
        assert_eq!(
            url.as_str(),
            "http://localhost:9000/storage/v1/b/bkt/o/dir%2Ffile%20name.txt/acl/user-a@example.com"
        );

        let url = transport.upload_url("bkt").unwrap();
        assert_eq!(url.path(), "/upload/storage/v1/b/bkt/o");
    }

    #[test]
    fn test_invalid_endpoint() {
        let err = HttpTransport::new("not a url", None).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert!(HttpTransport::new("mailto:someone@example.com", None).is_err());
    }

    #[test]
    fn test_new_object_body() {
        let metadata = ObjectMetadata::new("bkt", "obj")
            .with_content_type("text/plain")
            .with_metadata("origin", "test");
        let body = serde_json::to_value(NewObject::from(&metadata)).unwrap();
        assert_eq!(
            body,
            serde_json::json!({
                "name": "obj",
                "contentType": "text/plain",
                "metadata": {"origin": "test"}
            })
        );
    }
}
