//! Value objects exchanged with the storage service
//!
//! These types carry fields only. Their JSON shape follows the service's
//! JSON API, which encodes 64-bit integers as strings.

use std::collections::BTreeMap;

use jiff::Timestamp;
use serde::{Deserialize, Serialize};

/// Well-known storage classes
pub mod storage_class {
    pub const STANDARD: &str = "STANDARD";
    pub const MULTI_REGIONAL: &str = "MULTI_REGIONAL";
    pub const REGIONAL: &str = "REGIONAL";
    pub const NEARLINE: &str = "NEARLINE";
    pub const COLDLINE: &str = "COLDLINE";
    pub const DURABLE_REDUCED_AVAILABILITY: &str = "DURABLE_REDUCED_AVAILABILITY";
}

/// Project team of a `project-*` ACL entity
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectTeam {
    #[serde(default)]
    pub project_number: String,
    #[serde(default)]
    pub team: String,
}

/// One access-control entry on an object
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ObjectAccessControl {
    pub bucket: String,
    pub object: String,
    #[serde(with = "int64_string")]
    pub generation: i64,
    pub entity: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub entity_id: String,
    pub role: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub email: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub domain: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub etag: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub id: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_team: Option<ProjectTeam>,
}

impl ObjectAccessControl {
    pub fn new(entity: impl Into<String>, role: impl Into<String>) -> Self {
        Self {
            entity: entity.into(),
            role: role.into(),
            ..Default::default()
        }
    }
}

impl std::fmt::Display for ObjectAccessControl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}/{}#{} {}={}",
            self.bucket, self.object, self.generation, self.entity, self.role
        )
    }
}

/// Fields to change in a PATCH of an ACL entry
///
/// Only the fields that were set end up in the request payload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AclPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    entity: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
}

impl AclPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_role(mut self, role: impl Into<String>) -> Self {
        self.role = Some(role.into());
        self
    }

    pub fn set_entity(mut self, entity: impl Into<String>) -> Self {
        self.entity = Some(entity.into());
        self
    }

    pub fn role(&self) -> Option<&str> {
        self.role.as_deref()
    }

    pub fn is_empty(&self) -> bool {
        self.entity.is_none() && self.role.is_none()
    }

    /// JSON payload sent to the service
    pub fn payload(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_else(|_| serde_json::json!({}))
    }
}

/// Authoritative metadata of a stored object, as reported by the service
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ObjectMetadata {
    pub name: String,
    pub bucket: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(with = "int64_string")]
    pub generation: i64,
    #[serde(with = "int64_string")]
    pub metageneration: i64,
    #[serde(with = "int64_string")]
    pub size: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub md5_hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub crc32c: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage_class: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_created: Option<Timestamp>,
    /// Custom key/value attributes
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
}

impl ObjectMetadata {
    pub fn new(bucket: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn has_metadata(&self, key: &str) -> bool {
        self.metadata.contains_key(key)
    }
}

/// Conditions attached to a mutating request so that retrying it is safe
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Preconditions {
    pub if_generation_match: Option<i64>,
    pub if_generation_not_match: Option<i64>,
    pub if_metageneration_match: Option<i64>,
    pub if_metageneration_not_match: Option<i64>,
    pub if_match_etag: Option<String>,
    pub if_none_match_etag: Option<String>,
}

impl Preconditions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Only if the live generation equals `generation` (0: object must not exist)
    pub fn if_generation_match(mut self, generation: i64) -> Self {
        self.if_generation_match = Some(generation);
        self
    }

    pub fn if_generation_not_match(mut self, generation: i64) -> Self {
        self.if_generation_not_match = Some(generation);
        self
    }

    pub fn if_metageneration_match(mut self, metageneration: i64) -> Self {
        self.if_metageneration_match = Some(metageneration);
        self
    }

    pub fn if_metageneration_not_match(mut self, metageneration: i64) -> Self {
        self.if_metageneration_not_match = Some(metageneration);
        self
    }

    pub fn if_match_etag(mut self, etag: impl Into<String>) -> Self {
        self.if_match_etag = Some(etag.into());
        self
    }

    pub fn if_none_match_etag(mut self, etag: impl Into<String>) -> Self {
        self.if_none_match_etag = Some(etag.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Generation conditions as `(query parameter, value)` pairs
    pub fn query_parameters(&self) -> Vec<(&'static str, String)> {
        [
            ("ifGenerationMatch", self.if_generation_match),
            ("ifGenerationNotMatch", self.if_generation_not_match),
            ("ifMetagenerationMatch", self.if_metageneration_match),
            ("ifMetagenerationNotMatch", self.if_metageneration_not_match),
        ]
        .into_iter()
        .filter_map(|(name, value)| value.map(|v| (name, v.to_string())))
        .collect()
    }
}

/// Serde helper for int64 fields sent as JSON strings but sometimes as numbers
mod int64_string {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &i64, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Number(i64),
            Text(String),
        }

        match Repr::deserialize(deserializer)? {
            Repr::Number(n) => Ok(n),
            Repr::Text(s) => s.parse().map_err(serde::de::Error::custom),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_object_access_control() {
        let text = r#"{
            "bucket": "foo-bar",
            "domain": "example.com",
            "email": "foobar@example.com",
            "entity": "user-foobar",
            "entityId": "user-foobar-id-123",
            "etag": "XYZ=",
            "generation": 42,
            "id": "object-foo-bar-baz-acl-234",
            "kind": "storage#objectAccessControl",
            "object": "baz",
            "projectTeam": {
                "projectNumber": "3456789",
                "team": "a-team"
            },
            "role": "OWNER"
        }"#;
        let acl: ObjectAccessControl = serde_json::from_str(text).unwrap();

        assert_eq!(acl.bucket, "foo-bar");
        assert_eq!(acl.domain, "example.com");
        assert_eq!(acl.email, "foobar@example.com");
        assert_eq!(acl.entity, "user-foobar");
        assert_eq!(acl.entity_id, "user-foobar-id-123");
        assert_eq!(acl.etag, "XYZ=");
        assert_eq!(acl.generation, 42);
        assert_eq!(acl.id, "object-foo-bar-baz-acl-234");
        assert_eq!(acl.kind, "storage#objectAccessControl");
        assert_eq!(acl.object, "baz");
        let team = acl.project_team.as_ref().unwrap();
        assert_eq!(team.project_number, "3456789");
        assert_eq!(team.team, "a-team");
        assert_eq!(acl.role, "OWNER");
        assert_eq!(acl.to_string(), "foo-bar/baz#42 user-foobar=OWNER");
    }

    #[test]
    fn test_acl_patch_payload() {
        let patch = AclPatch::new().set_role("OWNER");
        assert_eq!(patch.payload(), serde_json::json!({"role": "OWNER"}));
        assert!(AclPatch::new().is_empty());
        assert_eq!(AclPatch::new().payload(), serde_json::json!({}));
    }

    #[test]
    fn test_parse_object_metadata() {
        let text = r#"{
            "name": "data.bin",
            "bucket": "bkt",
            "contentType": "text/plain",
            "generation": "1234567890123",
            "metageneration": "1",
            "size": "10485760",
            "timeCreated": "2024-01-15T10:30:00Z",
            "metadata": {"x_testbench_upload": "resumable"}
        }"#;
        let meta: ObjectMetadata = serde_json::from_str(text).unwrap();
        assert_eq!(meta.name, "data.bin");
        assert_eq!(meta.generation, 1_234_567_890_123);
        assert_eq!(meta.size, 10 * 1024 * 1024);
        assert_eq!(meta.content_type.as_deref(), Some("text/plain"));
        assert!(meta.time_created.is_some());
        assert!(meta.has_metadata("x_testbench_upload"));

        let json = serde_json::to_value(&meta).unwrap();
        assert_eq!(json["size"], "10485760");
    }

    #[test]
    fn test_preconditions_query_parameters() {
        let pre = Preconditions::new()
            .if_generation_match(0)
            .if_metageneration_not_match(7)
            .if_match_etag("ABC=");
        assert_eq!(
            pre.query_parameters(),
            vec![
                ("ifGenerationMatch", "0".to_string()),
                ("ifMetagenerationNotMatch", "7".to_string()),
            ]
        );
        assert!(!pre.is_empty());
        assert!(Preconditions::new().is_empty());
    }
}
