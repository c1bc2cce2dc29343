//! Staged source snapshots.
//!
//! The object key depends only on the project name and the schema version,
//! never on the revision. Every trigger overwrites the previous snapshot, so
//! at most one artifact per project is live at any time.

use std::fmt;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// File name of the staged archive
const ARCHIVE_FILE_NAME: &str = "source.zip";

/// Deterministic object key: `<project>/<schema>/source.zip`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ArtifactKey(String);

impl ArtifactKey {
    pub fn for_project(project_name: &str, schema: &str) -> Self {
        Self(format!("{}/{}/{}", project_name, schema, ARCHIVE_FILE_NAME))
    }

    /// Wrap an arbitrary key (used by stores and tests)
    pub fn from_raw(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ArtifactKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Snapshot bytes bound to their storage location
#[derive(Debug, Clone)]
pub struct StagedArtifact {
    pub bucket: String,
    pub key: ArtifactKey,
    pub content: Bytes,
}

impl StagedArtifact {
    pub fn new(bucket: impl Into<String>, key: ArtifactKey, content: Bytes) -> Self {
        Self {
            bucket: bucket.into(),
            key,
            content,
        }
    }
}

/// Acknowledgement returned by an object store after a write
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StagingAck {
    pub bucket: String,
    pub key: ArtifactKey,
    pub size_bytes: u64,
    /// Hex SHA-256 of the stored content
    pub sha256: String,
}

impl StagingAck {
    pub fn for_content(bucket: &str, key: &ArtifactKey, content: &[u8]) -> Self {
        Self {
            bucket: bucket.to_string(),
            key: key.clone(),
            size_bytes: content.len() as u64,
            sha256: content_digest(content),
        }
    }
}

/// Hex-encoded SHA-256 of `content`
pub fn content_digest(content: &[u8]) -> String {
    hex::encode(Sha256::digest(content))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_ignores_revision() {
        let key = ArtifactKey::for_project("ip-demo", "v1");
        assert_eq!(key.as_str(), "ip-demo/v1/source.zip");
        assert_eq!(key, ArtifactKey::for_project("ip-demo", "v1"));
    }

    #[test]
    fn test_ack_digest() {
        let key = ArtifactKey::for_project("p", "v1");
        let ack = StagingAck::for_content("bucket", &key, b"hello");

        assert_eq!(ack.size_bytes, 5);
        assert_eq!(
            ack.sha256,
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
    }
}
