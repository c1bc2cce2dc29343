//! Inbound push events and the build request derived from them.

use std::fmt;

use reqwest::Url;
use serde::Deserialize;

use crate::error::{BridgeError, FetchError};

/// Source-host project identifier (numeric id or `group/project` path)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RepositoryId(String);

impl RepositoryId {
    /// Returns `None` for an empty identifier
    pub fn new(value: impl Into<String>) -> Option<Self> {
        let value = value.into();
        if value.trim().is_empty() {
            None
        } else {
            Some(Self(value))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RepositoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Branch or ref the snapshot is taken from
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Revision(String);

impl Revision {
    /// Returns `None` for an empty revision
    pub fn new(value: impl Into<String>) -> Option<Self> {
        let value = value.into();
        if value.trim().is_empty() {
            None
        } else {
            Some(Self(value))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Push event body as delivered by the source host.
///
/// Only the fields the bridge needs are modelled; everything else in the
/// payload is ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct PushEvent {
    pub project: EventProject,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EventProject {
    pub id: ProjectIdField,
    pub default_branch: String,
}

/// Project ids arrive as integers from GitLab but may be paths elsewhere
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ProjectIdField {
    Number(u64),
    Text(String),
}

impl ProjectIdField {
    fn into_string(self) -> String {
        match self {
            Self::Number(n) => n.to_string(),
            Self::Text(s) => s,
        }
    }
}

impl PushEvent {
    /// Parse a raw webhook body
    pub fn from_slice(body: &[u8]) -> Result<Self, BridgeError> {
        serde_json::from_slice(body).map_err(|e| BridgeError::InvalidRequest(e.to_string()))
    }
}

/// A validated request to snapshot one revision of one repository.
///
/// Immutable once constructed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildRequest {
    repository_id: RepositoryId,
    revision: Revision,
    source_download_url: String,
}

impl BuildRequest {
    /// Build a request, deriving the archive download URL from `api_base`.
    ///
    /// An unusable `api_base` is a source-side failure, not a payload error;
    /// configuration validation normally rejects it at startup.
    pub fn new(
        repository_id: RepositoryId,
        revision: Revision,
        api_base: &str,
    ) -> Result<Self, BridgeError> {
        let url = archive_url(api_base, &repository_id, &revision)
            .map_err(FetchError::InvalidUrl)?;

        Ok(Self {
            repository_id,
            revision,
            source_download_url: url.to_string(),
        })
    }

    /// Validate a parsed event
    pub fn from_event(event: PushEvent, api_base: &str) -> Result<Self, BridgeError> {
        let repository_id = RepositoryId::new(event.project.id.into_string())
            .ok_or_else(|| BridgeError::InvalidRequest("project.id is empty".to_string()))?;
        let revision = Revision::new(event.project.default_branch).ok_or_else(|| {
            BridgeError::InvalidRequest("project.default_branch is empty".to_string())
        })?;

        Self::new(repository_id, revision, api_base)
    }

    /// Parse and validate a raw webhook body
    pub fn parse(body: &[u8], api_base: &str) -> Result<Self, BridgeError> {
        Self::from_event(PushEvent::from_slice(body)?, api_base)
    }

    pub fn repository_id(&self) -> &RepositoryId {
        &self.repository_id
    }

    pub fn revision(&self) -> &Revision {
        &self.revision
    }

    pub fn source_download_url(&self) -> &str {
        &self.source_download_url
    }
}

/// `{api_base}/projects/{id}/repository/archive.zip?sha={revision}`
///
/// The id is pushed as a single path segment, so `group/project` paths are
/// percent-encoded the way the source host expects.
pub fn archive_url(
    api_base: &str,
    repository_id: &RepositoryId,
    revision: &Revision,
) -> Result<Url, String> {
    let mut url = Url::parse(api_base).map_err(|e| e.to_string())?;

    url.path_segments_mut()
        .map_err(|_| format!("'{}' cannot be used as a base URL", api_base))?
        .pop_if_empty()
        .push("projects")
        .push(repository_id.as_str())
        .extend(["repository", "archive.zip"]);

    url.query_pairs_mut().append_pair("sha", revision.as_str());

    Ok(url)
}
