//! Build environment definitions.
//!
//! An environment is identified by its name alone. The name is derived from
//! the configured project identity, never from the repository or revision.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Where the build environment reads its source from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceLocation {
    pub bucket: String,
    pub key: String,
}

impl SourceLocation {
    pub fn new(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.into(),
        }
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.bucket, self.key)
    }
}

/// Container type, image and size the build runs on
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComputeShape {
    pub environment_type: String,
    pub image: String,
    pub compute_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentVariable {
    pub name: String,
    pub value: String,
}

impl EnvironmentVariable {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub key: String,
    pub value: String,
}

impl Tag {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Full definition sent to the build service on creation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildEnvironment {
    pub name: String,
    pub source: SourceLocation,
    /// Build instructions; a fixed placeholder at creation time
    pub buildspec: String,
    pub compute: ComputeShape,
    /// Identity the build runs as
    pub service_role: String,
    #[serde(default)]
    pub environment_variables: Vec<EnvironmentVariable>,
    #[serde(default)]
    pub tags: Vec<Tag>,
}

/// How `ensure_exists` obtained the environment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    /// Found by lookup and reused as-is
    Existing,
    /// Created by this invocation
    Created,
    /// Creation reported a duplicate name; another creator won the race
    AdoptedAfterConflict,
}

/// Handle to a build environment that is known to exist
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentRef {
    pub name: String,
    pub provenance: Provenance,
}

impl EnvironmentRef {
    pub fn new(name: impl Into<String>, provenance: Provenance) -> Self {
        Self {
            name: name.into(),
            provenance,
        }
    }

    /// True when this invocation performed the creation
    pub fn was_created(&self) -> bool {
        self.provenance == Provenance::Created
    }
}
