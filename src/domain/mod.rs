//! Domain types for the push-to-build bridge.
//!
//! This module contains the core data structures:
//! - Request: inbound push events and validated build requests
//! - Artifact: deterministic object keys and staged snapshots
//! - Environment: build environment definitions
//! - Execution: queued builds and the invocation outcome

pub mod artifact;
pub mod environment;
pub mod execution;
pub mod request;

// Re-export commonly used types
pub use artifact::{content_digest, ArtifactKey, StagedArtifact, StagingAck};
pub use environment::{
    BuildEnvironment, ComputeShape, EnvironmentRef, EnvironmentVariable, Provenance,
    SourceLocation, Tag,
};
pub use execution::{BuildExecution, Outcome};
pub use request::{BuildRequest, PushEvent, RepositoryId, Revision};
