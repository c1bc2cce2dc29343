//! Adapter interfaces for external systems.
//!
//! Each collaborator of the orchestrator is a narrow capability trait so the
//! orchestration core can run against real services or in-process fakes.

pub mod build_service;
pub mod gitlab;
pub mod secrets;
pub mod storage;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use bytes::Bytes;
use tracing::warn;

use crate::config::{BridgeConfig, SecretBackend};
use crate::domain::{ArtifactKey, BuildEnvironment, BuildExecution, BuildRequest, StagingAck};
use crate::error::{FetchError, ProvisionError, SecretError, StorageError, TriggerError};

// Re-export the concrete adapters
pub use build_service::{HttpBuildService, MemoryBuildService};
pub use gitlab::GitLabArchiveFetcher;
pub use secrets::{EnvSecretProvider, FileSecretProvider, Secret};
pub use storage::{FsObjectStore, MemoryObjectStore};

/// Resolves a named credential to its current value
#[async_trait]
pub trait ProvidesSecrets: Send + Sync {
    /// Human-readable backend name
    fn name(&self) -> &str;

    /// Fetch the secret fresh; implementations never cache
    async fn resolve(&self, name: &str) -> Result<Secret, SecretError>;
}

/// Downloads a complete archive of one revision
#[async_trait]
pub trait FetchesSource: Send + Sync {
    /// Any non-2xx answer is an error carrying the status; partial bodies
    /// are never returned.
    async fn fetch(&self, request: &BuildRequest, credential: &Secret) -> Result<Bytes, FetchError>;
}

/// Durable object storage with overwrite semantics
#[async_trait]
pub trait StagesArtifacts: Send + Sync {
    /// Replace the object at `bucket`/`key` entirely
    async fn put(&self, bucket: &str, key: &ArtifactKey, content: Bytes)
        -> Result<StagingAck, StorageError>;
}

/// Lookup and creation of named build environments
#[async_trait]
pub trait ProvisionsEnvironments: Send + Sync {
    async fn lookup(&self, name: &str) -> Result<Option<BuildEnvironment>, ProvisionError>;

    /// Must report a duplicate name as [`ProvisionError::AlreadyExists`]
    async fn create(&self, environment: &BuildEnvironment) -> Result<(), ProvisionError>;
}

/// Enqueues build executions without waiting for them
#[async_trait]
pub trait TriggersBuilds: Send + Sync {
    async fn start(&self, environment_name: &str) -> Result<BuildExecution, TriggerError>;
}

/// The full set of collaborators an orchestrator is built from
#[derive(Clone)]
pub struct Collaborators {
    pub secrets: Arc<dyn ProvidesSecrets>,
    pub fetcher: Arc<dyn FetchesSource>,
    pub stager: Arc<dyn StagesArtifacts>,
    pub environments: Arc<dyn ProvisionsEnvironments>,
    pub builds: Arc<dyn TriggersBuilds>,
}

impl Collaborators {
    /// Construct the production adapters described by `config`
    pub fn from_config(config: &BridgeConfig) -> Result<Self> {
        let secrets: Arc<dyn ProvidesSecrets> = match &config.secrets {
            SecretBackend::Env { var } => Arc::new(EnvSecretProvider::new(var.clone())),
            SecretBackend::File { dir } => Arc::new(FileSecretProvider::new(dir.clone())),
        };

        let fetcher = GitLabArchiveFetcher::new(Duration::from_secs(config.source.timeout_seconds))
            .context("Failed to build source host client")?;

        let stager = FsObjectStore::new(config.storage.root.clone());

        let (environments, builds): (Arc<dyn ProvisionsEnvironments>, Arc<dyn TriggersBuilds>) =
            match &config.build.endpoint {
                Some(endpoint) => {
                    let service = Arc::new(
                        HttpBuildService::new(
                            endpoint,
                            Duration::from_secs(config.build.timeout_seconds),
                        )
                        .context("Failed to build build-service client")?,
                    );
                    let environments: Arc<dyn ProvisionsEnvironments> = service.clone();
                    (environments, service as Arc<dyn TriggersBuilds>)
                }
                None => {
                    warn!("No build service endpoint configured; builds run in dry-run mode");
                    let service = Arc::new(MemoryBuildService::new());
                    let environments: Arc<dyn ProvisionsEnvironments> = service.clone();
                    (environments, service as Arc<dyn TriggersBuilds>)
                }
            };

        Ok(Self {
            secrets,
            fetcher: Arc::new(fetcher),
            stager: Arc::new(stager),
            environments,
            builds,
        })
    }
}
