//! Request orchestration.
//!
//! Sequences one invocation: resolve credential, fetch source, stage artifact,
//! ensure the build environment, trigger a build. Steps run strictly in order
//! and the first failure aborts the rest. Nothing is retried or compensated;
//! a staged artifact or a created environment left behind by a failed
//! invocation is reused by the next delivery of the event.

use std::sync::Arc;
use std::time::Instant;

use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::adapters::{Collaborators, FetchesSource, ProvidesSecrets, StagesArtifacts, TriggersBuilds};
use crate::config::BridgeConfig;
use crate::domain::{ArtifactKey, BuildRequest, Outcome, SourceLocation, StagedArtifact};
use crate::error::BridgeError;

use super::provisioner::{EnvironmentTemplate, Provisioner};

/// Main webhook orchestrator
pub struct Orchestrator {
    secrets: Arc<dyn ProvidesSecrets>,
    fetcher: Arc<dyn FetchesSource>,
    stager: Arc<dyn StagesArtifacts>,
    provisioner: Provisioner,
    builds: Arc<dyn TriggersBuilds>,

    secret_name: String,
    api_base: String,
    bucket: String,
    artifact_key: ArtifactKey,
    environment_name: String,
}

impl Orchestrator {
    /// Create an orchestrator from resolved configuration and its collaborators
    pub fn new(config: &BridgeConfig, collaborators: Collaborators) -> Self {
        Self {
            secrets: collaborators.secrets,
            fetcher: collaborators.fetcher,
            stager: collaborators.stager,
            provisioner: Provisioner::new(
                collaborators.environments,
                EnvironmentTemplate::from_config(config),
            ),
            builds: collaborators.builds,
            secret_name: config.source.secret_name.clone(),
            api_base: config.source.api_base.clone(),
            bucket: config.storage.bucket.clone(),
            artifact_key: config.artifact_key(),
            environment_name: config.environment_name().to_string(),
        }
    }

    /// Create an orchestrator wired to the production adapters
    pub fn from_config(config: &BridgeConfig) -> anyhow::Result<Self> {
        Ok(Self::new(config, Collaborators::from_config(config)?))
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub fn artifact_key(&self) -> &ArtifactKey {
        &self.artifact_key
    }

    pub fn environment_name(&self) -> &str {
        &self.environment_name
    }

    /// Handle a raw webhook body
    pub async fn handle(&self, body: &[u8]) -> Result<Outcome, BridgeError> {
        let request = BuildRequest::parse(body, &self.api_base).inspect_err(|e| {
            warn!(error = %e, "Rejected webhook payload");
        })?;
        self.handle_request(&request).await
    }

    /// Run the full sequence for a validated request
    #[instrument(
        skip(self, request),
        fields(
            invocation_id = %Uuid::new_v4(),
            repository = %request.repository_id(),
            revision = %request.revision(),
        )
    )]
    pub async fn handle_request(&self, request: &BuildRequest) -> Result<Outcome, BridgeError> {
        let started = Instant::now();

        match self.run_steps(request).await {
            Ok(outcome) => {
                info!(
                    build_id = %outcome.build_execution_id,
                    duration_ms = started.elapsed().as_millis() as u64,
                    "Build triggered"
                );
                Ok(outcome)
            }
            Err(e) => {
                error!(code = e.code(), error = %e, "Invocation aborted");
                Err(e)
            }
        }
    }

    async fn run_steps(&self, request: &BuildRequest) -> Result<Outcome, BridgeError> {
        // 1. Credential; dropped when this function returns
        let credential = self.secrets.resolve(&self.secret_name).await?;
        info!(backend = self.secrets.name(), "Credential resolved");

        // 2. Source snapshot
        let content = self.fetcher.fetch(request, &credential).await?;
        info!(bytes = content.len(), "Source archive downloaded");

        // 3. Stage under the deterministic key, replacing the previous snapshot
        let artifact = StagedArtifact::new(self.bucket.clone(), self.artifact_key.clone(), content);
        let ack = self
            .stager
            .put(&artifact.bucket, &artifact.key, artifact.content.clone())
            .await?;
        info!(
            bucket = %ack.bucket,
            key = %ack.key,
            bytes = ack.size_bytes,
            sha256 = %ack.sha256,
            "Artifact staged"
        );

        // 4. Build environment
        let source = SourceLocation::new(artifact.bucket.clone(), artifact.key.to_string());
        let environment = self
            .provisioner
            .ensure_exists(&self.environment_name, &source)
            .await?;
        info!(
            environment = %environment.name,
            provenance = ?environment.provenance,
            "Build environment ready"
        );

        // 5. Fire and forget
        let execution = self.builds.start(&environment.name).await?;

        Ok(Outcome {
            bucket: artifact.bucket,
            key: artifact.key.to_string(),
            build_execution_id: execution.id,
            environment_name: environment.name,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{EnvSecretProvider, GitLabArchiveFetcher, MemoryBuildService, MemoryObjectStore};
    use crate::config::{self, ConfigFile};
    use std::time::Duration;

    #[test]
    fn test_orchestrator_creation() {
        let env = |name: &str| match name {
            "SOURCE_BUCKET" => Some("bucket".to_string()),
            "CODEBUILD_SERVICE_ROLE" => Some("role".to_string()),
            "ENV_ACCOUNT_ID" => Some("1".to_string()),
            "ENV_REGION" => Some("r".to_string()),
            _ => None,
        };
        let config = config::resolve(ConfigFile::default(), None, env).unwrap();
        let service = Arc::new(MemoryBuildService::new());

        let orchestrator = Orchestrator::new(
            &config,
            Collaborators {
                secrets: Arc::new(EnvSecretProvider::new("UNUSED")),
                fetcher: Arc::new(GitLabArchiveFetcher::new(Duration::from_secs(1)).unwrap()),
                stager: Arc::new(MemoryObjectStore::new()),
                environments: service.clone(),
                builds: service,
            },
        );

        assert_eq!(orchestrator.bucket(), "bucket");
        assert_eq!(orchestrator.artifact_key().as_str(), "ip-demo/v1/source.zip");
        assert_eq!(orchestrator.environment_name(), "ip-demo");
        assert_eq!(orchestrator.provisioner.template().service_role, "role");
    }
}
