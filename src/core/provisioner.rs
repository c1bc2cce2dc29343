//! Idempotent build environment provisioning.
//!
//! `ensure_exists` is a lookup followed by a create. The pair is not atomic:
//! two first-time invocations can both see "absent" and both create. The
//! build service's own name uniqueness settles the race, and the loser's
//! duplicate-name error is treated exactly like a successful lookup.
//!
//! An environment that already exists is never updated, even when its stored
//! source location or tags differ from the current configuration.

use std::sync::Arc;

use tracing::{debug, info, instrument, warn};

use crate::adapters::ProvisionsEnvironments;
use crate::config::BridgeConfig;
use crate::domain::{
    BuildEnvironment, ComputeShape, EnvironmentRef, EnvironmentVariable, Provenance,
    SourceLocation, Tag,
};
use crate::error::ProvisionError;

/// Everything about a new environment except its name and source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvironmentTemplate {
    pub compute: ComputeShape,
    pub service_role: String,
    pub environment_variables: Vec<EnvironmentVariable>,
    pub tags: Vec<Tag>,
    pub buildspec: String,
}

impl EnvironmentTemplate {
    pub fn from_config(config: &BridgeConfig) -> Self {
        Self {
            compute: config.build.compute_shape(),
            service_role: config.build.service_role.clone(),
            environment_variables: config.build.environment_variables(),
            tags: config.tags.to_tags(),
            buildspec: config.build.buildspec.clone(),
        }
    }

    /// Full definition for `name` reading from `source`
    pub fn render(&self, name: &str, source: &SourceLocation) -> BuildEnvironment {
        BuildEnvironment {
            name: name.to_string(),
            source: source.clone(),
            buildspec: self.buildspec.clone(),
            compute: self.compute.clone(),
            service_role: self.service_role.clone(),
            environment_variables: self.environment_variables.clone(),
            tags: self.tags.clone(),
        }
    }
}

/// Ensures the named build environment exists, creating it at most once
pub struct Provisioner {
    service: Arc<dyn ProvisionsEnvironments>,
    template: EnvironmentTemplate,
}

impl Provisioner {
    pub fn new(service: Arc<dyn ProvisionsEnvironments>, template: EnvironmentTemplate) -> Self {
        Self { service, template }
    }

    pub fn template(&self) -> &EnvironmentTemplate {
        &self.template
    }

    /// Look the environment up; create it if absent.
    ///
    /// Creation failures other than a duplicate name are returned as-is and
    /// never retried here.
    #[instrument(skip(self, source), fields(environment = %name))]
    pub async fn ensure_exists(
        &self,
        name: &str,
        source: &SourceLocation,
    ) -> Result<EnvironmentRef, ProvisionError> {
        if let Some(existing) = self.service.lookup(name).await? {
            if existing.source != *source {
                debug!(
                    stored = %existing.source,
                    requested = %source,
                    "Existing environment reads a different source; leaving it unchanged"
                );
            }
            debug!("Build environment found");
            return Ok(EnvironmentRef::new(name, Provenance::Existing));
        }

        let definition = self.template.render(name, source);
        match self.service.create(&definition).await {
            Ok(()) => {
                info!(source = %source, "Created build environment");
                Ok(EnvironmentRef::new(name, Provenance::Created))
            }
            Err(ProvisionError::AlreadyExists { .. }) => {
                warn!("Build environment was created concurrently; reusing it");
                Ok(EnvironmentRef::new(name, Provenance::AdoptedAfterConflict))
            }
            Err(e) => Err(e),
        }
    }
}
