//! Build service adapters.
//!
//! [`HttpBuildService`] speaks a small REST contract:
//!
//! | Call | Request | Success | Notable failures |
//! |------|---------|---------|------------------|
//! | lookup | `GET /projects/{name}` | 200 + definition | 404 = absent |
//! | create | `POST /projects` | 200/201 | 409 = duplicate name, 403 = denied |
//! | start | `POST /projects/{name}/builds` | 200/201/202 + `{"id": ...}` | 404 = unknown environment |
//!
//! [`MemoryBuildService`] implements the same ports in-process. It backs the
//! dry-run mode and the test suite.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{StatusCode, Url};
use serde::Deserialize;
use tracing::{debug, info};
use uuid::Uuid;

use super::{ProvisionsEnvironments, TriggersBuilds};
use crate::domain::{BuildEnvironment, BuildExecution};
use crate::error::{EndpointError, ProvisionError, TriggerError};

/// REST client for the build service
pub struct HttpBuildService {
    endpoint: Url,
    client: reqwest::Client,
}

/// Body returned when a build is accepted
#[derive(Debug, Deserialize)]
struct StartBuildResponse {
    id: String,
}

impl HttpBuildService {
    /// Create a client whose requests give up after `timeout`
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self, EndpointError> {
        let invalid = |reason: &str| EndpointError::Invalid {
            endpoint: endpoint.to_string(),
            reason: reason.to_string(),
        };

        let endpoint = Url::parse(endpoint).map_err(|e| invalid(&e.to_string()))?;
        if endpoint.cannot_be_a_base() {
            return Err(invalid("cannot be used as a base URL"));
        }

        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { endpoint, client })
    }

    /// Build API URL; each segment is percent-encoded on its own
    fn api_url(&self, segments: &[&str]) -> Url {
        let mut url = self.endpoint.clone();
        // new() rejects endpoints that cannot be a base
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }
}

/// Response body as text, for error messages
async fn error_text(response: reqwest::Response) -> String {
    response.text().await.unwrap_or_default().trim().to_string()
}

#[async_trait]
impl ProvisionsEnvironments for HttpBuildService {
    async fn lookup(&self, name: &str) -> Result<Option<BuildEnvironment>, ProvisionError> {
        let response = self
            .client
            .get(self.api_url(&["projects", name]))
            .send()
            .await
            .map_err(|e| ProvisionError::Transport(e.to_string()))?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => response
                .json::<BuildEnvironment>()
                .await
                .map(Some)
                .map_err(|e| ProvisionError::MalformedResponse(e.to_string())),
            StatusCode::FORBIDDEN | StatusCode::UNAUTHORIZED => Err(ProvisionError::Denied {
                message: error_text(response).await,
            }),
            status => Err(ProvisionError::Service {
                status: status.as_u16(),
                message: error_text(response).await,
            }),
        }
    }

    async fn create(&self, environment: &BuildEnvironment) -> Result<(), ProvisionError> {
        let response = self
            .client
            .post(self.api_url(&["projects"]))
            .json(environment)
            .send()
            .await
            .map_err(|e| ProvisionError::Transport(e.to_string()))?;

        match response.status() {
            status if status.is_success() => Ok(()),
            StatusCode::CONFLICT => Err(ProvisionError::AlreadyExists {
                name: environment.name.clone(),
            }),
            StatusCode::FORBIDDEN | StatusCode::UNAUTHORIZED => Err(ProvisionError::Denied {
                message: error_text(response).await,
            }),
            status => Err(ProvisionError::Service {
                status: status.as_u16(),
                message: error_text(response).await,
            }),
        }
    }
}

#[async_trait]
impl TriggersBuilds for HttpBuildService {
    async fn start(&self, environment_name: &str) -> Result<BuildExecution, TriggerError> {
        let response = self
            .client
            .post(self.api_url(&["projects", environment_name, "builds"]))
            .send()
            .await
            .map_err(|e| TriggerError::Transport(e.to_string()))?;

        match response.status() {
            status if status.is_success() => {
                let body: StartBuildResponse = response
                    .json()
                    .await
                    .map_err(|e| TriggerError::MalformedResponse(e.to_string()))?;
                Ok(BuildExecution::new(body.id, environment_name))
            }
            StatusCode::NOT_FOUND => Err(TriggerError::UnknownEnvironment {
                name: environment_name.to_string(),
            }),
            status => Err(TriggerError::Service {
                status: status.as_u16(),
                message: error_text(response).await,
            }),
        }
    }
}

/// In-process build service.
///
/// Keeps environment definitions in memory. Queued executions are only
/// counted, and the most recent one kept, so a long-running dry-run server
/// does not grow with every webhook.
#[derive(Debug, Default)]
pub struct MemoryBuildService {
    environments: Mutex<HashMap<String, BuildEnvironment>>,
    last_execution: Mutex<Option<BuildExecution>>,
    starts: AtomicUsize,
    /// Inserted right after the next lookup answers, as if a concurrent
    /// invocation created it between check and act
    racing_creation: Mutex<Option<BuildEnvironment>>,
    lookups: AtomicUsize,
    creates: AtomicUsize,
    deny_creates: AtomicBool,
    fail_starts: AtomicBool,
}

impl MemoryBuildService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an existing environment
    pub fn with_environment(self, environment: BuildEnvironment) -> Self {
        if let Ok(mut envs) = self.environments.lock() {
            envs.insert(environment.name.clone(), environment);
        }
        self
    }

    /// Simulate another creator winning the race for `environment.name`
    pub fn race_next_lookup(&self, environment: BuildEnvironment) {
        if let Ok(mut slot) = self.racing_creation.lock() {
            *slot = Some(environment);
        }
    }

    /// Refuse creation with a permission error
    pub fn set_deny_creates(&self, deny: bool) {
        self.deny_creates.store(deny, Ordering::SeqCst);
    }

    /// Reject build starts with a service error
    pub fn set_fail_starts(&self, fail: bool) {
        self.fail_starts.store(fail, Ordering::SeqCst);
    }

    pub fn environment(&self, name: &str) -> Option<BuildEnvironment> {
        self.environments.lock().ok()?.get(name).cloned()
    }

    /// Number of builds queued so far
    pub fn execution_count(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }

    pub fn last_execution(&self) -> Option<BuildExecution> {
        self.last_execution.lock().ok()?.clone()
    }

    pub fn lookup_count(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }

    /// Number of create calls, including rejected ones
    pub fn create_count(&self) -> usize {
        self.creates.load(Ordering::SeqCst)
    }
}

fn poisoned_provision() -> ProvisionError {
    ProvisionError::Service {
        status: 500,
        message: "lock poisoned".to_string(),
    }
}

#[async_trait]
impl ProvisionsEnvironments for MemoryBuildService {
    async fn lookup(&self, name: &str) -> Result<Option<BuildEnvironment>, ProvisionError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);

        let mut envs = self.environments.lock().map_err(|_| poisoned_provision())?;
        let found = envs.get(name).cloned();

        let racer = self
            .racing_creation
            .lock()
            .map_err(|_| poisoned_provision())?
            .take();
        if let Some(env) = racer {
            debug!(environment = %env.name, "Concurrent creation landed after lookup");
            envs.insert(env.name.clone(), env);
        }

        Ok(found)
    }

    async fn create(&self, environment: &BuildEnvironment) -> Result<(), ProvisionError> {
        self.creates.fetch_add(1, Ordering::SeqCst);

        if self.deny_creates.load(Ordering::SeqCst) {
            return Err(ProvisionError::Denied {
                message: format!("not allowed to create '{}'", environment.name),
            });
        }

        let mut envs = self.environments.lock().map_err(|_| poisoned_provision())?;
        if envs.contains_key(&environment.name) {
            return Err(ProvisionError::AlreadyExists {
                name: environment.name.clone(),
            });
        }
        envs.insert(environment.name.clone(), environment.clone());
        Ok(())
    }
}

#[async_trait]
impl TriggersBuilds for MemoryBuildService {
    async fn start(&self, environment_name: &str) -> Result<BuildExecution, TriggerError> {
        if self.fail_starts.load(Ordering::SeqCst) {
            return Err(TriggerError::Service {
                status: 503,
                message: "build queue unavailable".to_string(),
            });
        }

        let known = self
            .environments
            .lock()
            .map(|envs| envs.contains_key(environment_name))
            .unwrap_or(false);
        if !known {
            return Err(TriggerError::UnknownEnvironment {
                name: environment_name.to_string(),
            });
        }

        let execution = BuildExecution::new(
            format!("{}:{}", environment_name, Uuid::new_v4()),
            environment_name,
        );
        info!(build_id = %execution.id, "Build queued (in-memory)");

        self.starts.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut last) = self.last_execution.lock() {
            *last = Some(execution.clone());
        }
        Ok(execution)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ComputeShape, SourceLocation};

    fn definition(name: &str) -> BuildEnvironment {
        BuildEnvironment {
            name: name.to_string(),
            source: SourceLocation::new("bucket", "ip-demo/v1/source.zip"),
            buildspec: "version: 0.2\n".to_string(),
            compute: ComputeShape {
                environment_type: "LINUX_CONTAINER".to_string(),
                image: "aws/codebuild/standard:7.0".to_string(),
                compute_type: "BUILD_GENERAL1_SMALL".to_string(),
            },
            service_role: "role".to_string(),
            environment_variables: Vec::new(),
            tags: Vec::new(),
        }
    }

    fn client(endpoint: &str) -> HttpBuildService {
        HttpBuildService::new(endpoint, Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn test_api_url_trims_trailing_slash() {
        let service = client("http://builds.internal/v1/");
        assert_eq!(
            service.api_url(&["projects", "ip-demo"]).as_str(),
            "http://builds.internal/v1/projects/ip-demo"
        );
    }

    #[test]
    fn test_api_url_encodes_name() {
        let service = client("http://builds.internal");
        assert_eq!(
            service.api_url(&["projects", "demo?x#y%z", "builds"]).as_str(),
            "http://builds.internal/projects/demo%3Fx%23y%25z/builds"
        );
    }

    #[test]
    fn test_rejects_unusable_endpoint() {
        for endpoint in ["not a url", "mailto:builds@example.com"] {
            let result = HttpBuildService::new(endpoint, Duration::from_secs(5));
            assert!(matches!(result, Err(EndpointError::Invalid { .. })), "{endpoint}");
        }
    }

    #[tokio::test]
    async fn test_memory_duplicate_create() {
        let service = MemoryBuildService::new();
        service.create(&definition("ip-demo")).await.unwrap();

        let err = service.create(&definition("ip-demo")).await.unwrap_err();
        assert!(matches!(err, ProvisionError::AlreadyExists { .. }));
        assert_eq!(service.create_count(), 2);
    }

    #[tokio::test]
    async fn test_memory_race_lands_after_lookup() {
        let service = MemoryBuildService::new();
        service.race_next_lookup(definition("ip-demo"));

        assert!(service.lookup("ip-demo").await.unwrap().is_none());
        assert!(service.environment("ip-demo").is_some());
    }

    #[tokio::test]
    async fn test_memory_start_requires_environment() {
        let service = MemoryBuildService::new();
        let err = service.start("missing").await.unwrap_err();
        assert!(matches!(err, TriggerError::UnknownEnvironment { .. }));

        let service = service.with_environment(definition("ip-demo"));
        let first = service.start("ip-demo").await.unwrap();
        let second = service.start("ip-demo").await.unwrap();

        assert_ne!(first.id, second.id);
        assert!(first.id.starts_with("ip-demo:"));
        assert_eq!(service.execution_count(), 2);
        assert_eq!(service.last_execution(), Some(second));
    }
}
