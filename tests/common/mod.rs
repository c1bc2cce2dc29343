//! Shared fakes for integration tests.
//!
//! Every collaborator is in-process and counts its calls, so tests can assert
//! which steps of an invocation ran.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use serde_json::json;

use pushbuild::adapters::{
    Collaborators, FetchesSource, MemoryBuildService, MemoryObjectStore, ProvidesSecrets, Secret,
};
use pushbuild::config::{self, BridgeConfig, ConfigFile};
use pushbuild::domain::BuildRequest;
use pushbuild::error::{FetchError, SecretError};
use pushbuild::Orchestrator;

pub const BUCKET: &str = "mlops-cicd-source";
pub const TOKEN: &str = "glpat-test-token";

/// Webhook body in the shape the source host sends
pub fn push_event(project_id: u64, branch: &str) -> Vec<u8> {
    serde_json::to_vec(&json!({
        "object_kind": "push",
        "project": {
            "id": project_id,
            "name": "demo",
            "default_branch": branch,
        },
    }))
    .unwrap()
}

/// Resolved configuration with only the required settings supplied
pub fn test_config() -> BridgeConfig {
    let env: HashMap<&str, &str> = HashMap::from([
        ("SOURCE_BUCKET", BUCKET),
        ("CODEBUILD_SERVICE_ROLE", "arn:aws:iam::000000000000:role/build"),
        ("ENV_ACCOUNT_ID", "000000000000"),
        ("ENV_REGION", "us-east-1"),
    ]);
    config::resolve(ConfigFile::default(), None, |name| {
        env.get(name).map(|v| v.to_string())
    })
    .unwrap()
}

/// Secret provider holding a fixed value (or none)
pub struct StaticSecrets {
    value: Option<String>,
    calls: AtomicUsize,
}

impl StaticSecrets {
    pub fn new(value: Option<&str>) -> Self {
        Self {
            value: value.map(str::to_string),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProvidesSecrets for StaticSecrets {
    fn name(&self) -> &str {
        "static"
    }

    async fn resolve(&self, name: &str) -> Result<Secret, SecretError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.value {
            Some(value) => Ok(Secret::new(name, value.clone())),
            None => Err(SecretError::Missing {
                name: name.to_string(),
            }),
        }
    }
}

/// Source fetcher answering every request the same way
pub struct StaticFetcher {
    response: Mutex<Result<Bytes, u16>>,
    calls: AtomicUsize,
    seen: Mutex<Vec<(String, String)>>,
}

impl StaticFetcher {
    pub fn serving(content: &'static [u8]) -> Self {
        Self::with_response(Ok(Bytes::from_static(content)))
    }

    pub fn failing(status: u16) -> Self {
        Self::with_response(Err(status))
    }

    fn with_response(response: Result<Bytes, u16>) -> Self {
        Self {
            response: Mutex::new(response),
            calls: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
        }
    }

    /// Serve different bytes from now on
    pub fn set_content(&self, content: &'static [u8]) {
        *self.response.lock().unwrap() = Ok(Bytes::from_static(content));
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// (download URL, credential) of every call so far
    pub fn seen(&self) -> Vec<(String, String)> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl FetchesSource for StaticFetcher {
    async fn fetch(&self, request: &BuildRequest, credential: &Secret) -> Result<Bytes, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().unwrap().push((
            request.source_download_url().to_string(),
            credential.expose().to_string(),
        ));

        match &*self.response.lock().unwrap() {
            Ok(content) => Ok(content.clone()),
            Err(status) => Err(FetchError::Status { status: *status }),
        }
    }
}

/// An orchestrator wired to in-memory collaborators
pub struct Harness {
    pub secrets: Arc<StaticSecrets>,
    pub fetcher: Arc<StaticFetcher>,
    pub store: Arc<MemoryObjectStore>,
    pub builds: Arc<MemoryBuildService>,
    pub orchestrator: Arc<Orchestrator>,
}

impl Harness {
    pub fn new(fetcher: StaticFetcher) -> Self {
        Self::build(
            StaticSecrets::new(Some(TOKEN)),
            fetcher,
            MemoryBuildService::new(),
        )
    }

    pub fn build(secrets: StaticSecrets, fetcher: StaticFetcher, builds: MemoryBuildService) -> Self {
        let secrets = Arc::new(secrets);
        let fetcher = Arc::new(fetcher);
        let store = Arc::new(MemoryObjectStore::new());
        let builds = Arc::new(builds);

        let collaborators = Collaborators {
            secrets: secrets.clone(),
            fetcher: fetcher.clone(),
            stager: store.clone(),
            environments: builds.clone(),
            builds: builds.clone(),
        };
        let orchestrator = Arc::new(Orchestrator::new(&test_config(), collaborators));

        Self {
            secrets,
            fetcher,
            store,
            builds,
            orchestrator,
        }
    }
}
