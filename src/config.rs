//! Configuration for the bridge.
//!
//! Configuration sources (highest priority first):
//! 1. Environment variables (SOURCE_BUCKET, CODEBUILD_SERVICE_ROLE, ...)
//! 2. Config file (--config / PUSHBUILD_CONFIG, else .pushbuild/config.yaml)
//! 3. Defaults
//!
//! Config file discovery:
//! - Searches current directory and parents for .pushbuild/config.yaml
//! - Relative paths in a discovered file resolve against the project root
//!   (the parent of .pushbuild/); in an explicit file, against its directory
//!
//! The resolved [`BridgeConfig`] is built once at startup and injected into
//! the orchestrator; nothing reads the environment ad hoc afterwards.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use reqwest::Url;
use serde::{Deserialize, Serialize};

use crate::adapters::gitlab::DEFAULT_API_BASE;
use crate::domain::{ArtifactKey, ComputeShape, EnvironmentVariable, Tag};

const DEFAULT_PROJECT_NAME: &str = "ip-demo";
const DEFAULT_ARTIFACT_SCHEMA: &str = "v1";
const DEFAULT_SECRET_NAME: &str = "/mlops/gitlab-token";
const DEFAULT_SECRET_ENV_VAR: &str = "PUSHBUILD_SOURCE_TOKEN";
const DEFAULT_SECRET_DIR: &str = "/run/secrets";
const DEFAULT_SOURCE_TIMEOUT_SECONDS: u64 = 300;
const DEFAULT_BUILD_TIMEOUT_SECONDS: u64 = 30;
const DEFAULT_ENVIRONMENT_TYPE: &str = "LINUX_CONTAINER";
const DEFAULT_IMAGE: &str = "aws/codebuild/standard:7.0";
const DEFAULT_COMPUTE_TYPE: &str = "BUILD_GENERAL1_SMALL";
const DEFAULT_BUILDSPEC: &str = "version: 0.2\nphases:\n  # run commands here\n";
const DEFAULT_ADDRESS: &str = "0.0.0.0:8080";
const DEFAULT_WEBHOOK_PATH: &str = "/webhook";

/// Raw config file schema (matches YAML structure)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigFile {
    pub project_name: Option<String>,
    pub artifact_schema: Option<String>,
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub secrets: SecretsConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub build: BuildConfig,
    #[serde(default)]
    pub tags: TagsConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SourceConfig {
    pub api_base: Option<String>,
    pub secret_name: Option<String>,
    pub timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SecretsConfig {
    /// `env` or `file`
    pub backend: Option<String>,
    pub env_var: Option<String>,
    pub dir: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StorageConfig {
    pub bucket: Option<String>,
    /// Directory buckets live under (relative to the config file)
    pub root: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BuildConfig {
    pub endpoint: Option<String>,
    pub timeout_seconds: Option<u64>,
    pub service_role: Option<String>,
    pub account_id: Option<String>,
    pub region: Option<String>,
    pub environment_type: Option<String>,
    pub image: Option<String>,
    pub compute_type: Option<String>,
    pub buildspec: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TagsConfig {
    pub environment: Option<String>,
    pub project: Option<String>,
    pub owner: Option<String>,
    pub cost_center: Option<String>,
    pub application: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServerConfig {
    pub address: Option<String>,
    pub path: Option<String>,
}

/// Resolved configuration
#[derive(Debug, Clone, Serialize)]
pub struct BridgeConfig {
    /// Names the build environment and prefixes the artifact key
    pub project_name: String,
    pub artifact_schema: String,
    pub source: SourceSettings,
    pub secrets: SecretBackend,
    pub storage: StorageSettings,
    pub build: BuildSettings,
    pub tags: TagSettings,
    pub server: ServerSettings,
    /// Path to config file (if found)
    pub config_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SourceSettings {
    pub api_base: String,
    pub secret_name: String,
    pub timeout_seconds: u64,
}

/// Where the source-host credential is read from
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "backend", rename_all = "snake_case")]
pub enum SecretBackend {
    Env { var: String },
    File { dir: PathBuf },
}

#[derive(Debug, Clone, Serialize)]
pub struct StorageSettings {
    pub bucket: String,
    pub root: PathBuf,
}

#[derive(Debug, Clone, Serialize)]
pub struct BuildSettings {
    /// `None` selects the in-memory dry-run build service
    pub endpoint: Option<String>,
    /// Per-request timeout for build service calls
    pub timeout_seconds: u64,
    pub service_role: String,
    pub account_id: String,
    pub region: String,
    pub environment_type: String,
    pub image: String,
    pub compute_type: String,
    pub buildspec: String,
}

impl BuildSettings {
    pub fn compute_shape(&self) -> ComputeShape {
        ComputeShape {
            environment_type: self.environment_type.clone(),
            image: self.image.clone(),
            compute_type: self.compute_type.clone(),
        }
    }

    /// Variables every build sees
    pub fn environment_variables(&self) -> Vec<EnvironmentVariable> {
        vec![
            EnvironmentVariable::new("AWS_ACCOUNT_ID", &self.account_id),
            EnvironmentVariable::new("AWS_DEFAULT_REGION", &self.region),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TagSettings {
    pub environment: String,
    pub project: String,
    pub owner: String,
    pub cost_center: String,
    pub application: String,
}

impl Default for TagSettings {
    fn default() -> Self {
        Self {
            environment: "dev".to_string(),
            project: "GenericProject".to_string(),
            owner: "eflores".to_string(),
            cost_center: "TI-ML".to_string(),
            application: "default_app".to_string(),
        }
    }
}

impl TagSettings {
    pub fn to_tags(&self) -> Vec<Tag> {
        vec![
            Tag::new("Environment", &self.environment),
            Tag::new("Project", &self.project),
            Tag::new("Owner", &self.owner),
            Tag::new("CostCenter", &self.cost_center),
            Tag::new("Application", &self.application),
        ]
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ServerSettings {
    pub address: String,
    pub path: String,
}

impl BridgeConfig {
    /// Deterministic key the snapshot is staged under
    pub fn artifact_key(&self) -> ArtifactKey {
        ArtifactKey::for_project(&self.project_name, &self.artifact_schema)
    }

    /// Name of the single build environment this deployment manages
    pub fn environment_name(&self) -> &str {
        &self.project_name
    }
}

/// Find config file by searching current directory and parents
fn find_config_file() -> Option<PathBuf> {
    let mut current = std::env::current_dir().ok()?;

    loop {
        let config_path = current.join(".pushbuild").join("config.yaml");
        if config_path.exists() {
            return Some(config_path);
        }

        if !current.pop() {
            break;
        }
    }

    None
}

/// Load and parse config file
pub fn load_config_file(path: &Path) -> Result<ConfigFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Resolve a path that may be relative to the config file's directory
fn resolve_path(base: Option<&Path>, path_str: &str) -> PathBuf {
    let path = PathBuf::from(path_str);
    match base {
        Some(base) if path.is_relative() => base.join(path),
        _ => path,
    }
}

/// Project root for a discovered `.pushbuild/config.yaml`, else the file's directory
fn config_base_dir(config_file: &Path) -> Option<&Path> {
    let dir = config_file.parent()?;
    if dir.file_name().is_some_and(|name| name == ".pushbuild") {
        dir.parent()
    } else {
        Some(dir)
    }
}

fn default_storage_root() -> PathBuf {
    dirs::home_dir()
        .map(|home| home.join(".pushbuild").join("buckets"))
        .unwrap_or_else(|| PathBuf::from(".pushbuild").join("buckets"))
}

/// Load configuration from all sources using the process environment
pub fn load(explicit: Option<&Path>) -> Result<BridgeConfig> {
    let config_path = match explicit {
        Some(path) => Some(path.to_path_buf()),
        None => find_config_file(),
    };

    let file = match &config_path {
        Some(path) => load_config_file(path)?,
        None => ConfigFile::default(),
    };

    resolve(file, config_path, |name| std::env::var(name).ok())
}

/// Merge a parsed file with environment overrides and defaults
pub fn resolve<F>(file: ConfigFile, config_file: Option<PathBuf>, env: F) -> Result<BridgeConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let base_dir = config_file.as_deref().and_then(config_base_dir);
    let env_or = |name: &str, file_value: Option<String>| -> Option<String> {
        env(name).filter(|v| !v.is_empty()).or(file_value)
    };

    let project_name = file
        .project_name
        .unwrap_or_else(|| DEFAULT_PROJECT_NAME.to_string());
    let artifact_schema = file
        .artifact_schema
        .unwrap_or_else(|| DEFAULT_ARTIFACT_SCHEMA.to_string());

    let source = SourceSettings {
        api_base: file
            .source
            .api_base
            .unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
        secret_name: file
            .source
            .secret_name
            .unwrap_or_else(|| DEFAULT_SECRET_NAME.to_string()),
        timeout_seconds: file
            .source
            .timeout_seconds
            .unwrap_or(DEFAULT_SOURCE_TIMEOUT_SECONDS),
    };

    let secrets = match file.secrets.backend.as_deref().unwrap_or("env") {
        "env" => SecretBackend::Env {
            var: file
                .secrets
                .env_var
                .unwrap_or_else(|| DEFAULT_SECRET_ENV_VAR.to_string()),
        },
        "file" => SecretBackend::File {
            dir: file
                .secrets
                .dir
                .map(|d| resolve_path(base_dir, &d))
                .unwrap_or_else(|| PathBuf::from(DEFAULT_SECRET_DIR)),
        },
        other => anyhow::bail!("Unknown secrets backend '{}' (expected 'env' or 'file')", other),
    };

    let storage = StorageSettings {
        bucket: env_or("SOURCE_BUCKET", file.storage.bucket)
            .context("Source bucket is required (SOURCE_BUCKET or storage.bucket)")?,
        root: env_or("PUSHBUILD_STORAGE_ROOT", file.storage.root)
            .map(|r| resolve_path(base_dir, &r))
            .unwrap_or_else(default_storage_root),
    };

    let build = BuildSettings {
        endpoint: env_or("PUSHBUILD_BUILD_ENDPOINT", file.build.endpoint),
        timeout_seconds: file
            .build
            .timeout_seconds
            .unwrap_or(DEFAULT_BUILD_TIMEOUT_SECONDS),
        service_role: env_or("CODEBUILD_SERVICE_ROLE", file.build.service_role)
            .context("Build service role is required (CODEBUILD_SERVICE_ROLE or build.service_role)")?,
        account_id: env_or("ENV_ACCOUNT_ID", file.build.account_id)
            .context("Account id is required (ENV_ACCOUNT_ID or build.account_id)")?,
        region: env_or("ENV_REGION", file.build.region)
            .context("Region is required (ENV_REGION or build.region)")?,
        environment_type: file
            .build
            .environment_type
            .unwrap_or_else(|| DEFAULT_ENVIRONMENT_TYPE.to_string()),
        image: file.build.image.unwrap_or_else(|| DEFAULT_IMAGE.to_string()),
        compute_type: file
            .build
            .compute_type
            .unwrap_or_else(|| DEFAULT_COMPUTE_TYPE.to_string()),
        buildspec: file
            .build
            .buildspec
            .unwrap_or_else(|| DEFAULT_BUILDSPEC.to_string()),
    };

    let defaults = TagSettings::default();
    let tags = TagSettings {
        environment: env_or("TAG_ENVIRONMENT", file.tags.environment).unwrap_or(defaults.environment),
        project: env_or("TAG_PROJECT", file.tags.project).unwrap_or(defaults.project),
        owner: env_or("TAG_OWNER", file.tags.owner).unwrap_or(defaults.owner),
        cost_center: env_or("TAG_COST_CENTER", file.tags.cost_center).unwrap_or(defaults.cost_center),
        application: env_or("TAG_APPLICATION", file.tags.application).unwrap_or(defaults.application),
    };

    let server = ServerSettings {
        address: file
            .server
            .address
            .unwrap_or_else(|| DEFAULT_ADDRESS.to_string()),
        path: file
            .server
            .path
            .unwrap_or_else(|| DEFAULT_WEBHOOK_PATH.to_string()),
    };

    let config = BridgeConfig {
        project_name,
        artifact_schema,
        source,
        secrets,
        storage,
        build,
        tags,
        server,
        config_file,
    };
    validate(&config)?;
    Ok(config)
}

fn validate(config: &BridgeConfig) -> Result<()> {
    let is_segment = |s: &str| !s.is_empty() && !s.contains('/') && s != "." && s != "..";

    if !is_segment(&config.project_name) {
        anyhow::bail!("project_name '{}' must be a single path segment", config.project_name);
    }
    if !is_segment(&config.artifact_schema) {
        anyhow::bail!(
            "artifact_schema '{}' must be a single path segment",
            config.artifact_schema
        );
    }
    if !config.server.path.starts_with('/') {
        anyhow::bail!("server.path '{}' must start with '/'", config.server.path);
    }
    if config.source.timeout_seconds == 0 {
        anyhow::bail!("source.timeout_seconds must be greater than zero");
    }
    if config.build.timeout_seconds == 0 {
        anyhow::bail!("build.timeout_seconds must be greater than zero");
    }

    check_base_url("source.api_base", &config.source.api_base)?;
    if let Some(endpoint) = &config.build.endpoint {
        check_base_url("build.endpoint", endpoint)?;
    }
    Ok(())
}

/// URLs that further path segments get appended to
fn check_base_url(field: &str, value: &str) -> Result<()> {
    let url = Url::parse(value).with_context(|| format!("{} '{}' is not a valid URL", field, value))?;
    if url.cannot_be_a_base() {
        anyhow::bail!("{} '{}' cannot be used as a base URL", field, value);
    }
    Ok(())
}
