//! Secret providers for the source-host credential.
//!
//! Secrets are resolved fresh on every invocation and dropped when the
//! invocation returns. Nothing here caches a value.

use std::fmt;
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;

use super::ProvidesSecrets;
use crate::error::SecretError;

/// A resolved credential. `Debug` never prints the value.
#[derive(Clone)]
pub struct Secret {
    name: String,
    value: String,
}

impl Secret {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The raw value, for attaching to an outbound request
    pub fn expose(&self) -> &str {
        &self.value
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Secret")
            .field("name", &self.name)
            .field("value", &"<redacted>")
            .finish()
    }
}

/// Normalise a raw value: strip the trailing newline files usually carry
fn finish(name: &str, raw: &str) -> Result<Secret, SecretError> {
    let value = raw.trim_end_matches(['\r', '\n']);
    if value.trim().is_empty() {
        return Err(SecretError::Empty {
            name: name.to_string(),
        });
    }
    Ok(Secret::new(name, value))
}

/// Reads the credential from one environment variable
pub struct EnvSecretProvider {
    var: String,
}

impl EnvSecretProvider {
    pub fn new(var: impl Into<String>) -> Self {
        Self { var: var.into() }
    }
}

#[async_trait]
impl ProvidesSecrets for EnvSecretProvider {
    fn name(&self) -> &str {
        "env"
    }

    async fn resolve(&self, name: &str) -> Result<Secret, SecretError> {
        let raw = std::env::var(&self.var).map_err(|_| SecretError::Missing {
            name: name.to_string(),
        })?;
        finish(name, &raw)
    }
}

/// Reads mounted secrets: `/mlops/gitlab-token` maps to `<dir>/mlops/gitlab-token`
pub struct FileSecretProvider {
    dir: PathBuf,
}

impl FileSecretProvider {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, name: &str) -> Result<PathBuf, SecretError> {
        let relative = Path::new(name.trim_start_matches('/'));
        let valid = !relative.as_os_str().is_empty()
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)));

        if !valid {
            return Err(SecretError::InvalidName {
                name: name.to_string(),
            });
        }
        Ok(self.dir.join(relative))
    }
}

#[async_trait]
impl ProvidesSecrets for FileSecretProvider {
    fn name(&self) -> &str {
        "file"
    }

    async fn resolve(&self, name: &str) -> Result<Secret, SecretError> {
        let path = self.path_for(name)?;

        match tokio::fs::read_to_string(&path).await {
            Ok(raw) => finish(name, &raw),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(SecretError::Missing {
                name: name.to_string(),
            }),
            Err(source) => Err(SecretError::Unreadable {
                name: name.to_string(),
                path,
                source,
            }),
        }
    }
}
