//! Error taxonomy for a single webhook invocation.
//!
//! Each collaborator has its own error enum. [`BridgeError`] wraps them so the
//! caller sees exactly one failure kind per aborted invocation, with a stable
//! code and an HTTP status attached.

use std::path::PathBuf;

use thiserror::Error;

/// Failure resolving the source-host credential
#[derive(Debug, Error)]
pub enum SecretError {
    /// No value is configured for the secret
    #[error("secret '{name}' is not set")]
    Missing { name: String },

    /// The secret resolved to an empty value
    #[error("secret '{name}' is empty")]
    Empty { name: String },

    /// The secret name cannot be mapped to a location
    #[error("invalid secret name '{name}'")]
    InvalidName { name: String },

    /// The backing file exists but could not be read
    #[error("failed to read secret '{name}' from {}", path.display())]
    Unreadable {
        name: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Failure downloading the repository snapshot
#[derive(Debug, Error)]
pub enum FetchError {
    /// The source host answered outside the 2xx range
    #[error("source host responded with status {status}")]
    Status { status: u16 },

    /// The download URL could not be derived from the configured API base
    #[error("invalid source URL: {0}")]
    InvalidUrl(String),

    /// Connection, TLS or body read failure
    #[error("transport error: {0}")]
    Transport(String),
}

impl FetchError {
    /// HTTP status returned by the source host, if the request got that far
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status } => Some(*status),
            _ => None,
        }
    }
}

/// Failure writing the staged artifact
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("invalid bucket '{bucket}': {reason}")]
    InvalidBucket { bucket: String, reason: &'static str },

    #[error("invalid object key '{key}': {reason}")]
    InvalidKey { key: String, reason: &'static str },

    #[error("I/O error on {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The store refused or could not process the write
    #[error("object store unavailable: {0}")]
    Unavailable(String),
}

/// Failure looking up or creating a build environment
#[derive(Debug, Clone, Error)]
pub enum ProvisionError {
    /// Creation lost a race against another creator of the same name.
    ///
    /// The provisioner reconciles this into a successful lookup; it only
    /// surfaces from the raw [`crate::adapters::ProvisionsEnvironments`] port.
    #[error("build environment '{name}' already exists")]
    AlreadyExists { name: String },

    #[error("permission denied: {message}")]
    Denied { message: String },

    #[error("build service responded with status {status}: {message}")]
    Service { status: u16, message: String },

    #[error("malformed build service response: {0}")]
    MalformedResponse(String),

    #[error("transport error: {0}")]
    Transport(String),
}

/// Build service client could not be constructed
#[derive(Debug, Error)]
pub enum EndpointError {
    #[error("invalid build service endpoint '{endpoint}': {reason}")]
    Invalid { endpoint: String, reason: String },

    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

/// Failure enqueueing a build execution
#[derive(Debug, Clone, Error)]
pub enum TriggerError {
    #[error("build environment '{name}' does not exist")]
    UnknownEnvironment { name: String },

    #[error("build service responded with status {status}: {message}")]
    Service { status: u16, message: String },

    #[error("malformed build service response: {0}")]
    MalformedResponse(String),

    #[error("transport error: {0}")]
    Transport(String),
}

/// The single outcome of an aborted invocation.
///
/// Every variant aborts the remaining steps. Nothing is rolled back: side
/// effects of earlier steps are reusable on the next delivery of the event.
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("invalid webhook payload: {0}")]
    InvalidRequest(String),

    #[error("failed to resolve credential: {0}")]
    Credential(#[from] SecretError),

    #[error("failed to fetch source: {0}")]
    SourceFetch(#[from] FetchError),

    #[error("failed to stage artifact: {0}")]
    Storage(#[from] StorageError),

    #[error("failed to provision build environment: {0}")]
    Provisioning(#[from] ProvisionError),

    #[error("failed to start build: {0}")]
    Trigger(#[from] TriggerError),
}

impl BridgeError {
    /// Stable machine-readable code used in error responses and logs
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidRequest(_) => "invalid_request",
            Self::Credential(_) => "credential_error",
            Self::SourceFetch(_) => "source_fetch_error",
            Self::Storage(_) => "storage_error",
            Self::Provisioning(_) => "provisioning_error",
            Self::Trigger(_) => "trigger_error",
        }
    }

    /// HTTP status the webhook answers with
    pub fn http_status(&self) -> u16 {
        match self {
            Self::InvalidRequest(_) => 400,
            Self::Credential(_) | Self::Storage(_) => 500,
            Self::SourceFetch(_) | Self::Provisioning(_) | Self::Trigger(_) => 502,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_are_distinct_per_kind() {
        let errors = [
            BridgeError::InvalidRequest("missing field".into()),
            BridgeError::from(SecretError::Missing { name: "t".into() }),
            BridgeError::from(FetchError::Status { status: 404 }),
            BridgeError::from(StorageError::Unavailable("down".into())),
            BridgeError::from(ProvisionError::Denied { message: "no".into() }),
            BridgeError::from(TriggerError::Transport("reset".into())),
        ];

        let mut codes: Vec<&str> = errors.iter().map(BridgeError::code).collect();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), errors.len());
    }

    #[test]
    fn test_http_status_mapping() {
        assert_eq!(BridgeError::InvalidRequest("x".into()).http_status(), 400);
        assert_eq!(
            BridgeError::from(FetchError::Status { status: 403 }).http_status(),
            502
        );
        assert_eq!(
            BridgeError::from(SecretError::Empty { name: "t".into() }).http_status(),
            500
        );
    }

    #[test]
    fn test_fetch_status_is_preserved() {
        let err = BridgeError::from(FetchError::Status { status: 404 });
        match err {
            BridgeError::SourceFetch(inner) => assert_eq!(inner.status(), Some(404)),
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(FetchError::Transport("eof".into()).status(), None);
    }
}
