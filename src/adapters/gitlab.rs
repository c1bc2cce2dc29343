//! GitLab repository archive download.
//!
//! Endpoint: GET /projects/:id/repository/archive.zip?sha=:ref
//! Auth: `PRIVATE-TOKEN` header

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tracing::debug;

use super::{FetchesSource, Secret};
use crate::domain::BuildRequest;
use crate::error::FetchError;

/// Default GitLab REST API base
pub const DEFAULT_API_BASE: &str = "https://gitlab.com/api/v4";

/// Header GitLab reads personal and project access tokens from
pub const TOKEN_HEADER: &str = "PRIVATE-TOKEN";

/// Archive fetcher for GitLab-compatible hosts
pub struct GitLabArchiveFetcher {
    client: reqwest::Client,
}

impl GitLabArchiveFetcher {
    /// Create a fetcher whose requests give up after `timeout`
    pub fn new(timeout: Duration) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| FetchError::Transport(e.to_string()))?;

        Ok(Self { client })
    }
}

#[async_trait]
impl FetchesSource for GitLabArchiveFetcher {
    async fn fetch(&self, request: &BuildRequest, credential: &Secret) -> Result<Bytes, FetchError> {
        debug!(url = %request.source_download_url(), "Downloading repository archive");

        let response = self
            .client
            .get(request.source_download_url())
            .header(TOKEN_HEADER, credential.expose())
            .send()
            .await
            .map_err(|e| FetchError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
            });
        }

        response
            .bytes()
            .await
            .map_err(|e| FetchError::Transport(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetcher_creation() {
        assert!(GitLabArchiveFetcher::new(Duration::from_secs(5)).is_ok());
    }

    // Note: request/response behaviour is covered against a stub server in tests/
}
