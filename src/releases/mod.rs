// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! GitHub release listing.
//!
//! Thin client over `GET /repos/{owner}/{repo}/releases`. Every call goes to
//! the network; there is no caching and no retry, so each resolution sees the
//! current release state.
//!
//! # Example
//!
//! ```no_run
//! use release_proxy::config::Config;
//! use release_proxy::releases::ReleaseClient;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = Config::new("acme");
//! let client = ReleaseClient::new(reqwest::Client::new(), &config);
//!
//! let releases = client.list_releases("acme", "tool").await?;
//! println!("{} releases", releases.len());
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

use reqwest::header::{ACCEPT, AUTHORIZATION, USER_AGENT};
use reqwest::StatusCode;
use thiserror::Error;

use crate::config::Config;
use crate::types::Release;

/// Default GitHub REST API endpoint.
pub const DEFAULT_API_URL: &str = "https://api.github.com";

/// Releases requested per listing call. Only the first page is read.
const PER_PAGE: u32 = 100;

const GITHUB_MEDIA_TYPE: &str = "application/vnd.github+json";

/// Error types specific to release listing.
#[derive(Debug, Error)]
pub enum ListError {
    /// DNS, connection or timeout failure.
    #[error("error listing releases: {0}")]
    Network(#[source] reqwest::Error),

    /// The API answered with a non-success status (e.g. bad credentials).
    #[error("GitHub API returned {status}: {message}")]
    Status { status: StatusCode, message: String },

    /// The response body was not a release list.
    #[error("invalid release list: {0}")]
    Decode(#[source] reqwest::Error),
}

/// Client for the release listing API.
#[derive(Debug, Clone)]
pub struct ReleaseClient {
    /// Shared HTTP client with pooled connections.
    client: reqwest::Client,
    /// Base URL for the REST API.
    api_url: String,
    /// Access token, sent as a bearer token when present.
    token: Option<String>,
    /// Request timeout.
    timeout: Duration,
}

impl ReleaseClient {
    /// Create a client on top of a shared `reqwest::Client`.
    pub fn new(client: reqwest::Client, config: &Config) -> Self {
        Self {
            client,
            api_url: config.api_url.trim_end_matches('/').to_string(),
            token: config.token.clone(),
            timeout: config.listing_timeout,
        }
    }

    /// List the releases of `owner/repo`, most recent first.
    ///
    /// Only the first page is read: the `PER_PAGE` (100) newest releases.
    /// `Link` pagination is not followed, so an older tag is not found and
    /// its download request ends in a 404.
    pub async fn list_releases(&self, owner: &str, repo: &str) -> Result<Vec<Release>, ListError> {
        let url = format!("{}/repos/{}/{}/releases", self.api_url, owner, repo);

        let mut request = self
            .client
            .get(&url)
            .query(&[("per_page", PER_PAGE)])
            .header(ACCEPT, GITHUB_MEDIA_TYPE)
            .header(USER_AGENT, concat!("release-proxy/", env!("CARGO_PKG_VERSION")))
            .timeout(self.timeout);

        if let Some(ref token) = self.token {
            request = request.header(AUTHORIZATION, format!("Bearer {}", token));
        }

        let response = request.send().await.map_err(ListError::Network)?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .text()
                .await
                .ok()
                .and_then(|body| api_message(&body))
                .unwrap_or_else(|| status.canonical_reason().unwrap_or("error").to_string());
            return Err(ListError::Status { status, message });
        }

        let releases: Vec<Release> = response.json().await.map_err(ListError::Decode)?;
        tracing::debug!(owner = %owner, repo = %repo, count = releases.len(), "listed releases");

        Ok(releases)
    }
}

/// Pull the `message` field out of a GitHub error body.
fn api_message(body: &str) -> Option<String> {
    #[derive(serde::Deserialize)]
    struct ApiError {
        message: String,
    }

    serde_json::from_str::<ApiError>(body).ok().map(|e| e.message)
}
