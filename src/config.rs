// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Process configuration.
//!
//! Built once in `main` from command-line flags (each with an environment
//! fallback), validated, then shared read-only with every request handler.

use std::time::Duration;

use anyhow::{bail, Result};
use reqwest::Url;

use crate::asset::DEFAULT_DOWNLOAD_URL;
use crate::releases::DEFAULT_API_URL;

/// Default listening port.
pub const DEFAULT_PORT: u16 = 8787;

/// Default timeout for a release listing call (in seconds).
pub const DEFAULT_LISTING_TIMEOUT_SECS: u64 = 30;

/// Default timeout for establishing an upstream connection (in seconds).
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Immutable process-wide configuration.
#[derive(Clone)]
pub struct Config {
    /// Port to listen on.
    pub port: u16,
    /// Address to bind to.
    pub bind_address: String,
    /// Owner (user or organization) of every proxied repository.
    pub owner: String,
    /// Access token for the release listing API.
    pub token: Option<String>,
    /// Base URL of the release listing API.
    pub api_url: String,
    /// Base URL of the host serving release assets.
    pub download_url: String,
    /// Upper bound on one release listing call.
    pub listing_timeout: Duration,
    /// Upper bound on connecting to either upstream. Asset bodies themselves
    /// have no total timeout since they may be arbitrarily large.
    pub connect_timeout: Duration,
}

impl Config {
    /// Configuration for `owner` with every other setting at its default.
    pub fn new(owner: impl Into<String>) -> Self {
        Self {
            port: DEFAULT_PORT,
            bind_address: "0.0.0.0".to_string(),
            owner: owner.into(),
            token: None,
            api_url: DEFAULT_API_URL.to_string(),
            download_url: DEFAULT_DOWNLOAD_URL.to_string(),
            listing_timeout: Duration::from_secs(DEFAULT_LISTING_TIMEOUT_SECS),
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn with_api_url(mut self, url: impl Into<String>) -> Self {
        self.api_url = url.into();
        self
    }

    pub fn with_download_url(mut self, url: impl Into<String>) -> Self {
        self.download_url = url.into();
        self
    }

    /// Reject configurations the server cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.owner.trim().is_empty() {
            bail!("owner must not be empty (set --owner or GITHUB_OWNER)");
        }
        if self.owner.contains('/') {
            bail!("owner must be a single path segment, got '{}'", self.owner);
        }
        for (name, url) in [("api-url", &self.api_url), ("download-url", &self.download_url)] {
            let valid = Url::parse(url)
                .map(|u| matches!(u.scheme(), "http" | "https"))
                .unwrap_or(false);
            if !valid {
                bail!("--{} must be an http(s) URL, got '{}'", name, url);
            }
        }
        Ok(())
    }

    /// The access token, masked for logging.
    ///
    /// Shows only the first few characters so the token is never logged in
    /// full. Tokens too short to keep anything hidden are masked entirely.
    pub fn token_masked(&self) -> Option<String> {
        self.token.as_ref().map(|token| {
            if token.chars().count() <= 4 {
                return "***".to_string();
            }
            let prefix: String = token.chars().take(4).collect();
            format!("{}...", prefix)
        })
    }
}

// Keep the token out of debug output.
impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("port", &self.port)
            .field("bind_address", &self.bind_address)
            .field("owner", &self.owner)
            .field("token", &self.token_masked())
            .field("api_url", &self.api_url)
            .field("download_url", &self.download_url)
            .field("listing_timeout", &self.listing_timeout)
            .field("connect_timeout", &self.connect_timeout)
            .finish()
    }
}
