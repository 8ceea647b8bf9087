// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Asset path construction.
//!
//! Two filename conventions are supported:
//!
//! - generic: `{repo}_{version}.{ext}`
//! - platform: `{repo}_{version}_{os}_{arch}.{ext}`
//!
//! `version` is the normalized tag (leading `v` stripped). The canonical tag,
//! marker included, is used for the `releases/download/<tag>` path segment.
//! Every segment is percent-encoded, so a tag like `v1.0#rc` stays in the path.

use reqwest::Url;

use crate::types::{normalize, Platform};

/// Default host serving release assets.
pub const DEFAULT_DOWNLOAD_URL: &str = "https://github.com";

/// Everything needed to locate one release asset.
#[derive(Debug, Clone)]
pub struct AssetRequest<'a> {
    pub owner: &'a str,
    pub repo: &'a str,
    /// Canonical tag as published upstream.
    pub tag: &'a str,
    pub platform: Option<&'a Platform>,
    pub extension: &'a str,
}

impl<'a> AssetRequest<'a> {
    /// Generic asset for `repo` at `tag`.
    pub fn generic(owner: &'a str, repo: &'a str, tag: &'a str, extension: &'a str) -> Self {
        Self {
            owner,
            repo,
            tag,
            platform: None,
            extension,
        }
    }

    /// Platform-specific asset for `repo` at `tag`.
    pub fn for_platform(
        owner: &'a str,
        repo: &'a str,
        tag: &'a str,
        platform: &'a Platform,
        extension: &'a str,
    ) -> Self {
        Self {
            owner,
            repo,
            tag,
            platform: Some(platform),
            extension,
        }
    }

    /// The expected asset filename.
    pub fn filename(&self) -> String {
        let version = normalize(self.tag);
        match self.platform {
            Some(platform) => format!(
                "{}_{}_{}_{}.{}",
                self.repo,
                version,
                platform.os(),
                platform.arch(),
                self.extension
            ),
            None => format!("{}_{}.{}", self.repo, version, self.extension),
        }
    }

    /// Full download URL below `base` (e.g. `https://github.com`).
    ///
    /// Returns `None` only for a base that cannot carry a path (`mailto:`,
    /// `data:`); http(s) bases always succeed.
    pub fn url(&self, base: &Url) -> Option<Url> {
        let filename = self.filename();
        let mut url = base.clone();
        url.path_segments_mut()
            .ok()?
            .pop_if_empty()
            .extend([
                self.owner,
                self.repo,
                "releases",
                "download",
                self.tag,
                filename.as_str(),
            ]);
        Some(url)
    }
}
