// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Typed route parameters.
//!
//! axum matches whole path segments; this module turns those raw segments
//! into a [`Route`] whose parameters are already validated, so the handlers
//! only ever see a well-formed repository name, a `{stem}.{ext}` split and a
//! parsed platform.

use crate::errors::ProxyError;
use crate::types::{Platform, LATEST};

/// File served with the bare latest version number.
pub const VERSION_FILE: &str = "version.txt";

/// Extensions that span two dot-separated parts.
const COMPOUND_EXTENSIONS: [&str; 4] = ["tar.gz", "tar.bz2", "tar.xz", "tar.zst"];

/// A repository name accepted as a single path segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoName(String);

impl RepoName {
    /// Letters, digits, `-`, `_` and `.`, excluding `.` and `..`.
    pub fn parse(raw: &str) -> Option<Self> {
        let valid = !raw.is_empty()
            && raw != "."
            && raw != ".."
            && raw
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
        valid.then(|| Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RepoName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// One of the three request shapes the server answers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    /// `/{repo}/latest/version.txt`
    LatestVersion { repo: RepoName },
    /// `/{repo}/{tag}.{ext}`
    Generic {
        repo: RepoName,
        tag: String,
        extension: String,
    },
    /// `/{repo}/{tag}/{platform}.{ext}`
    Platform {
        repo: RepoName,
        tag: String,
        platform: Platform,
        extension: String,
    },
}

impl Route {
    /// Route for a two-segment path `/{repo}/{file}`.
    pub fn asset(repo: &str, file: &str) -> Result<Self, ProxyError> {
        let repo = RepoName::parse(repo).ok_or(ProxyError::Rejected)?;
        let (tag, extension) = split_generic(file).ok_or(ProxyError::Rejected)?;

        Ok(Self::Generic {
            repo,
            tag: tag.to_string(),
            extension: extension.to_string(),
        })
    }

    /// Route for a three-segment path `/{repo}/{tag}/{file}`.
    ///
    /// `latest/version.txt` wins over the platform reading of the same path.
    pub fn nested(repo: &str, tag: &str, file: &str) -> Result<Self, ProxyError> {
        let repo = RepoName::parse(repo).ok_or(ProxyError::Rejected)?;
        if tag == LATEST && file == VERSION_FILE {
            return Ok(Self::LatestVersion { repo });
        }

        let (token, extension) = split_platform(file).ok_or(ProxyError::Rejected)?;
        let platform = Platform::parse(token).ok_or(ProxyError::Rejected)?;

        Ok(Self::Platform {
            repo,
            tag: tag.to_string(),
            platform,
            extension: extension.to_string(),
        })
    }

    pub fn repo(&self) -> &RepoName {
        match self {
            Self::LatestVersion { repo }
            | Self::Generic { repo, .. }
            | Self::Platform { repo, .. } => repo,
        }
    }
}

/// Split `v1.2.3.tar.gz` into `v1.2.3` and `tar.gz`, `v1.2.3.zip` into `v1.2.3` and `zip`.
fn split_generic(file: &str) -> Option<(&str, &str)> {
    let (stem, extension) = COMPOUND_EXTENSIONS
        .iter()
        .find_map(|ext| {
            file.strip_suffix(ext)
                .and_then(|rest| rest.strip_suffix('.'))
                .map(|stem| (stem, *ext))
        })
        .or_else(|| file.rsplit_once('.'))?;

    non_empty(stem, extension)
}

/// Split on the first dot; platform tokens never contain one.
fn split_platform(file: &str) -> Option<(&str, &str)> {
    let (stem, extension) = file.split_once('.')?;
    non_empty(stem, extension)
}

fn non_empty<'a>(stem: &'a str, extension: &'a str) -> Option<(&'a str, &'a str)> {
    (!stem.is_empty() && !extension.is_empty()).then_some((stem, extension))
}
