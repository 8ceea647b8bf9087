// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Canonical types used across release-proxy.
//!
//! This module provides the values that flow between the release listing,
//! the version resolver and the asset path builder.

use serde::{Deserialize, Deserializer};

/// The alias that always resolves to the most recent release.
pub const LATEST: &str = "latest";

/// A published release as reported by the upstream provider.
///
/// Only the tag matters here; recency is the position of the release in the
/// sequence the provider returned (first = most recent).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Release {
    /// Tag exactly as published (e.g. `v1.2.3`). Never `Some("")`.
    #[serde(default, deserialize_with = "non_empty")]
    pub tag_name: Option<String>,
}

impl Release {
    /// A release with the given tag. An empty tag is stored as absent.
    pub fn tagged(tag: impl Into<String>) -> Self {
        let tag = tag.into();
        Self {
            tag_name: (!tag.is_empty()).then_some(tag),
        }
    }

    /// A release the provider reported without a tag.
    pub fn untagged() -> Self {
        Self { tag_name: None }
    }

    pub fn tag(&self) -> Option<&str> {
        self.tag_name.as_deref()
    }
}

fn non_empty<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.filter(|s| !s.is_empty()))
}

/// Strip a single leading `v` from a tag for use inside asset filenames.
///
/// ```
/// use release_proxy::types::normalize;
///
/// assert_eq!(normalize("v1.2.3"), "1.2.3");
/// assert_eq!(normalize("1.2.3"), "1.2.3");
/// ```
pub fn normalize(tag: &str) -> &str {
    tag.strip_prefix('v').unwrap_or(tag)
}

/// An `OS_ARCH` platform token, lowercased and split on the first underscore.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Platform {
    raw: String,
    os: String,
    arch: String,
}

impl Platform {
    /// Parse a caller-supplied platform token.
    ///
    /// Returns `None` unless the token splits into two non-empty halves.
    /// Anything after the first underscore belongs to the architecture, so
    /// `linux_arm_v7` parses as `linux` / `arm_v7`.
    pub fn parse(token: &str) -> Option<Self> {
        let lowered = token.to_lowercase();
        let (os, arch) = lowered.split_once('_')?;
        if os.is_empty() || arch.is_empty() {
            return None;
        }

        Some(Self {
            raw: token.to_string(),
            os: os.to_string(),
            arch: arch.to_string(),
        })
    }

    /// The token as the caller sent it, echoed in the `Platform` header.
    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn os(&self) -> &str {
        &self.os
    }

    pub fn arch(&self) -> &str {
        &self.arch
    }
}
