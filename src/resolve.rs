// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Version resolution.
//!
//! Maps a caller-supplied version token onto the canonical tag of one of the
//! releases the provider returned. Matching is exact: `v1.0.0` and `1.0.0`
//! are different tokens. The provider's ordering is trusted as "most recent
//! first" and never re-sorted.

use crate::types::{Release, LATEST};

/// Resolve `token` against `releases`.
///
/// Returns the canonical tag, or `None` when the token is unresolved: no
/// matching release, a match without a tag, or `latest` over an empty list.
pub fn resolve<'a>(releases: &'a [Release], token: &str) -> Option<&'a str> {
    let release = if token == LATEST {
        releases.first()?
    } else {
        releases.iter().find(|r| r.tag() == Some(token))?
    };

    release.tag()
}
