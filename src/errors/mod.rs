// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Request-level error handling.
//!
//! Every failure in the resolve/build/proxy pipeline ends at the request
//! boundary as one of four outcomes:
//!
//! | Error | Status | Body |
//! |---|---|---|
//! | `UpstreamUnavailable` | 502 | underlying error text |
//! | `Unresolved` | 404 | `Not found` |
//! | `Rejected` | 404 | `Not found` |
//! | `Fetch` | 502 | underlying error text |
//!
//! Nothing is retried and no error is fatal to the process. The gateway
//! variants are logged by their constructors with the repo or URL involved.

use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// Errors surfaced to the client while serving a download.
#[derive(Debug, Error)]
pub enum ProxyError {
    /// Release listing failed (transport, authorization or decoding).
    #[error("{0}")]
    UpstreamUnavailable(String),

    /// The version token matched no tagged release.
    #[error("Not found")]
    Unresolved,

    /// The request was well-routed but its parameters are malformed.
    #[error("Not found")]
    Rejected,

    /// The asset fetch itself failed before any upstream status arrived.
    #[error("{0}")]
    Fetch(String),
}

impl ProxyError {
    /// Listing failure for `repo`, logged with the underlying error.
    pub fn upstream_unavailable(repo: &str, error: impl std::fmt::Display) -> Self {
        let message = error.to_string();
        tracing::error!(repo = %repo, error = %message, "release listing failed");
        Self::UpstreamUnavailable(message)
    }

    /// Fetch failure for `url`, logged with the underlying error.
    pub fn fetch(url: &str, error: impl std::fmt::Display) -> Self {
        let message = error.to_string();
        tracing::error!(url = %url, error = %message, "asset fetch failed");
        Self::Fetch(message)
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::UpstreamUnavailable(_) | Self::Fetch(_) => StatusCode::BAD_GATEWAY,
            Self::Unresolved | Self::Rejected => StatusCode::NOT_FOUND,
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        (
            status,
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            format!("{}\n", self),
        )
            .into_response()
    }
}
