// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! release-proxy - Version-resolving download redirector library
//!
//! Serves GitHub release assets by version alias. A request names a
//! repository, a version (`latest` or an exact tag) and optionally a
//! platform; the server resolves the version against the current release
//! list, derives the asset filename and streams the asset back.
//!
//! **Listing** -> **Resolve** -> **Asset path** -> **Streaming proxy**
//!
//! # Core Modules
//!
//! - [`releases`] - GitHub release listing client
//! - [`resolve`] - Version alias resolution
//! - [`asset`] - Asset filename and download URL construction
//! - [`proxy`] - Streaming relay of upstream responses
//! - [`server`] - HTTP server and typed routes
//! - [`errors`] - Request-level error responses
//! - [`config`] - Process configuration

pub mod asset;
pub mod config;
pub mod errors;
pub mod logging;
pub mod proxy;
pub mod releases;
pub mod resolve;
pub mod server;
pub mod types;

pub use asset::AssetRequest;
pub use config::Config;
pub use errors::ProxyError;
pub use proxy::{AssetProxy, ProxyOutcome};
pub use releases::{ListError, ReleaseClient};
pub use resolve::resolve;
pub use server::Server;
pub use types::{normalize, Platform, Release};
