// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! HTTP server
//!
//! Resolves version aliases against the owner's GitHub releases and streams
//! the matching asset back to the caller.
//!
//! # Endpoints
//!
//! - `GET /health` - Health check
//! - `GET /{repo}/latest/version.txt` - Latest version number, `v` stripped
//! - `GET /{repo}/{tag}.{ext}` - Generic asset `{repo}_{version}.{ext}`
//! - `GET /{repo}/{tag}/{platform}.{ext}` - Platform asset
//!   `{repo}_{version}_{os}_{arch}.{ext}`
//!
//! `tag` is either `latest` or an exact published tag. Asset responses carry
//! `Version` (the resolved tag), `Backend-Url` (the URL fetched) and, on the
//! platform route, `Platform` (the token as sent).
//!
//! # Example
//!
//! ```no_run
//! use release_proxy::config::Config;
//! use release_proxy::server::Server;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let server = Server::new(Config::new("acme"))?;
//! server.start().await?;
//! # Ok(())
//! # }
//! ```

pub mod routes;

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    extract::{Path, State},
    http::{HeaderMap, HeaderName, HeaderValue},
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use reqwest::Url;
use serde::Serialize;
use tower_http::trace::TraceLayer;

use crate::asset::AssetRequest;
use crate::config::Config;
use crate::errors::ProxyError;
use crate::proxy::AssetProxy;
use crate::releases::ReleaseClient;
use crate::resolve::resolve;
use crate::types::{normalize, Platform, Release, LATEST};

use self::routes::{RepoName, Route};

/// Header carrying the resolved canonical tag.
pub const VERSION: HeaderName = HeaderName::from_static("version");

/// Header echoing the platform token of the request.
pub const PLATFORM: HeaderName = HeaderName::from_static("platform");

/// Server state shared across handlers. Read-only after startup.
pub struct AppState {
    /// Process configuration.
    pub config: Config,
    /// Release listing client.
    pub releases: ReleaseClient,
    /// Asset relay.
    pub proxy: AssetProxy,
    /// Parsed base URL of the asset host.
    pub download_base: Url,
}

impl AppState {
    /// Build handler state around one pooled HTTP client.
    pub fn new(config: Config) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .user_agent(concat!("release-proxy/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("failed to build HTTP client")?;

        let download_base = Url::parse(&config.download_url)
            .with_context(|| format!("invalid download URL '{}'", config.download_url))?;

        Ok(Self {
            releases: ReleaseClient::new(client.clone(), &config),
            download_base,
            proxy: AssetProxy::new(client),
            config,
        })
    }
}

/// API server.
pub struct Server {
    state: Arc<AppState>,
}

impl Server {
    /// Create a server for a validated configuration.
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            state: Arc::new(AppState::new(config)?),
        })
    }

    /// Build the router with all routes.
    pub fn build_router(&self) -> Router {
        router(self.state.clone())
    }

    /// Start the server with graceful shutdown.
    pub async fn start(&self) -> Result<()> {
        let config = &self.state.config;
        let addr = format!("{}:{}", config.bind_address, config.port);

        let listener = tokio::net::TcpListener::bind(&addr).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::AddrInUse {
                anyhow::anyhow!(
                    "Port {} is already in use. Stop the other process or pick another port with --port <PORT>",
                    config.port
                )
            } else {
                anyhow::anyhow!("Failed to bind to {}: {}", addr, e)
            }
        })?;

        tracing::info!(
            "serving on {} for {} (token: {})",
            addr,
            config.owner,
            config.token_masked().unwrap_or_else(|| "none".to_string())
        );

        axum::serve(listener, self.build_router())
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        Ok(())
    }

    /// Get the port.
    pub fn port(&self) -> u16 {
        self.state.config.port
    }
}

/// Router over shared state.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/:repo/:file", get(asset_handler))
        .route("/:repo/:tag/:file", get(nested_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// =============================================================================
// Handlers
// =============================================================================

/// Health check response.
#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    owner: String,
}

async fn health_handler(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        owner: state.config.owner.clone(),
    })
}

/// `/{repo}/{tag}.{ext}`
async fn asset_handler(
    State(state): State<Arc<AppState>>,
    Path((repo, file)): Path<(String, String)>,
) -> Result<Response, ProxyError> {
    let route = Route::asset(&repo, &file)?;
    dispatch(&state, route).await
}

/// `/{repo}/latest/version.txt` and `/{repo}/{tag}/{platform}.{ext}`
async fn nested_handler(
    State(state): State<Arc<AppState>>,
    Path((repo, tag, file)): Path<(String, String, String)>,
) -> Result<Response, ProxyError> {
    let route = Route::nested(&repo, &tag, &file)?;
    dispatch(&state, route).await
}

async fn dispatch(state: &AppState, route: Route) -> Result<Response, ProxyError> {
    tracing::debug!(repo = %route.repo(), ?route, "dispatch");
    match route {
        Route::LatestVersion { repo } => latest_version(state, &repo).await,
        Route::Generic {
            repo,
            tag,
            extension,
        } => download(state, &repo, &tag, None, &extension).await,
        Route::Platform {
            repo,
            tag,
            platform,
            extension,
        } => download(state, &repo, &tag, Some(&platform), &extension).await,
    }
}

async fn list_releases(state: &AppState, repo: &RepoName) -> Result<Vec<Release>, ProxyError> {
    state
        .releases
        .list_releases(&state.config.owner, repo.as_str())
        .await
        .map_err(|e| ProxyError::upstream_unavailable(repo.as_str(), e))
}

async fn latest_version(state: &AppState, repo: &RepoName) -> Result<Response, ProxyError> {
    let releases = list_releases(state, repo).await?;
    let tag = resolve(&releases, LATEST).ok_or(ProxyError::Unresolved)?;

    Ok(format!("{}\n", normalize(tag)).into_response())
}

async fn download(
    state: &AppState,
    repo: &RepoName,
    token: &str,
    platform: Option<&Platform>,
    extension: &str,
) -> Result<Response, ProxyError> {
    let releases = list_releases(state, repo).await?;
    let tag = resolve(&releases, token).ok_or_else(|| {
        tracing::debug!(repo = %repo, version = %token, "version not found");
        ProxyError::Unresolved
    })?;

    let owner = state.config.owner.as_str();
    let asset = match platform {
        Some(platform) => AssetRequest::for_platform(owner, repo.as_str(), tag, platform, extension),
        None => AssetRequest::generic(owner, repo.as_str(), tag, extension),
    };
    let url = asset.url(&state.download_base).ok_or_else(|| {
        ProxyError::fetch(state.download_base.as_str(), "download URL cannot carry a path")
    })?;

    let mut headers = HeaderMap::new();
    insert_header(&mut headers, VERSION, tag);
    if let Some(platform) = platform {
        insert_header(&mut headers, PLATFORM, platform.raw());
    }

    let outcome = state.proxy.fetch(url).await?;
    Ok((headers, outcome).into_response())
}

/// Insert a header, skipping values that contain control characters.
fn insert_header(headers: &mut HeaderMap, name: HeaderName, value: &str) {
    match HeaderValue::from_bytes(value.as_bytes()) {
        Ok(value) => {
            headers.insert(name, value);
        }
        Err(_) => tracing::warn!(header = %name, value = %value, "value not valid in a header"),
    }
}

/// Graceful shutdown signal handler.
///
/// Waits for SIGINT/SIGTERM. In-flight transfers are allowed to finish.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let (mut sigterm, mut sigint) =
            match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
                (Ok(term), Ok(int)) => (term, int),
                (Err(e), _) | (_, Err(e)) => {
                    tracing::error!("failed to install signal handlers: {}", e);
                    return std::future::pending().await;
                }
            };

        tokio::select! {
            _ = sigterm.recv() => {
                tracing::info!("Received SIGTERM, initiating graceful shutdown...");
            }
            _ = sigint.recv() => {
                tracing::info!("Received SIGINT (Ctrl+C), initiating graceful shutdown...");
            }
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("failed to install Ctrl+C handler: {}", e);
            return std::future::pending().await;
        }
        tracing::info!("Received Ctrl+C, initiating graceful shutdown...");
    }
}
