// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

use std::time::Duration;

use anyhow::Result;
use clap::Parser;

use release_proxy::asset::DEFAULT_DOWNLOAD_URL;
use release_proxy::config::{
    Config, DEFAULT_CONNECT_TIMEOUT_SECS, DEFAULT_LISTING_TIMEOUT_SECS, DEFAULT_PORT,
};
use release_proxy::logging::init_logging;
use release_proxy::releases::DEFAULT_API_URL;
use release_proxy::server::Server;

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// release-proxy - Version-resolving download redirector for GitHub releases.
#[derive(Parser)]
#[command(name = "release-proxy")]
#[command(version = VERSION)]
#[command(about = "Serve GitHub release assets by version alias.")]
#[command(long_about = "release-proxy - Version-resolving download redirector\n\n\
    Latest version:     GET /<repo>/latest/version.txt\n\
    Generic asset:      GET /<repo>/<tag>.<ext>\n\
    Platform asset:     GET /<repo>/<tag>/<os>_<arch>.<ext>\n\n\
    <tag> is `latest` or an exact release tag. Assets are streamed from\n\
    https://github.com/<owner>/<repo>/releases/download/<tag>/.")]
struct Cli {
    /// Port to listen on
    #[arg(short, long, env = "PORT", default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Address to bind to
    #[arg(long, env = "BIND_ADDRESS", default_value = "0.0.0.0")]
    bind: String,

    /// Owner (user or organization) of the proxied repositories
    #[arg(long, env = "GITHUB_OWNER")]
    owner: String,

    /// Access token for the GitHub API
    #[arg(long, env = "GITHUB_ACCESS_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Base URL of the GitHub API
    #[arg(long, env = "GITHUB_API_URL", default_value = DEFAULT_API_URL)]
    api_url: String,

    /// Base URL of the host serving release assets
    #[arg(long, env = "GITHUB_DOWNLOAD_URL", default_value = DEFAULT_DOWNLOAD_URL)]
    download_url: String,

    /// Timeout for one release listing call, in seconds
    #[arg(long, env = "LISTING_TIMEOUT_SECS", default_value_t = DEFAULT_LISTING_TIMEOUT_SECS)]
    listing_timeout: u64,

    /// Timeout for connecting to GitHub, in seconds
    #[arg(long, env = "CONNECT_TIMEOUT_SECS", default_value_t = DEFAULT_CONNECT_TIMEOUT_SECS)]
    connect_timeout: u64,

    /// Verbose mode: debug logging for this crate
    #[arg(short = 'v', long)]
    verbose: bool,
}

impl Cli {
    fn into_config(self) -> Config {
        Config {
            port: self.port,
            bind_address: self.bind,
            owner: self.owner,
            token: self.token.filter(|t| !t.is_empty()),
            api_url: self.api_url,
            download_url: self.download_url,
            listing_timeout: Duration::from_secs(self.listing_timeout),
            connect_timeout: Duration::from_secs(self.connect_timeout),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = cli.into_config();
    tracing::debug!(?config, "configuration loaded");

    let server = Server::new(config)?;
    server.start().await?;

    tracing::info!("Cleanup complete, shutting down server");
    Ok(())
}
