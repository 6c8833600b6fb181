//! API probe
//!
//! Single-shot CLI over the session client:
//! 1. Loads client settings and credentials
//! 2. Issues one request, refreshing the access token if the backend says it
//!    expired
//! 3. Prints the resolved payload as JSON (and the metrics, if asked)

mod cli;
mod config;
mod metrics;

use anyhow::{Context, Result};
use clap::Parser;
use credential::CredentialStore;
use serde_json::Value;
use session_client::HttpClient;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::cli::Args;
use crate::config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and LOG_LEVEL / RUST_LOG support
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_env("LOG_LEVEL")
                .or_else(|_| EnvFilter::try_from_default_env())
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();

    // Install before the client records anything
    let prometheus = if args.metrics {
        Some(metrics::install_recorder()?)
    } else {
        None
    };

    let config_path = Config::resolve_path(args.config.as_deref());
    info!(path = %config_path.display(), "loading configuration");
    let config = Config::load(&config_path)
        .with_context(|| format!("failed to load config from {}", config_path.display()))?;

    info!(
        base_url = %config.client.base_url,
        refresh_path = %config.client.refresh_endpoint_path,
        persisted = config.credentials.credentials_path.is_some(),
        "configuration loaded"
    );

    let client = build_client(&config).await?;
    let outcome = run(&client, &args).await;

    if let Some(handle) = prometheus {
        print!("{}", handle.render());
    }
    outcome
}

async fn build_client(config: &Config) -> Result<HttpClient> {
    let initial = config.initial_credential()?;
    let store = match &config.credentials.credentials_path {
        Some(path) => CredentialStore::load(path.clone(), initial)
            .await
            .with_context(|| format!("failed to open credential file {}", path.display()))?,
        None => CredentialStore::new(initial),
    };

    let client = HttpClient::builder(config.client.clone())
        .store(Arc::new(store))
        .build()?;
    Ok(client)
}

/// Issue the request, or give up on Ctrl+C.
async fn run(client: &HttpClient, args: &Args) -> Result<()> {
    let spec = args.request_spec();
    info!(method = %spec.method, path = %spec.path, "sending request");

    let result = tokio::select! {
        result = client.send::<Value>(spec, args.call_options()) => result,
        _ = shutdown_signal() => {
            let rejected = client.destroy();
            warn!(rejected, "interrupted, pending requests abandoned");
            anyhow::bail!("interrupted");
        }
    };

    match result {
        Ok(value) => {
            println!("{}", serde_json::to_string_pretty(&value)?);
            Ok(())
        }
        Err(e) => {
            error!(kind = e.kind(), error = %e, "request failed");
            Err(e.into())
        }
    }
}

/// Wait for SIGINT.
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to install Ctrl+C handler");
        std::future::pending::<()>().await;
    }
    info!("received SIGINT, shutting down");
}
