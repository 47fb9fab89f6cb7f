//! Provisions the configured storage backend and prints what changed.
//!
//! Run it once per deployment before starting the service, or let the
//! service bootstrap on startup; both are idempotent.

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use idp_runtime::{StorageSettings, open_store, telemetry::init_tracing};

#[derive(Parser, Debug)]
#[command(name = "idp-bootstrap")]
#[command(about = "Create and seed the identity document store")]
#[command(version)]
struct Cli {
    /// Storage settings file (JSON)
    #[arg(long, short, env = "IDP_STORAGE_SETTINGS")]
    settings: PathBuf,

    /// Also run a backend health check after bootstrapping
    #[arg(long)]
    health: bool,

    /// Log level when RUST_LOG is unset (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log_level).context("installing tracing subscriber")?;

    let settings = StorageSettings::from_path(&cli.settings)
        .with_context(|| format!("loading {}", cli.settings.display()))?;
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        backend = %settings.backend,
        "bootstrapping storage"
    );

    let storage = open_store(settings).await.context("storage bootstrap failed")?;
    if cli.health {
        storage.health_check().await.context("backend health check failed")?;
        tracing::info!("backend healthy");
    }

    println!("{}", serde_json::to_string_pretty(storage.report())?);
    Ok(())
}
