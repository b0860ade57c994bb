//! codered-server binary.
//!
//! Reads `codered.toml` (or the path given with `--config`) layered under
//! `CODERED_*` environment variables, opens the SQLite store and serves the
//! Code Red JSON API over HTTP.

use std::{path::PathBuf, sync::Arc};

use anyhow::Context as _;
use clap::Parser;
use codered_core::{clock::SystemClock, gateway::Gateway};
use codered_server::{ServerConfig, expand_tilde};
use codered_store_sqlite::SqliteStore;
use tokio::net::TcpListener;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Code Red coordination server")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "codered.toml")]
  config: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  let server_cfg = ServerConfig::load(&cli.config)
    .with_context(|| format!("failed to load configuration from {:?}", cli.config))?;

  let store_path = expand_tilde(&server_cfg.store_path);
  let store = SqliteStore::open(&store_path)
    .await
    .with_context(|| format!("failed to open store at {store_path:?}"))?;

  // Projection and activation stamping share the system clock.
  let gateway = Gateway::new(Arc::new(store), Arc::new(SystemClock));
  let app = codered_server::app(gateway);

  let address = server_cfg.address();
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;
  tracing::info!(store = ?store_path, "listening on http://{address}");

  axum::serve(listener, app).await.context("server error")?;

  Ok(())
}
