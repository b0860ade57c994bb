//! HTTP server assembly for Code Red coordination.
//!
//! Mounts the JSON API under `/api` next to a `/health` check and wraps
//! everything in request tracing. The binary in `main.rs` only loads
//! configuration and opens the store.

use std::path::{Path, PathBuf};

use axum::{Json, Router, routing::get};
use codered_core::{gateway::Gateway, store::EventStore};
use serde::Deserialize;
use serde_json::{Value, json};
use tower_http::trace::TraceLayer;

// ─── Configuration ────────────────────────────────────────────────────────────

/// Runtime server configuration, layered from `codered.toml` and `CODERED_*`
/// environment variables. Every field has a default.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct ServerConfig {
  pub host:       String,
  pub port:       u16,
  pub store_path: PathBuf,
}

impl Default for ServerConfig {
  fn default() -> Self {
    Self {
      host:       "127.0.0.1".to_string(),
      port:       5240,
      store_path: PathBuf::from("codered.sqlite3"),
    }
  }
}

impl ServerConfig {
  /// Build the layered configuration: optional file first, environment on
  /// top.
  pub fn load(file: &Path) -> Result<Self, config::ConfigError> {
    config::Config::builder()
      .add_source(config::File::from(file).required(false))
      .add_source(config::Environment::with_prefix("CODERED"))
      .build()?
      .try_deserialize()
  }

  pub fn address(&self) -> String { format!("{}:{}", self.host, self.port) }
}

/// Expand a leading `~` to the user's home directory.
pub fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// Build the complete application router for `gateway`.
pub fn app<S>(gateway: Gateway<S>) -> Router
where
  S: EventStore + 'static,
{
  Router::new()
    .route("/health", get(health))
    .nest("/api", codered_api::api_router(gateway))
    .layer(TraceLayer::new_for_http())
}

async fn health() -> Json<Value> { Json(json!({ "status": "ok" })) }

// ─── Integration tests ────────────────────────────────────────────────────────
