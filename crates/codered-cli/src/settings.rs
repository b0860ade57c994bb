//! Client settings: command-line flags and environment over an optional
//! TOML file over defaults.

use std::{
  path::{Path, PathBuf},
  time::Duration,
};

use anyhow::{Context, Result};
use codered_core::role::Role;
use serde::Deserialize;

pub const DEFAULT_URL: &str = "http://127.0.0.1:5240";
pub const DEFAULT_POLL_SECS: u64 = 5;

/// One source of settings. Parsed from flags/env by clap and from the config
/// file by `toml`; unset fields fall through to the next layer.
#[derive(clap::Args, Deserialize, Debug, Default, Clone, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct Layer {
  /// Base URL of the Code Red server.
  #[arg(long, env = "CODERED_URL", global = true)]
  pub url: Option<String>,

  /// Which dashboard to show: lab, runner or clinician.
  #[arg(long, env = "CODERED_ROLE", global = true)]
  pub role: Option<Role>,

  /// Lab type for labs, staff id for runners and clinicians.
  #[arg(long, env = "CODERED_SCOPE", global = true)]
  pub scope: Option<String>,

  /// Seconds between refreshes of the dashboard.
  #[arg(long = "poll-interval", env = "CODERED_POLL_INTERVAL", global = true)]
  pub poll_interval_secs: Option<u64>,

  /// Write diagnostics to this file. Nothing is logged otherwise.
  #[arg(long, env = "CODERED_LOG_FILE", global = true)]
  pub log_file: Option<PathBuf>,
}

impl Layer {
  /// Read a config file layer.
  pub fn from_file(path: &Path) -> Result<Self> {
    let raw = std::fs::read_to_string(path)
      .with_context(|| format!("reading config file {}", path.display()))?;
    toml::from_str(&raw).with_context(|| format!("parsing config file {}", path.display()))
  }
}

/// Fully resolved client settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
  pub url:           String,
  pub role:          Role,
  pub scope:         Option<String>,
  pub poll_interval: Duration,
  pub log_file:      Option<PathBuf>,
}

impl Settings {
  /// `cli` wins over `file`, which wins over the defaults.
  pub fn resolve(cli: Layer, file: Layer) -> Self {
    let nonblank = |s: String| (!s.trim().is_empty()).then_some(s);
    let poll_secs = cli
      .poll_interval_secs
      .or(file.poll_interval_secs)
      .unwrap_or(DEFAULT_POLL_SECS)
      .max(1);

    Self {
      url:           cli
        .url
        .and_then(nonblank)
        .or_else(|| file.url.and_then(nonblank))
        .unwrap_or_else(|| DEFAULT_URL.to_string()),
      role:          cli.role.or(file.role).unwrap_or(Role::Lab),
      scope:         cli
        .scope
        .and_then(nonblank)
        .or_else(|| file.scope.and_then(nonblank)),
      poll_interval: Duration::from_secs(poll_secs),
      log_file:      cli.log_file.or(file.log_file),
    }
  }
}
