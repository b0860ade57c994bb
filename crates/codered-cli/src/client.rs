//! Async HTTP client wrapping the Code Red JSON API.

use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use codered_core::{
  assignment::{AssignmentRecord, Slot},
  event::{EventId, NewCodeRed},
  pack::{NewPack, Pack, PackId, PackState},
  projector::CodeRedView,
  role::Role,
};
use reqwest::{Client, Response};
use serde::{Deserialize, de::DeserializeOwned};
use serde_json::json;

/// Connection settings for the Code Red API.
#[derive(Debug, Clone)]
pub struct ApiConfig {
  pub base_url: String,
  /// Upper bound on a single request, so a hung server cannot stall a poll
  /// loop indefinitely.
  pub timeout:  Duration,
}

/// Async HTTP client for the Code Red JSON REST API.
///
/// Cheap to clone; the inner [`reqwest::Client`] is `Arc`-based.
#[derive(Clone)]
pub struct ApiClient {
  client: Client,
  config: ApiConfig,
}

#[derive(Deserialize)]
struct ErrorBody {
  error: String,
}

impl ApiClient {
  pub fn new(config: ApiConfig) -> Result<Self> {
    let client = Client::builder()
      .timeout(config.timeout)
      .build()
      .context("failed to build HTTP client")?;
    Ok(Self { client, config })
  }

  fn url(&self, path: &str) -> String {
    format!(
      "{}/api{}",
      self.config.base_url.trim_end_matches('/'),
      path
    )
  }

  /// Decode a success body, or turn the server's `{"error": ...}` into an
  /// error carrying the status line.
  async fn decode<T: DeserializeOwned>(resp: Response, what: &str) -> Result<T> {
    let status = resp.status();
    if status.is_success() {
      return resp
        .json()
        .await
        .with_context(|| format!("deserialising {what}"));
    }
    let message = match resp.json::<ErrorBody>().await {
      Ok(body) => body.error,
      Err(_) => status.canonical_reason().unwrap_or("unknown error").to_string(),
    };
    Err(anyhow!("{what} → {status}: {message}"))
  }

  // ── Role views ────────────────────────────────────────────────────────────

  /// `GET /api/code-red/active[?role=..&scope=..]`
  pub async fn active(
    &self,
    role: Option<Role>,
    scope: Option<&str>,
  ) -> Result<Option<CodeRedView>> {
    let mut query: Vec<(&str, &str)> = Vec::new();
    if let Some(role) = role {
      query.push(("role", role.as_str()));
    }
    if let Some(scope) = scope {
      query.push(("scope", scope));
    }
    let resp = self
      .client
      .get(self.url("/code-red/active"))
      .query(&query)
      .send()
      .await
      .context("GET /code-red/active failed")?;
    Self::decode(resp, "active event").await
  }

  /// `GET /api/code-red/all-active`
  pub async fn all_active(&self) -> Result<Vec<CodeRedView>> {
    let resp = self
      .client
      .get(self.url("/code-red/all-active"))
      .send()
      .await
      .context("GET /code-red/all-active failed")?;
    Self::decode(resp, "active events").await
  }

  // ── Events ────────────────────────────────────────────────────────────────

  /// `GET /api/code-red[?include_resolved=true]`
  pub async fn list(&self, include_resolved: bool) -> Result<Vec<CodeRedView>> {
    let resp = self
      .client
      .get(self.url("/code-red"))
      .query(&[("include_resolved", include_resolved.to_string())])
      .send()
      .await
      .context("GET /code-red failed")?;
    Self::decode(resp, "events").await
  }

  /// `GET /api/code-red/{id}`
  pub async fn get(&self, id: EventId) -> Result<CodeRedView> {
    let resp = self
      .client
      .get(self.url(&format!("/code-red/{}", id.0)))
      .send()
      .await
      .context("GET /code-red/{id} failed")?;
    Self::decode(resp, "event").await
  }

  /// `POST /api/code-red`
  pub async fn activate(&self, input: &NewCodeRed) -> Result<CodeRedView> {
    let resp = self
      .client
      .post(self.url("/code-red"))
      .json(input)
      .send()
      .await
      .context("POST /code-red failed")?;
    Self::decode(resp, "activation").await
  }

  /// `POST /api/code-red/{id}/resolve`
  pub async fn resolve(
    &self,
    id: EventId,
    resolved_by: Option<&str>,
  ) -> Result<CodeRedView> {
    let resp = self
      .client
      .post(self.url(&format!("/code-red/{}/resolve", id.0)))
      .json(&json!({ "resolvedBy": resolved_by }))
      .send()
      .await
      .context("POST /code-red/{id}/resolve failed")?;
    Self::decode(resp, "resolution").await
  }

  // ── Assignment ────────────────────────────────────────────────────────────

  /// `POST /api/code-red/{id}/runner` or `/clinician`
  pub async fn assign(
    &self,
    id: EventId,
    slot: Slot,
    staff_id: &str,
  ) -> Result<CodeRedView> {
    let resp = self
      .client
      .post(self.url(&format!("/code-red/{}/{}", id.0, slot.as_str())))
      .json(&json!({ "staffId": staff_id }))
      .send()
      .await
      .with_context(|| format!("POST /code-red/{{id}}/{slot} failed"))?;
    Self::decode(resp, "assignment").await
  }

  /// `POST /api/code-red/{id}/reassign`
  pub async fn reassign(
    &self,
    id: EventId,
    slot: Slot,
    staff_id: &str,
    reason: Option<&str>,
  ) -> Result<CodeRedView> {
    let resp = self
      .client
      .post(self.url(&format!("/code-red/{}/reassign", id.0)))
      .json(&json!({ "slot": slot, "staffId": staff_id, "reason": reason }))
      .send()
      .await
      .context("POST /code-red/{id}/reassign failed")?;
    Self::decode(resp, "reassignment").await
  }

  /// `GET /api/code-red/{id}/assignments`
  pub async fn history(&self, id: EventId) -> Result<Vec<AssignmentRecord>> {
    let resp = self
      .client
      .get(self.url(&format!("/code-red/{}/assignments", id.0)))
      .send()
      .await
      .context("GET /code-red/{id}/assignments failed")?;
    Self::decode(resp, "assignment history").await
  }

  // ── Packs ─────────────────────────────────────────────────────────────────

  /// `POST /api/code-red/{id}/packs`
  pub async fn add_pack(&self, id: EventId, input: &NewPack) -> Result<Pack> {
    let resp = self
      .client
      .post(self.url(&format!("/code-red/{}/packs", id.0)))
      .json(input)
      .send()
      .await
      .context("POST /code-red/{id}/packs failed")?;
    Self::decode(resp, "pack").await
  }

  /// `POST /api/code-red/{id}/packs/{packId}`
  pub async fn update_pack(
    &self,
    id: EventId,
    pack_id: PackId,
    state: PackState,
  ) -> Result<Pack> {
    let resp = self
      .client
      .post(self.url(&format!("/code-red/{}/packs/{}", id.0, pack_id)))
      .json(&json!({ "state": state }))
      .send()
      .await
      .context("POST /code-red/{id}/packs/{packId} failed")?;
    Self::decode(resp, "pack").await
  }
}
