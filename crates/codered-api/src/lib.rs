//! JSON REST API for Code Red coordination.
//!
//! Exposes an axum [`Router`] backed by a [`Gateway`] over any
//! [`codered_core::store::EventStore`]. Reads are projected against the
//! gateway's clock on the way out. TLS and transport concerns are the
//! caller's responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", codered_api::api_router(gateway.clone()))
//! ```

pub mod assignments;
pub mod error;
pub mod events;
pub mod packs;

use axum::{
  Router,
  routing::{get, post},
};
use codered_core::{gateway::Gateway, store::EventStore};

pub use error::ApiError;

/// Build a fully-materialised API router for `gateway`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S>(gateway: Gateway<S>) -> Router<()>
where
  S: EventStore + 'static,
{
  Router::new()
    // Role views
    .route("/code-red/active", get(events::active::<S>))
    .route("/code-red/all-active", get(events::all_active::<S>))
    // Events
    .route("/code-red", get(events::list::<S>).post(events::create::<S>))
    .route("/code-red/{id}", get(events::get_one::<S>))
    .route("/code-red/{id}/resolve", post(events::resolve::<S>))
    // Assignment
    .route("/code-red/{id}/runner", post(assignments::runner::<S>))
    .route("/code-red/{id}/clinician", post(assignments::clinician::<S>))
    .route("/code-red/{id}/reassign", post(assignments::reassign::<S>))
    .route("/code-red/{id}/assignments", get(assignments::history::<S>))
    // Packs
    .route("/code-red/{id}/packs", post(packs::dispatch::<S>))
    .route("/code-red/{id}/packs/{pack_id}", post(packs::update::<S>))
    .with_state(gateway)
}

// ─── Integration tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
  use std::sync::Arc;

  use axum::{
    body::Body,
    http::{Request, StatusCode, header},
  };
  use chrono::{Duration, TimeZone, Utc};
  use codered_core::clock::ManualClock;
  use codered_store_sqlite::SqliteStore;
  use serde_json::{Value, json};
  use tower::ServiceExt as _;

  use super::*;

  async fn make_app() -> (Router, ManualClock) {
    let clock = ManualClock::new(Utc.with_ymd_and_hms(2024, 6, 1, 8, 0, 0).unwrap());
    let store = SqliteStore::open_in_memory()
      .await
      .unwrap()
      .with_clock(Arc::new(clock.clone()));
    let gateway = Gateway::new(Arc::new(store), Arc::new(clock.clone()));
    (api_router(gateway), clock)
  }

  async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    body: Option<Value>,
  ) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    let body = match body {
      Some(json) => {
        builder = builder.header(header::CONTENT_TYPE, "application/json");
        Body::from(json.to_string())
      }
      None => Body::empty(),
    };
    let resp = app.clone().oneshot(builder.body(body).unwrap()).await.unwrap();
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
      Value::Null
    } else {
      serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
  }

  async fn activate(app: &Router, lab: &str, mrn: &str) -> i64 {
    let (status, body) = send(
      app,
      "POST",
      "/code-red",
      Some(json!({ "labType": lab, "location": "ED Resus 1", "patientMRN": mrn })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    body["id"].as_i64().unwrap()
  }

  // ── Reads ───────────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn empty_store_gives_null_and_empty_array() {
    let (app, _) = make_app().await;

    let (status, body) = send(&app, "GET", "/code-red/active", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, Value::Null);

    let (status, body) = send(&app, "GET", "/code-red/all-active", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!([]));
  }

  #[tokio::test]
  async fn event_wire_shape_is_camel_case_with_derived_fields() {
    let (app, clock) = make_app().await;
    let id = activate(&app, "main_lab", "12345").await;
    clock.advance(Duration::minutes(125));

    let (status, body) = send(&app, "GET", &format!("/code-red/{id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["labType"], "main_lab");
    assert_eq!(body["patientMRN"], "12345");
    assert_eq!(body["activationTime"], "2024-06-01T08:00:00Z");
    assert_eq!(body["status"], "active");
    assert_eq!(body["elapsed"], "2h 5m");
    assert_eq!(body["elapsedMinutes"], 125);
    assert_eq!(body["packs"], json!([]));
  }

  #[tokio::test]
  async fn active_is_scoped_by_role() {
    let (app, clock) = make_app().await;
    let main = activate(&app, "main_lab", "1").await;
    clock.advance(Duration::minutes(1));
    let satellite = activate(&app, "satellite_lab", "2").await;
    send(
      &app,
      "POST",
      &format!("/code-red/{main}/runner"),
      Some(json!({ "staffId": "R1" })),
    )
    .await;

    let (_, body) = send(&app, "GET", "/code-red/active", None).await;
    assert_eq!(body["id"], satellite);

    let (_, body) = send(&app, "GET", "/code-red/active?role=lab&scope=main_lab", None).await;
    assert_eq!(body["id"], main);

    let (_, body) = send(&app, "GET", "/code-red/active?role=runner&scope=R1", None).await;
    assert_eq!(body["id"], main);

    let (_, body) = send(&app, "GET", "/code-red/active?role=clinician&scope=C9", None).await;
    assert_eq!(body, Value::Null);

    let (status, _) = send(&app, "GET", "/code-red/active?role=lab&scope=attic", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
  }

  #[tokio::test]
  async fn get_missing_event_returns_404() {
    let (app, _) = make_app().await;
    let (status, body) = send(&app, "GET", "/code-red/42", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].is_string());
  }

  #[tokio::test]
  async fn blank_mrn_returns_400() {
    let (app, _) = make_app().await;
    let (status, _) = send(
      &app,
      "POST",
      "/code-red",
      Some(json!({ "labType": "main_lab", "location": "Bay", "patientMRN": " " })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
  }

  // ── Assignment ─────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn second_runner_gets_409() {
    let (app, _) = make_app().await;
    let id = activate(&app, "main_lab", "1").await;
    let uri = format!("/code-red/{id}/runner");

    let (status, _) = send(&app, "POST", &uri, Some(json!({ "staffId": "R1" }))).await;
    assert_eq!(status, StatusCode::OK);
    let (status, body) = send(&app, "POST", &uri, Some(json!({ "staffId": "R1" }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["assignedRunnerId"], "R1");

    let (status, body) = send(&app, "POST", &uri, Some(json!({ "staffId": "R2" }))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["error"].as_str().unwrap().contains("R1"), "{body}");
  }

  #[tokio::test]
  async fn concurrent_runner_requests_yield_one_409() {
    let (app, _) = make_app().await;
    let id = activate(&app, "main_lab", "1").await;
    let uri = format!("/code-red/{id}/runner");

    let (a, b) = tokio::join!(
      send(&app, "POST", &uri, Some(json!({ "staffId": "R1" }))),
      send(&app, "POST", &uri, Some(json!({ "staffId": "R2" }))),
    );
    let mut statuses = [a.0, b.0];
    statuses.sort();
    assert_eq!(statuses, [StatusCode::OK, StatusCode::CONFLICT]);
  }

  #[tokio::test]
  async fn assign_on_missing_event_returns_404() {
    let (app, _) = make_app().await;
    let (status, _) = send(
      &app,
      "POST",
      "/code-red/9/clinician",
      Some(json!({ "staffId": "C1" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
  }

  #[tokio::test]
  async fn reassignment_shows_in_history() {
    let (app, _) = make_app().await;
    let id = activate(&app, "main_lab", "1").await;
    send(
      &app,
      "POST",
      &format!("/code-red/{id}/clinician"),
      Some(json!({ "staffId": "C1" })),
    )
    .await;

    let (status, body) = send(
      &app,
      "POST",
      &format!("/code-red/{id}/reassign"),
      Some(json!({ "slot": "clinician", "staffId": "C2", "reason": "handover" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["assignedClinicianId"], "C2");

    let (status, body) = send(&app, "GET", &format!("/code-red/{id}/assignments"), None).await;
    assert_eq!(status, StatusCode::OK);
    let records = body.as_array().unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[1]["previousStaffId"], "C1");
    assert_eq!(records[1]["reason"], "handover");
  }

  // ── Packs ──────────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn pack_dispatch_and_delivery() {
    let (app, _) = make_app().await;
    let id = activate(&app, "satellite_lab", "1").await;

    let (status, pack) = send(
      &app,
      "POST",
      &format!("/code-red/{id}/packs"),
      Some(json!({ "product": "red_cells", "unitNumber": "G123" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(pack["sequence"], 1);
    assert_eq!(pack["state"], "dispatched");
    let pack_id = pack["packId"].as_str().unwrap().to_owned();

    let uri = format!("/code-red/{id}/packs/{pack_id}");
    let (status, pack) = send(&app, "POST", &uri, Some(json!({ "state": "delivered" }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(pack["state"], "delivered");

    // Delivered packs cannot go back to dispatched.
    let (status, _) = send(&app, "POST", &uri, Some(json!({ "state": "dispatched" }))).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (_, event) = send(&app, "GET", &format!("/code-red/{id}"), None).await;
    assert_eq!(event["packs"].as_array().unwrap().len(), 1);
    assert_eq!(event["packCounts"]["delivered"], 1);
  }

  #[tokio::test]
  async fn unknown_pack_returns_404() {
    let (app, _) = make_app().await;
    let id = activate(&app, "main_lab", "1").await;
    let (status, _) = send(
      &app,
      "POST",
      &format!("/code-red/{id}/packs/00000000-0000-4000-8000-000000000000"),
      Some(json!({ "state": "delivered" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
  }

  // ── Resolution ─────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn resolved_event_is_listed_only_with_include_resolved() {
    let (app, clock) = make_app().await;
    let id = activate(&app, "main_lab", "1").await;
    clock.advance(Duration::minutes(30));

    let (status, body) = send(
      &app,
      "POST",
      &format!("/code-red/{id}/resolve"),
      Some(json!({ "resolvedBy": "Dr Patel" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "resolved");
    assert_eq!(body["resolution"]["resolvedBy"], "Dr Patel");

    // The clock stops at resolution.
    clock.advance(Duration::minutes(30));
    let (_, body) = send(&app, "GET", &format!("/code-red/{id}"), None).await;
    assert_eq!(body["elapsed"], "30m");

    let (_, body) = send(&app, "GET", "/code-red", None).await;
    assert_eq!(body, json!([]));
    let (_, body) = send(&app, "GET", "/code-red?include_resolved=true", None).await;
    assert_eq!(body.as_array().unwrap().len(), 1);

    let (status, _) = send(&app, "POST", &format!("/code-red/{id}/resolve"), Some(json!({}))).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = send(
      &app,
      "POST",
      &format!("/code-red/{id}/packs"),
      Some(json!({ "product": "plasma" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
  }

  #[tokio::test]
  async fn resolve_accepts_an_empty_body() {
    let (app, _) = make_app().await;
    let id = activate(&app, "satellite_lab", "1").await;

    let (status, body) = send(&app, "POST", &format!("/code-red/{id}/resolve"), None).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["status"], "resolved");
    assert_eq!(body["resolution"]["resolvedBy"], Value::Null);
  }

  // ── End-to-end ──────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn code_red_lifecycle_over_http() {
    let (app, _) = make_app().await;

    let e1 = activate(&app, "main_lab", "12345").await;
    let (_, list) = send(&app, "GET", "/code-red/all-active", None).await;
    let ids: Vec<_> = list.as_array().unwrap().iter().map(|e| e["id"].clone()).collect();
    assert_eq!(ids, vec![json!(e1)]);

    let runner = format!("/code-red/{e1}/runner");
    let (status, _) = send(&app, "POST", &runner, Some(json!({ "staffId": "R1" }))).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = send(&app, "POST", &runner, Some(json!({ "staffId": "R2" }))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    let (status, _) = send(
      &app,
      "POST",
      &format!("/code-red/{e1}/clinician"),
      Some(json!({ "staffId": "C1" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(&app, "POST", &format!("/code-red/{e1}/resolve"), Some(json!({}))).await;
    assert_eq!(status, StatusCode::OK);

    let (_, list) = send(&app, "GET", "/code-red/all-active", None).await;
    assert_eq!(list, json!([]));
    let (status, _) = send(&app, "GET", &format!("/code-red/{e1}"), None).await;
    assert_eq!(status, StatusCode::OK);
  }
}
