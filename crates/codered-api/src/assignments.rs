//! Handlers for slot assignment endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/code-red/{id}/runner` | Body: `{"staffId":"R1"}`; 409 if another runner holds the slot |
//! | `POST` | `/code-red/{id}/clinician` | Body: `{"staffId":"C1"}`; 409 likewise |
//! | `POST` | `/code-red/{id}/reassign` | Body: `{"slot":"runner","staffId":"R2","reason":"..."}` |
//! | `GET`  | `/code-red/{id}/assignments` | Audit history, oldest first |

use axum::{
  Json,
  extract::{Path, State},
};
use codered_core::{
  assignment::{AssignmentRecord, Slot},
  event::EventId,
  gateway::Gateway,
  projector::CodeRedView,
  store::EventStore,
};
use serde::Deserialize;

use crate::error::ApiError;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignBody {
  pub staff_id: String,
}

async fn assign<S>(
  gateway: &Gateway<S>,
  id: EventId,
  slot: Slot,
  staff_id: String,
) -> Result<Json<CodeRedView>, ApiError>
where
  S: EventStore + 'static,
{
  let event = gateway
    .store()
    .assign(id, slot, staff_id)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(gateway.view(event)))
}

/// `POST /code-red/{id}/runner`
pub async fn runner<S>(
  State(gateway): State<Gateway<S>>,
  Path(id): Path<EventId>,
  Json(body): Json<AssignBody>,
) -> Result<Json<CodeRedView>, ApiError>
where
  S: EventStore + 'static,
{
  assign(&gateway, id, Slot::Runner, body.staff_id).await
}

/// `POST /code-red/{id}/clinician`
pub async fn clinician<S>(
  State(gateway): State<Gateway<S>>,
  Path(id): Path<EventId>,
  Json(body): Json<AssignBody>,
) -> Result<Json<CodeRedView>, ApiError>
where
  S: EventStore + 'static,
{
  assign(&gateway, id, Slot::Clinician, body.staff_id).await
}

// ─── Reassign ────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReassignBody {
  pub slot:     Slot,
  pub staff_id: String,
  pub reason:   Option<String>,
}

/// `POST /code-red/{id}/reassign`
pub async fn reassign<S>(
  State(gateway): State<Gateway<S>>,
  Path(id): Path<EventId>,
  Json(body): Json<ReassignBody>,
) -> Result<Json<CodeRedView>, ApiError>
where
  S: EventStore + 'static,
{
  let event = gateway
    .store()
    .reassign(id, body.slot, body.staff_id, body.reason)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(gateway.view(event)))
}

// ─── History ─────────────────────────────────────────────────────────────────

/// `GET /code-red/{id}/assignments`
pub async fn history<S>(
  State(gateway): State<Gateway<S>>,
  Path(id): Path<EventId>,
) -> Result<Json<Vec<AssignmentRecord>>, ApiError>
where
  S: EventStore + 'static,
{
  let records = gateway
    .store()
    .assignment_history(id)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(records))
}
