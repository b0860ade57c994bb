//! Handlers for `/code-red` event endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/code-red/active` | Optional `?role=lab\|runner\|clinician&scope=<id>`; `null` when nothing matches |
//! | `GET`  | `/code-red/all-active` | Always an array |
//! | `GET`  | `/code-red` | Optional `?include_resolved=true` |
//! | `POST` | `/code-red` | Body: `{"labType":"main_lab","location":"...","patientMRN":"..."}` |
//! | `GET`  | `/code-red/{id}` | 404 if not found |
//! | `POST` | `/code-red/{id}/resolve` | Body: `{"resolvedBy":"..."}` (optional field) |

use axum::{
  Json,
  extract::{Path, Query, State},
  http::StatusCode,
  response::IntoResponse,
};
use codered_core::{
  event::{EventId, NewCodeRed},
  gateway::Gateway,
  projector::CodeRedView,
  role::{Role, Viewer},
  store::EventStore,
};
use serde::Deserialize;

use crate::error::ApiError;

// ─── Active ──────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ActiveParams {
  pub role:  Option<Role>,
  pub scope: Option<String>,
}

/// `GET /code-red/active[?role=<role>][&scope=<id>]`
///
/// Without a role the most recently activated event is returned.
pub async fn active<S>(
  State(gateway): State<Gateway<S>>,
  Query(params): Query<ActiveParams>,
) -> Result<Json<Option<CodeRedView>>, ApiError>
where
  S: EventStore + 'static,
{
  let viewer = match params.role {
    Some(role) => Viewer::from_parts(role, params.scope.as_deref())?,
    None => Viewer::Lab(None),
  };
  let view = gateway.active_for(&viewer).await.map_err(ApiError::store)?;
  Ok(Json(view))
}

/// `GET /code-red/all-active`
pub async fn all_active<S>(
  State(gateway): State<Gateway<S>>,
) -> Result<Json<Vec<CodeRedView>>, ApiError>
where
  S: EventStore + 'static,
{
  let views = gateway.all_active().await.map_err(ApiError::store)?;
  Ok(Json(views))
}

// ─── List ────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ListParams {
  #[serde(default)]
  pub include_resolved: bool,
}

/// `GET /code-red[?include_resolved=true]`
pub async fn list<S>(
  State(gateway): State<Gateway<S>>,
  Query(params): Query<ListParams>,
) -> Result<Json<Vec<CodeRedView>>, ApiError>
where
  S: EventStore + 'static,
{
  let views = gateway
    .all(params.include_resolved)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(views))
}

// ─── Create ──────────────────────────────────────────────────────────────────

/// `POST /code-red`: 201 with the activated event.
pub async fn create<S>(
  State(gateway): State<Gateway<S>>,
  Json(body): Json<NewCodeRed>,
) -> Result<impl IntoResponse, ApiError>
where
  S: EventStore + 'static,
{
  let event = gateway
    .store()
    .create_event(body)
    .await
    .map_err(ApiError::store)?;
  Ok((StatusCode::CREATED, Json(gateway.view(event))))
}

// ─── Get one ─────────────────────────────────────────────────────────────────

/// `GET /code-red/{id}`
pub async fn get_one<S>(
  State(gateway): State<Gateway<S>>,
  Path(id): Path<EventId>,
) -> Result<Json<CodeRedView>, ApiError>
where
  S: EventStore + 'static,
{
  let view = gateway
    .get(id)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::NotFound(format!("event {id} not found")))?;
  Ok(Json(view))
}

// ─── Resolve ─────────────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolveBody {
  pub resolved_by: Option<String>,
}

/// `POST /code-red/{id}/resolve`. The body is optional.
pub async fn resolve<S>(
  State(gateway): State<Gateway<S>>,
  Path(id): Path<EventId>,
  body: Option<Json<ResolveBody>>,
) -> Result<Json<CodeRedView>, ApiError>
where
  S: EventStore + 'static,
{
  let body = body.map(|Json(body)| body).unwrap_or_default();
  let event = gateway
    .store()
    .resolve(id, body.resolved_by)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(gateway.view(event)))
}
