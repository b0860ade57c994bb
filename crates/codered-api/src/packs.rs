//! Handlers for pack endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/code-red/{id}/packs` | Body: `{"product":"red_cells","unitNumber":"..."}`; returns 201 |
//! | `POST` | `/code-red/{id}/packs/{packId}` | Body: `{"state":"delivered"}` |

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use codered_core::{
  event::EventId,
  gateway::Gateway,
  pack::{NewPack, Pack, PackId, PackState},
  store::EventStore,
};
use serde::Deserialize;

use crate::error::ApiError;

/// `POST /code-red/{id}/packs`: 201 with the dispatched pack.
pub async fn dispatch<S>(
  State(gateway): State<Gateway<S>>,
  Path(id): Path<EventId>,
  Json(body): Json<NewPack>,
) -> Result<impl IntoResponse, ApiError>
where
  S: EventStore + 'static,
{
  let pack = gateway
    .store()
    .add_pack(id, body)
    .await
    .map_err(ApiError::store)?;
  Ok((StatusCode::CREATED, Json(pack)))
}

#[derive(Debug, Deserialize)]
pub struct UpdateBody {
  pub state: PackState,
}

/// `POST /code-red/{id}/packs/{packId}`
pub async fn update<S>(
  State(gateway): State<Gateway<S>>,
  Path((id, pack_id)): Path<(EventId, PackId)>,
  Json(body): Json<UpdateBody>,
) -> Result<Json<Pack>, ApiError>
where
  S: EventStore + 'static,
{
  let pack = gateway
    .store()
    .update_pack(id, pack_id, body.state)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(pack))
}
