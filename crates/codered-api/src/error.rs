//! API error type and [`axum::response::IntoResponse`] implementation.

use axum::{
  Json,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use codered_core::{Error as CoreError, store::StoreError};
use serde_json::json;
use thiserror::Error;

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error("{0}")]
  NotFound(String),

  #[error("{0}")]
  BadRequest(String),

  /// The request lost a race or targets a closed event.
  #[error("{0}")]
  Conflict(String),

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl ApiError {
  /// Map a backend error, surfacing domain outcomes as their own statuses.
  pub fn store<E: StoreError>(e: E) -> Self {
    match e.domain() {
      Some(domain) => domain.clone().into(),
      None => ApiError::Store(Box::new(e)),
    }
  }
}

impl From<CoreError> for ApiError {
  fn from(e: CoreError) -> Self {
    let message = e.to_string();
    match e {
      CoreError::EventNotFound(_) | CoreError::PackNotFound(_) => {
        ApiError::NotFound(message)
      }
      CoreError::Conflict { .. }
      | CoreError::EventResolved(_)
      | CoreError::InvalidPackTransition { .. } => ApiError::Conflict(message),
      CoreError::Invalid(_) => ApiError::BadRequest(message),
    }
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let (status, message) = match &self {
      ApiError::NotFound(m) => (StatusCode::NOT_FOUND, m.clone()),
      ApiError::BadRequest(m) => (StatusCode::BAD_REQUEST, m.clone()),
      ApiError::Conflict(m) => (StatusCode::CONFLICT, m.clone()),
      ApiError::Store(e) => {
        tracing::error!(error = %e, "store failure");
        (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
      }
    };
    (status, Json(json!({ "error": message }))).into_response()
  }
}
