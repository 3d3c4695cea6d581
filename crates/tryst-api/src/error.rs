//! API error type and [`axum::response::IntoResponse`] implementation.

use axum::{
  Json,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;
use tryst_core::Error as CoreError;
use tryst_engine::Error as EngineError;

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error("missing or malformed x-user-id header")]
  Unauthorized,

  #[error("not found: {0}")]
  NotFound(String),

  #[error(transparent)]
  Engine(#[from] EngineError),
}

impl From<CoreError> for ApiError {
  fn from(e: CoreError) -> Self { Self::Engine(EngineError::Domain(e)) }
}

impl ApiError {
  pub fn status(&self) -> StatusCode {
    match self {
      ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
      ApiError::NotFound(_) => StatusCode::NOT_FOUND,
      ApiError::Engine(EngineError::Domain(e)) => match e {
        CoreError::Conflict(..) | CoreError::InvalidState { .. } => StatusCode::CONFLICT,
        CoreError::NotFound(_) => StatusCode::NOT_FOUND,
        CoreError::Expired(_) => StatusCode::GONE,
        CoreError::Forbidden { .. } => StatusCode::FORBIDDEN,
        CoreError::InvalidInput(_) | CoreError::UnknownBehaviorType(_) => {
          StatusCode::BAD_REQUEST
        }
        _ => StatusCode::INTERNAL_SERVER_ERROR,
      },
      ApiError::Engine(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let status = self.status();
    if status.is_server_error() {
      tracing::error!(error = %self, "request failed");
    }
    (status, Json(json!({ "error": self.to_string() }))).into_response()
  }
}
