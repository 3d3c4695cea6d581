//! `PUT /compatibility`: ingest point for the ranking subsystem.

use axum::{Json, extract::State, http::StatusCode};
use serde::Deserialize;
use tryst_core::{
  UserId,
  collab::{CompatibilityFeed, CompatibilityIngest, ConversationService},
};
use tryst_engine::MatchStore;

use crate::{Engine, error::ApiError};

#[derive(Debug, Deserialize)]
pub struct CompatibilityBody {
  pub user_a: UserId,
  pub user_b: UserId,
  /// In `[0, 1]`.
  pub score:  f64,
}

/// Returns 204; 400 for a self pair or an out-of-range score.
pub async fn upsert<S, V, F>(
  State(engine): State<Engine<S, V, F>>,
  Json(body): Json<CompatibilityBody>,
) -> Result<StatusCode, ApiError>
where
  S: MatchStore,
  V: ConversationService + 'static,
  F: CompatibilityFeed + CompatibilityIngest + 'static,
{
  engine
    .record_compatibility(body.user_a, body.user_b, body.score)
    .await?;
  Ok(StatusCode::NO_CONTENT)
}
