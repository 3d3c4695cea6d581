//! Handlers for the acting user's own windows (`/me/...`).

use axum::{Json, extract::State};
use serde::Serialize;
use tryst_core::{
  collab::{CompatibilityFeed, ConversationService},
  window::MatchWindow,
};
use tryst_engine::{Dashboard, MatchStore};

use crate::{ActingUser, Engine, error::ApiError};

/// `GET /me/windows/pending`: soonest deadline first.
pub async fn pending<S, V, F>(
  State(engine): State<Engine<S, V, F>>,
  ActingUser(acting): ActingUser,
) -> Result<Json<Vec<MatchWindow>>, ApiError>
where
  S: MatchStore,
  V: ConversationService + 'static,
  F: CompatibilityFeed + 'static,
{
  Ok(Json(engine.pending_decisions(acting).await?))
}

#[derive(Debug, Serialize)]
pub struct Count {
  pub count: u64,
}

/// `GET /me/windows/pending/count`
pub async fn pending_count<S, V, F>(
  State(engine): State<Engine<S, V, F>>,
  ActingUser(acting): ActingUser,
) -> Result<Json<Count>, ApiError>
where
  S: MatchStore,
  V: ConversationService + 'static,
  F: CompatibilityFeed + 'static,
{
  let count = engine.pending_count(acting).await?;
  Ok(Json(Count { count }))
}

/// `GET /me/windows/waiting`
pub async fn waiting<S, V, F>(
  State(engine): State<Engine<S, V, F>>,
  ActingUser(acting): ActingUser,
) -> Result<Json<Vec<MatchWindow>>, ApiError>
where
  S: MatchStore,
  V: ConversationService + 'static,
  F: CompatibilityFeed + 'static,
{
  Ok(Json(engine.waiting_matches(acting).await?))
}

/// `GET /me/windows/confirmed`: most recently matched first.
pub async fn confirmed<S, V, F>(
  State(engine): State<Engine<S, V, F>>,
  ActingUser(acting): ActingUser,
) -> Result<Json<Vec<MatchWindow>>, ApiError>
where
  S: MatchStore,
  V: ConversationService + 'static,
  F: CompatibilityFeed + 'static,
{
  Ok(Json(engine.confirmed_matches(acting).await?))
}

/// `GET /me/dashboard`
pub async fn dashboard<S, V, F>(
  State(engine): State<Engine<S, V, F>>,
  ActingUser(acting): ActingUser,
) -> Result<Json<Dashboard>, ApiError>
where
  S: MatchStore,
  V: ConversationService + 'static,
  F: CompatibilityFeed + 'static,
{
  Ok(Json(engine.dashboard(acting).await?))
}
