//! Handlers for `/windows` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/windows` | Body: [`CreateBody`]; returns 201 + window |
//! | `POST` | `/windows/batch` | Body: [`BatchBody`]; returns the created windows |
//! | `GET`  | `/windows/{token}` | 404 if unknown |
//! | `POST` | `/windows/{token}/confirm` | Acting user required |
//! | `POST` | `/windows/{token}/decline` | Acting user required |
//! | `POST` | `/windows/{token}/extend` | Acting user required |
//! | `POST` | `/windows/{token}/intro` | Body: [`IntroBody`]; acting user required |

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use serde::Deserialize;
use tryst_core::{
  UserId,
  collab::{CompatibilityFeed, ConversationService},
  window::MatchWindow,
};
use tryst_engine::MatchStore;
use uuid::Uuid;

use crate::{ActingUser, Engine, error::ApiError};

// ─── Create ───────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CreateBody {
  pub user_a:              UserId,
  pub user_b:              UserId,
  pub compatibility_score: f64,
}

/// `POST /windows`: returns 201 + the new window, 409 if the pair is busy.
pub async fn create<S, V, F>(
  State(engine): State<Engine<S, V, F>>,
  Json(body): Json<CreateBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: MatchStore,
  V: ConversationService + 'static,
  F: CompatibilityFeed + 'static,
{
  let window = engine
    .create_window(body.user_a, body.user_b, body.compatibility_score)
    .await?;
  Ok((StatusCode::CREATED, Json(window)))
}

#[derive(Debug, Deserialize)]
pub struct BatchBody {
  pub user:      UserId,
  pub threshold: f64,
}

/// `POST /windows/batch`
pub async fn create_batch<S, V, F>(
  State(engine): State<Engine<S, V, F>>,
  Json(body): Json<BatchBody>,
) -> Result<Json<Vec<MatchWindow>>, ApiError>
where
  S: MatchStore,
  V: ConversationService + 'static,
  F: CompatibilityFeed + 'static,
{
  let created = engine
    .create_windows_for_high_matches(body.user, body.threshold)
    .await?;
  Ok(Json(created))
}

// ─── Get one ──────────────────────────────────────────────────────────────────

/// `GET /windows/{token}`
pub async fn get_one<S, V, F>(
  State(engine): State<Engine<S, V, F>>,
  Path(token): Path<Uuid>,
) -> Result<Json<MatchWindow>, ApiError>
where
  S: MatchStore,
  V: ConversationService + 'static,
  F: CompatibilityFeed + 'static,
{
  let window = engine
    .get_window(token)
    .await?
    .ok_or_else(|| ApiError::NotFound(format!("match window {token} not found")))?;
  Ok(Json(window))
}

// ─── Participant actions ──────────────────────────────────────────────────────

/// `POST /windows/{token}/confirm`
pub async fn confirm<S, V, F>(
  State(engine): State<Engine<S, V, F>>,
  ActingUser(acting): ActingUser,
  Path(token): Path<Uuid>,
) -> Result<Json<MatchWindow>, ApiError>
where
  S: MatchStore,
  V: ConversationService + 'static,
  F: CompatibilityFeed + 'static,
{
  Ok(Json(engine.confirm_interest(token, acting).await?))
}

/// `POST /windows/{token}/decline`
pub async fn decline<S, V, F>(
  State(engine): State<Engine<S, V, F>>,
  ActingUser(acting): ActingUser,
  Path(token): Path<Uuid>,
) -> Result<Json<MatchWindow>, ApiError>
where
  S: MatchStore,
  V: ConversationService + 'static,
  F: CompatibilityFeed + 'static,
{
  Ok(Json(engine.decline_match(token, acting).await?))
}

/// `POST /windows/{token}/extend`
pub async fn extend<S, V, F>(
  State(engine): State<Engine<S, V, F>>,
  ActingUser(acting): ActingUser,
  Path(token): Path<Uuid>,
) -> Result<Json<MatchWindow>, ApiError>
where
  S: MatchStore,
  V: ConversationService + 'static,
  F: CompatibilityFeed + 'static,
{
  Ok(Json(engine.request_extension(token, acting).await?))
}

#[derive(Debug, Deserialize)]
pub struct IntroBody {
  pub message: String,
}

/// `POST /windows/{token}/intro`
pub async fn intro<S, V, F>(
  State(engine): State<Engine<S, V, F>>,
  ActingUser(acting): ActingUser,
  Path(token): Path<Uuid>,
  Json(body): Json<IntroBody>,
) -> Result<Json<MatchWindow>, ApiError>
where
  S: MatchStore,
  V: ConversationService + 'static,
  F: CompatibilityFeed + 'static,
{
  Ok(Json(engine.send_intro_message(token, acting, &body.message).await?))
}
