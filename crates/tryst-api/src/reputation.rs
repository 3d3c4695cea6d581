//! Handlers for `/reputation` endpoints.
//!
//! Behavior is reported by other subsystems (messaging, date feedback,
//! moderation), so these routes take the subject user from the path rather
//! than from the acting-user header.

use axum::{
  Json,
  extract::{Path, Query, State},
  http::StatusCode,
  response::IntoResponse,
};
use serde::{Deserialize, Serialize};
use tryst_core::{
  UserId,
  behavior::{BehaviorEvent, BehaviorType, NewBehavior},
  collab::{CompatibilityFeed, ConversationService},
  reputation::ReputationScore,
};
use tryst_engine::MatchStore;
use uuid::Uuid;

use crate::{Engine, error::ApiError};

/// Default trailing window for `GET /reputation/{user}/behavior`.
pub const DEFAULT_RECENT_DAYS: u32 = 30;

/// A stored score plus its derived overall value.
#[derive(Debug, Serialize)]
pub struct ScoreView {
  #[serde(flatten)]
  pub score:   ReputationScore,
  pub overall: f64,
}

impl From<ReputationScore> for ScoreView {
  fn from(score: ReputationScore) -> Self {
    let overall = score.overall();
    Self { score, overall }
  }
}

/// `GET /reputation/{user}`: a neutral score is created on first access.
pub async fn get_one<S, V, F>(
  State(engine): State<Engine<S, V, F>>,
  Path(user): Path<Uuid>,
) -> Result<Json<ScoreView>, ApiError>
where
  S: MatchStore,
  V: ConversationService + 'static,
  F: CompatibilityFeed + 'static,
{
  let score = engine
    .reputation()
    .get_or_create_reputation(UserId(user))
    .await?;
  Ok(Json(score.into()))
}

/// JSON body accepted by `POST /reputation/{user}/behavior`.
#[derive(Debug, Deserialize)]
pub struct BehaviorBody {
  /// snake_case behavior name, e.g. `"thoughtful_message"`.
  pub behavior_type: String,
  pub target:        Option<UserId>,
  pub metadata:      Option<serde_json::Value>,
}

/// `POST /reputation/{user}/behavior`: returns 201 + the stored event.
pub async fn record<S, V, F>(
  State(engine): State<Engine<S, V, F>>,
  Path(user): Path<Uuid>,
  Json(body): Json<BehaviorBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: MatchStore,
  V: ConversationService + 'static,
  F: CompatibilityFeed + 'static,
{
  let behavior = NewBehavior {
    user:          UserId(user),
    behavior_type: BehaviorType::parse(&body.behavior_type)?,
    target:        body.target,
    metadata:      body.metadata,
  };
  let event = engine.reputation().record_behavior(behavior).await?;
  Ok((StatusCode::CREATED, Json(event)))
}

#[derive(Debug, Deserialize)]
pub struct RecentParams {
  pub days: Option<u32>,
}

/// `GET /reputation/{user}/behavior[?days=N]`: newest first.
pub async fn recent<S, V, F>(
  State(engine): State<Engine<S, V, F>>,
  Path(user): Path<Uuid>,
  Query(params): Query<RecentParams>,
) -> Result<Json<Vec<BehaviorEvent>>, ApiError>
where
  S: MatchStore,
  V: ConversationService + 'static,
  F: CompatibilityFeed + 'static,
{
  let days = params.days.unwrap_or(DEFAULT_RECENT_DAYS);
  let events = engine
    .reputation()
    .get_recent_behavior(UserId(user), days)
    .await?;
  Ok(Json(events))
}
