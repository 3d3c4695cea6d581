//! External collaborators consumed by the engines.
//!
//! Conversations and compatibility scoring belong to other subsystems. This
//! core only needs an opaque conversation handle once both users confirm,
//! and a feed of precomputed pair scores.

use std::{fmt, future::Future};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result, user::UserId};

/// Opaque reference to a messaging thread created elsewhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConversationRef(pub Uuid);

impl fmt::Display for ConversationRef {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    self.0.fmt(f)
  }
}

/// A compatibility score for a pair, as seen from `user`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompatibilityScore {
  pub user:  UserId,
  pub other: UserId,
  /// In `[0, 1]`; origin is opaque to this core.
  pub score: f64,
}

impl CompatibilityScore {
  /// Validate a score for the pair `(user, other)`.
  pub fn new(user: UserId, other: UserId, score: f64) -> Result<Self> {
    if user == other {
      return Err(Error::InvalidInput(format!("{user} cannot be scored against themself")));
    }
    check_score(score)?;
    Ok(Self { user, other, score })
  }
}

/// Reject compatibility scores outside `[0, 1]`, NaN included.
pub fn check_score(score: f64) -> Result<()> {
  if !(0.0..=1.0).contains(&score) {
    return Err(Error::InvalidInput(format!(
      "compatibility score must be within [0, 1], got {score}"
    )));
  }
  Ok(())
}

/// Creates (or reuses) the conversation between two confirmed users.
pub trait ConversationService: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// `at` is the moment the pair matched.
  fn create_conversation(
    &self,
    a: UserId,
    b: UserId,
    at: DateTime<Utc>,
  ) -> impl Future<Output = Result<ConversationRef, Self::Error>> + Send + '_;
}

/// Sink for scores produced by the ranking subsystem. Scores are symmetric:
/// writing `(a, b)` replaces any previous score for `(b, a)`.
pub trait CompatibilityIngest: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  fn upsert_compatibility(
    &self,
    score: CompatibilityScore,
    at: DateTime<Utc>,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;
}

/// Source of compatibility scores.
pub trait CompatibilityFeed: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Every known score involving `user`, in either position of the pair.
  /// The returned rows are oriented so that `CompatibilityScore::user ==
  /// user`.
  fn scores_for(
    &self,
    user: UserId,
  ) -> impl Future<Output = Result<Vec<CompatibilityScore>, Self::Error>> + Send + '_;
}
