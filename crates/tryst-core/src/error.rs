//! Error types for `tryst-core`.
//!
//! These are the caller-visible domain failures. None of them are retried
//! automatically.

use thiserror::Error;
use uuid::Uuid;

use crate::{user::UserId, window::WindowStatus};

#[derive(Debug, Error)]
pub enum Error {
  #[error("an active match window already exists between {0} and {1}")]
  Conflict(UserId, UserId),

  #[error("match window not found: {0}")]
  NotFound(Uuid),

  #[error("match window {0} has expired")]
  Expired(Uuid),

  #[error("user {user} is not part of match window {token}")]
  Forbidden { token: Uuid, user: UserId },

  #[error("match window {token} is {status} and {reason}")]
  InvalidState {
    token:  Uuid,
    status: WindowStatus,
    reason: &'static str,
  },

  #[error("invalid input: {0}")]
  InvalidInput(String),

  #[error("unknown behavior type: {0:?}")]
  UnknownBehaviorType(String),

  #[error("unknown window status: {0:?}")]
  UnknownStatus(String),

  #[error("unknown trust level: {0:?}")]
  UnknownTrustLevel(String),

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
