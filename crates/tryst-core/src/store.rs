//! Storage traits for match windows, the behavior ledger and reputation
//! scores.
//!
//! The traits are implemented by storage backends (e.g.
//! `tryst-store-sqlite`). The engines depend on this abstraction, not on any
//! concrete backend.
//!
//! Mutable rows (windows and scores) carry a `version`. Updates are
//! compare-and-swap on that version: a write succeeds only if nobody else
//! wrote the row since it was read. This is what serializes concurrent
//! confirmations, overlapping sweeps and concurrent behavior recording for
//! the same user.

use std::future::Future;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  behavior::{BehaviorEvent, BehaviorType},
  collab::ConversationRef,
  reputation::ReputationScore,
  user::UserId,
  window::MatchWindow,
};

// ─── Query type ──────────────────────────────────────────────────────────────

/// Per-user views over windows, all evaluated against `as_of`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserWindows {
  /// Non-terminal, unexpired, and the user has not confirmed. Soonest
  /// deadline first.
  Pending,
  /// The user confirmed, the other side has not, unexpired. Soonest
  /// deadline first.
  Waiting,
  /// Status `Confirmed`. Most recently updated first.
  Confirmed,
}

// ─── Windows ─────────────────────────────────────────────────────────────────

pub trait WindowStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Persist a new window. Returns `false` without writing if an active
  /// window already exists for the unordered pair. The check must hold
  /// under concurrent inserts.
  fn insert_window(
    &self,
    window: MatchWindow,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  /// Retrieve a window by token. Returns `None` if not found.
  fn get_window(
    &self,
    token: Uuid,
  ) -> impl Future<Output = Result<Option<MatchWindow>, Self::Error>> + Send + '_;

  /// Whether an active window exists between `a` and `b`, in either order.
  fn has_active_window(
    &self,
    a: UserId,
    b: UserId,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  /// Overwrite the mutable fields of `window` if the stored version still
  /// equals `window.version`. On success the stored version is incremented
  /// and `true` is returned; on a version mismatch nothing is written.
  fn update_window(
    &self,
    window: MatchWindow,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  /// Persist an expired `window` under the same version check as
  /// [`update_window`](Self::update_window). When `ghosting` is given, its
  /// event is appended and its score written under the score version check
  /// (as [`ReputationStore::commit_behavior`] does), all in one transaction.
  /// Returns `false`, writing nothing, if either version check fails.
  fn commit_expiry(
    &self,
    window: MatchWindow,
    ghosting: Option<(BehaviorEvent, ReputationScore)>,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  /// Attach a conversation to a window that has none yet. Returns `false`
  /// if one was already attached.
  fn attach_conversation(
    &self,
    token: Uuid,
    conversation: ConversationRef,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  /// Windows for `user` matching `view`, evaluated at `as_of`.
  fn user_windows(
    &self,
    user: UserId,
    view: UserWindows,
    as_of: DateTime<Utc>,
  ) -> impl Future<Output = Result<Vec<MatchWindow>, Self::Error>> + Send + '_;

  /// Number of windows in the [`UserWindows::Pending`] view.
  fn count_pending(
    &self,
    user: UserId,
    as_of: DateTime<Utc>,
  ) -> impl Future<Output = Result<u64, Self::Error>> + Send + '_;

  /// Non-terminal windows whose deadline is at or before `now`.
  fn due_for_expiry(
    &self,
    now: DateTime<Utc>,
  ) -> impl Future<Output = Result<Vec<MatchWindow>, Self::Error>> + Send + '_;

  /// Non-terminal windows with a deadline in `(from, until]`.
  fn expiring_between(
    &self,
    from: DateTime<Utc>,
    until: DateTime<Utc>,
  ) -> impl Future<Output = Result<Vec<MatchWindow>, Self::Error>> + Send + '_;
}

// ─── Behavior ledger ─────────────────────────────────────────────────────────

/// Read surface of the append-only behavior log. Appends happen through
/// [`ReputationStore::commit_behavior`] so that the event and the score
/// change land together.
pub trait BehaviorLedger: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Number of events of `behavior` ever recorded for `user`.
  fn count_behavior(
    &self,
    user: UserId,
    behavior: BehaviorType,
  ) -> impl Future<Output = Result<u64, Self::Error>> + Send + '_;

  /// Events for `user` that occurred at or after `since`, newest first.
  fn behavior_since(
    &self,
    user: UserId,
    since: DateTime<Utc>,
  ) -> impl Future<Output = Result<Vec<BehaviorEvent>, Self::Error>> + Send + '_;
}

// ─── Reputation ──────────────────────────────────────────────────────────────

pub trait ReputationStore: BehaviorLedger {
  /// Retrieve the score row for `user`. Returns `None` if none exists.
  fn get_score(
    &self,
    user: UserId,
  ) -> impl Future<Output = Result<Option<ReputationScore>, <Self as BehaviorLedger>::Error>>
  + Send
  + '_;

  /// Insert `score` unless a row for the same user exists, then return the
  /// stored row (either the new one or the pre-existing one).
  fn insert_score_if_absent(
    &self,
    score: ReputationScore,
  ) -> impl Future<Output = Result<ReputationScore, <Self as BehaviorLedger>::Error>>
  + Send
  + '_;

  /// Append `event` and overwrite the user's score in a single transaction,
  /// provided the stored score version still equals `score.version`.
  /// Returns `false`, writing nothing, on a version mismatch.
  fn commit_behavior(
    &self,
    event: BehaviorEvent,
    score: ReputationScore,
  ) -> impl Future<Output = Result<bool, <Self as BehaviorLedger>::Error>> + Send + '_;
}
