//! Behavior events and the impact table that turns them into reputation.
//!
//! Events are append-only. The impact stored on an event is the decayed value
//! that was actually applied when it was recorded; it is never recomputed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString};
use uuid::Uuid;

use crate::{Error, Result, user::UserId};

// ─── Behavior types ──────────────────────────────────────────────────────────

/// Observed behaviors. Each one moves exactly one reputation component.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  AsRefStr,
  EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum BehaviorType {
  // ── Positive ────────────────────────────────────────────────────────────
  ThoughtfulMessage,
  PromptResponse,
  ScheduledDate,
  CompletedDate,
  PositiveFeedback,
  GracefulDecline,
  ProfileComplete,
  VideoVerified,

  // ── Negative ────────────────────────────────────────────────────────────
  LowEffortMessage,
  SlowResponse,
  Ghosting,
  NoShow,
  NegativeFeedback,
  Reported,
  ReportUpheld,
  InappropriateContent,
  Misrepresentation,
}

/// The four reputation components.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Component {
  ResponseQuality,
  Respect,
  Authenticity,
  Investment,
}

impl BehaviorType {
  /// Parse a stored or user-supplied discriminant. Unknown strings are an
  /// error, never a zero-impact default.
  pub fn parse(s: &str) -> Result<Self> {
    s.parse()
      .map_err(|_| Error::UnknownBehaviorType(s.to_owned()))
  }

  /// Undecayed impact of the first occurrence.
  pub fn base_impact(self) -> f64 {
    match self {
      Self::ThoughtfulMessage => 0.5,
      Self::PromptResponse => 0.3,
      Self::ScheduledDate => 1.0,
      Self::CompletedDate => 2.0,
      Self::PositiveFeedback => 2.5,
      Self::GracefulDecline => 0.5,
      Self::ProfileComplete => 1.0,
      Self::VideoVerified => 3.0,
      Self::LowEffortMessage => -0.3,
      Self::SlowResponse => -0.2,
      Self::Ghosting => -2.0,
      Self::NoShow => -5.0,
      Self::NegativeFeedback => -2.0,
      Self::Reported => -1.0,
      Self::ReportUpheld => -10.0,
      Self::InappropriateContent => -5.0,
      Self::Misrepresentation => -15.0,
    }
  }

  /// The component this behavior moves.
  pub fn component(self) -> Component {
    match self {
      Self::ThoughtfulMessage
      | Self::PromptResponse
      | Self::LowEffortMessage
      | Self::SlowResponse => Component::ResponseQuality,

      Self::Ghosting
      | Self::GracefulDecline
      | Self::Reported
      | Self::ReportUpheld
      | Self::InappropriateContent => Component::Respect,

      Self::VideoVerified | Self::ProfileComplete | Self::Misrepresentation => {
        Component::Authenticity
      }

      Self::ScheduledDate
      | Self::CompletedDate
      | Self::PositiveFeedback
      | Self::NegativeFeedback
      | Self::NoShow => Component::Investment,
    }
  }

  pub fn is_positive(self) -> bool { self.base_impact() > 0.0 }
}

// ─── Decay ───────────────────────────────────────────────────────────────────

/// Diminishing returns for repeated behavior of the same type by the same
/// user.
///
/// The n-th occurrence (1-based) is weighted by
/// `floor + (1 - floor) * factor^(n-1)`: the first occurrence counts fully,
/// each later one strictly less, converging on `floor` without reaching
/// zero.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DecayPolicy {
  /// Geometric ratio between successive occurrences, in `(0, 1)`.
  pub factor: f64,
  /// Asymptotic weight, in `(0, 1)`.
  pub floor:  f64,
}

impl DecayPolicy {
  pub const DEFAULT_FACTOR: f64 = 0.8;
  pub const DEFAULT_FLOOR: f64 = 0.1;

  /// Weight applied to an event when `prior` events of the same type have
  /// already been recorded for the user.
  pub fn weight(&self, prior: u64) -> f64 {
    self.floor + (1.0 - self.floor) * self.factor.powf(prior as f64)
  }

  pub fn applied_impact(&self, behavior: BehaviorType, prior: u64) -> f64 {
    behavior.base_impact() * self.weight(prior)
  }
}

impl Default for DecayPolicy {
  fn default() -> Self {
    Self { factor: Self::DEFAULT_FACTOR, floor: Self::DEFAULT_FLOOR }
  }
}

// ─── Events ──────────────────────────────────────────────────────────────────

/// A recorded behavior. Immutable once written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BehaviorEvent {
  pub event_id:          Uuid,
  /// The user who performed the behavior.
  pub user:              UserId,
  pub target:            Option<UserId>,
  pub behavior_type:     BehaviorType,
  pub occurred_at:       DateTime<Utc>,
  /// Decayed impact actually applied, frozen at write time.
  pub reputation_impact: f64,
  pub metadata:          Option<serde_json::Value>,
}

/// Input to `ReputationEngine::record_behavior`.
#[derive(Debug, Clone)]
pub struct NewBehavior {
  pub user:          UserId,
  pub behavior_type: BehaviorType,
  pub target:        Option<UserId>,
  pub metadata:      Option<serde_json::Value>,
}

impl NewBehavior {
  pub fn new(user: UserId, behavior_type: BehaviorType) -> Self {
    Self { user, behavior_type, target: None, metadata: None }
  }

  pub fn with_target(mut self, target: UserId) -> Self {
    self.target = Some(target);
    self
  }

  pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
    self.metadata = Some(metadata);
    self
  }

  /// Tag the event with the match window that produced it.
  pub fn with_window(self, token: Uuid) -> Self {
    self.with_metadata(serde_json::json!({ "window": token }))
  }
}
