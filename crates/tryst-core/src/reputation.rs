//! Per-user reputation: four bounded component scores, audit counters and a
//! derived trust tier.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString};

use crate::{
  Error, Result,
  behavior::{BehaviorType, Component},
  user::UserId,
};

pub const SCORE_MIN: f64 = 0.0;
pub const SCORE_MAX: f64 = 100.0;
/// Starting value of every component.
pub const SCORE_NEUTRAL: f64 = 50.0;

/// Coarse tier gating downstream privileges.
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
pub enum TrustLevel {
  NewMember,
  Verified,
  Trusted,
  HighlyTrusted,
  UnderReview,
  /// Recovery path between `UnderReview` and `Restricted`; assigned by
  /// moderation, never derived by [`TrustPolicy`].
  Probation,
  Restricted,
}

impl TrustLevel {
  pub fn parse(s: &str) -> Result<Self> {
    s.parse().map_err(|_| Error::UnknownTrustLevel(s.to_owned()))
  }
}

// ─── Score ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReputationScore {
  pub user:                    UserId,
  pub response_quality:        f64,
  pub respect:                 f64,
  pub authenticity:            f64,
  pub investment:              f64,
  pub ghosting_count:          u32,
  pub dates_completed:         u32,
  pub reports_received:        u32,
  pub reports_upheld:          u32,
  pub positive_feedback_count: u32,
  pub trust_level:             TrustLevel,
  pub created_at:              DateTime<Utc>,
  pub updated_at:              DateTime<Utc>,
  /// Bumped by the store on every persisted change.
  pub version:                 u64,
}

impl ReputationScore {
  /// A neutral score for a user with no history.
  pub fn new(user: UserId, now: DateTime<Utc>) -> Self {
    Self {
      user,
      response_quality: SCORE_NEUTRAL,
      respect: SCORE_NEUTRAL,
      authenticity: SCORE_NEUTRAL,
      investment: SCORE_NEUTRAL,
      ghosting_count: 0,
      dates_completed: 0,
      reports_received: 0,
      reports_upheld: 0,
      positive_feedback_count: 0,
      trust_level: TrustLevel::NewMember,
      created_at: now,
      updated_at: now,
      version: 0,
    }
  }

  pub fn component(&self, component: Component) -> f64 {
    match component {
      Component::ResponseQuality => self.response_quality,
      Component::Respect => self.respect,
      Component::Authenticity => self.authenticity,
      Component::Investment => self.investment,
    }
  }

  fn component_mut(&mut self, component: Component) -> &mut f64 {
    match component {
      Component::ResponseQuality => &mut self.response_quality,
      Component::Respect => &mut self.respect,
      Component::Authenticity => &mut self.authenticity,
      Component::Investment => &mut self.investment,
    }
  }

  /// Unweighted mean of the four components. Computed on read, never stored.
  pub fn overall(&self) -> f64 {
    let sum = self.response_quality + self.respect + self.authenticity + self.investment;
    (sum / 4.0).clamp(SCORE_MIN, SCORE_MAX)
  }

  /// Sum of the counters that represent completed positive interactions.
  pub fn positive_history(&self) -> u32 {
    self.dates_completed + self.positive_feedback_count
  }

  /// Apply an already decayed `impact` for `behavior`, bump the matching
  /// counter and re-derive the trust tier.
  pub fn apply(
    &mut self,
    behavior: BehaviorType,
    impact: f64,
    policy: &TrustPolicy,
    now: DateTime<Utc>,
  ) {
    let slot = self.component_mut(behavior.component());
    *slot = (*slot + impact).clamp(SCORE_MIN, SCORE_MAX);

    match behavior {
      BehaviorType::Ghosting => self.ghosting_count += 1,
      BehaviorType::CompletedDate => self.dates_completed += 1,
      BehaviorType::Reported => self.reports_received += 1,
      BehaviorType::ReportUpheld => self.reports_upheld += 1,
      BehaviorType::PositiveFeedback => self.positive_feedback_count += 1,
      _ => {}
    }

    self.trust_level = policy.evaluate(self);
    self.updated_at = now;
  }
}

// ─── Trust policy ────────────────────────────────────────────────────────────

/// Thresholds for deriving [`TrustLevel`]. Rules are checked top to bottom:
///
/// 1. `reports_upheld >= max_upheld_reports` → `Restricted`
/// 2. overall below `restricted_below` → `Restricted`
/// 3. overall below `review_below` → `UnderReview`
/// 4. positive history below `established_history` → `NewMember`
/// 5. overall and history at the highly-trusted bar → `HighlyTrusted`
/// 6. overall and history at the trusted bar → `Trusted`
/// 7. otherwise `Verified`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrustPolicy {
  pub max_upheld_reports:     u32,
  pub restricted_below:       f64,
  pub review_below:           f64,
  pub established_history:    u32,
  pub trusted_score:          f64,
  pub trusted_history:        u32,
  pub highly_trusted_score:   f64,
  pub highly_trusted_history: u32,
}

impl Default for TrustPolicy {
  fn default() -> Self {
    Self {
      max_upheld_reports:     3,
      restricted_below:       30.0,
      review_below:           50.0,
      established_history:    3,
      trusted_score:          65.0,
      trusted_history:        5,
      highly_trusted_score:   80.0,
      highly_trusted_history: 10,
    }
  }
}

impl TrustPolicy {
  pub fn evaluate(&self, score: &ReputationScore) -> TrustLevel {
    let overall = score.overall();
    let history = score.positive_history();

    if score.reports_upheld >= self.max_upheld_reports || overall < self.restricted_below {
      TrustLevel::Restricted
    } else if overall < self.review_below {
      TrustLevel::UnderReview
    } else if history < self.established_history {
      TrustLevel::NewMember
    } else if overall >= self.highly_trusted_score && history >= self.highly_trusted_history {
      TrustLevel::HighlyTrusted
    } else if overall >= self.trusted_score && history >= self.trusted_history {
      TrustLevel::Trusted
    } else {
      TrustLevel::Verified
    }
  }
}
