//! [`ReputationEngine`]: behavior recording, decay and score maintenance.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use tryst_core::{
  UserId,
  behavior::{BehaviorEvent, DecayPolicy, NewBehavior},
  clock::Clock,
  reputation::{ReputationScore, TrustPolicy},
  store::ReputationStore,
};

use crate::{Error, MAX_ATTEMPTS, Result, error::store_err};

pub struct ReputationEngine<S> {
  store: S,
  clock: Arc<dyn Clock>,
  decay: DecayPolicy,
  trust: TrustPolicy,
}

impl<S: ReputationStore> ReputationEngine<S> {
  /// An engine with the default [`DecayPolicy`] and [`TrustPolicy`].
  pub fn new(store: S, clock: Arc<dyn Clock>) -> Self {
    Self {
      store,
      clock,
      decay: DecayPolicy::default(),
      trust: TrustPolicy::default(),
    }
  }

  pub fn with_policies(mut self, decay: DecayPolicy, trust: TrustPolicy) -> Self {
    self.decay = decay;
    self.trust = trust;
    self
  }

  pub fn decay_policy(&self) -> &DecayPolicy { &self.decay }

  pub fn trust_policy(&self) -> &TrustPolicy { &self.trust }

  /// The user's score, creating a neutral one on first access.
  pub async fn get_or_create_reputation(&self, user: UserId) -> Result<ReputationScore> {
    if let Some(score) = self.store.get_score(user).await.map_err(store_err)? {
      return Ok(score);
    }

    let fresh = ReputationScore::new(user, self.clock.now());
    self
      .store
      .insert_score_if_absent(fresh)
      .await
      .map_err(store_err)
  }

  /// Append a behavior event and fold its decayed impact into the user's
  /// score. Returns the stored event.
  ///
  /// The occurrence count used for decay is read under the score version,
  /// so concurrent recordings for the same user never share a multiplier.
  pub async fn record_behavior(&self, behavior: NewBehavior) -> Result<BehaviorEvent> {
    let user = behavior.user;

    for attempt in 1..=MAX_ATTEMPTS {
      let staged = self.stage(&behavior).await?;

      if self
        .store
        .commit_behavior(staged.event.clone(), staged.next.clone())
        .await
        .map_err(store_err)?
      {
        staged.log_committed();
        return Ok(staged.event);
      }

      tracing::debug!(%user, attempt, "reputation changed concurrently; retrying");
    }

    Err(Error::Contention(user.as_uuid()))
  }

  /// Build the event and the resulting score for `behavior` against the
  /// current score, without writing. The caller commits both under the
  /// version carried by the staged score.
  pub(crate) async fn stage(&self, behavior: &NewBehavior) -> Result<Staged> {
    let user          = behavior.user;
    let behavior_type = behavior.behavior_type;

    let current = self.get_or_create_reputation(user).await?;
    let prior = self
      .store
      .count_behavior(user, behavior_type)
      .await
      .map_err(store_err)?;

    let now    = self.clock.now();
    let impact = self.decay.applied_impact(behavior_type, prior);
    let event  = BehaviorEvent {
      event_id: Uuid::new_v4(),
      user,
      target: behavior.target,
      behavior_type,
      occurred_at: now,
      reputation_impact: impact,
      metadata: behavior.metadata.clone(),
    };

    let mut next = current.clone();
    next.apply(behavior_type, impact, &self.trust, now);

    Ok(Staged { occurrence: prior + 1, current, event, next })
  }

  /// Events for `user` from the trailing `days`, newest first.
  pub async fn get_recent_behavior(
    &self,
    user: UserId,
    days: u32,
  ) -> Result<Vec<BehaviorEvent>> {
    let since = self
      .clock
      .now()
      .checked_sub_signed(Duration::days(i64::from(days)))
      .unwrap_or(DateTime::<Utc>::MIN_UTC);
    self
      .store
      .behavior_since(user, since)
      .await
      .map_err(store_err)
  }
}

/// A behavior event and the score it produces, not yet committed.
pub(crate) struct Staged {
  pub(crate) occurrence: u64,
  pub(crate) current:    ReputationScore,
  pub(crate) event:      BehaviorEvent,
  pub(crate) next:       ReputationScore,
}

impl Staged {
  pub(crate) fn log_committed(&self) {
    let user = self.event.user;
    tracing::debug!(
      %user,
      behavior = %self.event.behavior_type,
      occurrence = self.occurrence,
      impact = self.event.reputation_impact,
      "behavior recorded"
    );
    if self.next.trust_level != self.current.trust_level {
      tracing::info!(
        %user,
        from = %self.current.trust_level,
        to = %self.next.trust_level,
        "trust level changed"
      );
    }
  }
}
