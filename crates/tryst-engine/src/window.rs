//! [`MatchWindowEngine`]: the match window lifecycle.
//!
//! The engine loads a window, lets [`MatchWindow::apply`] validate the event,
//! and writes the result back with a version compare-and-swap. Side effects
//! (conversation creation, behavior events) run only for the caller whose
//! write produced the transition, so a transition can never fire them twice.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use uuid::Uuid;

use tryst_core::{
  Error as CoreError, UserId,
  behavior::{BehaviorType, NewBehavior},
  clock::Clock,
  collab::{
    CompatibilityFeed, CompatibilityIngest, CompatibilityScore, ConversationService,
  },
  store::{UserWindows, WindowStore},
  window::{MatchWindow, Side, Transition, WindowEvent, WindowStatus},
};

use crate::{Error, MAX_ATTEMPTS, MatchStore, ReputationEngine, Result, error::store_err};

// ─── Reports ─────────────────────────────────────────────────────────────────

/// Outcome of one expiration sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
  /// Windows that were due when the sweep started.
  pub examined:  usize,
  pub expired:   usize,
  pub ghostings: usize,
  /// Already closed by someone else by the time we got to them.
  pub skipped:   usize,
  pub failed:    usize,
}

/// A participant who has not confirmed a window that expires soon.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExpirationReminder {
  pub token:           Uuid,
  pub user:            UserId,
  pub other:           UserId,
  pub expires_at:      DateTime<Utc>,
  pub hours_remaining: i64,
}

/// Everything a user needs to decide on, in one read.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Dashboard {
  pub pending:       Vec<MatchWindow>,
  pub waiting:       Vec<MatchWindow>,
  pub confirmed:     Vec<MatchWindow>,
  pub pending_count: u64,
}

// ─── Engine ──────────────────────────────────────────────────────────────────

pub struct MatchWindowEngine<S, V, F> {
  store:         S,
  reputation:    ReputationEngine<S>,
  conversations: V,
  feed:          F,
  clock:         Arc<dyn Clock>,
}

impl<S, V, F> MatchWindowEngine<S, V, F>
where
  S: MatchStore,
  V: ConversationService,
  F: CompatibilityFeed,
{
  pub fn new(store: S, conversations: V, feed: F, clock: Arc<dyn Clock>) -> Self {
    let reputation = ReputationEngine::new(store.clone(), Arc::clone(&clock));
    Self { store, reputation, conversations, feed, clock }
  }

  /// Replace the reputation engine, e.g. to tune its policies.
  pub fn with_reputation(mut self, reputation: ReputationEngine<S>) -> Self {
    self.reputation = reputation;
    self
  }

  pub fn reputation(&self) -> &ReputationEngine<S> { &self.reputation }

  pub fn now(&self) -> DateTime<Utc> { self.clock.now() }

  // ── Creation ──────────────────────────────────────────────────────────

  /// Open a window for the pair. Fails with `Conflict` if the pair already
  /// has an active window, in either order.
  pub async fn create_window(
    &self,
    user_a: UserId,
    user_b: UserId,
    compatibility_score: f64,
  ) -> Result<MatchWindow> {
    let window = MatchWindow::open(user_a, user_b, compatibility_score, self.clock.now())?;

    let inserted = self
      .store
      .insert_window(window.clone())
      .await
      .map_err(store_err)?;
    if !inserted {
      return Err(CoreError::Conflict(user_a, user_b).into());
    }

    tracing::info!(
      token = %window.token,
      %user_a,
      %user_b,
      score = compatibility_score,
      "match window opened"
    );
    Ok(window)
  }

  /// Open a window with every partner whose compatibility with `user` is at
  /// least `threshold`. Pairs that already have an active window are
  /// skipped, as are creations that lose a race to a concurrent one.
  pub async fn create_windows_for_high_matches(
    &self,
    user: UserId,
    threshold: f64,
  ) -> Result<Vec<MatchWindow>> {
    if !threshold.is_finite() {
      let reason = format!("threshold must be finite, got {threshold}");
      return Err(CoreError::InvalidInput(reason).into());
    }

    let scores = self
      .feed
      .scores_for(user)
      .await
      .map_err(|e| Error::Feed(Box::new(e)))?;

    let mut created = Vec::new();
    for candidate in scores {
      if candidate.score < threshold || candidate.other == user {
        continue;
      }
      let has_active = self
        .store
        .has_active_window(user, candidate.other)
        .await
        .map_err(store_err)?;
      if has_active {
        continue;
      }

      match self.create_window(user, candidate.other, candidate.score).await {
        Ok(window) => created.push(window),
        Err(Error::Domain(CoreError::Conflict(..))) => {
          tracing::debug!(
            %user,
            other = %candidate.other,
            "window created concurrently; skipping"
          );
        }
        Err(e) => return Err(e),
      }
    }

    tracing::debug!(%user, threshold, created = created.len(), "batch window creation done");
    Ok(created)
  }

  // ── Participant actions ───────────────────────────────────────────────

  /// Record the acting user's interest. The caller whose confirmation
  /// completes the pair creates the conversation.
  ///
  /// Confirming a `Confirmed` window that still has no conversation (its
  /// creation failed earlier) retries the creation.
  pub async fn confirm_interest(&self, token: Uuid, acting: UserId) -> Result<MatchWindow> {
    let (mut window, transition) = self.mutate(token, acting, WindowEvent::Confirm).await?;

    match transition {
      Transition::AwaitingOther { waiting_on } => {
        let waiting_on = window.user(waiting_on);
        tracing::info!(%token, %acting, %waiting_on, "interest confirmed");
      }
      Transition::Confirmed => {
        tracing::info!(%token, user_a = %window.user_a, user_b = %window.user_b, "match confirmed");
      }
      _ => {}
    }

    if window.status == WindowStatus::Confirmed
      && window.conversation.is_none()
      && self.open_conversation(&mut window).await?
    {
      self.record_scheduled_dates(&window).await;
    }

    Ok(window)
  }

  /// Close the window on behalf of the acting user. Irreversible.
  pub async fn decline_match(&self, token: Uuid, acting: UserId) -> Result<MatchWindow> {
    let (window, transition) = self.mutate(token, acting, WindowEvent::Decline).await?;

    if let Transition::Declined { by } = transition {
      tracing::info!(%token, %acting, "match declined");
      let behavior = NewBehavior::new(window.user(by), BehaviorType::GracefulDecline)
        .with_target(window.user(by.other()))
        .with_window(token);
      if let Err(e) = self.reputation.record_behavior(behavior).await {
        tracing::warn!(%token, %acting, error = %e, "failed to record graceful decline");
      }
    }

    Ok(window)
  }

  /// Use the pair's one-time extension.
  pub async fn request_extension(&self, token: Uuid, acting: UserId) -> Result<MatchWindow> {
    let (window, _) = self.mutate(token, acting, WindowEvent::Extend).await?;
    tracing::info!(%token, %acting, expires_at = %window.expires_at, "match window extended");
    Ok(window)
  }

  /// Attach the acting user's opening message.
  pub async fn send_intro_message(
    &self,
    token: Uuid,
    acting: UserId,
    message: &str,
  ) -> Result<MatchWindow> {
    let (window, _) = self
      .mutate(token, acting, |side| WindowEvent::Intro(side, message.to_owned()))
      .await?;
    tracing::debug!(%token, %acting, "intro message sent");
    Ok(window)
  }

  // ── Scheduled work ────────────────────────────────────────────────────

  /// Expire every undecided window whose deadline has passed, recording a
  /// ghosting event wherever exactly one side had confirmed.
  ///
  /// A failure on one window is logged and the sweep moves on.
  pub async fn expire_windows(&self) -> Result<SweepReport> {
    let now = self.clock.now();
    let due = self.store.due_for_expiry(now).await.map_err(store_err)?;

    let mut report = SweepReport { examined: due.len(), ..SweepReport::default() };
    for window in due {
      let token = window.token;
      match self.expire_one(window, now).await {
        Ok(None) => report.skipped += 1,
        Ok(Some(ghosted)) => {
          report.expired += 1;
          if ghosted {
            report.ghostings += 1;
          }
        }
        Err(e) => {
          report.failed += 1;
          tracing::error!(%token, error = %e, "failed to expire match window");
        }
      }
    }

    if report.examined > 0 {
      tracing::info!(
        examined = report.examined,
        expired = report.expired,
        ghostings = report.ghostings,
        skipped = report.skipped,
        failed = report.failed,
        "expiration sweep finished"
      );
    }
    Ok(report)
  }

  /// Participants who still owe a decision on a window expiring within
  /// `lead`.
  pub async fn expiration_reminders(&self, lead: Duration) -> Result<Vec<ExpirationReminder>> {
    let now = self.clock.now();
    let windows = self
      .store
      .expiring_between(now, now + lead)
      .await
      .map_err(store_err)?;

    let reminders = windows
      .iter()
      .flat_map(|w| {
        [Side::A, Side::B]
          .into_iter()
          .filter(|side| !w.is_confirmed_by(*side))
          .map(move |side| ExpirationReminder {
            token:           w.token,
            user:            w.user(side),
            other:           w.user(side.other()),
            expires_at:      w.expires_at,
            hours_remaining: w.hours_remaining(now),
          })
      })
      .collect();

    Ok(reminders)
  }

  // ── Queries ───────────────────────────────────────────────────────────

  pub async fn get_window(&self, token: Uuid) -> Result<Option<MatchWindow>> {
    self.store.get_window(token).await.map_err(store_err)
  }

  /// Undecided, unexpired windows where the acting user still has to
  /// answer. Soonest deadline first.
  pub async fn pending_decisions(&self, acting: UserId) -> Result<Vec<MatchWindow>> {
    self.view(acting, UserWindows::Pending).await
  }

  /// Windows the acting user confirmed and the other side has not.
  pub async fn waiting_matches(&self, acting: UserId) -> Result<Vec<MatchWindow>> {
    self.view(acting, UserWindows::Waiting).await
  }

  pub async fn confirmed_matches(&self, acting: UserId) -> Result<Vec<MatchWindow>> {
    self.view(acting, UserWindows::Confirmed).await
  }

  pub async fn pending_count(&self, acting: UserId) -> Result<u64> {
    self
      .store
      .count_pending(acting, self.clock.now())
      .await
      .map_err(store_err)
  }

  pub async fn dashboard(&self, acting: UserId) -> Result<Dashboard> {
    let pending = self.pending_decisions(acting).await?;
    Ok(Dashboard {
      pending_count: pending.len() as u64,
      pending,
      waiting: self.waiting_matches(acting).await?,
      confirmed: self.confirmed_matches(acting).await?,
    })
  }

  // ── Internals ─────────────────────────────────────────────────────────

  async fn view(&self, acting: UserId, view: UserWindows) -> Result<Vec<MatchWindow>> {
    self
      .store
      .user_windows(acting, view, self.clock.now())
      .await
      .map_err(store_err)
  }

  async fn load(&self, token: Uuid) -> Result<MatchWindow> {
    self
      .get_window(token)
      .await?
      .ok_or_else(|| CoreError::NotFound(token).into())
  }

  /// Read-apply-CAS loop for a participant event. Returns the window as
  /// stored after the write together with the transition it produced.
  async fn mutate<E>(
    &self,
    token: Uuid,
    acting: UserId,
    event: E,
  ) -> Result<(MatchWindow, Transition)>
  where
    E: Fn(Side) -> WindowEvent,
  {
    for attempt in 1..=MAX_ATTEMPTS {
      let mut window = self.load(token).await?;
      let side = window.participant(acting)?;
      let transition = window.apply(&event(side), self.clock.now())?;

      if !transition.is_change() {
        return Ok((window, transition));
      }
      if self.store.update_window(window.clone()).await.map_err(store_err)? {
        window.version += 1;
        return Ok((window, transition));
      }

      tracing::debug!(%token, attempt, "match window changed concurrently; retrying");
    }

    Err(Error::Contention(token))
  }

  /// Returns `Some(ghosted)` if this call expired the window, `None` if
  /// another writer had already closed it.
  ///
  /// The EXPIRED write and the ghosting event commit together, so a failure
  /// leaves the window due for the next sweep.
  async fn expire_one(
    &self,
    mut window: MatchWindow,
    now: DateTime<Utc>,
  ) -> Result<Option<bool>> {
    let token = window.token;

    for attempt in 1..=MAX_ATTEMPTS {
      let Transition::Expired { ghosted } = window.apply(&WindowEvent::Expire, now)? else {
        return Ok(None);
      };

      let staged = match ghosted {
        Some(ghost) => {
          let behavior = NewBehavior::new(window.user(ghost), BehaviorType::Ghosting)
            .with_target(window.user(ghost.other()))
            .with_window(token);
          Some(self.reputation.stage(&behavior).await?)
        }
        None => None,
      };
      let ghosting = staged.as_ref().map(|s| (s.event.clone(), s.next.clone()));

      if !self
        .store
        .commit_expiry(window.clone(), ghosting)
        .await
        .map_err(store_err)?
      {
        tracing::debug!(%token, attempt, "match window or score changed during sweep; re-reading");
        window = self.load(token).await?;
        continue;
      }

      let Some(staged) = staged else {
        tracing::debug!(%token, "match window expired undecided");
        return Ok(Some(false));
      };
      staged.log_committed();
      tracing::info!(%token, user = %staged.event.user, "ghosting recorded");
      return Ok(Some(true));
    }

    Err(Error::Contention(token))
  }

  /// Create and attach the pair's conversation. Returns `true` if this call
  /// attached it.
  async fn open_conversation(&self, window: &mut MatchWindow) -> Result<bool> {
    let conversation = self
      .conversations
      .create_conversation(window.user_a, window.user_b, self.clock.now())
      .await
      .map_err(|e| Error::Conversation(Box::new(e)))?;

    let attached = self
      .store
      .attach_conversation(window.token, conversation)
      .await
      .map_err(store_err)?;

    if attached {
      window.attach_conversation(conversation);
      window.version += 1;
    } else {
      *window = self.load(window.token).await?;
    }
    Ok(attached)
  }

  async fn record_scheduled_dates(&self, window: &MatchWindow) {
    for side in [Side::A, Side::B] {
      let behavior = NewBehavior::new(window.user(side), BehaviorType::ScheduledDate)
        .with_target(window.user(side.other()))
        .with_window(window.token);
      if let Err(e) = self.reputation.record_behavior(behavior).await {
        tracing::warn!(
          token = %window.token,
          user = %window.user(side),
          error = %e,
          "failed to record scheduled date"
        );
      }
    }
  }
}

impl<S, V, F> MatchWindowEngine<S, V, F>
where
  S: MatchStore,
  V: ConversationService,
  F: CompatibilityFeed + CompatibilityIngest,
{
  /// Store the compatibility of a pair for later batch creation.
  pub async fn record_compatibility(&self, a: UserId, b: UserId, score: f64) -> Result<()> {
    let score = CompatibilityScore::new(a, b, score)?;
    self
      .feed
      .upsert_compatibility(score, self.clock.now())
      .await
      .map_err(|e| Error::Feed(Box::new(e)))?;
    tracing::debug!(%a, %b, "compatibility recorded");
    Ok(())
  }
}
