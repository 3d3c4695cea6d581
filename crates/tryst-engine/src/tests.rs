//! Engine tests against an in-memory SQLite store and a manual clock.

use std::sync::{
  Arc, Mutex,
  atomic::{AtomicBool, Ordering},
};

use chrono::{DateTime, Duration, TimeZone, Utc};
use tryst_core::{
  Error as CoreError, UserId,
  behavior::{BehaviorEvent, BehaviorType, NewBehavior},
  clock::ManualClock,
  collab::{ConversationRef, ConversationService},
  reputation::{ReputationScore, SCORE_MAX, SCORE_MIN, SCORE_NEUTRAL, TrustLevel},
  store::{BehaviorLedger, ReputationStore, UserWindows, WindowStore},
  window::{EXTENSION_HOURS, MatchWindow, WINDOW_DURATION_HOURS, WindowStatus},
};
use tryst_store_sqlite::{Error as StoreError, Result as StoreResult, SqliteStore};
use uuid::Uuid;

use crate::{Error, ExpirationScheduler, MatchWindowEngine, SchedulerConfig, SweepReport};

type Engine = MatchWindowEngine<SqliteStore, SqliteStore, SqliteStore>;

struct Harness {
  engine: Engine,
  clock:  ManualClock,
}

fn t0() -> DateTime<Utc> { Utc.with_ymd_and_hms(2026, 1, 1, 12, 0, 0).unwrap() }

async fn harness() -> Harness {
  let store = SqliteStore::open_in_memory()
    .await
    .expect("in-memory store");
  let clock = ManualClock::new(t0());
  let engine = MatchWindowEngine::new(
    store.clone(),
    store.clone(),
    store,
    Arc::new(clock.clone()),
  );
  Harness { engine, clock }
}

impl Harness {
  /// Every event of `behavior` recorded for `user` in the past year.
  async fn events(&self, user: UserId, behavior: BehaviorType) -> Vec<BehaviorEvent> {
    self
      .engine
      .reputation()
      .get_recent_behavior(user, 365)
      .await
      .unwrap()
      .into_iter()
      .filter(|e| e.behavior_type == behavior)
      .collect()
  }
}

fn users() -> (UserId, UserId) { (UserId::new(), UserId::new()) }

// ─── Creation ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn create_window_starts_pending_with_24h_deadline() {
  let h = harness().await;
  let (a, b) = users();

  let w = h.engine.create_window(a, b, 0.85).await.unwrap();
  assert_eq!(w.status, WindowStatus::PendingBoth);
  assert_eq!(w.expires_at, t0() + Duration::hours(WINDOW_DURATION_HOURS));
  assert_eq!(h.engine.get_window(w.token).await.unwrap(), Some(w));
}

#[tokio::test]
async fn second_active_window_conflicts_in_both_orders() {
  let h = harness().await;
  let (a, b) = users();
  h.engine.create_window(a, b, 0.85).await.unwrap();

  for (x, y) in [(a, b), (b, a)] {
    let err = h.engine.create_window(x, y, 0.9).await.unwrap_err();
    assert!(matches!(err, Error::Domain(CoreError::Conflict(..))), "{err}");
  }
}

#[tokio::test]
async fn concurrent_creates_yield_exactly_one_window() {
  let h = harness().await;
  let (a, b) = users();

  let (first, second) = tokio::join!(
    h.engine.create_window(a, b, 0.8),
    h.engine.create_window(b, a, 0.8),
  );
  assert_eq!([first.is_ok(), second.is_ok()].iter().filter(|ok| **ok).count(), 1);
}

#[tokio::test]
async fn self_window_is_invalid_input() {
  let h = harness().await;
  let a = UserId::new();
  let err = h.engine.create_window(a, a, 0.9).await.unwrap_err();
  assert!(matches!(err, Error::Domain(CoreError::InvalidInput(_))));
}

#[tokio::test]
async fn declined_pair_can_be_matched_again() {
  let h = harness().await;
  let (a, b) = users();
  let w = h.engine.create_window(a, b, 0.85).await.unwrap();
  h.engine.decline_match(w.token, b).await.unwrap();

  assert!(h.engine.create_window(b, a, 0.85).await.is_ok());
}

#[tokio::test]
async fn batch_creation_respects_threshold_and_existing_windows() {
  let h = harness().await;
  let me = UserId::new();
  let (high, low, busy) = (UserId::new(), UserId::new(), UserId::new());

  h.engine.record_compatibility(me, high, 0.92).await.unwrap();
  h.engine.record_compatibility(low, me, 0.40).await.unwrap();
  h.engine.record_compatibility(busy, me, 0.95).await.unwrap();
  h.engine.create_window(busy, me, 0.95).await.unwrap();

  let created = h
    .engine
    .create_windows_for_high_matches(me, 0.75)
    .await
    .unwrap();
  assert_eq!(created.len(), 1);
  assert_eq!(created[0].user_a, me);
  assert_eq!(created[0].user_b, high);
  assert_eq!(created[0].compatibility_score, 0.92);

  // Running it again finds nothing new.
  assert!(h.engine.create_windows_for_high_matches(me, 0.75).await.unwrap().is_empty());

  let err = h.engine.record_compatibility(me, high, 1.2).await.unwrap_err();
  assert!(matches!(err, Error::Domain(CoreError::InvalidInput(_))));
}

// ─── Confirmation ────────────────────────────────────────────────────────────

#[tokio::test]
async fn both_confirmations_open_one_conversation() {
  let h = harness().await;
  let (a, b) = users();
  let w = h.engine.create_window(a, b, 0.85).await.unwrap();

  let after_a = h.engine.confirm_interest(w.token, a).await.unwrap();
  assert_eq!(after_a.status, WindowStatus::PendingUserB);
  assert!(after_a.conversation.is_none());

  let after_b = h.engine.confirm_interest(w.token, b).await.unwrap();
  assert_eq!(after_b.status, WindowStatus::Confirmed);
  assert!(after_b.both_confirmed());
  assert!(after_b.conversation.is_some());
  assert_eq!(h.engine.get_window(w.token).await.unwrap(), Some(after_b));

  for user in [a, b] {
    assert!(h.events(user, BehaviorType::Ghosting).await.is_empty());
    assert_eq!(h.events(user, BehaviorType::ScheduledDate).await.len(), 1);
  }
}

#[tokio::test]
async fn confirmation_order_gives_identical_outcome() {
  let h = harness().await;
  let (a, b) = users();
  let (c, d) = users();
  let ab = h.engine.create_window(a, b, 0.85).await.unwrap();
  let cd = h.engine.create_window(c, d, 0.85).await.unwrap();

  h.engine.confirm_interest(ab.token, a).await.unwrap();
  let ab = h.engine.confirm_interest(ab.token, b).await.unwrap();
  h.engine.confirm_interest(cd.token, d).await.unwrap();
  let cd = h.engine.confirm_interest(cd.token, c).await.unwrap();

  assert_eq!(ab.status, cd.status);
  assert_eq!(ab.version, cd.version);
  assert!(ab.conversation.is_some() && cd.conversation.is_some());
}

#[tokio::test]
async fn reconfirming_changes_nothing() {
  let h = harness().await;
  let (a, b) = users();
  let w = h.engine.create_window(a, b, 0.85).await.unwrap();

  let first = h.engine.confirm_interest(w.token, a).await.unwrap();
  h.clock.advance(Duration::minutes(10));
  let second = h.engine.confirm_interest(w.token, a).await.unwrap();
  assert_eq!(first, second);

  let done = h.engine.confirm_interest(w.token, b).await.unwrap();
  let again = h.engine.confirm_interest(w.token, b).await.unwrap();
  assert_eq!(done, again);
  assert_eq!(h.events(a, BehaviorType::ScheduledDate).await.len(), 1);
}

#[tokio::test]
async fn concurrent_final_confirmations_create_one_conversation() {
  let h = harness().await;
  let (a, b) = users();
  let w = h.engine.create_window(a, b, 0.85).await.unwrap();

  let (ra, rb) = tokio::join!(
    h.engine.confirm_interest(w.token, a),
    h.engine.confirm_interest(w.token, b),
  );
  ra.unwrap();
  rb.unwrap();

  let stored = h.engine.get_window(w.token).await.unwrap().unwrap();
  assert_eq!(stored.status, WindowStatus::Confirmed);
  assert!(stored.conversation.is_some());
  assert_eq!(h.events(a, BehaviorType::ScheduledDate).await.len(), 1);
  assert_eq!(h.events(b, BehaviorType::ScheduledDate).await.len(), 1);
}

#[tokio::test]
async fn confirm_error_cases() {
  let h = harness().await;
  let (a, b) = users();
  let w = h.engine.create_window(a, b, 0.85).await.unwrap();

  let err = h.engine.confirm_interest(Uuid::new_v4(), a).await.unwrap_err();
  assert!(matches!(err, Error::Domain(CoreError::NotFound(_))));

  let err = h.engine.confirm_interest(w.token, UserId::new()).await.unwrap_err();
  assert!(matches!(err, Error::Domain(CoreError::Forbidden { .. })));

  h.clock.advance(Duration::hours(WINDOW_DURATION_HOURS) + Duration::seconds(1));
  let err = h.engine.confirm_interest(w.token, a).await.unwrap_err();
  assert!(matches!(err, Error::Domain(CoreError::Expired(_))));
}

#[tokio::test]
async fn confirming_a_declined_window_is_invalid_state() {
  let h = harness().await;
  let (a, b) = users();
  let w = h.engine.create_window(a, b, 0.85).await.unwrap();
  h.engine.decline_match(w.token, a).await.unwrap();

  let err = h.engine.confirm_interest(w.token, b).await.unwrap_err();
  assert!(matches!(err, Error::Domain(CoreError::InvalidState { .. })));
}

// ─── Decline ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn decline_sets_side_and_records_graceful_decline() {
  let h = harness().await;
  let (a, b) = users();
  let w = h.engine.create_window(a, b, 0.85).await.unwrap();

  let declined = h.engine.decline_match(w.token, b).await.unwrap();
  assert_eq!(declined.status, WindowStatus::DeclinedByB);

  let events = h.events(b, BehaviorType::GracefulDecline).await;
  assert_eq!(events.len(), 1);
  assert_eq!(events[0].target, Some(a));
  assert!(h.events(a, BehaviorType::GracefulDecline).await.is_empty());

  let err = h.engine.decline_match(w.token, a).await.unwrap_err();
  assert!(matches!(err, Error::Domain(CoreError::InvalidState { .. })));
  let err = h.engine.decline_match(w.token, UserId::new()).await.unwrap_err();
  assert!(matches!(err, Error::Domain(CoreError::Forbidden { .. })));
}

// ─── Extension ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn extension_is_single_use_for_the_pair() {
  let h = harness().await;
  let (a, b) = users();
  let w = h.engine.create_window(a, b, 0.85).await.unwrap();

  let extended = h.engine.request_extension(w.token, b).await.unwrap();
  assert_eq!(extended.expires_at, w.expires_at + Duration::hours(EXTENSION_HOURS));
  assert_eq!(extended.extension_requested_by, Some(b));

  for user in [a, b] {
    let err = h.engine.request_extension(w.token, user).await.unwrap_err();
    assert!(
      matches!(err, Error::Domain(CoreError::InvalidState { reason: "cannot be extended", .. })),
      "{err}"
    );
  }
  let stored = h.engine.get_window(w.token).await.unwrap().unwrap();
  assert_eq!(stored.expires_at, extended.expires_at);
}

#[tokio::test]
async fn extension_after_deadline_is_expired() {
  let h = harness().await;
  let (a, b) = users();
  let w = h.engine.create_window(a, b, 0.85).await.unwrap();

  h.clock.advance(Duration::hours(25));
  let err = h.engine.request_extension(w.token, a).await.unwrap_err();
  assert!(matches!(err, Error::Domain(CoreError::Expired(_))));
}

#[tokio::test]
async fn extended_window_survives_the_original_deadline() {
  let h = harness().await;
  let (a, b) = users();
  let w = h.engine.create_window(a, b, 0.85).await.unwrap();
  h.engine.request_extension(w.token, a).await.unwrap();

  h.clock.advance(Duration::hours(30));
  assert_eq!(h.engine.expire_windows().await.unwrap().expired, 0);
  h.engine.confirm_interest(w.token, b).await.unwrap();
}

// ─── Intro messages ──────────────────────────────────────────────────────────

#[tokio::test]
async fn intro_message_is_trimmed_and_once_per_side() {
  let h = harness().await;
  let (a, b) = users();
  let w = h.engine.create_window(a, b, 0.85).await.unwrap();

  let sent = h.engine.send_intro_message(w.token, a, "  Coffee on Sunday?  ").await.unwrap();
  assert_eq!(sent.intro_a.as_ref().map(|m| m.text.as_str()), Some("Coffee on Sunday?"));

  let err = h.engine.send_intro_message(w.token, a, "second").await.unwrap_err();
  assert!(matches!(err, Error::Domain(CoreError::InvalidState { .. })));

  let err = h.engine.send_intro_message(w.token, b, "").await.unwrap_err();
  assert!(matches!(err, Error::Domain(CoreError::InvalidInput(_))));

  h.engine.send_intro_message(w.token, b, "Sure!").await.unwrap();
}

// ─── Expiration sweep ────────────────────────────────────────────────────────

#[tokio::test]
async fn one_sided_expiry_records_ghosting_for_the_non_confirmer() {
  let h = harness().await;
  let (a, b) = users();
  let w = h.engine.create_window(a, b, 0.85).await.unwrap();
  h.engine.confirm_interest(w.token, a).await.unwrap();

  h.clock.advance(Duration::hours(WINDOW_DURATION_HOURS));
  let report = h.engine.expire_windows().await.unwrap();
  assert_eq!(report, SweepReport { examined: 1, expired: 1, ghostings: 1, ..Default::default() });

  let stored = h.engine.get_window(w.token).await.unwrap().unwrap();
  assert_eq!(stored.status, WindowStatus::Expired);

  let ghosting = h.events(b, BehaviorType::Ghosting).await;
  assert_eq!(ghosting.len(), 1);
  assert_eq!(ghosting[0].user, b);
  assert_eq!(ghosting[0].target, Some(a));
  assert!(ghosting[0].reputation_impact < 0.0);
  assert!(h.events(a, BehaviorType::Ghosting).await.is_empty());

  let score = h.engine.reputation().get_or_create_reputation(b).await.unwrap();
  assert_eq!(score.ghosting_count, 1);
  assert!(score.respect < SCORE_NEUTRAL);
}

#[tokio::test]
async fn undecided_expiry_records_nothing() {
  let h = harness().await;
  let (a, b) = users();
  h.engine.create_window(a, b, 0.85).await.unwrap();

  h.clock.advance(Duration::hours(WINDOW_DURATION_HOURS + 1));
  let report = h.engine.expire_windows().await.unwrap();
  assert_eq!((report.expired, report.ghostings), (1, 0));

  for user in [a, b] {
    assert!(h.engine.reputation().get_recent_behavior(user, 30).await.unwrap().is_empty());
  }
}

#[tokio::test]
async fn sweep_is_idempotent() {
  let h = harness().await;
  let (a, b) = users();
  let w = h.engine.create_window(a, b, 0.85).await.unwrap();
  h.engine.confirm_interest(w.token, b).await.unwrap();

  h.clock.advance(Duration::hours(WINDOW_DURATION_HOURS + 2));
  h.engine.expire_windows().await.unwrap();
  let first = h.engine.get_window(w.token).await.unwrap();

  let second_report = h.engine.expire_windows().await.unwrap();
  assert_eq!(second_report, SweepReport::default());
  assert_eq!(h.engine.get_window(w.token).await.unwrap(), first);
  assert_eq!(h.events(a, BehaviorType::Ghosting).await.len(), 1);
}

#[tokio::test]
async fn concurrent_sweeps_record_ghosting_once() {
  let h = harness().await;
  let (a, b) = users();
  let w = h.engine.create_window(a, b, 0.85).await.unwrap();
  h.engine.confirm_interest(w.token, a).await.unwrap();

  h.clock.advance(Duration::hours(WINDOW_DURATION_HOURS));
  let (r1, r2) = tokio::join!(h.engine.expire_windows(), h.engine.expire_windows());
  let (r1, r2) = (r1.unwrap(), r2.unwrap());

  assert_eq!(r1.expired + r2.expired, 1);
  assert_eq!(r1.ghostings + r2.ghostings, 1);
  assert_eq!(h.events(b, BehaviorType::Ghosting).await.len(), 1);
}

#[tokio::test]
async fn sweep_leaves_future_and_terminal_windows_alone() {
  let h = harness().await;
  let (a, b) = users();
  let (c, d) = users();
  let confirmed = h.engine.create_window(a, b, 0.85).await.unwrap();
  h.engine.confirm_interest(confirmed.token, a).await.unwrap();
  h.engine.confirm_interest(confirmed.token, b).await.unwrap();

  h.clock.advance(Duration::hours(20));
  let fresh = h.engine.create_window(c, d, 0.85).await.unwrap();

  h.clock.advance(Duration::hours(5));
  let report = h.engine.expire_windows().await.unwrap();
  assert_eq!(report.examined, 0);

  let confirmed = h.engine.get_window(confirmed.token).await.unwrap().unwrap();
  assert_eq!(confirmed.status, WindowStatus::Confirmed);
  let fresh = h.engine.get_window(fresh.token).await.unwrap().unwrap();
  assert_eq!(fresh.status, WindowStatus::PendingBoth);
}

#[tokio::test]
async fn reminders_name_only_undecided_participants() {
  let h = harness().await;
  let (a, b) = users();
  let (c, d) = users();
  let soon = h.engine.create_window(a, b, 0.85).await.unwrap();
  h.engine.confirm_interest(soon.token, a).await.unwrap();

  h.clock.advance(Duration::hours(18));
  h.engine.create_window(c, d, 0.85).await.unwrap();
  h.clock.advance(Duration::hours(3));

  let reminders = h.engine.expiration_reminders(Duration::hours(4)).await.unwrap();
  assert_eq!(reminders.len(), 1);
  assert_eq!(reminders[0].token, soon.token);
  assert_eq!(reminders[0].user, b);
  assert_eq!(reminders[0].other, a);
  assert_eq!(reminders[0].hours_remaining, 3);
}

#[tokio::test]
async fn scheduler_sweeps_until_shut_down() {
  let Harness { engine, clock } = harness().await;
  let engine = Arc::new(engine);
  let (a, b) = users();
  let w = engine.create_window(a, b, 0.85).await.unwrap();
  engine.confirm_interest(w.token, a).await.unwrap();
  clock.advance(Duration::hours(WINDOW_DURATION_HOURS + 1));

  let config = SchedulerConfig {
    sweep_interval:    std::time::Duration::from_millis(10),
    reminder_interval: std::time::Duration::from_millis(10),
    reminder_lead:     Duration::hours(4),
  };
  let handle = ExpirationScheduler::new(Arc::clone(&engine), config).spawn();

  let mut status = WindowStatus::PendingUserB;
  for _ in 0..200 {
    status = engine.get_window(w.token).await.unwrap().unwrap().status;
    if status == WindowStatus::Expired {
      break;
    }
    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
  }
  handle.shutdown().await;

  assert_eq!(status, WindowStatus::Expired);
  let ghosted = engine
    .reputation()
    .get_recent_behavior(b, 2)
    .await
    .unwrap();
  assert_eq!(ghosted.len(), 1);
  assert_eq!(ghosted[0].behavior_type, BehaviorType::Ghosting);
}

// ─── Queries ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn per_user_views_and_dashboard() {
  let h = harness().await;
  let me = UserId::new();
  let (x, y, z) = (UserId::new(), UserId::new(), UserId::new());

  let undecided = h.engine.create_window(me, x, 0.8).await.unwrap();
  let mine = h.engine.create_window(y, me, 0.8).await.unwrap();
  let matched = h.engine.create_window(me, z, 0.8).await.unwrap();
  h.engine.confirm_interest(mine.token, me).await.unwrap();
  h.engine.confirm_interest(matched.token, me).await.unwrap();
  h.engine.confirm_interest(matched.token, z).await.unwrap();

  let pending = h.engine.pending_decisions(me).await.unwrap();
  assert_eq!(pending.iter().map(|w| w.token).collect::<Vec<_>>(), vec![undecided.token]);
  assert_eq!(h.engine.pending_count(me).await.unwrap(), 1);

  let waiting = h.engine.waiting_matches(me).await.unwrap();
  assert_eq!(waiting.iter().map(|w| w.token).collect::<Vec<_>>(), vec![mine.token]);

  let confirmed = h.engine.confirmed_matches(me).await.unwrap();
  assert_eq!(confirmed.iter().map(|w| w.token).collect::<Vec<_>>(), vec![matched.token]);

  let dashboard = h.engine.dashboard(me).await.unwrap();
  assert_eq!(dashboard.pending_count, 1);
  assert_eq!(dashboard.waiting.len(), 1);
  assert_eq!(dashboard.confirmed.len(), 1);

  // The other side of `mine` sees it as a pending decision.
  assert_eq!(h.engine.pending_count(y).await.unwrap(), 1);
}

#[tokio::test]
async fn unknown_users_get_empty_views() {
  let h = harness().await;
  let nobody = UserId::new();
  assert!(h.engine.pending_decisions(nobody).await.unwrap().is_empty());
  assert!(h.engine.confirmed_matches(nobody).await.unwrap().is_empty());
  assert_eq!(h.engine.pending_count(nobody).await.unwrap(), 0);
  assert!(h.engine.get_window(Uuid::new_v4()).await.unwrap().is_none());
}

// ─── Reputation ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn fresh_reputation_is_neutral() {
  let h = harness().await;
  let user = UserId::new();
  let score = h.engine.reputation().get_or_create_reputation(user).await.unwrap();
  assert_eq!(score.overall(), SCORE_NEUTRAL);
  assert_eq!(score.trust_level, TrustLevel::NewMember);

  let again = h.engine.reputation().get_or_create_reputation(user).await.unwrap();
  assert_eq!(score, again);
}

#[tokio::test]
async fn repeated_behavior_decays_and_is_frozen_on_the_event() {
  let h = harness().await;
  let rep = h.engine.reputation();
  let user = UserId::new();

  let mut impacts = Vec::new();
  for _ in 0..6 {
    let event = rep
      .record_behavior(NewBehavior::new(user, BehaviorType::ThoughtfulMessage))
      .await
      .unwrap();
    impacts.push(event.reputation_impact);
    h.clock.advance(Duration::seconds(1));
  }
  assert!((impacts[0] - BehaviorType::ThoughtfulMessage.base_impact()).abs() < 1e-12);
  assert!(impacts.windows(2).all(|pair| pair[1] < pair[0]), "{impacts:?}");

  // Another type starts from a full-weight first occurrence.
  let ghost = rep
    .record_behavior(NewBehavior::new(user, BehaviorType::Ghosting))
    .await
    .unwrap();
  assert!((ghost.reputation_impact - BehaviorType::Ghosting.base_impact()).abs() < 1e-12);

  let stored: Vec<f64> = rep
    .get_recent_behavior(user, 1)
    .await
    .unwrap()
    .iter()
    .filter(|e| e.behavior_type == BehaviorType::ThoughtfulMessage)
    .map(|e| e.reputation_impact)
    .rev()
    .collect();
  assert_eq!(stored, impacts);
}

#[tokio::test]
async fn concurrent_recordings_use_distinct_occurrence_counts() {
  let h = harness().await;
  let rep = h.engine.reputation();
  let user = UserId::new();

  let (e1, e2) = tokio::join!(
    rep.record_behavior(NewBehavior::new(user, BehaviorType::PromptResponse)),
    rep.record_behavior(NewBehavior::new(user, BehaviorType::PromptResponse)),
  );
  let (e1, e2) = (e1.unwrap(), e2.unwrap());
  assert_ne!(e1.reputation_impact, e2.reputation_impact);

  let score = rep.get_or_create_reputation(user).await.unwrap();
  let expected = SCORE_NEUTRAL + e1.reputation_impact + e2.reputation_impact;
  assert!((score.response_quality - expected).abs() < 1e-9);
}

#[tokio::test]
async fn components_stay_bounded_under_heavy_penalties() {
  let h = harness().await;
  let rep = h.engine.reputation();
  let user = UserId::new();

  for _ in 0..12 {
    rep
      .record_behavior(NewBehavior::new(user, BehaviorType::Misrepresentation))
      .await
      .unwrap();
  }
  for _ in 0..12 {
    rep
      .record_behavior(NewBehavior::new(user, BehaviorType::VideoVerified))
      .await
      .unwrap();
  }

  let score = rep.get_or_create_reputation(user).await.unwrap();
  assert!((SCORE_MIN..=SCORE_MAX).contains(&score.authenticity));
}

#[tokio::test]
async fn upheld_reports_restrict_the_user() {
  let h = harness().await;
  let rep = h.engine.reputation();
  let user = UserId::new();

  for _ in 0..3 {
    rep
      .record_behavior(NewBehavior::new(user, BehaviorType::ReportUpheld))
      .await
      .unwrap();
  }

  let score = rep.get_or_create_reputation(user).await.unwrap();
  assert_eq!(score.reports_upheld, 3);
  assert_eq!(score.trust_level, TrustLevel::Restricted);
}

#[tokio::test]
async fn recent_behavior_honours_the_day_window() {
  let h = harness().await;
  let rep = h.engine.reputation();
  let user = UserId::new();

  rep
    .record_behavior(NewBehavior::new(user, BehaviorType::ProfileComplete))
    .await
    .unwrap();
  h.clock.advance(Duration::days(10));
  rep
    .record_behavior(NewBehavior::new(user, BehaviorType::CompletedDate))
    .await
    .unwrap();

  let last_week = rep.get_recent_behavior(user, 7).await.unwrap();
  assert_eq!(last_week.len(), 1);
  assert_eq!(last_week[0].behavior_type, BehaviorType::CompletedDate);

  let all = rep.get_recent_behavior(user, 30).await.unwrap();
  assert_eq!(all.len(), 2);
  assert_eq!(all[0].behavior_type, BehaviorType::CompletedDate);
}

#[tokio::test]
async fn recent_behavior_with_an_unbounded_day_window_returns_everything() {
  let h = harness().await;
  let rep = h.engine.reputation();
  let user = UserId::new();

  rep
    .record_behavior(NewBehavior::new(user, BehaviorType::ProfileComplete))
    .await
    .unwrap();
  h.clock.advance(Duration::days(400));
  rep
    .record_behavior(NewBehavior::new(user, BehaviorType::CompletedDate))
    .await
    .unwrap();

  let all = rep.get_recent_behavior(user, u32::MAX).await.unwrap();
  assert_eq!(all.len(), 2);
}

// ─── Partial failures ────────────────────────────────────────────────────────

/// Delegates to a `SqliteStore`, except that score reads for the chosen user
/// fail.
#[derive(Clone)]
struct FlakyStore {
  inner:  SqliteStore,
  broken: Arc<Mutex<Option<UserId>>>,
}

impl FlakyStore {
  fn break_scores_for(&self, user: Option<UserId>) { *self.broken.lock().unwrap() = user; }

  fn check(&self, user: UserId) -> StoreResult<()> {
    match *self.broken.lock().unwrap() {
      Some(broken) if broken == user => Err(StoreError::Decode(format!("score row for {user}"))),
      _ => Ok(()),
    }
  }
}

impl WindowStore for FlakyStore {
  type Error = StoreError;

  async fn insert_window(&self, window: MatchWindow) -> StoreResult<bool> {
    self.inner.insert_window(window).await
  }

  async fn get_window(&self, token: Uuid) -> StoreResult<Option<MatchWindow>> {
    self.inner.get_window(token).await
  }

  async fn has_active_window(&self, a: UserId, b: UserId) -> StoreResult<bool> {
    self.inner.has_active_window(a, b).await
  }

  async fn update_window(&self, window: MatchWindow) -> StoreResult<bool> {
    self.inner.update_window(window).await
  }

  async fn commit_expiry(
    &self,
    window: MatchWindow,
    ghosting: Option<(BehaviorEvent, ReputationScore)>,
  ) -> StoreResult<bool> {
    self.inner.commit_expiry(window, ghosting).await
  }

  async fn attach_conversation(
    &self,
    token: Uuid,
    conversation: ConversationRef,
  ) -> StoreResult<bool> {
    self.inner.attach_conversation(token, conversation).await
  }

  async fn user_windows(
    &self,
    user: UserId,
    view: UserWindows,
    as_of: DateTime<Utc>,
  ) -> StoreResult<Vec<MatchWindow>> {
    self.inner.user_windows(user, view, as_of).await
  }

  async fn count_pending(&self, user: UserId, as_of: DateTime<Utc>) -> StoreResult<u64> {
    self.inner.count_pending(user, as_of).await
  }

  async fn due_for_expiry(&self, now: DateTime<Utc>) -> StoreResult<Vec<MatchWindow>> {
    self.inner.due_for_expiry(now).await
  }

  async fn expiring_between(
    &self,
    from: DateTime<Utc>,
    until: DateTime<Utc>,
  ) -> StoreResult<Vec<MatchWindow>> {
    self.inner.expiring_between(from, until).await
  }
}

impl BehaviorLedger for FlakyStore {
  type Error = StoreError;

  async fn count_behavior(&self, user: UserId, behavior: BehaviorType) -> StoreResult<u64> {
    self.inner.count_behavior(user, behavior).await
  }

  async fn behavior_since(
    &self,
    user: UserId,
    since: DateTime<Utc>,
  ) -> StoreResult<Vec<BehaviorEvent>> {
    self.inner.behavior_since(user, since).await
  }
}

impl ReputationStore for FlakyStore {
  async fn get_score(&self, user: UserId) -> StoreResult<Option<ReputationScore>> {
    self.check(user)?;
    self.inner.get_score(user).await
  }

  async fn insert_score_if_absent(&self, score: ReputationScore) -> StoreResult<ReputationScore> {
    self.check(score.user)?;
    self.inner.insert_score_if_absent(score).await
  }

  async fn commit_behavior(
    &self,
    event: BehaviorEvent,
    score: ReputationScore,
  ) -> StoreResult<bool> {
    self.inner.commit_behavior(event, score).await
  }
}

/// Conversation service that fails while `down` is set.
#[derive(Clone)]
struct FlakyConversations {
  inner: SqliteStore,
  down:  Arc<AtomicBool>,
}

impl ConversationService for FlakyConversations {
  type Error = StoreError;

  async fn create_conversation(
    &self,
    a: UserId,
    b: UserId,
    at: DateTime<Utc>,
  ) -> StoreResult<ConversationRef> {
    if self.down.load(Ordering::SeqCst) {
      return Err(StoreError::Decode("conversation service unavailable".into()));
    }
    self.inner.create_conversation(a, b, at).await
  }
}

struct FlakyHarness {
  engine: MatchWindowEngine<FlakyStore, FlakyConversations, SqliteStore>,
  store:  FlakyStore,
  down:   Arc<AtomicBool>,
  clock:  ManualClock,
}

async fn flaky_harness() -> FlakyHarness {
  let inner = SqliteStore::open_in_memory()
    .await
    .expect("in-memory store");
  let store = FlakyStore { inner: inner.clone(), broken: Arc::default() };
  let down = Arc::new(AtomicBool::new(false));
  let conversations = FlakyConversations { inner: inner.clone(), down: down.clone() };
  let clock = ManualClock::new(t0());
  let engine = MatchWindowEngine::new(
    store.clone(),
    conversations,
    inner,
    Arc::new(clock.clone()),
  );
  FlakyHarness { engine, store, down, clock }
}

impl FlakyHarness {
  async fn status(&self, token: Uuid) -> WindowStatus {
    self.engine.get_window(token).await.unwrap().unwrap().status
  }

  async fn count(&self, user: UserId, behavior: BehaviorType) -> usize {
    self
      .store
      .inner
      .count_behavior(user, behavior)
      .await
      .unwrap() as usize
  }
}

#[tokio::test]
async fn failed_ghosting_leaves_the_window_due_for_the_next_sweep() {
  let h = flaky_harness().await;
  let (a, b) = users();
  let w = h.engine.create_window(a, b, 0.85).await.unwrap();
  h.engine.confirm_interest(w.token, a).await.unwrap();
  h.clock.advance(Duration::hours(WINDOW_DURATION_HOURS + 1));

  h.store.break_scores_for(Some(b));
  let report = h.engine.expire_windows().await.unwrap();
  assert_eq!(report, SweepReport { examined: 1, failed: 1, ..Default::default() });
  let stored = h.engine.get_window(w.token).await.unwrap().unwrap();
  assert_eq!(stored.status, WindowStatus::PendingUserB);
  assert_eq!(h.count(b, BehaviorType::Ghosting).await, 0);

  h.store.break_scores_for(None);
  let report = h.engine.expire_windows().await.unwrap();
  assert_eq!(report, SweepReport { examined: 1, expired: 1, ghostings: 1, ..Default::default() });
  let stored = h.engine.get_window(w.token).await.unwrap().unwrap();
  assert_eq!(stored.status, WindowStatus::Expired);
  assert_eq!(h.count(b, BehaviorType::Ghosting).await, 1);

  let score = h.engine.reputation().get_or_create_reputation(b).await.unwrap();
  assert_eq!(score.ghosting_count, 1);
}

#[tokio::test]
async fn one_failing_window_does_not_stop_the_sweep() {
  let h = flaky_harness().await;
  let (a, b) = users();
  let (c, d) = users();
  let (e, f) = users();
  let broken = h.engine.create_window(a, b, 0.8).await.unwrap();
  let ghosted = h.engine.create_window(c, d, 0.8).await.unwrap();
  let undecided = h.engine.create_window(e, f, 0.8).await.unwrap();
  h.engine.confirm_interest(broken.token, a).await.unwrap();
  h.engine.confirm_interest(ghosted.token, c).await.unwrap();
  h.clock.advance(Duration::hours(WINDOW_DURATION_HOURS + 1));

  h.store.break_scores_for(Some(b));
  let report = h.engine.expire_windows().await.unwrap();
  assert_eq!(report, SweepReport {
    examined: 3,
    expired: 2,
    ghostings: 1,
    failed: 1,
    ..Default::default()
  });

  assert_eq!(h.status(broken.token).await, WindowStatus::PendingUserB);
  assert_eq!(h.status(ghosted.token).await, WindowStatus::Expired);
  assert_eq!(h.status(undecided.token).await, WindowStatus::Expired);
  assert_eq!(h.count(d, BehaviorType::Ghosting).await, 1);
  assert_eq!(h.count(b, BehaviorType::Ghosting).await, 0);
}

#[tokio::test]
async fn reconfirming_opens_a_conversation_that_failed_to_open() {
  let h = flaky_harness().await;
  let (a, b) = users();
  let w = h.engine.create_window(a, b, 0.9).await.unwrap();
  h.engine.confirm_interest(w.token, a).await.unwrap();

  h.down.store(true, Ordering::SeqCst);
  let err = h.engine.confirm_interest(w.token, b).await.unwrap_err();
  assert!(matches!(err, Error::Conversation(_)), "{err}");
  let stuck = h.engine.get_window(w.token).await.unwrap().unwrap();
  assert_eq!(stuck.status, WindowStatus::Confirmed);
  assert!(stuck.conversation.is_none());
  assert_eq!(h.count(a, BehaviorType::ScheduledDate).await, 0);

  h.down.store(false, Ordering::SeqCst);
  let healed = h.engine.confirm_interest(w.token, b).await.unwrap();
  assert!(healed.conversation.is_some());
  let stored = h.engine.get_window(w.token).await.unwrap().unwrap();
  assert_eq!(stored.conversation, healed.conversation);

  // Further confirmations are idempotent.
  let again = h.engine.confirm_interest(w.token, a).await.unwrap();
  assert_eq!(again.conversation, healed.conversation);
  for user in [a, b] {
    assert_eq!(h.count(user, BehaviorType::ScheduledDate).await, 1);
  }
}
