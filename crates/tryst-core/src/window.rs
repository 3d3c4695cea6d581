//! Match windows: the time-boxed, mutually confirmed negotiation between two
//! users.
//!
//! A window is opened for a pair, both users then confirm or decline within
//! [`WINDOW_DURATION_HOURS`], and the expiration sweep closes whatever is left
//! undecided. Every transition is validated by [`MatchWindow::apply`], which
//! is the only place that mutates [`MatchWindow::status`].

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString};
use uuid::Uuid;

use crate::{
  Error, Result,
  collab::{ConversationRef, check_score},
  user::{UserId, normalize_pair},
};

/// Lifetime of a freshly opened window.
pub const WINDOW_DURATION_HOURS: i64 = 24;

/// Time added by the one-time extension.
pub const EXTENSION_HOURS: i64 = 12;

/// Upper bound on an intro message, in characters.
pub const INTRO_MESSAGE_MAX_CHARS: usize = 500;

// ─── Status ──────────────────────────────────────────────────────────────────

/// Where a window is in its lifecycle.
///
/// `PendingUserA` means user B has confirmed and the window waits on A (and
/// vice versa).
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
pub enum WindowStatus {
  PendingBoth,
  PendingUserA,
  PendingUserB,
  Confirmed,
  DeclinedByA,
  DeclinedByB,
  Expired,
}

impl WindowStatus {
  /// No further transition is possible.
  pub fn is_terminal(&self) -> bool {
    matches!(
      self,
      Self::Confirmed | Self::DeclinedByA | Self::DeclinedByB | Self::Expired
    )
  }

  /// Counts towards the one-active-window-per-pair rule. A confirmed window
  /// stays active; only declined and expired windows free the pair.
  pub fn is_active(&self) -> bool {
    !matches!(self, Self::DeclinedByA | Self::DeclinedByB | Self::Expired)
  }
}

// ─── Sides ───────────────────────────────────────────────────────────────────

/// One of the two participant slots of a window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
  A,
  B,
}

impl Side {
  pub fn other(self) -> Self {
    match self {
      Self::A => Self::B,
      Self::B => Self::A,
    }
  }
}

/// An opening message sent by one side before both have confirmed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntroMessage {
  pub text:    String,
  pub sent_at: DateTime<Utc>,
}

// ─── Events and transitions ──────────────────────────────────────────────────

/// Something that happens to a window. User-driven events carry the side of
/// the acting participant, resolved with [`MatchWindow::participant`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WindowEvent {
  Confirm(Side),
  Decline(Side),
  Extend(Side),
  Intro(Side, String),
  /// The deadline sweep.
  Expire,
}

impl WindowEvent {
  fn refusal(&self) -> &'static str {
    match self {
      Self::Confirm(_) => "can no longer be confirmed",
      Self::Decline(_) => "can no longer be declined",
      Self::Extend(_) => "cannot be extended",
      Self::Intro(..) => "no longer accepts intro messages",
      Self::Expire => "cannot expire",
    }
  }
}

/// The observable effect of applying a [`WindowEvent`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
  /// Nothing changed: a repeated confirmation, or a sweep over a window that
  /// is terminal or not yet due.
  Unchanged,
  AwaitingOther { waiting_on: Side },
  Confirmed,
  Declined { by: Side },
  Extended { expires_at: DateTime<Utc> },
  IntroSent { by: Side },
  /// `ghosted` names the side that never answered a confirmed counterpart.
  Expired { ghosted: Option<Side> },
}

impl Transition {
  pub fn is_change(&self) -> bool { !matches!(self, Self::Unchanged) }
}

// ─── MatchWindow ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchWindow {
  /// Opaque public handle; internal row ordering is never exposed.
  pub token:                  Uuid,
  pub user_a:                 UserId,
  pub user_b:                 UserId,
  pub compatibility_score:    f64,
  pub status:                 WindowStatus,
  pub confirmed_a_at:         Option<DateTime<Utc>>,
  pub confirmed_b_at:         Option<DateTime<Utc>>,
  pub expires_at:             DateTime<Utc>,
  pub extension_used:         bool,
  pub extension_requested_by: Option<UserId>,
  pub conversation:           Option<ConversationRef>,
  pub intro_a:                Option<IntroMessage>,
  pub intro_b:                Option<IntroMessage>,
  pub created_at:             DateTime<Utc>,
  pub updated_at:             DateTime<Utc>,
  /// Bumped by the store on every persisted change.
  pub version:                u64,
}

impl MatchWindow {
  /// A fresh `PendingBoth` window expiring [`WINDOW_DURATION_HOURS`] from
  /// `now`.
  pub fn open(
    user_a: UserId,
    user_b: UserId,
    compatibility_score: f64,
    now: DateTime<Utc>,
  ) -> Result<Self> {
    if user_a == user_b {
      return Err(Error::InvalidInput(format!(
        "cannot open a match window between {user_a} and themself"
      )));
    }
    check_score(compatibility_score)?;

    Ok(Self {
      token: Uuid::new_v4(),
      user_a,
      user_b,
      compatibility_score,
      status: WindowStatus::PendingBoth,
      confirmed_a_at: None,
      confirmed_b_at: None,
      expires_at: now + Duration::hours(WINDOW_DURATION_HOURS),
      extension_used: false,
      extension_requested_by: None,
      conversation: None,
      intro_a: None,
      intro_b: None,
      created_at: now,
      updated_at: now,
      version: 0,
    })
  }

  // ── Participants ──────────────────────────────────────────────────────

  pub fn user(&self, side: Side) -> UserId {
    match side {
      Side::A => self.user_a,
      Side::B => self.user_b,
    }
  }

  pub fn side_of(&self, user: UserId) -> Option<Side> {
    if user == self.user_a {
      Some(Side::A)
    } else if user == self.user_b {
      Some(Side::B)
    } else {
      None
    }
  }

  /// Resolve the acting user's side, or fail with [`Error::Forbidden`].
  pub fn participant(&self, user: UserId) -> Result<Side> {
    self
      .side_of(user)
      .ok_or(Error::Forbidden { token: self.token, user })
  }

  pub fn other_user(&self, user: UserId) -> Option<UserId> {
    self.side_of(user).map(|side| self.user(side.other()))
  }

  /// The pair in normalized order, as used for uniqueness.
  pub fn pair(&self) -> (UserId, UserId) { normalize_pair(self.user_a, self.user_b) }

  // ── Derived state ─────────────────────────────────────────────────────

  pub fn is_confirmed_by(&self, side: Side) -> bool {
    match side {
      Side::A => self.confirmed_a_at.is_some(),
      Side::B => self.confirmed_b_at.is_some(),
    }
  }

  pub fn both_confirmed(&self) -> bool {
    self.is_confirmed_by(Side::A) && self.is_confirmed_by(Side::B)
  }

  pub fn is_expired(&self, now: DateTime<Utc>) -> bool { now > self.expires_at }

  pub fn can_extend(&self) -> bool {
    !self.extension_used && !self.status.is_terminal()
  }

  /// Whole hours left before the deadline, zero once it has passed.
  pub fn hours_remaining(&self, now: DateTime<Utc>) -> i64 {
    (self.expires_at - now).num_hours().max(0)
  }

  pub fn intro(&self, side: Side) -> Option<&IntroMessage> {
    match side {
      Side::A => self.intro_a.as_ref(),
      Side::B => self.intro_b.as_ref(),
    }
  }

  // ── Transitions ───────────────────────────────────────────────────────

  /// Validate `event` against the current status and apply it.
  ///
  /// On error the window is left untouched. On success the caller must
  /// persist the window if [`Transition::is_change`].
  pub fn apply(
    &mut self,
    event: &WindowEvent,
    now: DateTime<Utc>,
  ) -> Result<Transition> {
    use WindowEvent as E;

    let transition = match (self.status, event) {
      (_, E::Confirm(side)) if self.is_confirmed_by(*side) => Transition::Unchanged,
      (status, E::Expire) if status.is_terminal() || now < self.expires_at => {
        Transition::Unchanged
      }
      (_, E::Expire) => self.close_expired(),
      (status, _) if status.is_terminal() => {
        return Err(self.invalid_state(event.refusal()));
      }
      _ if self.is_expired(now) => return Err(Error::Expired(self.token)),
      (_, E::Confirm(side)) => self.record_confirmation(*side, now),
      (_, E::Decline(side)) => self.record_decline(*side),
      (_, E::Extend(_)) if self.extension_used => {
        return Err(self.invalid_state("cannot be extended"));
      }
      (_, E::Extend(side)) => self.record_extension(*side),
      (_, E::Intro(side, _)) if self.intro(*side).is_some() => {
        return Err(self.invalid_state("already has an intro message from this user"));
      }
      (_, E::Intro(side, text)) => self.record_intro(*side, text, now)?,
    };

    if transition.is_change() {
      self.updated_at = now;
    }
    Ok(transition)
  }

  /// Link the conversation created for a confirmed window. Returns `false`
  /// if one was already attached.
  pub fn attach_conversation(&mut self, conversation: ConversationRef) -> bool {
    if self.conversation.is_some() {
      return false;
    }
    self.conversation = Some(conversation);
    true
  }

  fn invalid_state(&self, reason: &'static str) -> Error {
    Error::InvalidState { token: self.token, status: self.status, reason }
  }

  fn record_confirmation(&mut self, side: Side, now: DateTime<Utc>) -> Transition {
    match side {
      Side::A => self.confirmed_a_at = Some(now),
      Side::B => self.confirmed_b_at = Some(now),
    }

    if self.both_confirmed() {
      self.status = WindowStatus::Confirmed;
      return Transition::Confirmed;
    }

    let waiting_on = side.other();
    self.status = match waiting_on {
      Side::A => WindowStatus::PendingUserA,
      Side::B => WindowStatus::PendingUserB,
    };
    Transition::AwaitingOther { waiting_on }
  }

  fn record_decline(&mut self, side: Side) -> Transition {
    self.status = match side {
      Side::A => WindowStatus::DeclinedByA,
      Side::B => WindowStatus::DeclinedByB,
    };
    Transition::Declined { by: side }
  }

  fn record_extension(&mut self, side: Side) -> Transition {
    self.expires_at += Duration::hours(EXTENSION_HOURS);
    self.extension_used = true;
    self.extension_requested_by = Some(self.user(side));
    Transition::Extended { expires_at: self.expires_at }
  }

  fn record_intro(
    &mut self,
    side: Side,
    text: &str,
    now: DateTime<Utc>,
  ) -> Result<Transition> {
    let text = text.trim();
    if text.is_empty() {
      return Err(Error::InvalidInput("intro message cannot be empty".into()));
    }
    if text.chars().count() > INTRO_MESSAGE_MAX_CHARS {
      return Err(Error::InvalidInput(format!(
        "intro message too long (max {INTRO_MESSAGE_MAX_CHARS} characters)"
      )));
    }

    let message = IntroMessage { text: text.to_owned(), sent_at: now };
    match side {
      Side::A => self.intro_a = Some(message),
      Side::B => self.intro_b = Some(message),
    }
    Ok(Transition::IntroSent { by: side })
  }

  fn close_expired(&mut self) -> Transition {
    let ghosted = match (self.is_confirmed_by(Side::A), self.is_confirmed_by(Side::B)) {
      (true, false) => Some(Side::B),
      (false, true) => Some(Side::A),
      _ => None,
    };
    self.status = WindowStatus::Expired;
    Transition::Expired { ghosted }
  }
}
