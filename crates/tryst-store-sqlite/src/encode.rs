//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as fixed-width RFC 3339 strings (microseconds, `Z`
//! suffix) so that SQL string comparison orders them correctly. Enums are
//! stored as their snake_case names. UUIDs are stored hyphenated.

use chrono::{DateTime, SecondsFormat, Utc};
use tryst_core::{
  UserId,
  behavior::{BehaviorEvent, BehaviorType},
  collab::ConversationRef,
  reputation::{ReputationScore, TrustLevel},
  user::normalize_pair,
  window::{IntroMessage, MatchWindow, WindowStatus},
};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Uuid ────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

pub fn encode_user(user: UserId) -> String { encode_uuid(user.as_uuid()) }

pub fn decode_user(s: &str) -> Result<UserId> { decode_uuid(s).map(UserId) }

/// Normalized `(user_low, user_high)` column values for a pair.
pub fn encode_pair(a: UserId, b: UserId) -> (String, String) {
  let (low, high) = normalize_pair(a, b);
  (encode_user(low), encode_user(high))
}

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::Decode(format!("bad timestamp {s:?}: {e}")))
}

// ─── Enums ───────────────────────────────────────────────────────────────────

pub fn decode_status(s: &str) -> Result<WindowStatus> {
  s.parse()
    .map_err(|_| Error::Core(tryst_core::Error::UnknownStatus(s.to_owned())))
}

/// Non-terminal status names, for use in SQL `IN (...)` lists.
pub const PENDING_STATUSES: &str = "'pending_both', 'pending_user_a', 'pending_user_b'";

// ─── Intro messages ──────────────────────────────────────────────────────────

pub fn encode_intro(intro: Option<&IntroMessage>) -> Result<Option<String>> {
  intro
    .map(|m| serde_json::to_string(m).map_err(Error::from))
    .transpose()
}

pub fn decode_intro(s: Option<&str>) -> Result<Option<IntroMessage>> {
  s.map(|s| serde_json::from_str(s).map_err(Error::from))
    .transpose()
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Column list matching [`RawWindow::from_row`].
pub const WINDOW_COLUMNS: &str = "token, user_a, user_b, compatibility_score, status,
   confirmed_a_at, confirmed_b_at, expires_at, extension_used,
   extension_requested_by, conversation_id, intro_a, intro_b,
   created_at, updated_at, version";

/// Raw values read directly from a `match_windows` row.
pub struct RawWindow {
  pub token:                  String,
  pub user_a:                 String,
  pub user_b:                 String,
  pub compatibility_score:    f64,
  pub status:                 String,
  pub confirmed_a_at:         Option<String>,
  pub confirmed_b_at:         Option<String>,
  pub expires_at:             String,
  pub extension_used:         bool,
  pub extension_requested_by: Option<String>,
  pub conversation_id:        Option<String>,
  pub intro_a:                Option<String>,
  pub intro_b:                Option<String>,
  pub created_at:             String,
  pub updated_at:             String,
  pub version:                i64,
}

impl RawWindow {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      token:                  row.get(0)?,
      user_a:                 row.get(1)?,
      user_b:                 row.get(2)?,
      compatibility_score:    row.get(3)?,
      status:                 row.get(4)?,
      confirmed_a_at:         row.get(5)?,
      confirmed_b_at:         row.get(6)?,
      expires_at:             row.get(7)?,
      extension_used:         row.get(8)?,
      extension_requested_by: row.get(9)?,
      conversation_id:        row.get(10)?,
      intro_a:                row.get(11)?,
      intro_b:                row.get(12)?,
      created_at:             row.get(13)?,
      updated_at:             row.get(14)?,
      version:                row.get(15)?,
    })
  }

  pub fn into_window(self) -> Result<MatchWindow> {
    Ok(MatchWindow {
      token:                  decode_uuid(&self.token)?,
      user_a:                 decode_user(&self.user_a)?,
      user_b:                 decode_user(&self.user_b)?,
      compatibility_score:    self.compatibility_score,
      status:                 decode_status(&self.status)?,
      confirmed_a_at:         self.confirmed_a_at.as_deref().map(decode_dt).transpose()?,
      confirmed_b_at:         self.confirmed_b_at.as_deref().map(decode_dt).transpose()?,
      expires_at:             decode_dt(&self.expires_at)?,
      extension_used:         self.extension_used,
      extension_requested_by: self
        .extension_requested_by
        .as_deref()
        .map(decode_user)
        .transpose()?,
      conversation:           self
        .conversation_id
        .as_deref()
        .map(|s| decode_uuid(s).map(ConversationRef))
        .transpose()?,
      intro_a:                decode_intro(self.intro_a.as_deref())?,
      intro_b:                decode_intro(self.intro_b.as_deref())?,
      created_at:             decode_dt(&self.created_at)?,
      updated_at:             decode_dt(&self.updated_at)?,
      version:                self.version as u64,
    })
  }
}

/// Column list matching [`RawEvent::from_row`].
pub const EVENT_COLUMNS: &str = "event_id, user_id, target_user_id, behavior_type,
   occurred_at, reputation_impact, metadata";

/// Raw values read directly from a `behavior_events` row.
pub struct RawEvent {
  pub event_id:          String,
  pub user_id:           String,
  pub target_user_id:    Option<String>,
  pub behavior_type:     String,
  pub occurred_at:       String,
  pub reputation_impact: f64,
  pub metadata:          Option<String>,
}

impl RawEvent {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      event_id:          row.get(0)?,
      user_id:           row.get(1)?,
      target_user_id:    row.get(2)?,
      behavior_type:     row.get(3)?,
      occurred_at:       row.get(4)?,
      reputation_impact: row.get(5)?,
      metadata:          row.get(6)?,
    })
  }

  pub fn into_event(self) -> Result<BehaviorEvent> {
    Ok(BehaviorEvent {
      event_id:          decode_uuid(&self.event_id)?,
      user:              decode_user(&self.user_id)?,
      target:            self.target_user_id.as_deref().map(decode_user).transpose()?,
      behavior_type:     BehaviorType::parse(&self.behavior_type)?,
      occurred_at:       decode_dt(&self.occurred_at)?,
      reputation_impact: self.reputation_impact,
      metadata:          self
        .metadata
        .as_deref()
        .map(serde_json::from_str)
        .transpose()?,
    })
  }
}

/// Column list matching [`RawScore::from_row`].
pub const SCORE_COLUMNS: &str = "user_id, response_quality, respect, authenticity,
   investment, ghosting_count, dates_completed, reports_received, reports_upheld,
   positive_feedback_count, trust_level, created_at, updated_at, version";

/// Raw values read directly from a `reputation_scores` row.
pub struct RawScore {
  pub user_id:                 String,
  pub response_quality:        f64,
  pub respect:                 f64,
  pub authenticity:            f64,
  pub investment:              f64,
  pub ghosting_count:          u32,
  pub dates_completed:         u32,
  pub reports_received:        u32,
  pub reports_upheld:          u32,
  pub positive_feedback_count: u32,
  pub trust_level:             String,
  pub created_at:              String,
  pub updated_at:              String,
  pub version:                 i64,
}

impl RawScore {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      user_id:                 row.get(0)?,
      response_quality:        row.get(1)?,
      respect:                 row.get(2)?,
      authenticity:            row.get(3)?,
      investment:              row.get(4)?,
      ghosting_count:          row.get(5)?,
      dates_completed:         row.get(6)?,
      reports_received:        row.get(7)?,
      reports_upheld:          row.get(8)?,
      positive_feedback_count: row.get(9)?,
      trust_level:             row.get(10)?,
      created_at:              row.get(11)?,
      updated_at:              row.get(12)?,
      version:                 row.get(13)?,
    })
  }

  pub fn into_score(self) -> Result<ReputationScore> {
    Ok(ReputationScore {
      user:                    decode_user(&self.user_id)?,
      response_quality:        self.response_quality,
      respect:                 self.respect,
      authenticity:            self.authenticity,
      investment:              self.investment,
      ghosting_count:          self.ghosting_count,
      dates_completed:         self.dates_completed,
      reports_received:        self.reports_received,
      reports_upheld:          self.reports_upheld,
      positive_feedback_count: self.positive_feedback_count,
      trust_level:             TrustLevel::parse(&self.trust_level)?,
      created_at:              decode_dt(&self.created_at)?,
      updated_at:              decode_dt(&self.updated_at)?,
      version:                 self.version as u64,
    })
  }
}
