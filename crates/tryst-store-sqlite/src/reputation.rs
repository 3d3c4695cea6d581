//! [`BehaviorLedger`] and [`ReputationStore`] for [`SqliteStore`].

use chrono::{DateTime, Utc};
use rusqlite::OptionalExtension as _;

use tryst_core::{
  UserId,
  behavior::{BehaviorEvent, BehaviorType},
  reputation::ReputationScore,
  store::{BehaviorLedger, ReputationStore},
};

use crate::{
  Error, Result, SqliteStore,
  encode::{
    EVENT_COLUMNS, RawEvent, RawScore, SCORE_COLUMNS, encode_dt, encode_user,
    encode_uuid,
  },
};

/// Owned column values of a score row, ready to bind.
pub(crate) struct ScoreParams {
  user:                    String,
  response_quality:        f64,
  respect:                 f64,
  authenticity:            f64,
  investment:              f64,
  ghosting_count:          u32,
  dates_completed:         u32,
  reports_received:        u32,
  reports_upheld:          u32,
  positive_feedback_count: u32,
  trust_level:             String,
  created_at:              String,
  updated_at:              String,
  version:                 i64,
}

impl From<&ReputationScore> for ScoreParams {
  fn from(s: &ReputationScore) -> Self {
    Self {
      user:                    encode_user(s.user),
      response_quality:        s.response_quality,
      respect:                 s.respect,
      authenticity:            s.authenticity,
      investment:              s.investment,
      ghosting_count:          s.ghosting_count,
      dates_completed:         s.dates_completed,
      reports_received:        s.reports_received,
      reports_upheld:          s.reports_upheld,
      positive_feedback_count: s.positive_feedback_count,
      trust_level:             s.trust_level.as_ref().to_owned(),
      created_at:              encode_dt(s.created_at),
      updated_at:              encode_dt(s.updated_at),
      version:                 s.version as i64,
    }
  }
}

fn select_score(
  conn: &rusqlite::Connection,
  user: &str,
) -> rusqlite::Result<Option<RawScore>> {
  conn
    .query_row(
      &format!("SELECT {SCORE_COLUMNS} FROM reputation_scores WHERE user_id = ?1"),
      rusqlite::params![user],
      RawScore::from_row,
    )
    .optional()
}

/// Owned column values of a behavior event, ready to bind.
pub(crate) struct EventParams {
  event_id:    String,
  user:        String,
  target:      Option<String>,
  behavior:    String,
  occurred_at: String,
  impact:      f64,
  metadata:    Option<String>,
}

impl TryFrom<&BehaviorEvent> for EventParams {
  type Error = Error;

  fn try_from(e: &BehaviorEvent) -> Result<Self> {
    Ok(Self {
      event_id:    encode_uuid(e.event_id),
      user:        encode_user(e.user),
      target:      e.target.map(encode_user),
      behavior:    e.behavior_type.as_ref().to_owned(),
      occurred_at: encode_dt(e.occurred_at),
      impact:      e.reputation_impact,
      metadata:    e.metadata.as_ref().map(serde_json::to_string).transpose()?,
    })
  }
}

/// Overwrite a score row if its stored version still equals `p.version`.
pub(crate) fn write_score(
  conn: &rusqlite::Connection,
  p: &ScoreParams,
) -> rusqlite::Result<bool> {
  let n = conn.execute(
    "UPDATE reputation_scores SET
       response_quality        = ?1,
       respect                 = ?2,
       authenticity            = ?3,
       investment              = ?4,
       ghosting_count          = ?5,
       dates_completed         = ?6,
       reports_received        = ?7,
       reports_upheld          = ?8,
       positive_feedback_count = ?9,
       trust_level             = ?10,
       updated_at              = ?11,
       version                 = version + 1
     WHERE user_id = ?12 AND version = ?13",
    rusqlite::params![
      p.response_quality,
      p.respect,
      p.authenticity,
      p.investment,
      p.ghosting_count,
      p.dates_completed,
      p.reports_received,
      p.reports_upheld,
      p.positive_feedback_count,
      p.trust_level,
      p.updated_at,
      p.user,
      p.version,
    ],
  )?;
  Ok(n == 1)
}

pub(crate) fn insert_event(
  conn: &rusqlite::Connection,
  p: &EventParams,
) -> rusqlite::Result<()> {
  conn.execute(
    &format!("INSERT INTO behavior_events ({EVENT_COLUMNS})
              VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"),
    rusqlite::params![
      p.event_id,
      p.user,
      p.target,
      p.behavior,
      p.occurred_at,
      p.impact,
      p.metadata,
    ],
  )?;
  Ok(())
}

// ─── BehaviorLedger impl ─────────────────────────────────────────────────────

impl BehaviorLedger for SqliteStore {
  type Error = Error;

  async fn count_behavior(&self, user: UserId, behavior: BehaviorType) -> Result<u64> {
    let user_str     = encode_user(user);
    let behavior_str = behavior.as_ref().to_owned();

    let count: i64 = self
      .conn
      .call(move |conn| {
        Ok(conn.query_row(
          "SELECT COUNT(*) FROM behavior_events
           WHERE user_id = ?1 AND behavior_type = ?2",
          rusqlite::params![user_str, behavior_str],
          |r| r.get(0),
        )?)
      })
      .await?;

    Ok(count as u64)
  }

  async fn behavior_since(
    &self,
    user:  UserId,
    since: DateTime<Utc>,
  ) -> Result<Vec<BehaviorEvent>> {
    let user_str  = encode_user(user);
    let since_str = encode_dt(since);

    let raws: Vec<RawEvent> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {EVENT_COLUMNS} FROM behavior_events
           WHERE user_id = ?1 AND occurred_at >= ?2
           ORDER BY occurred_at DESC, rowid DESC"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![user_str, since_str], RawEvent::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawEvent::into_event).collect()
  }
}

// ─── ReputationStore impl ────────────────────────────────────────────────────

impl ReputationStore for SqliteStore {
  async fn get_score(&self, user: UserId) -> Result<Option<ReputationScore>> {
    let user_str = encode_user(user);

    let raw = self
      .conn
      .call(move |conn| Ok(select_score(conn, &user_str)?))
      .await?;

    raw.map(RawScore::into_score).transpose()
  }

  async fn insert_score_if_absent(
    &self,
    score: ReputationScore,
  ) -> Result<ReputationScore> {
    let p = ScoreParams::from(&score);

    let raw = self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT OR IGNORE INTO reputation_scores (
             user_id, response_quality, respect, authenticity, investment,
             ghosting_count, dates_completed, reports_received, reports_upheld,
             positive_feedback_count, trust_level, created_at, updated_at, version
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
          rusqlite::params![
            p.user,
            p.response_quality,
            p.respect,
            p.authenticity,
            p.investment,
            p.ghosting_count,
            p.dates_completed,
            p.reports_received,
            p.reports_upheld,
            p.positive_feedback_count,
            p.trust_level,
            p.created_at,
            p.updated_at,
            p.version,
          ],
        )?;
        Ok(select_score(conn, &p.user)?)
      })
      .await?;

    raw
      .ok_or_else(|| Error::Decode("score row vanished after insert".into()))?
      .into_score()
  }

  async fn commit_behavior(
    &self,
    event: BehaviorEvent,
    score: ReputationScore,
  ) -> Result<bool> {
    let score = ScoreParams::from(&score);
    let event = EventParams::try_from(&event)?;

    let committed = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;

        // Stale read; dropping `tx` rolls back.
        if !write_score(&tx, &score)? {
          return Ok(false);
        }
        insert_event(&tx, &event)?;

        tx.commit()?;
        Ok(true)
      })
      .await?;

    Ok(committed)
  }
}
