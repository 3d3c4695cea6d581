//! Local conversation registry and compatibility feed.
//!
//! Both belong to other subsystems in a full deployment; these tables let a
//! single-node server run end to end.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use tryst_core::{
  UserId,
  collab::{
    CompatibilityFeed, CompatibilityIngest, CompatibilityScore, ConversationRef,
    ConversationService,
  },
};

use crate::{
  Error, Result, SqliteStore,
  encode::{decode_user, decode_uuid, encode_dt, encode_pair, encode_user, encode_uuid},
};

// ─── CompatibilityIngest impl ────────────────────────────────────────────────

impl CompatibilityIngest for SqliteStore {
  type Error = Error;

  async fn upsert_compatibility(
    &self,
    score: CompatibilityScore,
    at:    DateTime<Utc>,
  ) -> Result<()> {
    let CompatibilityScore { user, other, score } =
      CompatibilityScore::new(score.user, score.other, score.score)?;

    let (low, high) = encode_pair(user, other);
    let now_str     = encode_dt(at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO compatibility_scores (user_low, user_high, score, updated_at)
           VALUES (?1, ?2, ?3, ?4)
           ON CONFLICT (user_low, user_high)
           DO UPDATE SET score = excluded.score, updated_at = excluded.updated_at",
          rusqlite::params![low, high, score, now_str],
        )?;
        Ok(())
      })
      .await?;

    Ok(())
  }
}

// ─── ConversationService impl ────────────────────────────────────────────────

impl ConversationService for SqliteStore {
  type Error = Error;

  /// Returns the pair's existing conversation if there is one.
  async fn create_conversation(
    &self,
    a:  UserId,
    b:  UserId,
    at: DateTime<Utc>,
  ) -> Result<ConversationRef> {
    let (low, high) = encode_pair(a, b);
    let fresh_id    = encode_uuid(Uuid::new_v4());
    let now_str     = encode_dt(at);

    let id: String = self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT OR IGNORE INTO conversations (conversation_id, user_low, user_high, created_at)
           VALUES (?1, ?2, ?3, ?4)",
          rusqlite::params![fresh_id, low, high, now_str],
        )?;
        Ok(conn.query_row(
          "SELECT conversation_id FROM conversations
           WHERE user_low = ?1 AND user_high = ?2",
          rusqlite::params![low, high],
          |r| r.get(0),
        )?)
      })
      .await?;

    let conversation = ConversationRef(decode_uuid(&id)?);
    tracing::debug!(%a, %b, %conversation, "conversation ready");
    Ok(conversation)
  }
}

// ─── CompatibilityFeed impl ──────────────────────────────────────────────────

impl CompatibilityFeed for SqliteStore {
  type Error = Error;

  async fn scores_for(&self, user: UserId) -> Result<Vec<CompatibilityScore>> {
    let user_str = encode_user(user);

    let rows: Vec<(String, f64)> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT CASE WHEN user_low = ?1 THEN user_high ELSE user_low END, score
           FROM compatibility_scores
           WHERE user_low = ?1 OR user_high = ?1
           ORDER BY score DESC",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![user_str], |r| Ok((r.get(0)?, r.get(1)?)))?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    rows
      .into_iter()
      .map(|(other, score)| {
        Ok(CompatibilityScore { user, other: decode_user(&other)?, score })
      })
      .collect()
  }
}
