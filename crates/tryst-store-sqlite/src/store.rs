//! [`SqliteStore`] and its [`WindowStore`] implementation.

use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::OptionalExtension as _;
use uuid::Uuid;

use tryst_core::{
  UserId,
  behavior::BehaviorEvent,
  collab::ConversationRef,
  reputation::ReputationScore,
  store::{UserWindows, WindowStore},
  window::MatchWindow,
};

use crate::{
  Error, Result,
  encode::{
    PENDING_STATUSES, RawWindow, WINDOW_COLUMNS, encode_dt, encode_intro, encode_pair,
    encode_user, encode_uuid,
  },
  reputation::{EventParams, ScoreParams, insert_event, write_score},
  schema::SCHEMA,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A Tryst store backed by a single SQLite file.
///
/// Clones share one background connection.
#[derive(Clone)]
pub struct SqliteStore {
  pub(crate) conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let path = path.as_ref().to_path_buf();
    let conn = tokio_rusqlite::Connection::open(&path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    tracing::info!(path = %path.display(), "opened sqlite store");
    Ok(store)
  }

  /// Open a fresh in-memory store.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Run a `SELECT {WINDOW_COLUMNS} ...` query with positional text
  /// parameters.
  async fn query_windows(
    &self,
    sql: String,
    params: Vec<String>,
  ) -> Result<Vec<MatchWindow>> {
    let raws: Vec<RawWindow> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(rusqlite::params_from_iter(params.iter()), RawWindow::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawWindow::into_window).collect()
  }
}

/// Owned values of a window's mutable columns, ready to bind.
struct WindowParams {
  token:          String,
  status:         String,
  confirmed_a:    Option<String>,
  confirmed_b:    Option<String>,
  expires_at:     String,
  extension_used: bool,
  requested_by:   Option<String>,
  intro_a:        Option<String>,
  intro_b:        Option<String>,
  updated_at:     String,
  version:        i64,
}

impl TryFrom<&MatchWindow> for WindowParams {
  type Error = Error;

  fn try_from(w: &MatchWindow) -> Result<Self> {
    Ok(Self {
      token:          encode_uuid(w.token),
      status:         w.status.as_ref().to_owned(),
      confirmed_a:    w.confirmed_a_at.map(encode_dt),
      confirmed_b:    w.confirmed_b_at.map(encode_dt),
      expires_at:     encode_dt(w.expires_at),
      extension_used: w.extension_used,
      requested_by:   w.extension_requested_by.map(encode_user),
      intro_a:        encode_intro(w.intro_a.as_ref())?,
      intro_b:        encode_intro(w.intro_b.as_ref())?,
      updated_at:     encode_dt(w.updated_at),
      version:        w.version as i64,
    })
  }
}

/// Overwrite a window's mutable columns if its stored version still equals
/// `p.version`.
fn write_window(conn: &rusqlite::Connection, p: &WindowParams) -> rusqlite::Result<bool> {
  let n = conn.execute(
    "UPDATE match_windows SET
       status                 = ?1,
       confirmed_a_at         = ?2,
       confirmed_b_at         = ?3,
       expires_at             = ?4,
       extension_used         = ?5,
       extension_requested_by = ?6,
       intro_a                = ?7,
       intro_b                = ?8,
       updated_at             = ?9,
       version                = version + 1
     WHERE token = ?10 AND version = ?11",
    rusqlite::params![
      p.status,
      p.confirmed_a,
      p.confirmed_b,
      p.expires_at,
      p.extension_used,
      p.requested_by,
      p.intro_a,
      p.intro_b,
      p.updated_at,
      p.token,
      p.version,
    ],
  )?;
  Ok(n == 1)
}

// ─── WindowStore impl ────────────────────────────────────────────────────────

impl WindowStore for SqliteStore {
  type Error = Error;

  async fn insert_window(&self, window: MatchWindow) -> Result<bool> {
    let (low, high)     = encode_pair(window.user_a, window.user_b);
    let token_str       = encode_uuid(window.token);
    let user_a_str      = encode_user(window.user_a);
    let user_b_str      = encode_user(window.user_b);
    let status_str      = window.status.as_ref().to_owned();
    let confirmed_a_str = window.confirmed_a_at.map(encode_dt);
    let confirmed_b_str = window.confirmed_b_at.map(encode_dt);
    let expires_str     = encode_dt(window.expires_at);
    let requested_by    = window.extension_requested_by.map(encode_user);
    let conversation    = window.conversation.map(|c| encode_uuid(c.0));
    let intro_a         = encode_intro(window.intro_a.as_ref())?;
    let intro_b         = encode_intro(window.intro_b.as_ref())?;
    let created_str     = encode_dt(window.created_at);
    let updated_str     = encode_dt(window.updated_at);
    let version         = window.version as i64;
    let score           = window.compatibility_score;
    let extension_used  = window.extension_used;

    let inserted = self
      .conn
      .call(move |conn| {
        let outcome = conn.execute(
          "INSERT INTO match_windows (
             token, user_a, user_b, user_low, user_high, compatibility_score,
             status, confirmed_a_at, confirmed_b_at, expires_at, extension_used,
             extension_requested_by, conversation_id, intro_a, intro_b,
             created_at, updated_at, version
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18)",
          rusqlite::params![
            token_str,
            user_a_str,
            user_b_str,
            low,
            high,
            score,
            status_str,
            confirmed_a_str,
            confirmed_b_str,
            expires_str,
            extension_used,
            requested_by,
            conversation,
            intro_a,
            intro_b,
            created_str,
            updated_str,
            version,
          ],
        );

        match outcome {
          Ok(_) => Ok(true),
          // The partial unique index on the normalized pair rejected it.
          Err(rusqlite::Error::SqliteFailure(e, _))
            if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE =>
          {
            Ok(false)
          }
          Err(e) => Err(e.into()),
        }
      })
      .await?;

    Ok(inserted)
  }

  async fn get_window(&self, token: Uuid) -> Result<Option<MatchWindow>> {
    let token_str = encode_uuid(token);

    let raw: Option<RawWindow> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            &format!("SELECT {WINDOW_COLUMNS} FROM match_windows WHERE token = ?1"),
            rusqlite::params![token_str],
            RawWindow::from_row,
          )
          .optional()?)
      })
      .await?;

    raw.map(RawWindow::into_window).transpose()
  }

  async fn has_active_window(&self, a: UserId, b: UserId) -> Result<bool> {
    let (low, high) = encode_pair(a, b);

    let exists = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            "SELECT 1 FROM match_windows
             WHERE user_low = ?1 AND user_high = ?2
               AND status NOT IN ('declined_by_a', 'declined_by_b', 'expired')",
            rusqlite::params![low, high],
            |_| Ok(true),
          )
          .optional()?
          .unwrap_or(false))
      })
      .await?;

    Ok(exists)
  }

  async fn update_window(&self, window: MatchWindow) -> Result<bool> {
    let p = WindowParams::try_from(&window)?;

    let changed = self
      .conn
      .call(move |conn| Ok(write_window(conn, &p)?))
      .await?;

    Ok(changed)
  }

  async fn commit_expiry(
    &self,
    window:   MatchWindow,
    ghosting: Option<(BehaviorEvent, ReputationScore)>,
  ) -> Result<bool> {
    let window   = WindowParams::try_from(&window)?;
    let ghosting = ghosting
      .map(|(event, score)| {
        Ok::<_, Error>((EventParams::try_from(&event)?, ScoreParams::from(&score)))
      })
      .transpose()?;

    let committed = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;

        // Either version check failing rolls back everything.
        if !write_window(&tx, &window)? {
          return Ok(false);
        }
        if let Some((event, score)) = &ghosting {
          if !write_score(&tx, score)? {
            return Ok(false);
          }
          insert_event(&tx, event)?;
        }

        tx.commit()?;
        Ok(true)
      })
      .await?;

    Ok(committed)
  }

  async fn attach_conversation(
    &self,
    token:        Uuid,
    conversation: ConversationRef,
  ) -> Result<bool> {
    let token_str = encode_uuid(token);
    let conv_str  = encode_uuid(conversation.0);

    let attached = self
      .conn
      .call(move |conn| {
        let n = conn.execute(
          "UPDATE match_windows
           SET conversation_id = ?1, version = version + 1
           WHERE token = ?2 AND conversation_id IS NULL",
          rusqlite::params![conv_str, token_str],
        )?;
        Ok(n == 1)
      })
      .await?;

    Ok(attached)
  }

  async fn user_windows(
    &self,
    user:  UserId,
    view:  UserWindows,
    as_of: DateTime<Utc>,
  ) -> Result<Vec<MatchWindow>> {
    let user_str  = encode_user(user);
    let as_of_str = encode_dt(as_of);

    let (sql, params) = match view {
      UserWindows::Pending => (
        format!(
          "SELECT {WINDOW_COLUMNS} FROM match_windows
           WHERE ((user_a = ?1 AND confirmed_a_at IS NULL)
               OR (user_b = ?1 AND confirmed_b_at IS NULL))
             AND status IN ({PENDING_STATUSES})
             AND expires_at > ?2
           ORDER BY expires_at ASC"
        ),
        vec![user_str, as_of_str],
      ),
      UserWindows::Waiting => (
        format!(
          "SELECT {WINDOW_COLUMNS} FROM match_windows
           WHERE ((user_a = ?1 AND confirmed_a_at IS NOT NULL AND confirmed_b_at IS NULL)
               OR (user_b = ?1 AND confirmed_b_at IS NOT NULL AND confirmed_a_at IS NULL))
             AND status IN ('pending_user_a', 'pending_user_b')
             AND expires_at > ?2
           ORDER BY expires_at ASC"
        ),
        vec![user_str, as_of_str],
      ),
      UserWindows::Confirmed => (
        format!(
          "SELECT {WINDOW_COLUMNS} FROM match_windows
           WHERE (user_a = ?1 OR user_b = ?1)
             AND status = 'confirmed'
           ORDER BY updated_at DESC"
        ),
        vec![user_str],
      ),
    };

    self.query_windows(sql, params).await
  }

  async fn count_pending(&self, user: UserId, as_of: DateTime<Utc>) -> Result<u64> {
    let user_str  = encode_user(user);
    let as_of_str = encode_dt(as_of);

    let count: i64 = self
      .conn
      .call(move |conn| {
        Ok(conn.query_row(
          &format!(
            "SELECT COUNT(*) FROM match_windows
             WHERE ((user_a = ?1 AND confirmed_a_at IS NULL)
                 OR (user_b = ?1 AND confirmed_b_at IS NULL))
               AND status IN ({PENDING_STATUSES})
               AND expires_at > ?2"
          ),
          rusqlite::params![user_str, as_of_str],
          |r| r.get(0),
        )?)
      })
      .await?;

    Ok(count as u64)
  }

  async fn due_for_expiry(&self, now: DateTime<Utc>) -> Result<Vec<MatchWindow>> {
    let sql = format!(
      "SELECT {WINDOW_COLUMNS} FROM match_windows
       WHERE status IN ({PENDING_STATUSES}) AND expires_at <= ?1
       ORDER BY expires_at ASC"
    );
    self.query_windows(sql, vec![encode_dt(now)]).await
  }

  async fn expiring_between(
    &self,
    from:  DateTime<Utc>,
    until: DateTime<Utc>,
  ) -> Result<Vec<MatchWindow>> {
    let sql = format!(
      "SELECT {WINDOW_COLUMNS} FROM match_windows
       WHERE status IN ({PENDING_STATUSES})
         AND expires_at > ?1 AND expires_at <= ?2
       ORDER BY expires_at ASC"
    );
    self
      .query_windows(sql, vec![encode_dt(from), encode_dt(until)])
      .await
  }
}
