//! [`SqliteStore`], the SQLite implementation of [`GoalStore`].

use std::path::Path;

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Utc};
use rand_core::{OsRng, RngCore as _};
use rusqlite::OptionalExtension as _;
use sha2::{Digest as _, Sha256};
use uuid::Uuid;

use cascade_core::{
  goal::{Goal, GoalProgress},
  notification::{NewNotification, Notification, Recognition},
  store::{GoalQuery, GoalStore},
  user::User,
};

use crate::{
  encode::{
    GOAL_COLUMNS, GoalRow, PROGRESS_COLUMNS, RawGoal, RawNotification, RawProgress,
    RawRecognition, RawUser, USER_COLUMNS, encode_dt, encode_uuid,
  },
  schema::SCHEMA,
  Error, Result,
};

const UPDATE_GOAL: &str = "UPDATE goals SET
     title = ?3, description = ?4, goal_type = ?5, level = ?6,
     target_value = ?7, current_value = ?8, unit = ?9, confidence = ?10,
     start_date = ?11, end_date = ?12, status = ?13, owner_id = ?14,
     department_id = ?15, team_id = ?16, parent_goal_id = ?17,
     is_archived = ?18, version = ?19, updated_at = ?20
   WHERE goal_id = ?1 AND organization_id = ?2 AND version = ?21";

/// Bind a [`GoalRow`] in the parameter order of [`UPDATE_GOAL`].
fn run_update(
  conn: &rusqlite::Connection,
  row: &GoalRow,
  expected_version: i64,
) -> rusqlite::Result<usize> {
  conn.execute(
    UPDATE_GOAL,
    rusqlite::params![
      row.goal_id,
      row.organization_id,
      row.title,
      row.description,
      row.goal_type,
      row.level,
      row.target_value,
      row.current_value,
      row.unit,
      row.confidence,
      row.start_date,
      row.end_date,
      row.status,
      row.owner_id,
      row.department_id,
      row.team_id,
      row.parent_goal_id,
      row.is_archived,
      row.version,
      row.updated_at,
      expected_version,
    ],
  )
}

fn hash_token(token: &str) -> String { hex::encode(Sha256::digest(token.as_bytes())) }

// ─── Store ───────────────────────────────────────────────────────────────────

/// A goal store backed by a single SQLite file.
///
/// Clones share one reference-counted connection.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open a private in-memory store.
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

  // ── Directory seeding ─────────────────────────────────────────────────

  /// Insert or replace a directory user. The engine itself never calls
  /// this; it exists for provisioning and tests.
  pub async fn put_user(&self, user: &User) -> Result<()> {
    let id_str      = encode_uuid(user.id);
    let org_str     = encode_uuid(user.organization_id);
    let role_str    = user.role.to_string();
    let manager_str = user.manager_id.map(encode_uuid);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO users (user_id, organization_id, role, manager_id)
           VALUES (?1, ?2, ?3, ?4)
           ON CONFLICT(user_id) DO UPDATE SET
             organization_id = excluded.organization_id,
             role            = excluded.role,
             manager_id      = excluded.manager_id",
          rusqlite::params![id_str, org_str, role_str, manager_str],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Mint a new bearer token for `user_id`. Only the SHA-256 digest is
  /// stored; the returned string is the sole copy of the secret.
  pub async fn issue_token(&self, user_id: Uuid) -> Result<String> {
    if self.get_user(user_id).await?.is_none() {
      return Err(Error::UserNotFound(user_id));
    }

    let mut secret = [0u8; 32];
    OsRng.fill_bytes(&mut secret);
    let token = URL_SAFE_NO_PAD.encode(secret);

    let hash_str = hash_token(&token);
    let user_str = encode_uuid(user_id);
    let at_str   = encode_dt(Utc::now());

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO api_tokens (token_hash, user_id, created_at) VALUES (?1, ?2, ?3)",
          rusqlite::params![hash_str, user_str, at_str],
        )?;
        Ok(())
      })
      .await?;

    Ok(token)
  }

  /// Record a peer recognition; surfaced to the recipient's live channel by
  /// the next poll.
  pub async fn insert_recognition(
    &self,
    organization_id: Uuid,
    from_user_id: Uuid,
    to_user_id: Uuid,
    message: String,
  ) -> Result<Recognition> {
    let recognition = Recognition {
      id: Uuid::new_v4(),
      organization_id,
      from_user_id,
      to_user_id,
      message,
      created_at: Utc::now(),
    };

    let id_str   = encode_uuid(recognition.id);
    let org_str  = encode_uuid(organization_id);
    let from_str = encode_uuid(from_user_id);
    let to_str   = encode_uuid(to_user_id);
    let msg      = recognition.message.clone();
    let at_str   = encode_dt(recognition.created_at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO recognitions
             (recognition_id, organization_id, from_user_id, to_user_id, message, created_at)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
          rusqlite::params![id_str, org_str, from_str, to_str, msg, at_str],
        )?;
        Ok(())
      })
      .await?;

    Ok(recognition)
  }
}

// ─── GoalStore impl ──────────────────────────────────────────────────────────

impl GoalStore for SqliteStore {
  type Error = Error;

  // ── Users ─────────────────────────────────────────────────────────────────

  async fn get_user(&self, id: Uuid) -> Result<Option<User>> {
    let id_str = encode_uuid(id);

    let raw: Option<RawUser> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            &format!("SELECT {USER_COLUMNS} FROM users u WHERE u.user_id = ?1"),
            rusqlite::params![id_str],
            RawUser::read,
          )
          .optional()?)
      })
      .await?;

    raw.map(RawUser::into_user).transpose()
  }

  async fn user_for_token(&self, token: &str) -> Result<Option<User>> {
    let hash_str = hash_token(token);

    let raw: Option<RawUser> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            &format!(
              "SELECT {USER_COLUMNS}
               FROM api_tokens t
               JOIN users u ON u.user_id = t.user_id
               WHERE t.token_hash = ?1"
            ),
            rusqlite::params![hash_str],
            RawUser::read,
          )
          .optional()?)
      })
      .await?;

    raw.map(RawUser::into_user).transpose()
  }

  // ── Goals ─────────────────────────────────────────────────────────────────

  async fn insert_goal(&self, goal: &Goal) -> Result<()> {
    let row = GoalRow::encode(goal);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          &format!(
            "INSERT INTO goals ({GOAL_COLUMNS})
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11,
                     ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20, ?21)"
          ),
          rusqlite::params![
            row.goal_id,
            row.organization_id,
            row.title,
            row.description,
            row.goal_type,
            row.level,
            row.target_value,
            row.current_value,
            row.unit,
            row.confidence,
            row.start_date,
            row.end_date,
            row.status,
            row.owner_id,
            row.department_id,
            row.team_id,
            row.parent_goal_id,
            row.is_archived,
            row.version,
            row.created_at,
            row.updated_at,
          ],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn get_goal(&self, organization_id: Uuid, id: Uuid) -> Result<Option<Goal>> {
    let org_str = encode_uuid(organization_id);
    let id_str  = encode_uuid(id);

    let raw: Option<RawGoal> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            &format!(
              "SELECT {GOAL_COLUMNS} FROM goals
               WHERE goal_id = ?1 AND organization_id = ?2"
            ),
            rusqlite::params![id_str, org_str],
            RawGoal::read,
          )
          .optional()?)
      })
      .await?;

    raw.map(RawGoal::into_goal).transpose()
  }

  async fn update_goal(&self, goal: &Goal, expected_version: i64) -> Result<bool> {
    let row = GoalRow::encode(goal);

    let changed = self
      .conn
      .call(move |conn| Ok(run_update(conn, &row, expected_version)?))
      .await?;

    Ok(changed == 1)
  }

  async fn list_goals(&self, organization_id: Uuid, query: &GoalQuery) -> Result<Vec<Goal>> {
    // Every bound value is text, so the arguments travel as a plain Vec.
    let mut conds = vec!["organization_id = ?1".to_owned(), "is_archived = 0".to_owned()];
    let mut args  = vec![encode_uuid(organization_id)];

    let filters = [
      ("owner_id", query.owner_id.map(encode_uuid)),
      ("goal_type", query.goal_type.map(|t| t.to_string())),
      ("status", query.status.map(|s| s.to_string())),
      ("level", query.level.map(|l| l.to_string())),
      ("team_id", query.team_id.map(encode_uuid)),
    ];
    for (column, value) in filters {
      if let Some(value) = value {
        args.push(value);
        conds.push(format!("{column} = ?{}", args.len()));
      }
    }

    let sql = format!(
      "SELECT {GOAL_COLUMNS} FROM goals
       WHERE {}
       ORDER BY created_at DESC, rowid DESC",
      conds.join(" AND ")
    );

    let raws: Vec<RawGoal> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(rusqlite::params_from_iter(args.iter()), RawGoal::read)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawGoal::into_goal).collect()
  }

  async fn child_goal_ids(&self, organization_id: Uuid, id: Uuid) -> Result<Vec<Uuid>> {
    let org_str = encode_uuid(organization_id);
    let id_str  = encode_uuid(id);

    let ids: Vec<String> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT goal_id FROM goals
           WHERE parent_goal_id = ?1 AND organization_id = ?2 AND is_archived = 0
           ORDER BY created_at, rowid",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![id_str, org_str], |r| r.get(0))?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    ids
      .iter()
      .map(|s| Uuid::parse_str(s).map_err(Error::Uuid))
      .collect()
  }

  // ── Progress audit ────────────────────────────────────────────────────────

  async fn record_progress(
    &self,
    goal: &Goal,
    record: &GoalProgress,
    expected_version: i64,
  ) -> Result<bool> {
    let row = GoalRow::encode(goal);
    let rec = RawProgress::encode(record);

    let committed = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        if run_update(&tx, &row, expected_version)? != 1 {
          // Dropping the transaction rolls it back.
          return Ok(false);
        }
        tx.execute(
          &format!(
            "INSERT INTO goal_progress ({PROGRESS_COLUMNS})
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)"
          ),
          rusqlite::params![
            rec.progress_id,
            rec.goal_id,
            rec.previous_value,
            rec.new_value,
            rec.confidence,
            rec.comment,
            rec.evidence_url,
            rec.user_id,
            rec.created_at,
          ],
        )?;
        tx.commit()?;
        Ok(true)
      })
      .await?;

    Ok(committed)
  }

  async fn progress_history(&self, goal_id: Uuid) -> Result<Vec<GoalProgress>> {
    let id_str = encode_uuid(goal_id);

    let raws: Vec<RawProgress> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {PROGRESS_COLUMNS} FROM goal_progress
           WHERE goal_id = ?1
           ORDER BY created_at, rowid"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![id_str], RawProgress::read)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawProgress::into_progress).collect()
  }

  // ── Notifications & polling ───────────────────────────────────────────────

  async fn insert_notification(&self, input: NewNotification) -> Result<Notification> {
    let notification = Notification {
      id:         Uuid::new_v4(),
      user_id:    input.user_id,
      kind:       input.kind,
      title:      input.title,
      message:    input.message,
      data:       input.data,
      is_read:    false,
      created_at: Utc::now(),
    };

    let id_str   = encode_uuid(notification.id);
    let user_str = encode_uuid(notification.user_id);
    let kind     = notification.kind.clone();
    let title    = notification.title.clone();
    let message  = notification.message.clone();
    let data_str = notification.data.to_string();
    let at_str   = encode_dt(notification.created_at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO notifications
             (notification_id, user_id, kind, title, message, data_json, is_read, created_at)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0, ?7)",
          rusqlite::params![id_str, user_str, kind, title, message, data_str, at_str],
        )?;
        Ok(())
      })
      .await?;

    Ok(notification)
  }

  async fn notifications_since(
    &self,
    user_id: Uuid,
    since: DateTime<Utc>,
  ) -> Result<Vec<Notification>> {
    let user_str  = encode_uuid(user_id);
    let since_str = encode_dt(since);

    let raws: Vec<RawNotification> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT notification_id, user_id, kind, title, message, data_json, is_read, created_at
           FROM notifications
           WHERE user_id = ?1 AND created_at > ?2
           ORDER BY created_at, rowid",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![user_str, since_str], RawNotification::read)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawNotification::into_notification).collect()
  }

  async fn goals_updated_since(
    &self,
    organization_id: Uuid,
    owner_id: Uuid,
    since: DateTime<Utc>,
  ) -> Result<Vec<Goal>> {
    let org_str   = encode_uuid(organization_id);
    let owner_str = encode_uuid(owner_id);
    let since_str = encode_dt(since);

    let raws: Vec<RawGoal> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {GOAL_COLUMNS} FROM goals
           WHERE organization_id = ?1 AND owner_id = ?2 AND updated_at > ?3
           ORDER BY updated_at, rowid"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![org_str, owner_str, since_str], RawGoal::read)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawGoal::into_goal).collect()
  }

  async fn recognitions_since(
    &self,
    user_id: Uuid,
    since: DateTime<Utc>,
  ) -> Result<Vec<Recognition>> {
    let user_str  = encode_uuid(user_id);
    let since_str = encode_dt(since);

    let raws: Vec<RawRecognition> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT recognition_id, organization_id, from_user_id, to_user_id, message, created_at
           FROM recognitions
           WHERE to_user_id = ?1 AND created_at > ?2
           ORDER BY created_at, rowid",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![user_str, since_str], RawRecognition::read)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawRecognition::into_recognition).collect()
  }
}
