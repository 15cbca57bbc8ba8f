//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as RFC 3339 strings with a fixed nanosecond
//! precision and a `Z` suffix, so lexical order equals chronological order and
//! `created_at > ?` comparisons are exact. Calendar dates are `YYYY-MM-DD`.
//! Enumerations use their snake_case names. UUIDs are hyphenated lowercase.

use std::{fmt::Display, str::FromStr};

use cascade_core::{
  goal::{Goal, GoalProgress},
  notification::{Notification, Recognition},
  user::User,
};
use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Scalars ─────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

pub fn decode_opt_uuid(s: Option<String>) -> Result<Option<Uuid>> {
  s.as_deref().map(decode_uuid).transpose()
}

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::Decode(format!("timestamp {s:?}: {e}")))
}

pub fn encode_date(d: NaiveDate) -> String { d.format("%Y-%m-%d").to_string() }

pub fn decode_date(s: &str) -> Result<NaiveDate> {
  NaiveDate::parse_from_str(s, "%Y-%m-%d")
    .map_err(|e| Error::Decode(format!("date {s:?}: {e}")))
}

/// Parse any strum-backed enumeration from its stored name.
pub fn decode_enum<T>(s: &str) -> Result<T>
where
  T: FromStr,
  T::Err: Display,
{
  s.parse()
    .map_err(|e| Error::Decode(format!("{} {s:?}: {e}", std::any::type_name::<T>())))
}

fn decode_confidence(n: i64) -> Result<u8> {
  u8::try_from(n).map_err(|_| Error::Decode(format!("confidence out of range: {n}")))
}

// ─── Goals ───────────────────────────────────────────────────────────────────

/// Column list shared by every `SELECT` that feeds [`RawGoal::read`].
pub const GOAL_COLUMNS: &str = "goal_id, organization_id, title, description, goal_type, level,
  target_value, current_value, unit, confidence, start_date, end_date, status,
  owner_id, department_id, team_id, parent_goal_id, is_archived, version,
  created_at, updated_at";

/// Encoded form of a [`Goal`], ready to bind as statement parameters.
/// Owned so it can move into a `tokio_rusqlite` closure.
pub struct GoalRow {
  pub goal_id:         String,
  pub organization_id: String,
  pub title:           String,
  pub description:     Option<String>,
  pub goal_type:       String,
  pub level:           String,
  pub target_value:    Option<f64>,
  pub current_value:   f64,
  pub unit:            Option<String>,
  pub confidence:      i64,
  pub start_date:      Option<String>,
  pub end_date:        Option<String>,
  pub status:          String,
  pub owner_id:        String,
  pub department_id:   Option<String>,
  pub team_id:         Option<String>,
  pub parent_goal_id:  Option<String>,
  pub is_archived:     bool,
  pub version:         i64,
  pub created_at:      String,
  pub updated_at:      String,
}

impl GoalRow {
  pub fn encode(goal: &Goal) -> Self {
    Self {
      goal_id:         encode_uuid(goal.id),
      organization_id: encode_uuid(goal.organization_id),
      title:           goal.title.clone(),
      description:     goal.description.clone(),
      goal_type:       goal.goal_type.to_string(),
      level:           goal.level.to_string(),
      target_value:    goal.target_value,
      current_value:   goal.current_value,
      unit:            goal.unit.clone(),
      confidence:      i64::from(goal.confidence),
      start_date:      goal.start_date.map(encode_date),
      end_date:        goal.end_date.map(encode_date),
      status:          goal.status.to_string(),
      owner_id:        encode_uuid(goal.owner_id),
      department_id:   goal.department_id.map(encode_uuid),
      team_id:         goal.team_id.map(encode_uuid),
      parent_goal_id:  goal.parent_goal_id.map(encode_uuid),
      is_archived:     goal.is_archived,
      version:         goal.version,
      created_at:      encode_dt(goal.created_at),
      updated_at:      encode_dt(goal.updated_at),
    }
  }
}

/// Raw values read directly from a `goals` row, in [`GOAL_COLUMNS`] order.
pub struct RawGoal(GoalRow);

impl RawGoal {
  pub fn read(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self(GoalRow {
      goal_id:         row.get(0)?,
      organization_id: row.get(1)?,
      title:           row.get(2)?,
      description:     row.get(3)?,
      goal_type:       row.get(4)?,
      level:           row.get(5)?,
      target_value:    row.get(6)?,
      current_value:   row.get(7)?,
      unit:            row.get(8)?,
      confidence:      row.get(9)?,
      start_date:      row.get(10)?,
      end_date:        row.get(11)?,
      status:          row.get(12)?,
      owner_id:        row.get(13)?,
      department_id:   row.get(14)?,
      team_id:         row.get(15)?,
      parent_goal_id:  row.get(16)?,
      is_archived:     row.get(17)?,
      version:         row.get(18)?,
      created_at:      row.get(19)?,
      updated_at:      row.get(20)?,
    }))
  }

  pub fn into_goal(self) -> Result<Goal> {
    let r = self.0;
    Ok(Goal {
      id:              decode_uuid(&r.goal_id)?,
      organization_id: decode_uuid(&r.organization_id)?,
      title:           r.title,
      description:     r.description,
      goal_type:       decode_enum(&r.goal_type)?,
      level:           decode_enum(&r.level)?,
      target_value:    r.target_value,
      current_value:   r.current_value,
      unit:            r.unit,
      confidence:      decode_confidence(r.confidence)?,
      start_date:      r.start_date.as_deref().map(decode_date).transpose()?,
      end_date:        r.end_date.as_deref().map(decode_date).transpose()?,
      status:          decode_enum(&r.status)?,
      owner_id:        decode_uuid(&r.owner_id)?,
      department_id:   decode_opt_uuid(r.department_id)?,
      team_id:         decode_opt_uuid(r.team_id)?,
      parent_goal_id:  decode_opt_uuid(r.parent_goal_id)?,
      is_archived:     r.is_archived,
      version:         r.version,
      created_at:      decode_dt(&r.created_at)?,
      updated_at:      decode_dt(&r.updated_at)?,
    })
  }
}

// ─── Progress ────────────────────────────────────────────────────────────────

pub const PROGRESS_COLUMNS: &str = "progress_id, goal_id, previous_value, new_value, confidence,
  comment, evidence_url, user_id, created_at";

pub struct RawProgress {
  pub progress_id:    String,
  pub goal_id:        String,
  pub previous_value: f64,
  pub new_value:      f64,
  pub confidence:     i64,
  pub comment:        Option<String>,
  pub evidence_url:   Option<String>,
  pub user_id:        String,
  pub created_at:     String,
}

impl RawProgress {
  pub fn encode(p: &GoalProgress) -> Self {
    Self {
      progress_id:    encode_uuid(p.id),
      goal_id:        encode_uuid(p.goal_id),
      previous_value: p.previous_value,
      new_value:      p.new_value,
      confidence:     i64::from(p.confidence),
      comment:        p.comment.clone(),
      evidence_url:   p.evidence_url.clone(),
      user_id:        encode_uuid(p.user_id),
      created_at:     encode_dt(p.created_at),
    }
  }

  pub fn read(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      progress_id:    row.get(0)?,
      goal_id:        row.get(1)?,
      previous_value: row.get(2)?,
      new_value:      row.get(3)?,
      confidence:     row.get(4)?,
      comment:        row.get(5)?,
      evidence_url:   row.get(6)?,
      user_id:        row.get(7)?,
      created_at:     row.get(8)?,
    })
  }

  pub fn into_progress(self) -> Result<GoalProgress> {
    Ok(GoalProgress {
      id:             decode_uuid(&self.progress_id)?,
      goal_id:        decode_uuid(&self.goal_id)?,
      previous_value: self.previous_value,
      new_value:      self.new_value,
      confidence:     decode_confidence(self.confidence)?,
      comment:        self.comment,
      evidence_url:   self.evidence_url,
      user_id:        decode_uuid(&self.user_id)?,
      created_at:     decode_dt(&self.created_at)?,
    })
  }
}

// ─── Users ───────────────────────────────────────────────────────────────────

pub const USER_COLUMNS: &str = "u.user_id, u.organization_id, u.role, u.manager_id";

pub struct RawUser {
  pub user_id:         String,
  pub organization_id: String,
  pub role:            String,
  pub manager_id:      Option<String>,
}

impl RawUser {
  pub fn read(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      user_id:         row.get(0)?,
      organization_id: row.get(1)?,
      role:            row.get(2)?,
      manager_id:      row.get(3)?,
    })
  }

  pub fn into_user(self) -> Result<User> {
    Ok(User {
      id:              decode_uuid(&self.user_id)?,
      organization_id: decode_uuid(&self.organization_id)?,
      role:            decode_enum(&self.role)?,
      manager_id:      decode_opt_uuid(self.manager_id)?,
    })
  }
}

// ─── Notifications ───────────────────────────────────────────────────────────

pub struct RawNotification {
  pub notification_id: String,
  pub user_id:         String,
  pub kind:            String,
  pub title:           String,
  pub message:         String,
  pub data_json:       String,
  pub is_read:         bool,
  pub created_at:      String,
}

impl RawNotification {
  pub fn read(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      notification_id: row.get(0)?,
      user_id:         row.get(1)?,
      kind:            row.get(2)?,
      title:           row.get(3)?,
      message:         row.get(4)?,
      data_json:       row.get(5)?,
      is_read:         row.get(6)?,
      created_at:      row.get(7)?,
    })
  }

  pub fn into_notification(self) -> Result<Notification> {
    Ok(Notification {
      id:         decode_uuid(&self.notification_id)?,
      user_id:    decode_uuid(&self.user_id)?,
      kind:       self.kind,
      title:      self.title,
      message:    self.message,
      data:       serde_json::from_str(&self.data_json)?,
      is_read:    self.is_read,
      created_at: decode_dt(&self.created_at)?,
    })
  }
}

// ─── Recognitions ────────────────────────────────────────────────────────────

pub struct RawRecognition {
  pub recognition_id:  String,
  pub organization_id: String,
  pub from_user_id:    String,
  pub to_user_id:      String,
  pub message:         String,
  pub created_at:      String,
}

impl RawRecognition {
  pub fn read(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      recognition_id:  row.get(0)?,
      organization_id: row.get(1)?,
      from_user_id:    row.get(2)?,
      to_user_id:      row.get(3)?,
      message:         row.get(4)?,
      created_at:      row.get(5)?,
    })
  }

  pub fn into_recognition(self) -> Result<Recognition> {
    Ok(Recognition {
      id:              decode_uuid(&self.recognition_id)?,
      organization_id: decode_uuid(&self.organization_id)?,
      from_user_id:    decode_uuid(&self.from_user_id)?,
      to_user_id:      decode_uuid(&self.to_user_id)?,
      message:         self.message,
      created_at:      decode_dt(&self.created_at)?,
    })
  }
}
