//! Notification and recognition records consumed by the live channel.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A message addressed to one user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
  pub id:         Uuid,
  /// Recipient.
  pub user_id:    Uuid,
  #[serde(rename = "type")]
  pub kind:       String,
  pub title:      String,
  pub message:    String,
  pub data:       serde_json::Value,
  pub is_read:    bool,
  pub created_at: DateTime<Utc>,
}

/// Input to [`crate::store::GoalStore::insert_notification`].
/// `id` and `created_at` are assigned by the store.
#[derive(Debug, Clone)]
pub struct NewNotification {
  pub user_id: Uuid,
  pub kind:    String,
  pub title:   String,
  pub message: String,
  pub data:    serde_json::Value,
}

/// Peer recognition ("kudos") from one user to another.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recognition {
  pub id:              Uuid,
  pub organization_id: Uuid,
  pub from_user_id:    Uuid,
  pub to_user_id:      Uuid,
  pub message:         String,
  pub created_at:      DateTime<Utc>,
}
