//! The `GoalStore` trait and supporting query types.
//!
//! The trait is implemented by storage backends (e.g. `cascade-store-sqlite`).
//! It owns no business logic: authorization, validation, and derived state
//! all live in [`crate::service`].

use std::future::Future;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
  goal::{Goal, GoalLevel, GoalProgress, GoalStatus, GoalType},
  notification::{NewNotification, Notification, Recognition},
  user::User,
};

// ─── Query type ──────────────────────────────────────────────────────────────

/// Filters for [`GoalStore::list_goals`]. Archived goals are never returned.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GoalQuery {
  pub owner_id:  Option<Uuid>,
  pub goal_type: Option<GoalType>,
  pub status:    Option<GoalStatus>,
  pub level:     Option<GoalLevel>,
  pub team_id:   Option<Uuid>,
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over the authoritative relational store.
///
/// Goal writes are guarded by the row's `version`: a write succeeds only if
/// the stored version still equals `expected_version`, and bumps it. A
/// `false` return means another writer got there first and nothing changed.
///
/// All methods return `Send` futures so the trait can be used in multi-threaded
/// async runtimes (e.g. tokio with `axum`).
pub trait GoalStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Users (read-only) ─────────────────────────────────────────────────

  fn get_user(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<User>, Self::Error>> + Send + '_;

  /// Resolve the user behind a bearer token. `None` for unknown tokens.
  fn user_for_token<'a>(
    &'a self,
    token: &'a str,
  ) -> impl Future<Output = Result<Option<User>, Self::Error>> + Send + 'a;

  // ── Goals ─────────────────────────────────────────────────────────────

  fn insert_goal<'a>(
    &'a self,
    goal: &'a Goal,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  /// Fetch a goal scoped to `organization_id`, archived or not. Goals of
  /// other organizations are reported as `None`.
  fn get_goal(
    &self,
    organization_id: Uuid,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Goal>, Self::Error>> + Send + '_;

  /// Overwrite a goal row if its version still equals `expected_version`.
  /// The stored version becomes `goal.version`.
  fn update_goal<'a>(
    &'a self,
    goal: &'a Goal,
    expected_version: i64,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + 'a;

  /// Non-archived goals matching `query`, newest first.
  fn list_goals<'a>(
    &'a self,
    organization_id: Uuid,
    query: &'a GoalQuery,
  ) -> impl Future<Output = Result<Vec<Goal>, Self::Error>> + Send + 'a;

  /// Ids of the non-archived goals whose parent is `id`.
  fn child_goal_ids(
    &self,
    organization_id: Uuid,
    id: Uuid,
  ) -> impl Future<Output = Result<Vec<Uuid>, Self::Error>> + Send + '_;

  // ── Progress audit ────────────────────────────────────────────────────

  /// Append `record` and overwrite `goal` in a single transaction, gated by
  /// the same version check as [`GoalStore::update_goal`]. Either both
  /// writes land or neither does.
  fn record_progress<'a>(
    &'a self,
    goal: &'a Goal,
    record: &'a GoalProgress,
    expected_version: i64,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + 'a;

  /// Every progress record for a goal, oldest first.
  fn progress_history(
    &self,
    goal_id: Uuid,
  ) -> impl Future<Output = Result<Vec<GoalProgress>, Self::Error>> + Send + '_;

  // ── Notifications & live-channel polling ──────────────────────────────

  fn insert_notification(
    &self,
    input: NewNotification,
  ) -> impl Future<Output = Result<Notification, Self::Error>> + Send + '_;

  /// Notifications for `user_id` created strictly after `since`.
  fn notifications_since(
    &self,
    user_id: Uuid,
    since: DateTime<Utc>,
  ) -> impl Future<Output = Result<Vec<Notification>, Self::Error>> + Send + '_;

  /// Goals owned by `owner_id` updated strictly after `since`, archived
  /// included so clients can drop them.
  fn goals_updated_since(
    &self,
    organization_id: Uuid,
    owner_id: Uuid,
    since: DateTime<Utc>,
  ) -> impl Future<Output = Result<Vec<Goal>, Self::Error>> + Send + '_;

  /// Recognitions addressed to `user_id` created strictly after `since`.
  fn recognitions_since(
    &self,
    user_id: Uuid,
    since: DateTime<Utc>,
  ) -> impl Future<Output = Result<Vec<Recognition>, Self::Error>> + Send + '_;
}
