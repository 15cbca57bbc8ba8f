//! Goal types: the nodes of the cascading objective tree.
//!
//! A goal stores only raw inputs (values, confidence, dates). Progress,
//! confidence band, and risk are derived on every read and live solely in the
//! [`GoalView`] read model.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

use crate::progress::{self, ConfidenceLevel, RiskLevel};

// ─── Enumerations ────────────────────────────────────────────────────────────

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum GoalType {
  Objective,
  KeyResult,
}

/// Scope of a goal. Variants are declared from least to most global so the
/// derived ordering reads `Personal < Team < Company`.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  PartialOrd,
  Ord,
  Serialize,
  Deserialize,
  Display,
  EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum GoalLevel {
  Personal,
  Team,
  Company,
}

impl GoalLevel {
  /// Whether a goal at this level may roll up into a goal at `parent`.
  pub fn may_roll_up_to(self, parent: GoalLevel) -> bool { self < parent }
}

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum GoalStatus {
  Draft,
  Active,
  Completed,
  AtRisk,
  Archived,
}

impl GoalStatus {
  /// Transitions reachable through an ordinary update. `Archived` is only
  /// entered through the archive operation and is never a valid target here.
  pub fn can_transition_to(self, next: GoalStatus) -> bool {
    use GoalStatus::*;
    if self == next {
      return self != Archived;
    }
    matches!(
      (self, next),
      (Draft, Active)
        | (Active, Completed)
        | (Active, AtRisk)
        | (AtRisk, Active)
        | (AtRisk, Completed)
    )
  }
}

// ─── Goal ────────────────────────────────────────────────────────────────────

/// A persisted goal row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Goal {
  pub id:              Uuid,
  pub organization_id: Uuid,
  pub title:           String,
  pub description:     Option<String>,
  #[serde(rename = "type")]
  pub goal_type:       GoalType,
  pub level:           GoalLevel,
  pub target_value:    Option<f64>,
  pub current_value:   f64,
  pub unit:            Option<String>,
  /// Author-supplied, 0–10.
  pub confidence:      u8,
  pub start_date:      Option<NaiveDate>,
  pub end_date:        Option<NaiveDate>,
  pub status:          GoalStatus,
  pub owner_id:        Uuid,
  pub department_id:   Option<Uuid>,
  pub team_id:         Option<Uuid>,
  pub parent_goal_id:  Option<Uuid>,
  /// Soft-delete marker; archived rows are kept but never listed.
  pub is_archived:     bool,
  /// Bumped on every write; the compare-and-swap token for concurrent
  /// updates.
  pub version:         i64,
  pub created_at:      DateTime<Utc>,
  pub updated_at:      DateTime<Utc>,
}

// ─── Inputs ──────────────────────────────────────────────────────────────────

/// Input to [`crate::GoalService::create`].
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewGoal {
  pub title:          String,
  #[serde(default)]
  pub description:    Option<String>,
  #[serde(rename = "type", default = "default_goal_type")]
  pub goal_type:      GoalType,
  pub level:          GoalLevel,
  #[serde(default)]
  pub target_value:   Option<f64>,
  #[serde(default)]
  pub current_value:  Option<f64>,
  #[serde(default)]
  pub unit:           Option<String>,
  #[serde(default)]
  pub confidence:     Option<u8>,
  #[serde(default)]
  pub start_date:     Option<NaiveDate>,
  #[serde(default)]
  pub end_date:       Option<NaiveDate>,
  /// Defaults to the acting user.
  #[serde(default)]
  pub owner_id:       Option<Uuid>,
  #[serde(default)]
  pub department_id:  Option<Uuid>,
  #[serde(default)]
  pub team_id:        Option<Uuid>,
  #[serde(default)]
  pub parent_goal_id: Option<Uuid>,
}

fn default_goal_type() -> GoalType { GoalType::Objective }

impl NewGoal {
  /// Convenience constructor with every optional field left unset.
  pub fn new(title: impl Into<String>, level: GoalLevel) -> Self {
    Self {
      title: title.into(),
      description: None,
      goal_type: GoalType::Objective,
      level,
      target_value: None,
      current_value: None,
      unit: None,
      confidence: None,
      start_date: None,
      end_date: None,
      owner_id: None,
      department_id: None,
      team_id: None,
      parent_goal_id: None,
    }
  }
}

/// Partial update. `None` leaves a field untouched; for nullable columns a
/// nested `Some(None)` clears the value.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoalPatch {
  pub title:          Option<String>,
  #[serde(default, with = "nullable")]
  pub description:    Option<Option<String>>,
  #[serde(rename = "type")]
  pub goal_type:      Option<GoalType>,
  pub level:          Option<GoalLevel>,
  #[serde(default, with = "nullable")]
  pub target_value:   Option<Option<f64>>,
  pub current_value:  Option<f64>,
  #[serde(default, with = "nullable")]
  pub unit:           Option<Option<String>>,
  pub confidence:     Option<u8>,
  #[serde(default, with = "nullable")]
  pub start_date:     Option<Option<NaiveDate>>,
  #[serde(default, with = "nullable")]
  pub end_date:       Option<Option<NaiveDate>>,
  pub status:         Option<GoalStatus>,
  #[serde(default, with = "nullable")]
  pub department_id:  Option<Option<Uuid>>,
  #[serde(default, with = "nullable")]
  pub team_id:        Option<Option<Uuid>>,
  #[serde(default, with = "nullable")]
  pub parent_goal_id: Option<Option<Uuid>>,
}

/// Distinguishes an absent JSON key (`None`) from an explicit `null`
/// (`Some(None)`).
mod nullable {
  use serde::{Deserialize, Deserializer};

  pub fn deserialize<'de, T, D>(de: D) -> Result<Option<Option<T>>, D::Error>
  where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
  {
    Option::<T>::deserialize(de).map(Some)
  }
}

impl GoalPatch {
  /// Apply the patch onto `goal` in place. Returns `true` when a field that
  /// feeds the derived progress (`current_value` or `target_value`) changed.
  pub fn apply(&self, goal: &mut Goal) -> bool {
    let before = (goal.current_value, goal.target_value);

    if let Some(v) = &self.title {
      goal.title = v.clone();
    }
    if let Some(v) = &self.description {
      goal.description = v.clone();
    }
    if let Some(v) = self.goal_type {
      goal.goal_type = v;
    }
    if let Some(v) = self.level {
      goal.level = v;
    }
    if let Some(v) = self.target_value {
      goal.target_value = v;
    }
    if let Some(v) = self.current_value {
      goal.current_value = v;
    }
    if let Some(v) = &self.unit {
      goal.unit = v.clone();
    }
    if let Some(v) = self.confidence {
      goal.confidence = v;
    }
    if let Some(v) = self.start_date {
      goal.start_date = v;
    }
    if let Some(v) = self.end_date {
      goal.end_date = v;
    }
    if let Some(v) = self.status {
      goal.status = v;
    }
    if let Some(v) = self.department_id {
      goal.department_id = v;
    }
    if let Some(v) = self.team_id {
      goal.team_id = v;
    }
    if let Some(v) = self.parent_goal_id {
      goal.parent_goal_id = v;
    }

    before != (goal.current_value, goal.target_value)
  }
}

// ─── Progress audit ──────────────────────────────────────────────────────────

/// An immutable audit record of one progress check-in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoalProgress {
  pub id:             Uuid,
  pub goal_id:        Uuid,
  pub previous_value: f64,
  pub new_value:      f64,
  pub confidence:     u8,
  pub comment:        Option<String>,
  pub evidence_url:   Option<String>,
  /// Who recorded the check-in.
  pub user_id:        Uuid,
  pub created_at:     DateTime<Utc>,
}

/// Input to [`crate::GoalService::record_progress`].
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressInput {
  pub new_value:    f64,
  pub confidence:   u8,
  #[serde(default)]
  pub comment:      Option<String>,
  #[serde(default)]
  pub evidence_url: Option<String>,
}

// ─── Read model ──────────────────────────────────────────────────────────────

/// The read model returned to callers. Never stored; derived on every read.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GoalView {
  #[serde(flatten)]
  pub goal:             Goal,
  pub progress:         u8,
  pub confidence_level: ConfidenceLevel,
  pub risk_level:       RiskLevel,
  pub child_goal_ids:   Vec<Uuid>,
}

impl GoalView {
  /// Derive every computed field from `goal` as of `today`.
  pub fn derive(goal: Goal, child_goal_ids: Vec<Uuid>, today: NaiveDate) -> Self {
    let progress = progress::progress(goal.current_value, goal.target_value);
    let confidence_level = progress::confidence_level(goal.confidence);
    let risk_level = progress::risk_level(&progress::RiskInputs {
      progress,
      confidence_level,
      status: goal.status,
      start_date: goal.start_date,
      end_date: goal.end_date,
      today,
    });
    Self { goal, progress, confidence_level, risk_level, child_goal_ids }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn level_ordering_is_personal_team_company() {
    assert!(GoalLevel::Personal.may_roll_up_to(GoalLevel::Team));
    assert!(GoalLevel::Personal.may_roll_up_to(GoalLevel::Company));
    assert!(GoalLevel::Team.may_roll_up_to(GoalLevel::Company));
    assert!(!GoalLevel::Team.may_roll_up_to(GoalLevel::Team));
    assert!(!GoalLevel::Company.may_roll_up_to(GoalLevel::Personal));
  }

  #[test]
  fn status_transitions() {
    use GoalStatus::*;
    assert!(Draft.can_transition_to(Active));
    assert!(Active.can_transition_to(AtRisk));
    assert!(AtRisk.can_transition_to(Completed));
    assert!(Active.can_transition_to(Active));
    assert!(!Draft.can_transition_to(Completed));
    assert!(!Completed.can_transition_to(Active));
    assert!(!Active.can_transition_to(Archived));
    assert!(!Archived.can_transition_to(Archived));
  }

  #[test]
  fn patch_distinguishes_null_from_absent() {
    let patch: GoalPatch =
      serde_json::from_value(serde_json::json!({ "unit": null })).unwrap();
    assert_eq!(patch.unit, Some(None));
    assert_eq!(patch.description, None);
  }
}
