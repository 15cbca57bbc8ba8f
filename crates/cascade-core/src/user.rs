//! Users as seen by the engine.
//!
//! Users belong to an external directory. The engine only reads their role and
//! reporting line to answer authorization questions; it never mutates them.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

/// Organizational role of a user.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Role {
  Employee,
  TeamLead,
  Manager,
  HrAdmin,
  Ceo,
  SystemAdmin,
}

impl Role {
  pub const ALL: [Role; 6] = [
    Role::Employee,
    Role::TeamLead,
    Role::Manager,
    Role::HrAdmin,
    Role::Ceo,
    Role::SystemAdmin,
  ];

  /// Executives override ownership checks.
  pub fn is_executive(self) -> bool { matches!(self, Self::Ceo | Self::SystemAdmin) }

  /// Roles that may act on behalf of their reports.
  pub fn is_managing(self) -> bool {
    matches!(
      self,
      Self::Ceo | Self::SystemAdmin | Self::Manager | Self::HrAdmin | Self::TeamLead
    )
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
  pub id:              Uuid,
  pub organization_id: Uuid,
  pub role:            Role,
  /// The user this person reports to, if any.
  pub manager_id:      Option<Uuid>,
}
