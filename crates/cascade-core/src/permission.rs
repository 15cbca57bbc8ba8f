//! The goal mutation policy.
//!
//! Every role check in the workspace goes through this module. Handlers and
//! the service never compare roles directly.

use uuid::Uuid;

use crate::{goal::GoalLevel, user::Role};

/// The relationship between an actor and the owner of a goal.
#[derive(Debug, Clone, Copy)]
pub struct Subject {
  pub actor_id:         Uuid,
  pub actor_role:       Role,
  pub owner_id:         Uuid,
  /// The owner's manager. `None` when unknown; only ownership and executive
  /// checks apply in that case.
  pub owner_manager_id: Option<Uuid>,
}

impl Subject {
  fn is_owner(&self) -> bool { self.actor_id == self.owner_id }

  fn manages_owner(&self) -> bool {
    self.owner_manager_id == Some(self.actor_id) && self.actor_role.is_managing()
  }
}

pub fn can_create(role: Role, level: GoalLevel) -> bool {
  match level {
    GoalLevel::Company => role.is_executive(),
    GoalLevel::Team => role.is_managing(),
    GoalLevel::Personal => true,
  }
}

pub fn can_update(s: &Subject) -> bool {
  s.is_owner() || s.manages_owner() || s.actor_role.is_executive()
}

/// Narrower than [`can_update`]: a manager may not delete a report's goal.
pub fn can_delete(s: &Subject) -> bool { s.is_owner() || s.actor_role.is_executive() }

/// Broader than [`can_delete`]: any managing role may archive.
pub fn can_archive(s: &Subject) -> bool { s.is_owner() || s.actor_role.is_managing() }
