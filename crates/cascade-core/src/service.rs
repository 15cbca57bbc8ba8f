//! [`GoalService`]: the goal hierarchy's write and read paths.
//!
//! Every mutation follows the same path: tenant-scoped load, permission
//! check, merge and validate, versioned write, then notification and live
//! event fan-out. Events are emitted only after the write has landed and never
//! cause the mutation to fail.

use std::{collections::HashSet, sync::Arc};

use chrono::Utc;
use serde_json::json;
use uuid::Uuid;

use crate::{
  error::{Error, Result},
  event::{Envelope, EventKind, EventSink},
  goal::{Goal, GoalPatch, GoalProgress, GoalStatus, GoalView, NewGoal, ProgressInput},
  notification::NewNotification,
  permission::{self, Subject},
  store::{GoalQuery, GoalStore},
  user::User,
};

/// Attempts at a versioned write before giving up with [`Error::Conflict`].
const MAX_WRITE_ATTEMPTS: usize = 3;

/// Upper bound on ancestor walks; deeper chains are rejected outright.
const MAX_DEPTH: usize = 64;

const MAX_CONFIDENCE: u8 = 10;
const DEFAULT_CONFIDENCE: u8 = 5;

pub struct GoalService<S, E> {
  store:  Arc<S>,
  events: Arc<E>,
}

impl<S, E> Clone for GoalService<S, E> {
  fn clone(&self) -> Self {
    Self { store: self.store.clone(), events: self.events.clone() }
  }
}

impl<S, E> GoalService<S, E>
where
  S: GoalStore,
  E: EventSink,
{
  pub fn new(store: Arc<S>, events: Arc<E>) -> Self { Self { store, events } }

  pub fn store(&self) -> &Arc<S> { &self.store }

  // ── Reads ─────────────────────────────────────────────────────────────

  /// Fetch one goal. Archived goals and goals of other organizations are
  /// both reported as not found.
  pub async fn get(&self, actor: &User, id: Uuid) -> Result<GoalView> {
    let goal = self.load_active(actor, id).await?;
    self.view(goal).await
  }

  pub async fn list_for_organization(
    &self,
    actor: &User,
    query: &GoalQuery,
  ) -> Result<Vec<GoalView>> {
    let goals = self
      .store
      .list_goals(actor.organization_id, query)
      .await
      .map_err(Error::store)?;

    let mut views = Vec::with_capacity(goals.len());
    for goal in goals {
      views.push(self.view(goal).await?);
    }
    Ok(views)
  }

  pub async fn list_for_owner(
    &self,
    actor: &User,
    owner_id: Uuid,
    query: &GoalQuery,
  ) -> Result<Vec<GoalView>> {
    let query = GoalQuery { owner_id: Some(owner_id), ..query.clone() };
    self.list_for_organization(actor, &query).await
  }

  /// Progress check-ins for a goal, oldest first.
  pub async fn progress_history(&self, actor: &User, id: Uuid) -> Result<Vec<GoalProgress>> {
    let goal = self.load_active(actor, id).await?;
    self.store.progress_history(goal.id).await.map_err(Error::store)
  }

  // ── Create ────────────────────────────────────────────────────────────

  pub async fn create(&self, actor: &User, input: NewGoal) -> Result<GoalView> {
    if !permission::can_create(actor.role, input.level) {
      return Err(Error::Forbidden("role may not create goals at this level"));
    }

    let owner_id = input.owner_id.unwrap_or(actor.id);
    if owner_id != actor.id {
      self.user_in_org(actor, owner_id).await?;
    }

    let now = Utc::now();
    let goal = Goal {
      id:              Uuid::new_v4(),
      organization_id: actor.organization_id,
      title:           input.title.trim().to_owned(),
      description:     input.description,
      goal_type:       input.goal_type,
      level:           input.level,
      target_value:    input.target_value,
      current_value:   input.current_value.unwrap_or(0.0),
      unit:            input.unit,
      confidence:      input.confidence.unwrap_or(DEFAULT_CONFIDENCE),
      start_date:      input.start_date,
      end_date:        input.end_date,
      status:          GoalStatus::Draft,
      owner_id,
      department_id:   input.department_id,
      team_id:         input.team_id,
      parent_goal_id:  input.parent_goal_id,
      is_archived:     false,
      version:         1,
      created_at:      now,
      updated_at:      now,
    };

    validate_fields(&goal)?;
    if let Some(parent_id) = goal.parent_goal_id {
      self.check_parent(&goal, parent_id).await?;
    }

    self.store.insert_goal(&goal).await.map_err(Error::store)?;
    tracing::info!(goal_id = %goal.id, actor_id = %actor.id, level = %goal.level, "goal created");

    let view = self.view(goal).await?;
    if view.goal.owner_id != actor.id {
      self
        .notify(
          view.goal.owner_id,
          "goal_assigned",
          "New goal assigned",
          format!("You now own \"{}\"", view.goal.title),
          &view,
          actor,
        )
        .await;
    }
    self.push_goal(&view, actor).await;
    Ok(view)
  }

  // ── Update ────────────────────────────────────────────────────────────

  pub async fn update(&self, actor: &User, id: Uuid, patch: GoalPatch) -> Result<GoalView> {
    if patch.status == Some(GoalStatus::Archived) {
      return Err(Error::validation("goals are archived through the archive operation"));
    }

    for attempt in 1..=MAX_WRITE_ATTEMPTS {
      let current = self.load_active(actor, id).await?;
      let subject = self.subject(actor, &current).await?;
      if !permission::can_update(&subject) {
        return Err(Error::Forbidden("not allowed to update this goal"));
      }

      let mut next = current.clone();
      let progress_changed = patch.apply(&mut next);
      if !current.status.can_transition_to(next.status) {
        return Err(Error::validation(format!(
          "cannot move a goal from {} to {}",
          current.status, next.status
        )));
      }
      next.title = next.title.trim().to_owned();
      validate_fields(&next)?;

      if next.parent_goal_id != current.parent_goal_id || next.level != current.level {
        if let Some(parent_id) = next.parent_goal_id {
          self.check_parent(&next, parent_id).await?;
        }
      }
      if next.level != current.level {
        self.check_children(&next).await?;
      }

      let now = Utc::now();
      next.version = current.version + 1;
      next.updated_at = now;

      // A moved current value goes through the audit trail like a check-in.
      let written = if next.current_value != current.current_value {
        let record = GoalProgress {
          id:             Uuid::new_v4(),
          goal_id:        id,
          previous_value: current.current_value,
          new_value:      next.current_value,
          confidence:     next.confidence,
          comment:        None,
          evidence_url:   None,
          user_id:        actor.id,
          created_at:     now,
        };
        self.store.record_progress(&next, &record, current.version).await
      } else {
        self.store.update_goal(&next, current.version).await
      };

      if written.map_err(Error::store)? {
        tracing::info!(goal_id = %id, actor_id = %actor.id, progress_changed, "goal updated");
        let view = self.view(next).await?;
        self.announce_progress(actor, &view).await;
        return Ok(view);
      }
      tracing::debug!(goal_id = %id, attempt, "version conflict on update");
    }

    Err(Error::Conflict(id))
  }

  // ── Progress ──────────────────────────────────────────────────────────

  /// Append an audit record and move the goal's `current_value` in one
  /// atomic write. The record's `previous_value` is the value the write
  /// replaced; concurrent check-ins on the same goal are serialised by the
  /// version check and retried against the fresh baseline.
  pub async fn record_progress(
    &self,
    actor: &User,
    id: Uuid,
    input: ProgressInput,
  ) -> Result<(GoalView, GoalProgress)> {
    if !input.new_value.is_finite() {
      return Err(Error::validation("newValue must be a finite number"));
    }
    if input.confidence > MAX_CONFIDENCE {
      return Err(Error::validation("confidence must be between 0 and 10"));
    }

    for attempt in 1..=MAX_WRITE_ATTEMPTS {
      let current = self.load_active(actor, id).await?;
      let subject = self.subject(actor, &current).await?;
      if !permission::can_update(&subject) {
        return Err(Error::Forbidden("not allowed to record progress on this goal"));
      }

      let now = Utc::now();
      let record = GoalProgress {
        id:             Uuid::new_v4(),
        goal_id:        id,
        previous_value: current.current_value,
        new_value:      input.new_value,
        confidence:     input.confidence,
        comment:        input.comment.clone(),
        evidence_url:   input.evidence_url.clone(),
        user_id:        actor.id,
        created_at:     now,
      };

      let mut next = current.clone();
      next.current_value = input.new_value;
      next.confidence = input.confidence;
      next.version = current.version + 1;
      next.updated_at = now;

      if self
        .store
        .record_progress(&next, &record, current.version)
        .await
        .map_err(Error::store)?
      {
        tracing::info!(
          goal_id = %id,
          actor_id = %actor.id,
          previous = record.previous_value,
          new = record.new_value,
          "progress recorded"
        );
        let view = self.view(next).await?;
        self.announce_progress(actor, &view).await;
        return Ok((view, record));
      }
      tracing::debug!(goal_id = %id, attempt, "version conflict on progress");
    }

    Err(Error::Conflict(id))
  }

  // ── Delete / archive ──────────────────────────────────────────────────

  /// Soft delete: the row is flagged archived, its status is left as is.
  pub async fn delete(&self, actor: &User, id: Uuid) -> Result<()> {
    self
      .retire(actor, id, permission::can_delete, |goal| goal.is_archived = true)
      .await
  }

  /// Move the goal to the terminal `archived` status and hide it.
  pub async fn archive(&self, actor: &User, id: Uuid) -> Result<()> {
    self
      .retire(actor, id, permission::can_archive, |goal| {
        goal.status = GoalStatus::Archived;
        goal.is_archived = true;
      })
      .await
  }

  async fn retire(
    &self,
    actor: &User,
    id: Uuid,
    allowed: fn(&Subject) -> bool,
    mark: impl Fn(&mut Goal),
  ) -> Result<()> {
    for attempt in 1..=MAX_WRITE_ATTEMPTS {
      let current = self.load_active(actor, id).await?;
      let subject = self.subject(actor, &current).await?;
      if !allowed(&subject) {
        return Err(Error::Forbidden("not allowed to remove this goal"));
      }

      let mut next = current.clone();
      mark(&mut next);
      next.version = current.version + 1;
      next.updated_at = Utc::now();

      if self
        .store
        .update_goal(&next, current.version)
        .await
        .map_err(Error::store)?
      {
        tracing::info!(goal_id = %id, actor_id = %actor.id, status = %next.status, "goal archived");
        let view = self.view(next).await?;
        self.push_goal(&view, actor).await;
        return Ok(());
      }
      tracing::debug!(goal_id = %id, attempt, "version conflict on archive");
    }

    Err(Error::Conflict(id))
  }

  // ── Helpers ───────────────────────────────────────────────────────────

  async fn load_active(&self, actor: &User, id: Uuid) -> Result<Goal> {
    self
      .store
      .get_goal(actor.organization_id, id)
      .await
      .map_err(Error::store)?
      .filter(|g| !g.is_archived)
      .ok_or_else(|| Error::NotFound(format!("goal {id}")))
  }

  async fn user_in_org(&self, actor: &User, user_id: Uuid) -> Result<User> {
    self
      .store
      .get_user(user_id)
      .await
      .map_err(Error::store)?
      .filter(|u| u.organization_id == actor.organization_id)
      .ok_or_else(|| Error::NotFound(format!("user {user_id}")))
  }

  async fn subject(&self, actor: &User, goal: &Goal) -> Result<Subject> {
    let owner_manager_id = if goal.owner_id == actor.id {
      actor.manager_id
    } else {
      self
        .store
        .get_user(goal.owner_id)
        .await
        .map_err(Error::store)?
        .filter(|u| u.organization_id == actor.organization_id)
        .and_then(|u| u.manager_id)
    };

    Ok(Subject {
      actor_id: actor.id,
      actor_role: actor.role,
      owner_id: goal.owner_id,
      owner_manager_id,
    })
  }

  /// Verify that `child` may hang under `parent_id` without breaking the
  /// forest: same organization, live parent, strictly more global level, and
  /// no path from the parent back up to the child.
  async fn check_parent(&self, child: &Goal, parent_id: Uuid) -> Result<()> {
    if parent_id == child.id {
      return Err(Error::validation("a goal cannot be its own parent"));
    }

    let org = child.organization_id;
    let parent = self
      .store
      .get_goal(org, parent_id)
      .await
      .map_err(Error::store)?
      .filter(|g| !g.is_archived)
      .ok_or_else(|| Error::validation(format!("parent goal {parent_id} not found")))?;

    if !child.level.may_roll_up_to(parent.level) {
      return Err(Error::validation(format!(
        "a {} goal cannot roll up to a {} goal",
        child.level, parent.level
      )));
    }

    let mut seen = HashSet::from([parent.id]);
    let mut cursor = parent.parent_goal_id;
    while let Some(ancestor_id) = cursor {
      if ancestor_id == child.id {
        return Err(Error::validation("parent reference would create a cycle"));
      }
      if !seen.insert(ancestor_id) || seen.len() > MAX_DEPTH {
        return Err(Error::validation("goal hierarchy is too deep or already cyclic"));
      }
      cursor = self
        .store
        .get_goal(org, ancestor_id)
        .await
        .map_err(Error::store)?
        .and_then(|g| g.parent_goal_id);
    }

    Ok(())
  }

  /// After a level change every existing child must still roll up.
  async fn check_children(&self, goal: &Goal) -> Result<()> {
    let children = self
      .store
      .child_goal_ids(goal.organization_id, goal.id)
      .await
      .map_err(Error::store)?;

    for child_id in children {
      let child = self
        .store
        .get_goal(goal.organization_id, child_id)
        .await
        .map_err(Error::store)?;
      if let Some(child) = child
        && !child.level.may_roll_up_to(goal.level)
      {
        return Err(Error::validation(format!(
          "child goal {child_id} ({}) cannot roll up to a {} goal",
          child.level, goal.level
        )));
      }
    }
    Ok(())
  }

  async fn view(&self, goal: Goal) -> Result<GoalView> {
    let children = self
      .store
      .child_goal_ids(goal.organization_id, goal.id)
      .await
      .map_err(Error::store)?;
    Ok(GoalView::derive(goal, children, Utc::now().date_naive()))
  }

  /// Owner always hears about a change; an actor acting on someone else's
  /// goal gets their own copy.
  async fn announce_progress(&self, actor: &User, view: &GoalView) {
    let title = "Goal progress updated";
    let message = format!("\"{}\" is now at {}%", view.goal.title, view.progress);

    self
      .notify(view.goal.owner_id, "goal_progress", title, message.clone(), view, actor)
      .await;
    if actor.id != view.goal.owner_id {
      self.notify(actor.id, "goal_progress", title, message, view, actor).await;
    }
    self.push_goal(view, actor).await;
  }

  async fn notify(
    &self,
    recipient: Uuid,
    kind: &str,
    title: &str,
    message: String,
    view: &GoalView,
    actor: &User,
  ) {
    let input = NewNotification {
      user_id: recipient,
      kind:    kind.to_owned(),
      title:   title.to_owned(),
      message,
      data:    json!({
        "goalId":   view.goal.id,
        "progress": view.progress,
        "actorId":  actor.id,
      }),
    };

    match self.store.insert_notification(input).await {
      Ok(notification) => {
        self
          .events
          .publish(recipient, Envelope::of(EventKind::Notifications, &[notification]))
          .await;
      }
      Err(e) => {
        tracing::warn!(%e, goal_id = %view.goal.id, %recipient, "failed to store notification");
      }
    }
  }

  async fn push_goal(&self, view: &GoalView, actor: &User) {
    let envelope = Envelope::of(EventKind::GoalUpdates, &[view]);
    self.events.publish(view.goal.owner_id, envelope.clone()).await;
    if actor.id != view.goal.owner_id {
      self.events.publish(actor.id, envelope).await;
    }
  }
}

fn validate_fields(goal: &Goal) -> Result<()> {
  if goal.title.is_empty() {
    return Err(Error::validation("title is required"));
  }
  if goal.confidence > MAX_CONFIDENCE {
    return Err(Error::validation("confidence must be between 0 and 10"));
  }
  if !goal.current_value.is_finite() || goal.target_value.is_some_and(|t| !t.is_finite()) {
    return Err(Error::validation("values must be finite numbers"));
  }
  if let (Some(start), Some(end)) = (goal.start_date, goal.end_date)
    && end <= start
  {
    return Err(Error::validation("endDate must be after startDate"));
  }
  Ok(())
}
