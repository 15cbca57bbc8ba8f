//! Integration tests for `SqliteStore` against an in-memory database.

use cascade_core::{
  goal::{Goal, GoalLevel, GoalProgress, GoalStatus, GoalType},
  notification::NewNotification,
  store::{GoalQuery, GoalStore},
  user::{Role, User},
};
use chrono::{Duration, NaiveDate, Utc};
use uuid::Uuid;

use crate::SqliteStore;

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

fn user(org: Uuid, role: Role) -> User {
  User { id: Uuid::new_v4(), organization_id: org, role, manager_id: None }
}

fn goal(org: Uuid, owner: Uuid, level: GoalLevel) -> Goal {
  let now = Utc::now();
  Goal {
    id:              Uuid::new_v4(),
    organization_id: org,
    title:           "Ship the thing".into(),
    description:     Some("All of it".into()),
    goal_type:       GoalType::Objective,
    level,
    target_value:    Some(100.0),
    current_value:   0.0,
    unit:            Some("%".into()),
    confidence:      5,
    start_date:      NaiveDate::from_ymd_opt(2026, 1, 1),
    end_date:        NaiveDate::from_ymd_opt(2026, 12, 31),
    status:          GoalStatus::Draft,
    owner_id:        owner,
    department_id:   None,
    team_id:         None,
    parent_goal_id:  None,
    is_archived:     false,
    version:         1,
    created_at:      now,
    updated_at:      now,
  }
}

// ─── Users & tokens ──────────────────────────────────────────────────────────

#[tokio::test]
async fn put_and_get_user() {
  let s = store().await;
  let org = Uuid::new_v4();
  let boss = user(org, Role::Ceo);
  let mut report = user(org, Role::Manager);
  report.manager_id = Some(boss.id);

  s.put_user(&boss).await.unwrap();
  s.put_user(&report).await.unwrap();

  let fetched = s.get_user(report.id).await.unwrap().unwrap();
  assert_eq!(fetched, report);
  assert!(s.get_user(Uuid::new_v4()).await.unwrap().is_none());
}

#[tokio::test]
async fn put_user_replaces_role() {
  let s = store().await;
  let mut u = user(Uuid::new_v4(), Role::Employee);
  s.put_user(&u).await.unwrap();
  u.role = Role::TeamLead;
  s.put_user(&u).await.unwrap();

  assert_eq!(s.get_user(u.id).await.unwrap().unwrap().role, Role::TeamLead);
}

#[tokio::test]
async fn issued_token_resolves_to_user() {
  let s = store().await;
  let u = user(Uuid::new_v4(), Role::Employee);
  s.put_user(&u).await.unwrap();

  let token = s.issue_token(u.id).await.unwrap();
  assert_eq!(s.user_for_token(&token).await.unwrap(), Some(u));
  assert!(s.user_for_token("not-a-token").await.unwrap().is_none());
}

#[tokio::test]
async fn issue_token_for_unknown_user_errors() {
  let s = store().await;
  let err = s.issue_token(Uuid::new_v4()).await.unwrap_err();
  assert!(matches!(err, crate::Error::UserNotFound(_)));
}

// ─── Goals ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn insert_and_get_goal() {
  let s = store().await;
  let org = Uuid::new_v4();
  let g = goal(org, Uuid::new_v4(), GoalLevel::Team);
  s.insert_goal(&g).await.unwrap();

  let fetched = s.get_goal(org, g.id).await.unwrap().unwrap();
  assert_eq!(fetched.id, g.id);
  assert_eq!(fetched.level, GoalLevel::Team);
  assert_eq!(fetched.start_date, g.start_date);
  assert_eq!(fetched.target_value, Some(100.0));
  assert_eq!(fetched.created_at, g.created_at);
}

#[tokio::test]
async fn get_goal_from_other_organization_is_none() {
  let s = store().await;
  let g = goal(Uuid::new_v4(), Uuid::new_v4(), GoalLevel::Personal);
  s.insert_goal(&g).await.unwrap();

  assert!(s.get_goal(Uuid::new_v4(), g.id).await.unwrap().is_none());
}

#[tokio::test]
async fn update_goal_checks_version() {
  let s = store().await;
  let org = Uuid::new_v4();
  let g = goal(org, Uuid::new_v4(), GoalLevel::Personal);
  s.insert_goal(&g).await.unwrap();

  let mut next = g.clone();
  next.title = "Renamed".into();
  next.version = 2;
  assert!(s.update_goal(&next, 1).await.unwrap());

  // A second writer still holding version 1 loses.
  let mut stale = g.clone();
  stale.title = "Stale".into();
  stale.version = 2;
  assert!(!s.update_goal(&stale, 1).await.unwrap());

  let stored = s.get_goal(org, g.id).await.unwrap().unwrap();
  assert_eq!(stored.title, "Renamed");
  assert_eq!(stored.version, 2);
}

#[tokio::test]
async fn list_goals_filters_and_orders_newest_first() {
  let s = store().await;
  let org = Uuid::new_v4();
  let owner = Uuid::new_v4();
  let team = Uuid::new_v4();

  let mut older = goal(org, owner, GoalLevel::Team);
  older.created_at -= Duration::minutes(5);
  older.team_id = Some(team);
  let newer = goal(org, owner, GoalLevel::Personal);
  let mut archived = goal(org, owner, GoalLevel::Personal);
  archived.is_archived = true;
  let foreign = goal(Uuid::new_v4(), owner, GoalLevel::Personal);

  for g in [&older, &newer, &archived, &foreign] {
    s.insert_goal(g).await.unwrap();
  }

  let all = s.list_goals(org, &GoalQuery::default()).await.unwrap();
  let ids: Vec<_> = all.iter().map(|g| g.id).collect();
  assert_eq!(ids, vec![newer.id, older.id]);

  let by_level = GoalQuery { level: Some(GoalLevel::Team), ..Default::default() };
  let teams = s.list_goals(org, &by_level).await.unwrap();
  assert_eq!(teams.len(), 1);
  assert_eq!(teams[0].id, older.id);

  let by_team = GoalQuery { team_id: Some(team), owner_id: Some(owner), ..Default::default() };
  assert_eq!(s.list_goals(org, &by_team).await.unwrap().len(), 1);

  let by_status = GoalQuery { status: Some(GoalStatus::Active), ..Default::default() };
  assert!(s.list_goals(org, &by_status).await.unwrap().is_empty());
}

#[tokio::test]
async fn child_goal_ids_skip_archived() {
  let s = store().await;
  let org = Uuid::new_v4();
  let owner = Uuid::new_v4();
  let parent = goal(org, owner, GoalLevel::Company);
  let mut live = goal(org, owner, GoalLevel::Team);
  live.parent_goal_id = Some(parent.id);
  let mut gone = goal(org, owner, GoalLevel::Team);
  gone.parent_goal_id = Some(parent.id);
  gone.is_archived = true;

  for g in [&parent, &live, &gone] {
    s.insert_goal(g).await.unwrap();
  }

  assert_eq!(s.child_goal_ids(org, parent.id).await.unwrap(), vec![live.id]);
}

// ─── Progress ────────────────────────────────────────────────────────────────

fn progress(goal: &Goal, previous: f64, new: f64, by: Uuid) -> GoalProgress {
  GoalProgress {
    id:             Uuid::new_v4(),
    goal_id:        goal.id,
    previous_value: previous,
    new_value:      new,
    confidence:     8,
    comment:        Some("weekly check-in".into()),
    evidence_url:   None,
    user_id:        by,
    created_at:     Utc::now(),
  }
}

#[tokio::test]
async fn record_progress_writes_both_rows() {
  let s = store().await;
  let org = Uuid::new_v4();
  let owner = Uuid::new_v4();
  let g = goal(org, owner, GoalLevel::Personal);
  s.insert_goal(&g).await.unwrap();

  let mut next = g.clone();
  next.current_value = 40.0;
  next.version = 2;
  let rec = progress(&g, 0.0, 40.0, owner);

  assert!(s.record_progress(&next, &rec, 1).await.unwrap());

  let stored = s.get_goal(org, g.id).await.unwrap().unwrap();
  assert_eq!(stored.current_value, 40.0);
  let history = s.progress_history(g.id).await.unwrap();
  assert_eq!(history, vec![rec]);
}

#[tokio::test]
async fn record_progress_with_stale_version_writes_nothing() {
  let s = store().await;
  let org = Uuid::new_v4();
  let owner = Uuid::new_v4();
  let g = goal(org, owner, GoalLevel::Personal);
  s.insert_goal(&g).await.unwrap();

  let mut next = g.clone();
  next.current_value = 40.0;
  next.version = 8;
  let rec = progress(&g, 0.0, 40.0, owner);

  assert!(!s.record_progress(&next, &rec, 7).await.unwrap());
  assert_eq!(s.get_goal(org, g.id).await.unwrap().unwrap().current_value, 0.0);
  assert!(s.progress_history(g.id).await.unwrap().is_empty());
}

// ─── Polling queries ─────────────────────────────────────────────────────────

#[tokio::test]
async fn notifications_since_is_strict() {
  let s = store().await;
  let recipient = Uuid::new_v4();

  let first = s
    .insert_notification(NewNotification {
      user_id: recipient,
      kind:    "goal_progress".into(),
      title:   "One".into(),
      message: "first".into(),
      data:    serde_json::json!({ "n": 1 }),
    })
    .await
    .unwrap();
  let second = s
    .insert_notification(NewNotification {
      user_id: recipient,
      kind:    "goal_progress".into(),
      title:   "Two".into(),
      message: "second".into(),
      data:    serde_json::Value::Null,
    })
    .await
    .unwrap();

  let all = s
    .notifications_since(recipient, first.created_at - Duration::seconds(1))
    .await
    .unwrap();
  assert_eq!(all, vec![first.clone(), second.clone()]);

  let after_first = s.notifications_since(recipient, first.created_at).await.unwrap();
  assert!(after_first.iter().all(|n| n.id != first.id));

  assert!(s.notifications_since(Uuid::new_v4(), first.created_at - Duration::seconds(1))
    .await
    .unwrap()
    .is_empty());
}

#[tokio::test]
async fn goals_updated_since_includes_archived() {
  let s = store().await;
  let org = Uuid::new_v4();
  let owner = Uuid::new_v4();
  let before = Utc::now() - Duration::seconds(1);

  let mut g = goal(org, owner, GoalLevel::Personal);
  g.is_archived = true;
  s.insert_goal(&g).await.unwrap();
  s.insert_goal(&goal(org, Uuid::new_v4(), GoalLevel::Personal)).await.unwrap();

  let updated = s.goals_updated_since(org, owner, before).await.unwrap();
  assert_eq!(updated.len(), 1);
  assert_eq!(updated[0].id, g.id);
  assert!(s.goals_updated_since(org, owner, Utc::now()).await.unwrap().is_empty());
}

#[tokio::test]
async fn recognitions_since_returns_only_recipient() {
  let s = store().await;
  let org = Uuid::new_v4();
  let (from, to) = (Uuid::new_v4(), Uuid::new_v4());
  let before = Utc::now() - Duration::seconds(1);

  let r = s
    .insert_recognition(org, from, to, "Great launch".into())
    .await
    .unwrap();

  assert_eq!(s.recognitions_since(to, before).await.unwrap(), vec![r]);
  assert!(s.recognitions_since(from, before).await.unwrap().is_empty());
}
