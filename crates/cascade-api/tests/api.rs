//! Router tests over an in-memory SQLite store.

use std::{sync::Arc, time::Duration};

use axum::{
  Router,
  body::{Body, BodyDataStream},
  http::{Request, StatusCode, header},
};
use cascade_api::{AppState, router};
use cascade_core::user::{Role, User};
use cascade_realtime::{Broadcaster, RealtimeConfig};
use cascade_store_sqlite::SqliteStore;
use futures::StreamExt as _;
use serde_json::{Value, json};
use tower::ServiceExt as _;
use uuid::Uuid;

struct Fixture {
  app:      Router,
  ceo:      (User, String),
  manager:  (User, String),
  employee: (User, String),
  outsider: (User, String),
}

async fn member(store: &SqliteStore, user: User) -> (User, String) {
  store.put_user(&user).await.unwrap();
  let token = store.issue_token(user.id).await.unwrap();
  (user, token)
}

async fn fixture() -> Fixture {
  let store = Arc::new(SqliteStore::open_in_memory().await.unwrap());
  let org = Uuid::new_v4();

  let ceo = member(&store, User {
    id:              Uuid::new_v4(),
    organization_id: org,
    role:            Role::Ceo,
    manager_id:      None,
  })
  .await;
  let manager = member(&store, User {
    id:              Uuid::new_v4(),
    organization_id: org,
    role:            Role::Manager,
    manager_id:      Some(ceo.0.id),
  })
  .await;
  let employee = member(&store, User {
    id:              Uuid::new_v4(),
    organization_id: org,
    role:            Role::Employee,
    manager_id:      Some(manager.0.id),
  })
  .await;
  let outsider = member(&store, User {
    id:              Uuid::new_v4(),
    organization_id: Uuid::new_v4(),
    role:            Role::Ceo,
    manager_id:      None,
  })
  .await;

  let state = AppState::new(store, Broadcaster::new(RealtimeConfig::default()));
  Fixture { app: router(state), ceo, manager, employee, outsider }
}

fn request(method: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> Request<Body> {
  let mut builder = Request::builder().method(method).uri(uri);
  if let Some(token) = token {
    builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
  }
  match body {
    Some(json) => builder
      .header(header::CONTENT_TYPE, "application/json")
      .body(Body::from(json.to_string()))
      .unwrap(),
    None => builder.body(Body::empty()).unwrap(),
  }
}

async fn call(
  app: &Router,
  method: &str,
  uri: &str,
  token: &str,
  body: Option<Value>,
) -> (StatusCode, Value) {
  let resp = app.clone().oneshot(request(method, uri, Some(token), body)).await.unwrap();
  let status = resp.status();
  let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
  let json = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap() };
  (status, json)
}

async fn create_goal(app: &Router, token: &str, body: Value) -> Value {
  let (status, json) = call(app, "POST", "/goals", token, Some(body)).await;
  assert_eq!(status, StatusCode::CREATED, "{json}");
  json["goal"].clone()
}

// ─── Auth ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn missing_or_unknown_token_is_401() {
  let f = fixture().await;

  let resp = f.app.clone().oneshot(request("GET", "/goals", None, None)).await.unwrap();
  assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
  assert!(resp.headers().contains_key(header::WWW_AUTHENTICATE));

  let (status, body) = call(&f.app, "GET", "/goals", "forged", None).await;
  assert_eq!(status, StatusCode::UNAUTHORIZED);
  assert_eq!(body["success"], json!(false));
}

// ─── Goals ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn create_returns_201_with_derived_fields() {
  let f = fixture().await;
  let goal = create_goal(
    &f.app,
    &f.ceo.1,
    json!({ "title": "Grow ARR", "level": "company", "targetValue": 10000000, "currentValue": 0 }),
  )
  .await;

  assert_eq!(goal["progress"], json!(0));
  assert_eq!(goal["status"], json!("draft"));
  assert_eq!(goal["confidenceLevel"], json!("yellow"));
  assert_eq!(goal["type"], json!("objective"));
  assert_eq!(goal["ownerId"], json!(f.ceo.0.id));
  assert_eq!(goal["childGoalIds"], json!([]));
}

#[tokio::test]
async fn create_outside_role_is_403_and_bad_input_is_400() {
  let f = fixture().await;

  let (status, _) = call(
    &f.app,
    "POST",
    "/goals",
    &f.employee.1,
    Some(json!({ "title": "Take over", "level": "company" })),
  )
  .await;
  assert_eq!(status, StatusCode::FORBIDDEN);

  let (status, body) = call(
    &f.app,
    "POST",
    "/goals",
    &f.employee.1,
    Some(json!({
      "title": "Backwards",
      "level": "personal",
      "startDate": "2026-06-30",
      "endDate": "2026-06-01",
    })),
  )
  .await;
  assert_eq!(status, StatusCode::BAD_REQUEST);
  assert!(body["error"].as_str().unwrap().contains("endDate"));
}

#[tokio::test]
async fn undecodable_input_is_a_400_error_body() {
  let f = fixture().await;
  let token = &f.employee.1;

  let bodies = [
    json!({ "level": "personal" }),
    json!({ "title": "Loud", "level": "personal", "confidence": 300 }),
    json!({ "title": "Far", "level": "galaxy" }),
  ];
  for body in bodies {
    let (status, json) = call(&f.app, "POST", "/goals", token, Some(body.clone())).await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
    assert_eq!(json["success"], json!(false));
    assert!(json["error"].is_string(), "{json}");
  }

  let resp = f
    .app
    .clone()
    .oneshot(
      Request::builder()
        .method("POST")
        .uri("/goals")
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap(),
    )
    .await
    .unwrap();
  assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

  let (status, json) = call(&f.app, "GET", "/goals?level=galaxy", token, None).await;
  assert_eq!(status, StatusCode::BAD_REQUEST);
  assert_eq!(json["success"], json!(false));

  let (status, json) = call(&f.app, "GET", "/goals/not-a-uuid", token, None).await;
  assert_eq!(status, StatusCode::BAD_REQUEST);
  assert_eq!(json["success"], json!(false));
}

#[tokio::test]
async fn list_applies_filters_and_reports_total() {
  let f = fixture().await;
  create_goal(&f.app, &f.ceo.1, json!({ "title": "Company", "level": "company" })).await;
  create_goal(&f.app, &f.manager.1, json!({ "title": "Team", "level": "team" })).await;
  create_goal(
    &f.app,
    &f.employee.1,
    json!({ "title": "Mine", "level": "personal", "type": "key_result" }),
  )
  .await;

  let (status, all) = call(&f.app, "GET", "/goals", &f.employee.1, None).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(all["success"], json!(true));
  assert_eq!(all["total"], json!(3));

  let (_, teams) = call(&f.app, "GET", "/goals?level=team", &f.employee.1, None).await;
  assert_eq!(teams["total"], json!(1));
  assert_eq!(teams["goals"][0]["title"], json!("Team"));

  let uri = format!("/goals?userId={}&type=key_result", f.employee.0.id);
  let (_, mine) = call(&f.app, "GET", &uri, &f.ceo.1, None).await;
  assert_eq!(mine["total"], json!(1));

  let (_, none) = call(&f.app, "GET", "/goals", &f.outsider.1, None).await;
  assert_eq!(none["total"], json!(0));
}

#[tokio::test]
async fn other_tenant_gets_404_not_403() {
  let f = fixture().await;
  let goal = create_goal(&f.app, &f.ceo.1, json!({ "title": "Plan", "level": "company" })).await;
  let uri = format!("/goals/{}", goal["id"].as_str().unwrap());

  let (status, body) = call(&f.app, "GET", &uri, &f.outsider.1, None).await;
  assert_eq!(status, StatusCode::NOT_FOUND);
  assert!(body.get("goal").is_none());

  let (status, _) = call(&f.app, "PUT", &uri, &f.outsider.1, Some(json!({ "title": "Mine" }))).await;
  assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn update_respects_permissions_and_lifecycle() {
  let f = fixture().await;
  let goal = create_goal(&f.app, &f.employee.1, json!({ "title": "Learn", "level": "personal" })).await;
  let uri = format!("/goals/{}", goal["id"].as_str().unwrap());

  let (status, body) = call(
    &f.app,
    "PUT",
    &uri,
    &f.manager.1,
    Some(json!({ "status": "active", "description": "Rust first" })),
  )
  .await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["goal"]["status"], json!("active"));
  assert_eq!(body["goal"]["version"], json!(2));

  let (status, _) =
    call(&f.app, "PUT", &uri, &f.employee.1, Some(json!({ "status": "draft" }))).await;
  assert_eq!(status, StatusCode::BAD_REQUEST);

  let (status, body) =
    call(&f.app, "PUT", &uri, &f.employee.1, Some(json!({ "description": null }))).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["goal"]["description"], Value::Null);
}

#[tokio::test]
async fn manager_cannot_delete_but_can_archive() {
  let f = fixture().await;
  let goal = create_goal(&f.app, &f.employee.1, json!({ "title": "Report's", "level": "personal" })).await;
  let id = goal["id"].as_str().unwrap();

  let (status, _) = call(&f.app, "DELETE", &format!("/goals/{id}"), &f.manager.1, None).await;
  assert_eq!(status, StatusCode::FORBIDDEN);

  let (status, body) =
    call(&f.app, "POST", &format!("/goals/{id}/archive"), &f.manager.1, None).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["success"], json!(true));

  let (status, _) = call(&f.app, "GET", &format!("/goals/{id}"), &f.employee.1, None).await;
  assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn owner_delete_hides_the_goal() {
  let f = fixture().await;
  let goal = create_goal(&f.app, &f.employee.1, json!({ "title": "Temp", "level": "personal" })).await;
  let uri = format!("/goals/{}", goal["id"].as_str().unwrap());

  let (status, body) = call(&f.app, "DELETE", &uri, &f.employee.1, None).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["message"], json!("Goal deleted"));

  let (status, _) = call(&f.app, "GET", &uri, &f.employee.1, None).await;
  assert_eq!(status, StatusCode::NOT_FOUND);
}

// ─── Progress ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn progress_check_in_and_history() {
  let f = fixture().await;
  let company = create_goal(
    &f.app,
    &f.ceo.1,
    json!({ "title": "Grow ARR", "level": "company", "targetValue": 10000000 }),
  )
  .await;
  let team = create_goal(
    &f.app,
    &f.manager.1,
    json!({
      "title": "Team ARR",
      "level": "team",
      "targetValue": 10000000,
      "parentGoalId": company["id"],
    }),
  )
  .await;
  let id = team["id"].as_str().unwrap();

  let (status, body) = call(
    &f.app,
    "POST",
    &format!("/goals/{id}/progress"),
    &f.manager.1,
    Some(json!({ "newValue": 6500000, "confidence": 8, "comment": "Q3 close" })),
  )
  .await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["goal"]["progress"], json!(65));
  assert_eq!(body["goal"]["confidenceLevel"], json!("green"));
  assert_eq!(body["progressRecord"]["previousValue"], json!(0.0));
  assert_eq!(body["progressRecord"]["newValue"], json!(6500000.0));

  let (status, body) =
    call(&f.app, "GET", &format!("/goals/{id}/progress"), &f.employee.1, None).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["history"].as_array().unwrap().len(), 1);
  assert_eq!(body["history"][0]["comment"], json!("Q3 close"));

  let (_, parent) =
    call(&f.app, "GET", &format!("/goals/{}", company["id"].as_str().unwrap()), &f.ceo.1, None)
      .await;
  assert_eq!(parent["goal"]["childGoalIds"], json!([id]));
}

#[tokio::test]
async fn progress_on_unknown_goal_is_404() {
  let f = fixture().await;
  let (status, _) = call(
    &f.app,
    "POST",
    &format!("/goals/{}/progress", Uuid::new_v4()),
    &f.ceo.1,
    Some(json!({ "newValue": 1, "confidence": 5 })),
  )
  .await;
  assert_eq!(status, StatusCode::NOT_FOUND);
}

// ─── Live stream ─────────────────────────────────────────────────────────────

async fn next_frame(frames: &mut BodyDataStream) -> String {
  let chunk = tokio::time::timeout(Duration::from_secs(5), frames.next())
    .await
    .expect("stream stalled")
    .expect("stream ended")
    .unwrap();
  String::from_utf8(chunk.to_vec()).unwrap()
}

#[tokio::test]
async fn realtime_stream_is_private() {
  let f = fixture().await;
  let (status, _) = call(
    &f.app,
    "GET",
    &format!("/people/{}/realtime", f.employee.0.id),
    &f.manager.1,
    None,
  )
  .await;
  assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn realtime_stream_relays_goal_changes() {
  let f = fixture().await;
  let goal = create_goal(
    &f.app,
    &f.employee.1,
    json!({ "title": "Ship", "level": "personal", "targetValue": 4 }),
  )
  .await;

  let resp = f
    .app
    .clone()
    .oneshot(request(
      "GET",
      &format!("/people/{}/realtime", f.employee.0.id),
      Some(&f.employee.1),
      None,
    ))
    .await
    .unwrap();
  assert_eq!(resp.status(), StatusCode::OK);
  let content_type = resp.headers()[header::CONTENT_TYPE].to_str().unwrap().to_owned();
  assert!(content_type.starts_with("text/event-stream"), "{content_type}");

  let mut frames = resp.into_body().into_data_stream();
  let mut seen = String::new();
  seen.push_str(&next_frame(&mut frames).await);
  assert!(seen.contains("event: connected"), "{seen}");

  let (status, _) = call(
    &f.app,
    "POST",
    &format!("/goals/{}/progress", goal["id"].as_str().unwrap()),
    &f.manager.1,
    Some(json!({ "newValue": 1, "confidence": 6 })),
  )
  .await;
  assert_eq!(status, StatusCode::OK);

  while !seen.contains("event: goal_updates") {
    seen.push_str(&next_frame(&mut frames).await);
  }
  assert!(seen.contains("event: notifications"), "{seen}");
  assert!(seen.contains("\"progress\":25"), "{seen}");
}
