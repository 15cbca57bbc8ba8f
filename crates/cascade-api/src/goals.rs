//! Handlers for `/goals` endpoints.
//!
//! | Method   | Path                    | Notes |
//! |----------|-------------------------|-------|
//! | `GET`    | `/goals`                | Optional `userId`, `type`, `status`, `level`, `teamId` |
//! | `POST`   | `/goals`                | Body: [`NewGoal`]; returns 201 |
//! | `GET`    | `/goals/{id}`           | 404 if missing, archived, or another tenant's |
//! | `PUT`    | `/goals/{id}`           | Body: [`GoalPatch`] |
//! | `DELETE` | `/goals/{id}`           | Soft delete |
//! | `POST`   | `/goals/{id}/archive`   | Move to `archived` |
//! | `POST`   | `/goals/{id}/progress`  | Body: [`ProgressInput`] |
//! | `GET`    | `/goals/{id}/progress`  | Check-in history, oldest first |

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use cascade_core::{
  goal::{GoalLevel, GoalPatch, GoalStatus, GoalType, NewGoal, ProgressInput},
  store::{GoalQuery, GoalStore},
};
use serde::Deserialize;
use serde_json::{Value, json};
use uuid::Uuid;

use crate::{
  AppState,
  auth::Actor,
  error::ApiError,
  extract::{JsonBody, PathParam, QueryParams},
};

// ─── List ────────────────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListParams {
  /// Restrict to goals owned by this user.
  pub user_id: Option<Uuid>,
  #[serde(rename = "type")]
  pub goal_type: Option<GoalType>,
  pub status: Option<GoalStatus>,
  pub level: Option<GoalLevel>,
  pub team_id: Option<Uuid>,
}

impl From<ListParams> for GoalQuery {
  fn from(p: ListParams) -> Self {
    GoalQuery {
      owner_id:  p.user_id,
      goal_type: p.goal_type,
      status:    p.status,
      level:     p.level,
      team_id:   p.team_id,
    }
  }
}

/// `GET /goals`
pub async fn list<S>(
  State(state): State<AppState<S>>,
  Actor(actor): Actor,
  QueryParams(params): QueryParams<ListParams>,
) -> Result<Json<Value>, ApiError>
where
  S: GoalStore + 'static,
{
  let goals = state
    .service
    .list_for_organization(&actor, &GoalQuery::from(params))
    .await?;
  Ok(Json(json!({ "success": true, "total": goals.len(), "goals": goals })))
}

// ─── Create ──────────────────────────────────────────────────────────────────

/// `POST /goals`, answering 201 with the created goal.
pub async fn create<S>(
  State(state): State<AppState<S>>,
  Actor(actor): Actor,
  JsonBody(body): JsonBody<NewGoal>,
) -> Result<impl IntoResponse, ApiError>
where
  S: GoalStore + 'static,
{
  let goal = state.service.create(&actor, body).await?;
  Ok((StatusCode::CREATED, Json(json!({ "success": true, "goal": goal }))))
}

// ─── Single goal ─────────────────────────────────────────────────────────────

/// `GET /goals/{id}`
pub async fn get_one<S>(
  State(state): State<AppState<S>>,
  Actor(actor): Actor,
  PathParam(id): PathParam<Uuid>,
) -> Result<Json<Value>, ApiError>
where
  S: GoalStore + 'static,
{
  let goal = state.service.get(&actor, id).await?;
  Ok(Json(json!({ "success": true, "goal": goal })))
}

/// `PUT /goals/{id}`
pub async fn update<S>(
  State(state): State<AppState<S>>,
  Actor(actor): Actor,
  PathParam(id): PathParam<Uuid>,
  JsonBody(patch): JsonBody<GoalPatch>,
) -> Result<Json<Value>, ApiError>
where
  S: GoalStore + 'static,
{
  let goal = state.service.update(&actor, id, patch).await?;
  Ok(Json(json!({ "success": true, "goal": goal })))
}

/// `DELETE /goals/{id}`
pub async fn delete<S>(
  State(state): State<AppState<S>>,
  Actor(actor): Actor,
  PathParam(id): PathParam<Uuid>,
) -> Result<Json<Value>, ApiError>
where
  S: GoalStore + 'static,
{
  state.service.delete(&actor, id).await?;
  Ok(Json(json!({ "success": true, "message": "Goal deleted" })))
}

/// `POST /goals/{id}/archive`
pub async fn archive<S>(
  State(state): State<AppState<S>>,
  Actor(actor): Actor,
  PathParam(id): PathParam<Uuid>,
) -> Result<Json<Value>, ApiError>
where
  S: GoalStore + 'static,
{
  state.service.archive(&actor, id).await?;
  Ok(Json(json!({ "success": true, "message": "Goal archived" })))
}

// ─── Progress ────────────────────────────────────────────────────────────────

/// `POST /goals/{id}/progress`
pub async fn record_progress<S>(
  State(state): State<AppState<S>>,
  Actor(actor): Actor,
  PathParam(id): PathParam<Uuid>,
  JsonBody(body): JsonBody<ProgressInput>,
) -> Result<Json<Value>, ApiError>
where
  S: GoalStore + 'static,
{
  let (goal, record) = state.service.record_progress(&actor, id, body).await?;
  Ok(Json(json!({ "success": true, "goal": goal, "progressRecord": record })))
}

/// `GET /goals/{id}/progress`
pub async fn history<S>(
  State(state): State<AppState<S>>,
  Actor(actor): Actor,
  PathParam(id): PathParam<Uuid>,
) -> Result<Json<Value>, ApiError>
where
  S: GoalStore + 'static,
{
  let history = state.service.progress_history(&actor, id).await?;
  Ok(Json(json!({ "success": true, "history": history })))
}
