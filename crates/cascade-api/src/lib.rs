//! JSON REST API and live event stream for Cascade.
//!
//! Exposes an axum [`Router`] backed by any [`cascade_core::store::GoalStore`].
//! Every route requires an `Authorization: Bearer <token>` header; TLS is the
//! caller's responsibility.

pub mod auth;
pub mod error;
pub mod extract;
pub mod goals;
pub mod realtime;

use std::sync::Arc;

use axum::{
  Router,
  body::Body,
  http::Request,
  routing::{get, post},
};
use cascade_core::{GoalService, store::GoalStore};
use cascade_realtime::Broadcaster;
use tower_http::trace::TraceLayer;

pub use error::ApiError;

// ─── Application state ───────────────────────────────────────────────────────

/// Shared state threaded through all handlers.
pub struct AppState<S> {
  pub service:     GoalService<S, Broadcaster>,
  pub broadcaster: Broadcaster,
}

impl<S> Clone for AppState<S> {
  fn clone(&self) -> Self {
    Self { service: self.service.clone(), broadcaster: self.broadcaster.clone() }
  }
}

impl<S: GoalStore> AppState<S> {
  /// Wire a service that publishes through `broadcaster`.
  pub fn new(store: Arc<S>, broadcaster: Broadcaster) -> Self {
    let service = GoalService::new(store, Arc::new(broadcaster.clone()));
    Self { service, broadcaster }
  }
}

// ─── Router ──────────────────────────────────────────────────────────────────

/// Build the API router for `state`, wrapped in request tracing.
pub fn router<S>(state: AppState<S>) -> Router
where
  S: GoalStore + 'static,
{
  Router::new()
    // Goals
    .route("/goals", get(goals::list::<S>).post(goals::create::<S>))
    .route(
      "/goals/{id}",
      get(goals::get_one::<S>)
        .put(goals::update::<S>)
        .delete(goals::delete::<S>),
    )
    .route("/goals/{id}/archive", post(goals::archive::<S>))
    .route(
      "/goals/{id}/progress",
      get(goals::history::<S>).post(goals::record_progress::<S>),
    )
    // Live stream
    .route("/people/{user_id}/realtime", get(realtime::stream::<S>))
    .layer(TraceLayer::new_for_http().make_span_with(|req: &Request<Body>| {
      tracing::info_span!(
        "request",
        method = %req.method(),
        uri = %req.uri(),
        actor_id = tracing::field::Empty,
      )
    }))
    .with_state(state)
}
