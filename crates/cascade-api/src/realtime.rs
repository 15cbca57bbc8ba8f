//! `GET /people/{userId}/realtime`: the live event stream.
//!
//! Each envelope becomes one SSE event whose name is the envelope type and
//! whose data is the envelope JSON. The stream ends when the client goes away
//! or the broadcaster shuts down; either way the channel's timers stop.

use axum::{
  extract::State,
  response::sse::{Event, Sse},
};
use cascade_core::{Error, store::GoalStore};
use futures::{Stream, StreamExt as _};
use uuid::Uuid;

use crate::{AppState, auth::Actor, error::ApiError, extract::PathParam};

pub async fn stream<S>(
  State(state): State<AppState<S>>,
  Actor(actor): Actor,
  PathParam(user_id): PathParam<Uuid>,
) -> Result<Sse<impl Stream<Item = Result<Event, axum::Error>>>, ApiError>
where
  S: GoalStore + 'static,
{
  // Only the user's own stream can be opened.
  if user_id != actor.id {
    return Err(Error::NotFound(format!("user {user_id}")).into());
  }

  let subscription = state
    .broadcaster
    .open_channel(&actor, state.service.store().clone());
  tracing::info!(user_id = %actor.id, channel_id = subscription.handle().channel_id, "live stream opened");

  let events = subscription.map(|envelope| {
    Event::default()
      .event(envelope.kind.as_ref())
      .json_data(&envelope)
  });
  Ok(Sse::new(events))
}
