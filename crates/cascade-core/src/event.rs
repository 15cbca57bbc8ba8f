//! The publish contract between state-changing code and the live channel.
//!
//! The service only knows that *something* accepts envelopes addressed to a
//! user. Delivery is best-effort: an [`EventSink`] never reports failure.

use std::future::Future;

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display};
use uuid::Uuid;

/// Event names on the wire; also the SSE `event:` field.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum EventKind {
  Connected,
  Notifications,
  GoalUpdates,
  Recognitions,
  Heartbeat,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
  #[serde(rename = "type")]
  pub kind: EventKind,
  pub data: serde_json::Value,
}

impl Envelope {
  pub fn new(kind: EventKind, data: serde_json::Value) -> Self { Self { kind, data } }

  /// Serialise `data` into an envelope. A value that cannot be represented
  /// as JSON degrades to `null` rather than failing the caller.
  pub fn of<T: Serialize>(kind: EventKind, data: &T) -> Self {
    let data = serde_json::to_value(data).unwrap_or_else(|e| {
      tracing::warn!(%e, ?kind, "event payload is not serialisable");
      serde_json::Value::Null
    });
    Self { kind, data }
  }
}

/// Anything that can relay an [`Envelope`] to a user's live connections.
pub trait EventSink: Send + Sync {
  fn publish(
    &self,
    user_id: Uuid,
    envelope: Envelope,
  ) -> impl Future<Output = ()> + Send + '_;
}
