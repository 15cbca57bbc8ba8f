//! Per-channel background task: store polling and heartbeats.

use std::{collections::HashMap, sync::Arc};

use cascade_core::{
  event::{Envelope, EventKind},
  goal::GoalView,
  store::GoalStore,
  user::User,
};
use chrono::{DateTime, TimeDelta, Utc};
use serde_json::json;
use tokio::{
  sync::mpsc,
  time::{self, Instant, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::broadcaster::{Broadcaster, ChannelHandle};

// ─── Poll cursor ─────────────────────────────────────────────────────────────

/// Identity of one delivered record. Goals are keyed by version so each
/// revision is sent once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Sent {
  Notification(Uuid),
  Goal(Uuid, i64),
  Recognition(Uuid),
}

/// Where a channel's next poll starts. After each check the window reaches
/// back `overlap` so late-committed rows still surface; anything already
/// delivered inside that window is skipped.
struct Cursor {
  floor:   DateTime<Utc>,
  overlap: TimeDelta,
  sent:    HashMap<Sent, DateTime<Utc>>,
}

impl Cursor {
  fn new(since: DateTime<Utc>, overlap: TimeDelta) -> Self {
    Self { floor: since, overlap, sent: HashMap::new() }
  }

  /// `true` the first time `key` is offered.
  fn fresh(&mut self, key: Sent, stamped: DateTime<Utc>) -> bool {
    self.sent.insert(key, stamped).is_none()
  }

  fn advance(&mut self, checked_at: DateTime<Utc>) {
    self.floor = checked_at - self.overlap;
    let floor = self.floor;
    self.sent.retain(|_, stamped| *stamped > floor);
  }
}

// ─── Driver ──────────────────────────────────────────────────────────────────

pub(crate) struct Driver<S> {
  pub broadcaster: Broadcaster,
  pub handle:      ChannelHandle,
  pub user:        User,
  pub store:       Arc<S>,
  pub tx:          mpsc::Sender<Envelope>,
  pub cancel:      CancellationToken,
}

impl<S: GoalStore + 'static> Driver<S> {
  /// Run until the channel's token is cancelled or a write fails. Records
  /// created after `since` are picked up by the first poll.
  pub async fn run(self, since: DateTime<Utc>) {
    let config = self.broadcaster.config().clone();
    let start = Instant::now();
    let mut poll = time::interval_at(start + config.poll_interval(), config.poll_interval());
    let mut heartbeat =
      time::interval_at(start + config.heartbeat_interval(), config.heartbeat_interval());
    poll.set_missed_tick_behavior(MissedTickBehavior::Delay);
    heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let overlap = TimeDelta::from_std(config.poll_overlap()).unwrap_or(TimeDelta::zero());
    let mut cursor = Cursor::new(since, overlap);
    loop {
      let alive = tokio::select! {
        biased;
        _ = self.cancel.cancelled() => break,
        _ = poll.tick() => match self.poll_once(&mut cursor).await {
          Ok(batch) => self.send_all(batch).await,
          Err(e) => {
            tracing::warn!(user_id = %self.user.id, %e, "live channel poll failed");
            true
          }
        },
        _ = heartbeat.tick() => {
          self.send(Envelope::new(EventKind::Heartbeat, json!({ "timestamp": Utc::now() }))).await
        }
      };

      if !alive {
        self.broadcaster.unsubscribe(self.handle);
        break;
      }
    }

    tracing::debug!(
      user_id = %self.user.id,
      channel_id = self.handle.channel_id,
      "channel driver stopped"
    );
  }

  /// Collect everything addressed to this user since the cursor's floor
  /// that has not been delivered yet. The cursor only moves on success.
  async fn poll_once(&self, cursor: &mut Cursor) -> Result<Vec<Envelope>, S::Error> {
    let checked_at = Utc::now();
    let since = cursor.floor;
    let user = &self.user;

    let notifications = self.store.notifications_since(user.id, since).await?;
    let goals = self
      .store
      .goals_updated_since(user.organization_id, user.id, since)
      .await?;
    let recognitions = self.store.recognitions_since(user.id, since).await?;

    let today = checked_at.date_naive();
    let mut views = Vec::with_capacity(goals.len());
    for goal in goals {
      let children = self.store.child_goal_ids(goal.organization_id, goal.id).await?;
      views.push(GoalView::derive(goal, children, today));
    }

    // Every query succeeded; from here on the cursor moves.
    let notifications: Vec<_> = notifications
      .into_iter()
      .filter(|n| cursor.fresh(Sent::Notification(n.id), n.created_at))
      .collect();
    let views: Vec<_> = views
      .into_iter()
      .filter(|v| cursor.fresh(Sent::Goal(v.goal.id, v.goal.version), v.goal.updated_at))
      .collect();
    let recognitions: Vec<_> = recognitions
      .into_iter()
      .filter(|r| cursor.fresh(Sent::Recognition(r.id), r.created_at))
      .collect();
    cursor.advance(checked_at);

    let mut batch = Vec::new();
    if !notifications.is_empty() {
      batch.push(Envelope::of(EventKind::Notifications, &notifications));
    }
    if !views.is_empty() {
      batch.push(Envelope::of(EventKind::GoalUpdates, &views));
    }
    if !recognitions.is_empty() {
      batch.push(Envelope::of(EventKind::Recognitions, &recognitions));
    }
    Ok(batch)
  }

  async fn send_all(&self, batch: Vec<Envelope>) -> bool {
    for envelope in batch {
      if !self.send(envelope).await {
        return false;
      }
    }
    true
  }

  async fn send(&self, envelope: Envelope) -> bool {
    let timeout = self.broadcaster.config().send_timeout();
    match self.tx.send_timeout(envelope, timeout).await {
      Ok(()) => true,
      Err(e) => {
        tracing::debug!(
          user_id = %self.user.id,
          channel_id = self.handle.channel_id,
          %e,
          "channel write failed"
        );
        false
      }
    }
  }
}
