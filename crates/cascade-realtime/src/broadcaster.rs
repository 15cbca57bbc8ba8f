//! Process-wide registry of live per-user channels.
//!
//! Each open channel is an `mpsc` sender keyed by user and channel id. The
//! registry lock is only ever held to copy or edit the map, never across a
//! channel write, so a slow client cannot stall anyone else.

use std::{
  collections::HashMap,
  pin::Pin,
  sync::{
    Arc, Mutex, MutexGuard, PoisonError,
    atomic::{AtomicU64, Ordering},
  },
  task::{Context, Poll},
};

use cascade_core::{
  event::{Envelope, EventKind, EventSink},
  store::GoalStore,
  user::User,
};
use chrono::Utc;
use futures::{Stream, future::join_all};
use serde_json::json;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::{config::RealtimeConfig, driver::Driver};

/// Identifies one open channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChannelHandle {
  pub user_id:    Uuid,
  pub channel_id: u64,
}

struct Channel {
  tx:     mpsc::Sender<Envelope>,
  cancel: CancellationToken,
}

type Registry = HashMap<Uuid, HashMap<u64, Channel>>;

struct Inner {
  config:   RealtimeConfig,
  channels: Mutex<Registry>,
  next_id:  AtomicU64,
  shutdown: CancellationToken,
}

/// Fans envelopes out to every open channel of a user.
///
/// Cheap to clone; all clones share one registry. Construct one per process
/// and call [`Broadcaster::shutdown`] when the process stops.
#[derive(Clone)]
pub struct Broadcaster {
  inner: Arc<Inner>,
}

impl Broadcaster {
  pub fn new(config: RealtimeConfig) -> Self {
    Self {
      inner: Arc::new(Inner {
        config,
        channels: Mutex::new(HashMap::new()),
        next_id: AtomicU64::new(1),
        shutdown: CancellationToken::new(),
      }),
    }
  }

  pub fn config(&self) -> &RealtimeConfig { &self.inner.config }

  fn registry(&self) -> MutexGuard<'_, Registry> {
    self.inner.channels.lock().unwrap_or_else(PoisonError::into_inner)
  }

  /// Register a channel for `user_id`. The `connected` envelope is already
  /// queued when this returns.
  pub fn subscribe(&self, user_id: Uuid) -> Subscription { self.register(user_id).0 }

  /// Register a channel and spawn its driver, which polls `store` for
  /// records created after this call and emits heartbeats until the
  /// channel closes.
  pub fn open_channel<S>(&self, user: &User, store: Arc<S>) -> Subscription
  where
    S: GoalStore + 'static,
  {
    let since = Utc::now();
    let (subscription, tx) = self.register(user.id);
    let driver = Driver {
      broadcaster: self.clone(),
      handle: subscription.handle,
      user: user.clone(),
      store,
      tx,
      cancel: subscription.cancel.clone(),
    };
    tokio::spawn(driver.run(since));
    subscription
  }

  fn register(&self, user_id: Uuid) -> (Subscription, mpsc::Sender<Envelope>) {
    let (tx, rx) = mpsc::channel(self.inner.config.channel_capacity());
    let cancel = self.inner.shutdown.child_token();
    let handle = ChannelHandle {
      user_id,
      channel_id: self.inner.next_id.fetch_add(1, Ordering::Relaxed),
    };

    let connected = Envelope::new(
      EventKind::Connected,
      json!({
        "userId":    user_id,
        "channelId": handle.channel_id,
        "timestamp": Utc::now(),
      }),
    );
    // Fresh channel, capacity at least one.
    let _ = tx.try_send(connected);

    if !self.inner.shutdown.is_cancelled() {
      self
        .registry()
        .entry(user_id)
        .or_default()
        .insert(handle.channel_id, Channel { tx: tx.clone(), cancel: cancel.clone() });
      tracing::debug!(%user_id, channel_id = handle.channel_id, "channel opened");
    }

    let subscription = Subscription { handle, rx, cancel, broadcaster: self.clone() };
    (subscription, tx)
  }

  /// Write `envelope` to every channel of `user_id` concurrently. Channels
  /// that fail or time out are evicted on the spot. Returns the number of
  /// channels that accepted the envelope; zero channels is not an error and
  /// nothing is kept for later.
  pub async fn publish(&self, user_id: Uuid, envelope: Envelope) -> usize {
    let targets: Vec<(u64, mpsc::Sender<Envelope>)> = {
      let registry = self.registry();
      registry
        .get(&user_id)
        .map(|channels| channels.iter().map(|(id, c)| (*id, c.tx.clone())).collect())
        .unwrap_or_default()
    };

    if targets.is_empty() {
      tracing::trace!(%user_id, kind = %envelope.kind, "no open channels");
      return 0;
    }

    let timeout = self.inner.config.send_timeout();
    let writes = targets.into_iter().map(|(channel_id, tx)| {
      let envelope = envelope.clone();
      async move { (channel_id, tx.send_timeout(envelope, timeout).await) }
    });

    let mut delivered = 0;
    for (channel_id, result) in join_all(writes).await {
      match result {
        Ok(()) => delivered += 1,
        Err(e) => {
          tracing::debug!(%user_id, channel_id, %e, "evicting channel after failed write");
          self.unsubscribe(ChannelHandle { user_id, channel_id });
        }
      }
    }
    delivered
  }

  /// Remove a channel and stop its timers. Returns `false` if it was
  /// already gone.
  pub fn unsubscribe(&self, handle: ChannelHandle) -> bool {
    let removed = {
      let mut registry = self.registry();
      let Some(channels) = registry.get_mut(&handle.user_id) else {
        return false;
      };
      let removed = channels.remove(&handle.channel_id);
      if channels.is_empty() {
        registry.remove(&handle.user_id);
      }
      removed
    };

    match removed {
      Some(channel) => {
        channel.cancel.cancel();
        tracing::debug!(
          user_id = %handle.user_id,
          channel_id = handle.channel_id,
          "channel closed"
        );
        true
      }
      None => false,
    }
  }

  pub fn channel_count(&self, user_id: Uuid) -> usize {
    self.registry().get(&user_id).map_or(0, HashMap::len)
  }

  pub fn total_channels(&self) -> usize { self.registry().values().map(HashMap::len).sum() }

  /// Cancel every channel and empty the registry. Channels opened afterwards
  /// receive their `connected` envelope and then end.
  pub fn shutdown(&self) {
    self.inner.shutdown.cancel();
    let drained = std::mem::take(&mut *self.registry());
    let count: usize = drained.values().map(HashMap::len).sum();
    tracing::info!(channels = count, "broadcaster shut down");
  }
}

impl EventSink for Broadcaster {
  async fn publish(&self, user_id: Uuid, envelope: Envelope) {
    Broadcaster::publish(self, user_id, envelope).await;
  }
}

// ─── Subscription ────────────────────────────────────────────────────────────

/// Receiving end of one channel. Dropping it unsubscribes the channel and
/// cancels its driver.
pub struct Subscription {
  handle:      ChannelHandle,
  rx:          mpsc::Receiver<Envelope>,
  cancel:      CancellationToken,
  broadcaster: Broadcaster,
}

impl Subscription {
  pub fn handle(&self) -> ChannelHandle { self.handle }

  /// Next envelope, or `None` once the channel has been closed.
  pub async fn recv(&mut self) -> Option<Envelope> { self.rx.recv().await }
}

impl Stream for Subscription {
  type Item = Envelope;

  fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Envelope>> {
    self.get_mut().rx.poll_recv(cx)
  }
}

impl Drop for Subscription {
  fn drop(&mut self) {
    self.cancel.cancel();
    self.broadcaster.unsubscribe(self.handle);
  }
}
