use std::time::Duration;

use serde::Deserialize;

/// Timer and buffer settings for live channels.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RealtimeConfig {
  /// Seconds between store polls on each open channel.
  pub poll_interval_secs:      u64,
  /// Seconds between `heartbeat` envelopes; longer than the poll interval.
  pub heartbeat_interval_secs: u64,
  /// How long a single channel write may block before the channel is evicted.
  pub send_timeout_ms:         u64,
  /// Envelopes buffered per channel.
  pub channel_capacity:        usize,
  /// How far each poll reaches back before the previous check, to catch
  /// rows stamped before it but committed after it.
  pub poll_overlap_ms:         u64,
}

impl Default for RealtimeConfig {
  fn default() -> Self {
    Self {
      poll_interval_secs:      5,
      heartbeat_interval_secs: 30,
      send_timeout_ms:         250,
      channel_capacity:        64,
      poll_overlap_ms:         2_000,
    }
  }
}

impl RealtimeConfig {
  pub fn poll_interval(&self) -> Duration { Duration::from_secs(self.poll_interval_secs.max(1)) }

  pub fn heartbeat_interval(&self) -> Duration {
    Duration::from_secs(self.heartbeat_interval_secs.max(1))
  }

  pub fn send_timeout(&self) -> Duration { Duration::from_millis(self.send_timeout_ms) }

  pub fn channel_capacity(&self) -> usize { self.channel_capacity.max(1) }

  pub fn poll_overlap(&self) -> Duration { Duration::from_millis(self.poll_overlap_ms) }
}
