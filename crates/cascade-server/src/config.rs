//! Server configuration: an optional TOML file overlaid by `CASCADE_*`
//! environment variables.

use std::path::{Path, PathBuf};

use anyhow::Context as _;
use cascade_realtime::RealtimeConfig;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
  pub host:          String,
  pub port:          u16,
  pub database_path: PathBuf,
  pub realtime:      RealtimeConfig,
}

impl Default for ServerConfig {
  fn default() -> Self {
    Self {
      host:          "127.0.0.1".to_owned(),
      port:          8080,
      database_path: PathBuf::from("cascade.db"),
      realtime:      RealtimeConfig::default(),
    }
  }
}

impl ServerConfig {
  /// Read `path` if it exists, then apply the environment. Nested keys use a
  /// double underscore, e.g. `CASCADE_REALTIME__POLL_INTERVAL_SECS`.
  pub fn load(path: &Path) -> anyhow::Result<Self> {
    let settings = config::Config::builder()
      .add_source(config::File::from(path).required(false))
      .add_source(
        config::Environment::with_prefix("CASCADE")
          .prefix_separator("_")
          .separator("__")
          .try_parsing(true),
      )
      .build()
      .context("failed to read config file")?;

    let mut cfg: ServerConfig = settings
      .try_deserialize()
      .context("failed to deserialise ServerConfig")?;
    cfg.database_path = expand_tilde(&cfg.database_path);
    Ok(cfg)
  }

  pub fn address(&self) -> String { format!("{}:{}", self.host, self.port) }
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}

#[cfg(test)]
mod tests {
  use config::{Config, File, FileFormat};

  use super::*;

  fn parse(toml: &str) -> ServerConfig {
    Config::builder()
      .add_source(File::from_str(toml, FileFormat::Toml))
      .build()
      .unwrap()
      .try_deserialize()
      .unwrap()
  }

  #[test]
  fn empty_file_yields_defaults() {
    let cfg = parse("");
    assert_eq!(cfg.address(), "127.0.0.1:8080");
    assert_eq!(cfg.realtime.poll_interval_secs, 5);
    assert_eq!(cfg.realtime.heartbeat_interval_secs, 30);
  }

  #[test]
  fn partial_realtime_table_keeps_other_defaults() {
    let cfg = parse(
      r#"
      port = 9000
      database_path = "/tmp/goals.db"

      [realtime]
      poll_interval_secs = 2
      "#,
    );
    assert_eq!(cfg.port, 9000);
    assert_eq!(cfg.database_path, PathBuf::from("/tmp/goals.db"));
    assert_eq!(cfg.realtime.poll_interval_secs, 2);
    assert_eq!(cfg.realtime.channel_capacity, 64);
  }

  #[test]
  fn tilde_expands_to_home() {
    let Ok(home) = std::env::var("HOME") else { return };
    assert_eq!(expand_tilde(Path::new("~/x.db")), PathBuf::from(home).join("x.db"));
    assert_eq!(expand_tilde(Path::new("/abs.db")), PathBuf::from("/abs.db"));
  }
}
