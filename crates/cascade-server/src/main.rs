//! cascade server binary.
//!
//! Reads `cascade.toml` (or the path given with `--config`), opens the SQLite
//! store, and serves the goals API and live event streams over HTTP. Users
//! come from an external directory; `add-user` and `issue-token` seed them
//! for local use.

mod config;

use std::sync::Arc;

use anyhow::Context as _;
use cascade_api::AppState;
use cascade_core::{
  store::GoalStore,
  user::{Role, User},
};
use cascade_realtime::Broadcaster;
use cascade_store_sqlite::SqliteStore;
use clap::{Parser, Subcommand};
use tokio::net::TcpListener;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use crate::config::ServerConfig;

#[derive(Parser)]
#[command(author, version, about = "Cascade goal hierarchy server")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "cascade.toml")]
  config: std::path::PathBuf,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand)]
enum Command {
  /// Serve the HTTP API.
  Serve,
  /// Insert or replace a user record.
  AddUser {
    #[arg(long)]
    organization: Uuid,
    /// e.g. `employee`, `team_lead`, `manager`, `ceo`.
    #[arg(long)]
    role:         Role,
    #[arg(long)]
    manager:      Option<Uuid>,
    /// Reuse an existing id instead of generating one.
    #[arg(long)]
    id:           Option<Uuid>,
  },
  /// Print a new bearer token for a user.
  IssueToken { user: Uuid },
  /// Record a recognition from one user to another.
  Recognize {
    #[arg(long)]
    from:    Uuid,
    #[arg(long)]
    to:      Uuid,
    message: String,
  },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();
  let cfg = ServerConfig::load(&cli.config)?;

  let store = SqliteStore::open(&cfg.database_path)
    .await
    .with_context(|| format!("failed to open store at {:?}", cfg.database_path))?;

  match cli.command {
    Command::Serve => serve(cfg, store).await,
    Command::AddUser { organization, role, manager, id } => {
      let user = User {
        id: id.unwrap_or_else(Uuid::new_v4),
        organization_id: organization,
        role,
        manager_id: manager,
      };
      store.put_user(&user).await.context("failed to store user")?;
      println!("{}", user.id);
      Ok(())
    }
    Command::IssueToken { user } => {
      let token = store
        .issue_token(user)
        .await
        .with_context(|| format!("failed to issue token for {user}"))?;
      println!("{token}");
      Ok(())
    }
    Command::Recognize { from, to, message } => {
      let sender = store
        .get_user(from)
        .await
        .context("failed to look up sender")?
        .with_context(|| format!("unknown user {from}"))?;
      let recognition = store
        .insert_recognition(sender.organization_id, from, to, message)
        .await
        .context("failed to store recognition")?;
      println!("{}", recognition.id);
      Ok(())
    }
  }
}

async fn serve(cfg: ServerConfig, store: SqliteStore) -> anyhow::Result<()> {
  let broadcaster = Broadcaster::new(cfg.realtime.clone());
  let state = AppState::new(Arc::new(store), broadcaster.clone());
  let app = cascade_api::router(state);

  let address = cfg.address();
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;
  tracing::info!("Listening on http://{address}");

  axum::serve(listener, app)
    .with_graceful_shutdown(shutdown_signal(broadcaster))
    .await
    .context("server error")?;

  tracing::info!("server stopped");
  Ok(())
}

/// Resolve on Ctrl-C, closing every live channel so open streams end and
/// the graceful shutdown can complete.
async fn shutdown_signal(broadcaster: Broadcaster) {
  if let Err(e) = tokio::signal::ctrl_c().await {
    tracing::error!(%e, "failed to listen for shutdown signal");
  }
  tracing::info!("shutting down");
  broadcaster.shutdown();
}
