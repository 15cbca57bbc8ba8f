//! Error types for `cascade-core`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  /// No actor could be resolved for the request.
  #[error("unauthorized")]
  Unauthorized,

  /// The actor is known but the permission matrix denies the operation.
  #[error("forbidden: {0}")]
  Forbidden(&'static str),

  /// Missing, archived, or owned by another organization.
  #[error("not found: {0}")]
  NotFound(String),

  #[error("validation failed: {0}")]
  Validation(String),

  /// Concurrent writers kept winning the version race.
  #[error("goal {0} was modified concurrently; retry the request")]
  Conflict(uuid::Uuid),

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
  /// Wrap a backend failure as an internal error.
  pub fn store<E>(e: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    Self::Store(Box::new(e))
  }

  pub(crate) fn validation(msg: impl Into<String>) -> Self {
    Self::Validation(msg.into())
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
