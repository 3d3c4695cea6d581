//! Error type for `tryst-engine`.

use thiserror::Error;
use uuid::Uuid;

/// A failure from a collaborator whose concrete error type the engines are
/// generic over.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum Error {
  /// A caller-visible domain failure.
  #[error(transparent)]
  Domain(#[from] tryst_core::Error),

  #[error("store error: {0}")]
  Store(#[source] BoxError),

  #[error("conversation service error: {0}")]
  Conversation(#[source] BoxError),

  #[error("compatibility feed error: {0}")]
  Feed(#[source] BoxError),

  /// The row for `id` (a window token or a user id) kept changing under us.
  #[error("gave up on {0} after repeated concurrent updates")]
  Contention(Uuid),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

pub(crate) fn store_err<E>(e: E) -> Error
where
  E: std::error::Error + Send + Sync + 'static,
{
  Error::Store(Box::new(e))
}
