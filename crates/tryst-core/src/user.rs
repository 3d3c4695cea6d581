//! User identity as seen by this core.
//!
//! Users are owned elsewhere; windows, events and scores only hold a weak
//! reference to them.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque identifier of a user.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct UserId(pub Uuid);

impl UserId {
  pub fn new() -> Self { Self(Uuid::new_v4()) }

  pub fn as_uuid(&self) -> Uuid { self.0 }
}

impl Default for UserId {
  fn default() -> Self { Self::new() }
}

impl From<Uuid> for UserId {
  fn from(id: Uuid) -> Self { Self(id) }
}

impl fmt::Display for UserId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    self.0.fmt(f)
  }
}

/// Order an unordered pair so that lookups and uniqueness checks see the
/// same key regardless of argument order.
pub fn normalize_pair(a: UserId, b: UserId) -> (UserId, UserId) {
  if a <= b { (a, b) } else { (b, a) }
}
