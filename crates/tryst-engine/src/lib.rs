//! Engines driving match windows and reputation on top of the `tryst-core`
//! storage traits.
//!
//! - [`MatchWindowEngine`] owns the window lifecycle and feeds window
//!   outcomes into reputation.
//! - [`ReputationEngine`] records behavior and maintains decayed scores.
//! - [`ExpirationScheduler`] runs the expiration sweep and reminder scan on
//!   fixed intervals.
//!
//! Every persisted mutation is a compare-and-swap on the row version, retried
//! up to [`MAX_ATTEMPTS`] times before giving up with
//! [`Error::Contention`].

pub mod error;
pub mod reputation;
pub mod scheduler;
pub mod window;

use tryst_core::store::{ReputationStore, WindowStore};

pub use error::{Error, Result};
pub use reputation::ReputationEngine;
pub use scheduler::{ExpirationScheduler, SchedulerConfig, SchedulerHandle};
pub use window::{Dashboard, ExpirationReminder, MatchWindowEngine, SweepReport};

/// Optimistic-concurrency attempts per operation.
pub const MAX_ATTEMPTS: usize = 8;

/// A backend holding both windows and reputation, shareable across tasks.
pub trait MatchStore: WindowStore + ReputationStore + Clone + 'static {}

impl<T> MatchStore for T where T: WindowStore + ReputationStore + Clone + 'static {}

#[cfg(test)]
mod tests;
