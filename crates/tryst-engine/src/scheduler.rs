//! Periodic driver for the expiration sweep and reminder scan.

use std::{sync::Arc, time::Duration};

use tokio::{
  sync::watch,
  task::JoinHandle,
  time::{self, MissedTickBehavior},
};

use tryst_core::collab::{CompatibilityFeed, ConversationService};

use crate::{MatchStore, MatchWindowEngine};

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
  pub sweep_interval:    Duration,
  pub reminder_interval: Duration,
  /// How far ahead of a deadline participants are reminded.
  pub reminder_lead:     chrono::Duration,
}

impl Default for SchedulerConfig {
  fn default() -> Self {
    Self {
      sweep_interval:    Duration::from_secs(5 * 60),
      reminder_interval: Duration::from_secs(60 * 60),
      reminder_lead:     chrono::Duration::hours(4),
    }
  }
}

/// Runs [`MatchWindowEngine::expire_windows`] and
/// [`MatchWindowEngine::expiration_reminders`] on fixed intervals.
///
/// Ticks run one at a time on a single task; a tick that overruns its
/// interval causes the missed ticks to be skipped rather than bunched up.
pub struct ExpirationScheduler<S, V, F> {
  engine: Arc<MatchWindowEngine<S, V, F>>,
  config: SchedulerConfig,
}

/// Handle to a spawned scheduler.
pub struct SchedulerHandle {
  shutdown: watch::Sender<bool>,
  task:     JoinHandle<()>,
}

impl SchedulerHandle {
  /// Signal the loop to stop and wait for the current tick to finish.
  pub async fn shutdown(self) {
    let _ = self.shutdown.send(true);
    if let Err(e) = self.task.await {
      tracing::error!(error = %e, "expiration scheduler task failed");
    }
  }
}

impl<S, V, F> ExpirationScheduler<S, V, F>
where
  S: MatchStore,
  V: ConversationService + 'static,
  F: CompatibilityFeed + 'static,
{
  pub fn new(engine: Arc<MatchWindowEngine<S, V, F>>, config: SchedulerConfig) -> Self {
    Self { engine, config }
  }

  pub fn spawn(self) -> SchedulerHandle {
    let (shutdown, rx) = watch::channel(false);
    let task = tokio::spawn(self.run(rx));
    SchedulerHandle { shutdown, task }
  }

  /// Loop until `shutdown` carries `true` or its sender is dropped.
  pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
    let mut sweep = time::interval(self.config.sweep_interval);
    sweep.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut remind = time::interval(self.config.reminder_interval);
    remind.set_missed_tick_behavior(MissedTickBehavior::Skip);

    tracing::info!(
      sweep_secs = self.config.sweep_interval.as_secs(),
      reminder_secs = self.config.reminder_interval.as_secs(),
      "expiration scheduler started"
    );

    loop {
      tokio::select! {
        _ = sweep.tick() => self.sweep().await,
        _ = remind.tick() => self.remind().await,
        changed = shutdown.changed() => {
          if changed.is_err() || *shutdown.borrow() {
            break;
          }
        }
      }
    }

    tracing::info!("expiration scheduler stopped");
  }

  async fn sweep(&self) {
    if let Err(e) = self.engine.expire_windows().await {
      tracing::error!(error = %e, "expiration sweep failed");
    }
  }

  async fn remind(&self) {
    match self.engine.expiration_reminders(self.config.reminder_lead).await {
      Ok(reminders) => {
        for r in &reminders {
          tracing::info!(
            token = %r.token,
            user = %r.user,
            hours_remaining = r.hours_remaining,
            "match window expiring soon"
          );
        }
      }
      Err(e) => tracing::error!(error = %e, "expiration reminder scan failed"),
    }
  }
}
