//! Tryst HTTP server: configuration and application assembly.
//!
//! The binary in `main.rs` only wires process concerns (CLI, tracing,
//! signals) around what is built here.

use std::{path::PathBuf, sync::Arc, time::Duration};

use axum::{Router, routing::get};
use serde::Deserialize;
use tower_http::trace::TraceLayer;
use tryst_core::collab::{CompatibilityFeed, CompatibilityIngest, ConversationService};
use tryst_engine::{MatchStore, MatchWindowEngine, SchedulerConfig};

// ─── Configuration ────────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `config.toml` and
/// `TRYST_*` environment variables. Every field has a default.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
  pub host:                   String,
  pub port:                   u16,
  pub store_path:             PathBuf,
  pub sweep_interval_secs:    u64,
  pub reminder_interval_secs: u64,
  pub reminder_lead_hours:    i64,
}

impl Default for ServerConfig {
  fn default() -> Self {
    Self {
      host:                   "127.0.0.1".to_string(),
      port:                   8080,
      store_path:             PathBuf::from("~/.local/share/tryst/tryst.db"),
      sweep_interval_secs:    5 * 60,
      reminder_interval_secs: 60 * 60,
      reminder_lead_hours:    4,
    }
  }
}

impl ServerConfig {
  pub fn scheduler(&self) -> SchedulerConfig {
    SchedulerConfig {
      sweep_interval:    Duration::from_secs(self.sweep_interval_secs.max(1)),
      reminder_interval: Duration::from_secs(self.reminder_interval_secs.max(1)),
      reminder_lead:     chrono::Duration::hours(self.reminder_lead_hours),
    }
  }
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// The full application: `/health` plus the JSON API under `/api`.
pub fn app<S, V, F>(engine: Arc<MatchWindowEngine<S, V, F>>) -> Router
where
  S: MatchStore,
  V: ConversationService + 'static,
  F: CompatibilityFeed + CompatibilityIngest + 'static,
{
  Router::new()
    .route("/health", get(|| async { "OK" }))
    .nest("/api", tryst_api::api_router(engine))
    .layer(TraceLayer::new_for_http())
}
