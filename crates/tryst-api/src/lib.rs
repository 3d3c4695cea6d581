//! JSON REST API for Tryst.
//!
//! Exposes an axum [`Router`] over a [`MatchWindowEngine`]. Authentication,
//! TLS and transport concerns are the caller's responsibility; participant
//! routes expect the resolved user in the `x-user-id` header.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", tryst_api::api_router(engine.clone()))
//! ```

pub mod acting;
pub mod compatibility;
pub mod error;
pub mod me;
pub mod reputation;
pub mod windows;

use std::sync::Arc;

use axum::{
  Router,
  routing::{get, post, put},
};
use tryst_core::collab::{CompatibilityFeed, CompatibilityIngest, ConversationService};
use tryst_engine::{MatchStore, MatchWindowEngine};

pub use acting::ActingUser;
pub use error::ApiError;

/// Shared engine handle used as router state.
pub type Engine<S, V, F> = Arc<MatchWindowEngine<S, V, F>>;

/// Build a fully-materialised API router for `engine`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S, V, F>(engine: Engine<S, V, F>) -> Router<()>
where
  S: MatchStore,
  V: ConversationService + 'static,
  F: CompatibilityFeed + CompatibilityIngest + 'static,
{
  Router::new()
    // Windows
    .route("/windows", post(windows::create::<S, V, F>))
    .route("/windows/batch", post(windows::create_batch::<S, V, F>))
    .route("/windows/{token}", get(windows::get_one::<S, V, F>))
    .route("/windows/{token}/confirm", post(windows::confirm::<S, V, F>))
    .route("/windows/{token}/decline", post(windows::decline::<S, V, F>))
    .route("/windows/{token}/extend", post(windows::extend::<S, V, F>))
    .route("/windows/{token}/intro", post(windows::intro::<S, V, F>))
    // Acting user
    .route("/me/windows/pending", get(me::pending::<S, V, F>))
    .route("/me/windows/pending/count", get(me::pending_count::<S, V, F>))
    .route("/me/windows/waiting", get(me::waiting::<S, V, F>))
    .route("/me/windows/confirmed", get(me::confirmed::<S, V, F>))
    .route("/me/dashboard", get(me::dashboard::<S, V, F>))
    // Reputation
    .route("/reputation/{user}", get(reputation::get_one::<S, V, F>))
    .route(
      "/reputation/{user}/behavior",
      get(reputation::recent::<S, V, F>).post(reputation::record::<S, V, F>),
    )
    // Compatibility feed
    .route("/compatibility", put(compatibility::upsert::<S, V, F>))
    .with_state(engine)
}
