//! Core types and trait definitions for Tryst match windows and reputation.
//!
//! This crate is deliberately free of HTTP and database dependencies. The
//! window state machine, the decay curve and the trust policy live here as
//! pure functions; storage backends and collaborators are reached through
//! traits.

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod behavior;
pub mod clock;
pub mod collab;
pub mod error;
pub mod reputation;
pub mod store;
pub mod user;
pub mod window;

pub use error::{Error, Result};
pub use user::UserId;
