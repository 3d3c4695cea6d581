//! The `x-user-id` extractor.
//!
//! Authentication happens upstream; by the time a request reaches this
//! router the acting user has been resolved and forwarded in a header.

use axum::{extract::FromRequestParts, http::request::Parts};
use tryst_core::UserId;
use uuid::Uuid;

use crate::error::ApiError;

pub const USER_HEADER: &str = "x-user-id";

/// The authenticated user on whose behalf a request acts.
#[derive(Debug, Clone, Copy)]
pub struct ActingUser(pub UserId);

impl<St> FromRequestParts<St> for ActingUser
where
  St: Send + Sync,
{
  type Rejection = ApiError;

  async fn from_request_parts(parts: &mut Parts, _: &St) -> Result<Self, Self::Rejection> {
    let id = parts
      .headers
      .get(USER_HEADER)
      .and_then(|v| v.to_str().ok())
      .and_then(|s| Uuid::parse_str(s.trim()).ok())
      .ok_or(ApiError::Unauthorized)?;
    Ok(ActingUser(UserId(id)))
  }
}
