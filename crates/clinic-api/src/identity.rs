//! Actor identity extractor.
//!
//! Authentication happens upstream (a gateway or session layer); by the time a
//! request reaches this router the caller's id and role are forwarded as
//! headers and trusted as-is.

use axum::{
  extract::FromRequestParts,
  http::{HeaderMap, request::Parts},
};
use clinic_core::actor::{Actor, Role};
use uuid::Uuid;

use crate::error::ApiError;

pub const ACTOR_ID_HEADER: &str = "x-actor-id";
pub const ACTOR_ROLE_HEADER: &str = "x-actor-role";

/// The authenticated actor behind a request.
#[derive(Debug, Clone, Copy)]
pub struct Identity(pub Actor);

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Result<&'a str, ApiError> {
  headers
    .get(name)
    .ok_or_else(|| ApiError::Unauthorized(format!("missing {name} header")))?
    .to_str()
    .map_err(|_| ApiError::Unauthorized(format!("{name} is not valid text")))
}

/// Read the actor from request headers.
pub fn actor_from_headers(headers: &HeaderMap) -> Result<Actor, ApiError> {
  let id: Uuid = header(headers, ACTOR_ID_HEADER)?
    .parse()
    .map_err(|_| ApiError::Unauthorized("actor id is not a uuid".into()))?;
  let role: Role = header(headers, ACTOR_ROLE_HEADER)?
    .parse()
    .map_err(|_| ApiError::Unauthorized("unknown actor role".into()))?;
  Ok(Actor::new(id, role))
}

impl<S: Send + Sync> FromRequestParts<S> for Identity {
  type Rejection = ApiError;

  async fn from_request_parts(
    parts: &mut Parts,
    _state: &S,
  ) -> Result<Self, Self::Rejection> {
    actor_from_headers(&parts.headers).map(Identity)
  }
}
