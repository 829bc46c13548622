//! Handlers for `/notifications` endpoints.
//!
//! `audience` defaults to the caller's own user audience. Mark-read and
//! delete answer 204 whether or not the id exists in the caller's scope.

use axum::{
  Json,
  extract::{Path, Query, State},
  http::StatusCode,
};
use clinic_core::{
  actor::Actor,
  lifecycle::LifecycleController,
  notification::{Audience, Notification},
  store::ClinicStore,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{error::ApiError, identity::Identity};

#[derive(Debug, Deserialize)]
pub struct AudienceParams {
  pub audience: Option<String>,
}

impl AudienceParams {
  fn resolve(&self, actor: &Actor) -> Result<Audience, ApiError> {
    match &self.audience {
      Some(raw) => Ok(raw.parse()?),
      None => Ok(Audience::User(actor.id)),
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnreadCount {
  pub unread: usize,
}

/// `GET /notifications[?audience=admin]`
pub async fn list<S: ClinicStore + 'static>(
  State(lc): State<LifecycleController<S>>,
  Identity(actor): Identity,
  Query(params): Query<AudienceParams>,
) -> Result<Json<Vec<Notification>>, ApiError> {
  let audience = params.resolve(&actor)?;
  Ok(Json(lc.channel().list(&actor, audience).await?))
}

/// `GET /notifications/unread[?audience=admin]`
pub async fn unread<S: ClinicStore + 'static>(
  State(lc): State<LifecycleController<S>>,
  Identity(actor): Identity,
  Query(params): Query<AudienceParams>,
) -> Result<Json<UnreadCount>, ApiError> {
  let audience = params.resolve(&actor)?;
  let unread = lc.channel().unread_count(&actor, audience).await?;
  Ok(Json(UnreadCount { unread }))
}

/// `PUT /notifications/{id}/read`
pub async fn mark_read<S: ClinicStore + 'static>(
  State(lc): State<LifecycleController<S>>,
  Identity(actor): Identity,
  Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
  lc.channel().mark_read(&actor, id).await?;
  Ok(StatusCode::NO_CONTENT)
}

/// `DELETE /notifications/{id}`
pub async fn delete<S: ClinicStore + 'static>(
  State(lc): State<LifecycleController<S>>,
  Identity(actor): Identity,
  Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
  lc.channel().delete(&actor, id).await?;
  Ok(StatusCode::NO_CONTENT)
}
