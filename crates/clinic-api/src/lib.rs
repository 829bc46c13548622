//! JSON REST API for the clinic appointment engine.
//!
//! Exposes an axum [`Router`] backed by any [`clinic_core::store::ClinicStore`].
//! Authentication, TLS, and transport concerns are the caller's
//! responsibility; the caller's identity arrives in the
//! [`ACTOR_ID_HEADER`] and [`ACTOR_ROLE_HEADER`] headers.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", clinic_api::api_router(store.clone()))
//! ```

pub mod appointments;
pub mod error;
pub mod identity;
pub mod notifications;

#[cfg(test)]
mod tests;

use std::sync::Arc;

use axum::{
  Router,
  routing::{delete, get, put},
};
use clinic_core::{lifecycle::LifecycleController, store::ClinicStore};

pub use error::{ApiError, ErrorBody};
pub use identity::{ACTOR_ID_HEADER, ACTOR_ROLE_HEADER, Identity};

/// Build a fully-materialised API router for `store`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S>(store: Arc<S>) -> Router<()>
where
  S: ClinicStore + 'static,
{
  Router::new()
    // Appointments
    .route(
      "/appointments",
      get(appointments::list::<S>).post(appointments::create::<S>),
    )
    .route(
      "/appointments/{id}",
      get(appointments::get_one::<S>).put(appointments::transition::<S>),
    )
    .route("/appointments/{id}/actions", get(appointments::actions::<S>))
    .route("/appointments/{id}/history", get(appointments::history::<S>))
    // Notifications
    .route("/notifications", get(notifications::list::<S>))
    .route("/notifications/unread", get(notifications::unread::<S>))
    .route("/notifications/{id}/read", put(notifications::mark_read::<S>))
    .route("/notifications/{id}", delete(notifications::delete::<S>))
    .with_state(LifecycleController::new(store))
}
