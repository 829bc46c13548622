//! Error types for `clinic-core`.
//!
//! The variants form the user-facing error taxonomy of the appointment
//! engine. `PermissionDenied` and `InvalidTransition` are safe to show
//! verbatim; `Conflict` means the caller must re-fetch before retrying.

use thiserror::Error;
use uuid::Uuid;

use crate::appointment::AppointmentStatus;

#[derive(Debug, Error)]
pub enum Error {
  /// The actor's role (or relationship to the appointment) does not entitle
  /// it to the requested edge.
  #[error("not allowed for your role: {0}")]
  PermissionDenied(String),

  /// The edge does not exist, including any move out of a terminal status.
  #[error("{}", invalid_transition_message(*from, *to))]
  InvalidTransition {
    from: AppointmentStatus,
    to:   AppointmentStatus,
  },

  /// Lost an optimistic race: the persisted status no longer matches what
  /// the caller observed.
  #[error("appointment was changed concurrently; it is now {current}")]
  Conflict { current: AppointmentStatus },

  #[error("appointment not found: {0}")]
  NotFound(Uuid),

  #[error("invalid schedule: {0}")]
  InvalidSchedule(String),

  #[error("invalid audience: {0:?}")]
  InvalidAudience(String),

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
  /// Wrap a backend error.
  pub fn store(e: impl std::error::Error + Send + Sync + 'static) -> Self {
    Self::Store(Box::new(e))
  }
}

fn invalid_transition_message(
  from: AppointmentStatus,
  to: AppointmentStatus,
) -> String {
  if from.is_terminal() {
    format!("this appointment is already closed ({from})")
  } else {
    format!("an appointment cannot move from {from} to {to}")
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
