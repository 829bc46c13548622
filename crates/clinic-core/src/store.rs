//! The `ClinicStore` trait and supporting query types.
//!
//! The trait is implemented by storage backends (e.g. `clinic-store-sqlite`).
//! Higher layers (`clinic-api`, the lifecycle controller) depend on this
//! abstraction, not on any concrete backend.

use std::future::Future;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
  actor::Actor,
  appointment::{
    Appointment, AppointmentStatus, NewAppointment, TransitionRecord,
  },
  notification::{Audience, NewNotification, Notification},
};

// ─── Query / write types ─────────────────────────────────────────────────────

/// Parameters for [`ClinicStore::list_appointments`]. Filters combine with
/// AND, except `include_unassigned` which widens `vet_id`.
#[derive(Debug, Clone, Default)]
pub struct AppointmentQuery {
  pub client_id:          Option<Uuid>,
  pub vet_id:             Option<Uuid>,
  /// With `vet_id` set, also return pending appointments nobody is assigned
  /// to.
  pub include_unassigned: bool,
  pub status:             Option<AppointmentStatus>,
}

/// A compare-and-swap on an appointment's status.
#[derive(Debug, Clone)]
pub struct ConditionalUpdate {
  pub appointment_id:  Uuid,
  /// The write applies only while the persisted status still equals this.
  pub expected_status: AppointmentStatus,
  pub new_status:      AppointmentStatus,
  /// Replaces `scheduled_at` when set (reschedule).
  pub scheduled_at:    Option<DateTime<Utc>>,
  /// Fills `vet_id` when it is still unset.
  pub assign_vet:      Option<Uuid>,
  /// Recorded in the transition audit log.
  pub actor:           Actor,
}

/// Result of a [`ConditionalUpdate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateOutcome {
  Applied(Appointment),
  /// Someone else moved the appointment first.
  Conflict { current: AppointmentStatus },
  NotFound,
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over a clinic store backend: the authoritative appointment
/// records and the durable per-audience notification queue.
///
/// Status changes go only through [`ClinicStore::update_status`], which must
/// be atomic with respect to the status comparison and the audit-log append.
///
/// All methods return `Send` futures so the trait can be used in multi-threaded
/// async runtimes (e.g. tokio with `axum`).
pub trait ClinicStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Appointments ──────────────────────────────────────────────────────

  /// Persist a new `pending` appointment and its creation audit record.
  fn create_appointment(
    &self,
    input: NewAppointment,
    actor: Actor,
  ) -> impl Future<Output = Result<Appointment, Self::Error>> + Send + '_;

  /// Retrieve an appointment by UUID. Returns `None` if not found.
  fn get_appointment(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Appointment>, Self::Error>> + Send + '_;

  /// Appointments matching `query`, ordered by `scheduled_at` ascending.
  fn list_appointments<'a>(
    &'a self,
    query: &'a AppointmentQuery,
  ) -> impl Future<Output = Result<Vec<Appointment>, Self::Error>> + Send + 'a;

  /// Apply `update` iff the persisted status equals `expected_status`.
  fn update_status(
    &self,
    update: ConditionalUpdate,
  ) -> impl Future<Output = Result<UpdateOutcome, Self::Error>> + Send + '_;

  /// The audit trail for one appointment, oldest first.
  fn transition_history(
    &self,
    appointment_id: Uuid,
  ) -> impl Future<Output = Result<Vec<TransitionRecord>, Self::Error>> + Send + '_;

  // ── Notifications ─────────────────────────────────────────────────────

  /// Create one durable, unread notification.
  fn enqueue_notification(
    &self,
    input: NewNotification,
  ) -> impl Future<Output = Result<Notification, Self::Error>> + Send + '_;

  /// All notifications for `audience`, most recent first.
  fn list_notifications(
    &self,
    audience: Audience,
  ) -> impl Future<Output = Result<Vec<Notification>, Self::Error>> + Send + '_;

  /// Mark a notification read if it belongs to one of `scope`.
  /// Unknown or out-of-scope ids are a silent no-op.
  fn mark_notification_read(
    &self,
    id: Uuid,
    scope: Vec<Audience>,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Delete a notification if it belongs to one of `scope`.
  /// Unknown or out-of-scope ids are a silent no-op.
  fn delete_notification(
    &self,
    id: Uuid,
    scope: Vec<Audience>,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Count of unread notifications for `audience`.
  fn unread_count(
    &self,
    audience: Audience,
  ) -> impl Future<Output = Result<usize, Self::Error>> + Send + '_;
}
