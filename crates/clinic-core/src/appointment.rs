//! The finite-state record at the centre of the engine.
//!
//! An appointment is created `pending` by its client and afterwards only
//! changes through [`crate::lifecycle::LifecycleController`]. It is never
//! removed; cancellation is a status.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoStaticStr};
use uuid::Uuid;

use crate::actor::Role;

// ─── Status ──────────────────────────────────────────────────────────────────

/// Where an appointment is in its lifecycle.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  EnumIter,
  IntoStaticStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum AppointmentStatus {
  Pending,
  Accepted,
  Rejected,
  Completed,
  Cancelled,
}

impl AppointmentStatus {
  /// `rejected`, `completed` and `cancelled` admit no further transition.
  pub fn is_terminal(self) -> bool {
    matches!(self, Self::Rejected | Self::Completed | Self::Cancelled)
  }

  pub fn as_str(self) -> &'static str { self.into() }
}

// ─── Appointment ─────────────────────────────────────────────────────────────

/// The persisted appointment record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Appointment {
  pub appointment_id: Uuid,
  pub client_id:      Uuid,
  pub pet_id:         Uuid,
  pub service_id:     Uuid,
  /// Unset until a veterinarian is assigned or accepts.
  pub vet_id:         Option<Uuid>,
  pub scheduled_at:   DateTime<Utc>,
  pub status:         AppointmentStatus,
  pub notes:          String,
  pub created_at:     DateTime<Utc>,
  pub updated_at:     DateTime<Utc>,
}

/// Input to [`crate::store::ClinicStore::create_appointment`].
/// Identity, status and timestamps are assigned by the store.
#[derive(Debug, Clone)]
pub struct NewAppointment {
  pub client_id:    Uuid,
  pub pet_id:       Uuid,
  pub service_id:   Uuid,
  pub vet_id:       Option<Uuid>,
  pub scheduled_at: DateTime<Utc>,
  pub notes:        String,
}

/// What a client submits when booking. The owning client is always the
/// acting client, so it is not part of the request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookAppointment {
  pub pet_id:       Uuid,
  pub service_id:   Uuid,
  #[serde(default)]
  pub vet_id:       Option<Uuid>,
  pub scheduled_at: DateTime<Utc>,
  #[serde(default)]
  pub notes:        String,
}

// ─── Audit ───────────────────────────────────────────────────────────────────

/// One committed status write. Appended in the same database transaction as
/// the write itself; `from` is `None` for the creating write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionRecord {
  pub transition_id:  Uuid,
  pub appointment_id: Uuid,
  pub from:           Option<AppointmentStatus>,
  pub to:             AppointmentStatus,
  pub actor_id:       Uuid,
  pub actor_role:     Role,
  pub recorded_at:    DateTime<Utc>,
}
