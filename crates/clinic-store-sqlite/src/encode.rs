//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as fixed-width RFC 3339 strings (microseconds, `Z`)
//! so that text ordering matches time ordering. Enums are stored as their
//! serde names. UUIDs are stored as hyphenated lowercase strings.

use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};
use clinic_core::{
  actor::Role,
  appointment::{Appointment, AppointmentStatus, TransitionRecord},
  notification::{Audience, Notification, NotificationKind},
};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Uuid ─────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

// ─── DateTime<Utc> ────────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── Enums ────────────────────────────────────────────────────────────────────

fn decode_enum<T: FromStr>(column: &'static str, s: &str) -> Result<T> {
  s.parse().map_err(|_| Error::UnknownValue { column, value: s.to_owned() })
}

pub fn decode_status(s: &str) -> Result<AppointmentStatus> {
  decode_enum("status", s)
}

pub fn decode_role(s: &str) -> Result<Role> { decode_enum("actor_role", s) }

pub fn decode_kind(s: &str) -> Result<NotificationKind> {
  decode_enum("kind", s)
}

pub fn decode_audience(s: &str) -> Result<Audience> {
  decode_enum("audience", s)
}

// ─── Row types ───────────────────────────────────────────────────────────────

pub const APPOINTMENT_COLUMNS: &str = "appointment_id, client_id, pet_id, \
  service_id, vet_id, scheduled_at, status, notes, created_at, updated_at";

/// Raw strings read directly from an `appointments` row.
pub struct RawAppointment {
  pub appointment_id: String,
  pub client_id:      String,
  pub pet_id:         String,
  pub service_id:     String,
  pub vet_id:         Option<String>,
  pub scheduled_at:   String,
  pub status:         String,
  pub notes:          String,
  pub created_at:     String,
  pub updated_at:     String,
}

impl RawAppointment {
  /// Map a row selected with [`APPOINTMENT_COLUMNS`].
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      appointment_id: row.get(0)?,
      client_id:      row.get(1)?,
      pet_id:         row.get(2)?,
      service_id:     row.get(3)?,
      vet_id:         row.get(4)?,
      scheduled_at:   row.get(5)?,
      status:         row.get(6)?,
      notes:          row.get(7)?,
      created_at:     row.get(8)?,
      updated_at:     row.get(9)?,
    })
  }

  pub fn into_appointment(self) -> Result<Appointment> {
    Ok(Appointment {
      appointment_id: decode_uuid(&self.appointment_id)?,
      client_id:      decode_uuid(&self.client_id)?,
      pet_id:         decode_uuid(&self.pet_id)?,
      service_id:     decode_uuid(&self.service_id)?,
      vet_id:         self.vet_id.as_deref().map(decode_uuid).transpose()?,
      scheduled_at:   decode_dt(&self.scheduled_at)?,
      status:         decode_status(&self.status)?,
      notes:          self.notes,
      created_at:     decode_dt(&self.created_at)?,
      updated_at:     decode_dt(&self.updated_at)?,
    })
  }
}

/// Raw strings read directly from an `appointment_transitions` row.
pub struct RawTransition {
  pub transition_id:  String,
  pub appointment_id: String,
  pub from_status:    Option<String>,
  pub to_status:      String,
  pub actor_id:       String,
  pub actor_role:     String,
  pub recorded_at:    String,
}

impl RawTransition {
  pub fn into_record(self) -> Result<TransitionRecord> {
    Ok(TransitionRecord {
      transition_id:  decode_uuid(&self.transition_id)?,
      appointment_id: decode_uuid(&self.appointment_id)?,
      from:           self.from_status.as_deref().map(decode_status).transpose()?,
      to:             decode_status(&self.to_status)?,
      actor_id:       decode_uuid(&self.actor_id)?,
      actor_role:     decode_role(&self.actor_role)?,
      recorded_at:    decode_dt(&self.recorded_at)?,
    })
  }
}

pub const NOTIFICATION_COLUMNS: &str =
  "notification_id, audience, kind, appointment_id, message, read, created_at";

/// Raw values read directly from a `notifications` row.
pub struct RawNotification {
  pub notification_id: String,
  pub audience:        String,
  pub kind:            String,
  pub appointment_id:  Option<String>,
  pub message:         String,
  pub read:            bool,
  pub created_at:      String,
}

impl RawNotification {
  /// Map a row selected with [`NOTIFICATION_COLUMNS`].
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      notification_id: row.get(0)?,
      audience:        row.get(1)?,
      kind:            row.get(2)?,
      appointment_id:  row.get(3)?,
      message:         row.get(4)?,
      read:            row.get(5)?,
      created_at:      row.get(6)?,
    })
  }

  pub fn into_notification(self) -> Result<Notification> {
    Ok(Notification {
      notification_id: decode_uuid(&self.notification_id)?,
      audience:        decode_audience(&self.audience)?,
      kind:            decode_kind(&self.kind)?,
      appointment_id:  self
        .appointment_id
        .as_deref()
        .map(decode_uuid)
        .transpose()?,
      message:         self.message,
      read:            self.read,
      created_at:      decode_dt(&self.created_at)?,
    })
  }
}
