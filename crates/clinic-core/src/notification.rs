//! Notification types.
//!
//! Durable notifications live in the store, one queue per [`Audience`].
//! Ephemeral notifications exist only in a client session and expire on their
//! own; they never receive a durable id.

use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString, IntoStaticStr};
use uuid::Uuid;

use crate::{Error, appointment::Appointment};

// ─── Audience ────────────────────────────────────────────────────────────────

/// Recipient scope: one user, or every admin.
///
/// Text form is `user:<uuid>` or `admin`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Audience {
  User(Uuid),
  Admin,
}

impl fmt::Display for Audience {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::User(id) => write!(f, "user:{id}"),
      Self::Admin => f.write_str("admin"),
    }
  }
}

impl FromStr for Audience {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    if s == "admin" {
      return Ok(Self::Admin);
    }
    s.strip_prefix("user:")
      .and_then(|id| Uuid::parse_str(id).ok())
      .map(Self::User)
      .ok_or_else(|| Error::InvalidAudience(s.to_owned()))
  }
}

impl TryFrom<String> for Audience {
  type Error = Error;

  fn try_from(s: String) -> Result<Self, Self::Error> { s.parse() }
}

impl From<Audience> for String {
  fn from(a: Audience) -> Self { a.to_string() }
}

// ─── Kind ────────────────────────────────────────────────────────────────────

/// The event a notification reports.
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
  IntoStaticStr,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum NotificationKind {
  AppointmentCreated,
  AppointmentAccepted,
  /// Acceptance as reported to the admin audience.
  AppointmentAcceptedAdmin,
  AppointmentRejected,
  AppointmentCompleted,
  AppointmentCancelled,
  AppointmentRescheduled,
}

impl NotificationKind {
  pub fn as_str(self) -> &'static str { self.into() }

  /// Human-readable text for this event about `appointment`.
  pub fn render(self, appointment: &Appointment) -> String {
    let when = appointment.scheduled_at.format("%Y-%m-%d %H:%M UTC");
    match self {
      Self::AppointmentCreated => {
        format!("New appointment requested for {when}.")
      }
      Self::AppointmentAccepted => {
        format!("Your appointment on {when} was accepted.")
      }
      Self::AppointmentAcceptedAdmin => format!(
        "Appointment {} on {when} was accepted.",
        appointment.appointment_id
      ),
      Self::AppointmentRejected => {
        format!("The appointment on {when} was rejected.")
      }
      Self::AppointmentCompleted => {
        format!("The appointment on {when} was completed.")
      }
      Self::AppointmentCancelled => {
        format!("The appointment on {when} was cancelled.")
      }
      Self::AppointmentRescheduled => format!(
        "An appointment was rescheduled to {when} and needs approval again."
      ),
    }
  }
}

// ─── Durable ─────────────────────────────────────────────────────────────────

/// A server-held notification. Its `read` flag is authoritative only in the
/// store; clients hold an eventually-consistent copy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
  pub notification_id: Uuid,
  pub audience:        Audience,
  pub kind:            NotificationKind,
  /// The appointment the event concerns, if any.
  pub appointment_id:  Option<Uuid>,
  pub message:         String,
  pub read:            bool,
  pub created_at:      DateTime<Utc>,
}

/// Input to [`crate::store::ClinicStore::enqueue_notification`].
#[derive(Debug, Clone)]
pub struct NewNotification {
  pub audience:       Audience,
  pub kind:           NotificationKind,
  pub appointment_id: Option<Uuid>,
  pub message:        String,
}

// ─── Ephemeral ───────────────────────────────────────────────────────────────

/// Session-local identifier for an ephemeral notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LocalId(pub u64);

/// Client-local feedback that is never sent to, or fetched from, the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EphemeralNotification {
  pub local_id:   LocalId,
  pub message:    String,
  pub created_at: DateTime<Utc>,
  pub expires_at: DateTime<Utc>,
}

impl EphemeralNotification {
  pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
    now >= self.expires_at
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn audience_text_form() {
    let id = Uuid::new_v4();
    assert_eq!(Audience::User(id).to_string(), format!("user:{id}"));
    assert_eq!("admin".parse::<Audience>().unwrap(), Audience::Admin);
    assert_eq!(
      format!("user:{id}").parse::<Audience>().unwrap(),
      Audience::User(id)
    );
    assert!(matches!(
      "user:not-a-uuid".parse::<Audience>(),
      Err(Error::InvalidAudience(_))
    ));
    assert!("everyone".parse::<Audience>().is_err());
  }

  #[test]
  fn audience_serialises_as_string() {
    let json = serde_json::to_string(&Audience::Admin).unwrap();
    assert_eq!(json, "\"admin\"");
    let back: Audience = serde_json::from_str(&json).unwrap();
    assert_eq!(back, Audience::Admin);
  }

  #[test]
  fn kind_uses_kebab_case() {
    assert_eq!(
      NotificationKind::AppointmentAcceptedAdmin.as_str(),
      "appointment-accepted-admin"
    );
    assert_eq!(
      serde_json::to_string(&NotificationKind::AppointmentRescheduled)
        .unwrap(),
      "\"appointment-rescheduled\""
    );
  }
}
