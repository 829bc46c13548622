//! The transition table.
//!
//! [`decide`] is a pure function of `(current, requested, role, relation)`.
//! The same table answers server-side authorisation and UI affordance
//! ([`allowed_targets`]), so a button renders iff the request would pass.
//!
//! | From | To | Who |
//! |------|----|-----|
//! | pending | accepted | veterinarian, admin |
//! | pending | rejected | veterinarian, admin |
//! | pending | cancelled | owning client, veterinarian, admin |
//! | accepted | completed | veterinarian, admin |
//! | accepted | cancelled | owning client, veterinarian, admin |
//! | accepted | pending | owning client (reschedule) |
//!
//! A veterinarian qualifies when assigned, or when nobody is assigned yet.
//! Nothing leaves a terminal status.

use strum::IntoEnumIterator;

use crate::{
  Error, Result,
  actor::{ActorRelation, Role},
  appointment::AppointmentStatus::{self, *},
  notification::NotificationKind::{self, *},
};

// ─── Fan-out ─────────────────────────────────────────────────────────────────

/// A party interested in an appointment, resolved to a concrete
/// [`Audience`](crate::notification::Audience) by the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recipient {
  Client,
  /// Skipped when no veterinarian is assigned.
  AssignedVet,
  Admins,
}

/// One notification to emit after a committed transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NotificationIntent {
  pub recipient: Recipient,
  pub kind:      NotificationKind,
}

/// An allowed transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
  pub fanout:       Vec<NotificationIntent>,
  /// The acting veterinarian becomes the assigned one as part of the write.
  pub assign_actor: bool,
}

// ─── Table ───────────────────────────────────────────────────────────────────

struct Edge {
  from:   AppointmentStatus,
  to:     AppointmentStatus,
  client: bool,
  vet:    bool,
  admin:  bool,
  fanout: &'static [(Recipient, NotificationKind)],
}

const CANCELLED_FANOUT: &[(Recipient, NotificationKind)] = &[
  (Recipient::Client, AppointmentCancelled),
  (Recipient::AssignedVet, AppointmentCancelled),
  (Recipient::Admins, AppointmentCancelled),
];

const EDGES: &[Edge] = &[
  Edge {
    from:   Pending,
    to:     Accepted,
    client: false,
    vet:    true,
    admin:  true,
    fanout: &[
      (Recipient::Client, AppointmentAccepted),
      (Recipient::Admins, AppointmentAcceptedAdmin),
    ],
  },
  Edge {
    from:   Pending,
    to:     Rejected,
    client: false,
    vet:    true,
    admin:  true,
    fanout: &[
      (Recipient::Client, AppointmentRejected),
      (Recipient::Admins, AppointmentRejected),
    ],
  },
  Edge {
    from:   Pending,
    to:     Cancelled,
    client: true,
    vet:    true,
    admin:  true,
    fanout: CANCELLED_FANOUT,
  },
  Edge {
    from:   Accepted,
    to:     Completed,
    client: false,
    vet:    true,
    admin:  true,
    fanout: &[
      (Recipient::Client, AppointmentCompleted),
      (Recipient::Admins, AppointmentCompleted),
    ],
  },
  Edge {
    from:   Accepted,
    to:     Cancelled,
    client: true,
    vet:    true,
    admin:  true,
    fanout: CANCELLED_FANOUT,
  },
  // Reschedule: back to pending so the veterinarian approves again.
  Edge {
    from:   Accepted,
    to:     Pending,
    client: true,
    vet:    false,
    admin:  false,
    fanout: &[
      (Recipient::AssignedVet, AppointmentRescheduled),
      (Recipient::Admins, AppointmentRescheduled),
    ],
  },
];

const CREATION_FANOUT: &[(Recipient, NotificationKind)] = &[
  (Recipient::AssignedVet, AppointmentCreated),
  (Recipient::Admins, AppointmentCreated),
];

fn intents(
  pairs: &[(Recipient, NotificationKind)],
) -> Vec<NotificationIntent> {
  pairs
    .iter()
    .map(|&(recipient, kind)| NotificationIntent { recipient, kind })
    .collect()
}

// ─── Decisions ───────────────────────────────────────────────────────────────

/// Decide whether an actor may move an appointment from `current` to
/// `requested`.
///
/// Returns [`Error::InvalidTransition`] when the edge does not exist (always
/// the case out of a terminal status) and [`Error::PermissionDenied`] when
/// it exists but not for this actor.
pub fn decide(
  current: AppointmentStatus,
  requested: AppointmentStatus,
  role: Role,
  relation: ActorRelation,
) -> Result<Decision> {
  let invalid = Error::InvalidTransition { from: current, to: requested };
  if current.is_terminal() {
    return Err(invalid);
  }
  let edge = EDGES
    .iter()
    .find(|e| e.from == current && e.to == requested)
    .ok_or(invalid)?;

  let permitted = match role {
    Role::Client => edge.client && relation == ActorRelation::Owner,
    Role::Veterinarian => {
      edge.vet
        && matches!(relation, ActorRelation::Assigned | ActorRelation::Unassigned)
    }
    Role::Admin => edge.admin,
  };
  if !permitted {
    return Err(Error::PermissionDenied(format!(
      "a {role} cannot move this appointment from {current} to {requested}"
    )));
  }

  Ok(Decision {
    fanout:       intents(edge.fanout),
    assign_actor: role == Role::Veterinarian
      && relation == ActorRelation::Unassigned
      && matches!(requested, Accepted | Completed),
  })
}

/// Every status the actor could move the appointment to right now.
pub fn allowed_targets(
  current: AppointmentStatus,
  role: Role,
  relation: ActorRelation,
) -> Vec<AppointmentStatus> {
  AppointmentStatus::iter()
    .filter(|&to| decide(current, to, role, relation).is_ok())
    .collect()
}

/// Fan-out for a newly booked appointment.
pub fn creation_fanout() -> Vec<NotificationIntent> {
  intents(CREATION_FANOUT)
}
