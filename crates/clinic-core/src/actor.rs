//! The already-authenticated identity behind a request.
//!
//! The engine never authenticates. Identity arrives from the auth layer and is
//! passed explicitly into every operation; nothing reads an ambient "current
//! user".

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString, IntoStaticStr};
use uuid::Uuid;

use crate::{appointment::Appointment, notification::Audience};

/// What kind of user is acting.
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
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Role {
  Client,
  Veterinarian,
  Admin,
}

impl Role {
  pub fn as_str(self) -> &'static str { self.into() }
}

/// A trusted `{id, role}` pair supplied by the auth layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
  pub id:   Uuid,
  pub role: Role,
}

impl Actor {
  pub fn new(id: Uuid, role: Role) -> Self { Self { id, role } }

  /// Every audience whose notifications this actor may read.
  pub fn audiences(&self) -> Vec<Audience> {
    let mut audiences = vec![Audience::User(self.id)];
    if self.role == Role::Admin {
      audiences.push(Audience::Admin);
    }
    audiences
  }

  pub fn can_view_audience(&self, audience: &Audience) -> bool {
    match audience {
      Audience::User(id) => *id == self.id,
      Audience::Admin => self.role == Role::Admin,
    }
  }

  /// Whether the appointment is visible to this actor at all.
  ///
  /// Veterinarians see unassigned appointments so they can pick them up.
  pub fn can_view(&self, appointment: &Appointment) -> bool {
    match ActorRelation::of(self, appointment) {
      ActorRelation::Administrator
      | ActorRelation::Owner
      | ActorRelation::Assigned
      | ActorRelation::Unassigned => true,
      ActorRelation::Unrelated => false,
    }
  }
}

/// How an actor stands with respect to one appointment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActorRelation {
  /// The client who booked it.
  Owner,
  /// The veterinarian recorded in `vet_id`.
  Assigned,
  /// A veterinarian, and no veterinarian is assigned yet.
  Unassigned,
  /// An admin; ownership does not apply.
  Administrator,
  /// Another client, or a veterinarian when someone else is assigned.
  Unrelated,
}

impl ActorRelation {
  pub fn of(actor: &Actor, appointment: &Appointment) -> Self {
    match actor.role {
      Role::Admin => Self::Administrator,
      Role::Client if appointment.client_id == actor.id => Self::Owner,
      Role::Client => Self::Unrelated,
      Role::Veterinarian => match appointment.vet_id {
        Some(vet) if vet == actor.id => Self::Assigned,
        Some(_) => Self::Unrelated,
        None => Self::Unassigned,
      },
    }
  }
}
