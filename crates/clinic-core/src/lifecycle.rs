//! The appointment lifecycle controller.
//!
//! A transition request always re-reads the persisted appointment, asks the
//! [`authority`](crate::authority) for a decision, and commits through a
//! conditional write keyed on the status it just read. Only after the write is
//! confirmed are fan-out notifications enqueued. A failed enqueue never undoes
//! the transition; it is logged and reported back as a warning.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  Error, Result,
  actor::{Actor, ActorRelation, Role},
  appointment::{
    Appointment, AppointmentStatus, BookAppointment, NewAppointment,
    TransitionRecord,
  },
  authority::{self, NotificationIntent, Recipient},
  channel::NotificationChannel,
  notification::{Audience, NewNotification, Notification, NotificationKind},
  store::{AppointmentQuery, ClinicStore, ConditionalUpdate, UpdateOutcome},
};

// ─── Request / outcome ───────────────────────────────────────────────────────

/// A requested status change.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransitionRequest {
  pub target:       AppointmentStatus,
  /// New time; required for a reschedule and rejected otherwise.
  #[serde(default)]
  pub scheduled_at: Option<DateTime<Utc>>,
  /// The status the caller last saw. A mismatch is reported as a conflict
  /// instead of being decided against the fresher status.
  #[serde(default)]
  pub expected:     Option<AppointmentStatus>,
}

impl TransitionRequest {
  pub fn to(target: AppointmentStatus) -> Self {
    Self { target, scheduled_at: None, expected: None }
  }

  /// `accepted -> pending` with a new time.
  pub fn reschedule(at: DateTime<Utc>) -> Self {
    Self {
      target:       AppointmentStatus::Pending,
      scheduled_at: Some(at),
      expected:     None,
    }
  }

  pub fn expecting(mut self, status: AppointmentStatus) -> Self {
    self.expected = Some(status);
    self
  }
}

/// A fan-out notification that could not be enqueued.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryFailure {
  pub audience: Audience,
  pub kind:     NotificationKind,
  pub reason:   String,
}

/// A committed transition (or creation).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransitionOutcome {
  pub appointment: Appointment,
  pub delivered:   Vec<Notification>,
  /// Non-empty means `NotificationDeliveryFailed`: the state change stands.
  pub undelivered: Vec<DeliveryFailure>,
}

impl TransitionOutcome {
  pub fn delivery_failed(&self) -> bool { !self.undelivered.is_empty() }
}

// ─── Controller ──────────────────────────────────────────────────────────────

/// Orchestrates appointment creation and transitions over a [`ClinicStore`].
///
/// Cheap to clone: the store is reference-counted.
pub struct LifecycleController<S> {
  store:   Arc<S>,
  channel: NotificationChannel<S>,
}

impl<S> Clone for LifecycleController<S> {
  fn clone(&self) -> Self {
    Self {
      store:   Arc::clone(&self.store),
      channel: self.channel.clone(),
    }
  }
}

impl<S: ClinicStore> LifecycleController<S> {
  pub fn new(store: Arc<S>) -> Self {
    let channel = NotificationChannel::new(Arc::clone(&store));
    Self { store, channel }
  }

  pub fn channel(&self) -> &NotificationChannel<S> { &self.channel }

  async fn load(&self, id: Uuid) -> Result<Appointment> {
    self
      .store
      .get_appointment(id)
      .await
      .map_err(Error::store)?
      .ok_or(Error::NotFound(id))
  }

  async fn load_visible(&self, id: Uuid, actor: &Actor) -> Result<Appointment> {
    let appointment = self.load(id).await?;
    // Hide existence from unrelated actors.
    if !actor.can_view(&appointment) {
      return Err(Error::NotFound(id));
    }
    Ok(appointment)
  }

  // ── Reads ─────────────────────────────────────────────────────────────

  pub async fn get(&self, id: Uuid, actor: &Actor) -> Result<Appointment> {
    self.load_visible(id, actor).await
  }

  /// Appointments visible to `actor`, optionally filtered by status.
  pub async fn list(
    &self,
    actor: &Actor,
    status: Option<AppointmentStatus>,
  ) -> Result<Vec<Appointment>> {
    let query = match actor.role {
      Role::Client => AppointmentQuery {
        client_id: Some(actor.id),
        status,
        ..Default::default()
      },
      Role::Veterinarian => AppointmentQuery {
        vet_id: Some(actor.id),
        include_unassigned: true,
        status,
        ..Default::default()
      },
      Role::Admin => AppointmentQuery { status, ..Default::default() },
    };
    self.store.list_appointments(&query).await.map_err(Error::store)
  }

  /// Statuses `actor` may currently request for the appointment.
  pub async fn available_transitions(
    &self,
    id: Uuid,
    actor: &Actor,
  ) -> Result<Vec<AppointmentStatus>> {
    let appointment = self.load_visible(id, actor).await?;
    let relation = ActorRelation::of(actor, &appointment);
    Ok(authority::allowed_targets(appointment.status, actor.role, relation))
  }

  pub async fn history(
    &self,
    id: Uuid,
    actor: &Actor,
  ) -> Result<Vec<TransitionRecord>> {
    self.load_visible(id, actor).await?;
    self.store.transition_history(id).await.map_err(Error::store)
  }

  // ── Writes ────────────────────────────────────────────────────────────

  /// Book a new appointment for the acting client.
  pub async fn create(
    &self,
    actor: &Actor,
    request: BookAppointment,
  ) -> Result<TransitionOutcome> {
    if actor.role != Role::Client {
      return Err(Error::PermissionDenied(format!(
        "a {} cannot book appointments",
        actor.role
      )));
    }
    ensure_future(request.scheduled_at)?;

    let appointment = self
      .store
      .create_appointment(
        NewAppointment {
          client_id:    actor.id,
          pet_id:       request.pet_id,
          service_id:   request.service_id,
          vet_id:       request.vet_id,
          scheduled_at: request.scheduled_at,
          notes:        request.notes,
        },
        *actor,
      )
      .await
      .map_err(Error::store)?;

    tracing::info!(
      appointment_id = %appointment.appointment_id,
      actor_id = %actor.id,
      scheduled_at = %appointment.scheduled_at,
      "appointment created"
    );

    let (delivered, undelivered) = self
      .fan_out(&appointment, actor, &authority::creation_fanout())
      .await;
    Ok(TransitionOutcome { appointment, delivered, undelivered })
  }

  /// Move an appointment to `request.target` on behalf of `actor`.
  ///
  /// Errors are local and safe to show: `PermissionDenied`,
  /// `InvalidTransition`, `InvalidSchedule`, `NotFound`, or `Conflict` when
  /// another actor got there first (re-fetch before retrying).
  pub async fn request_transition(
    &self,
    id: Uuid,
    request: TransitionRequest,
    actor: &Actor,
  ) -> Result<TransitionOutcome> {
    // Never trust a cached status; decide against what is persisted now.
    // Unrelated actors learn nothing, not even the current status.
    let current = self.load_visible(id, actor).await?;
    if let Some(expected) = request.expected
      && expected != current.status
    {
      return Err(Error::Conflict { current: current.status });
    }

    let relation = ActorRelation::of(actor, &current);
    let decision =
      authority::decide(current.status, request.target, actor.role, relation)?;

    let rescheduling = current.status == AppointmentStatus::Accepted
      && request.target == AppointmentStatus::Pending;
    match (rescheduling, request.scheduled_at) {
      (true, Some(at)) => ensure_future(at)?,
      (true, None) => {
        return Err(Error::InvalidSchedule(
          "a reschedule needs a new scheduled time".into(),
        ));
      }
      (false, Some(_)) => {
        return Err(Error::InvalidSchedule(
          "only a reschedule may change the scheduled time".into(),
        ));
      }
      (false, None) => {}
    }

    let update = ConditionalUpdate {
      appointment_id:  id,
      expected_status: current.status,
      new_status:      request.target,
      scheduled_at:    request.scheduled_at,
      assign_vet:      decision.assign_actor.then_some(actor.id),
      actor:           *actor,
    };

    let appointment =
      match self.store.update_status(update).await.map_err(Error::store)? {
        UpdateOutcome::Applied(a) => a,
        UpdateOutcome::Conflict { current } => {
          tracing::info!(
            appointment_id = %id,
            actor_id = %actor.id,
            %current,
            "transition lost a concurrent race"
          );
          return Err(Error::Conflict { current });
        }
        UpdateOutcome::NotFound => return Err(Error::NotFound(id)),
      };

    tracing::info!(
      appointment_id = %id,
      from = %current.status,
      to = %appointment.status,
      actor_id = %actor.id,
      role = %actor.role,
      "appointment transitioned"
    );

    let (delivered, undelivered) =
      self.fan_out(&appointment, actor, &decision.fanout).await;
    Ok(TransitionOutcome { appointment, delivered, undelivered })
  }

  /// Enqueue one notification per resolved recipient. Runs strictly after the
  /// status write has committed; failures are collected, not propagated.
  async fn fan_out(
    &self,
    appointment: &Appointment,
    actor: &Actor,
    intents: &[NotificationIntent],
  ) -> (Vec<Notification>, Vec<DeliveryFailure>) {
    let mut delivered = Vec::new();
    let mut undelivered = Vec::new();

    for (audience, kind) in resolve_recipients(appointment, actor, intents) {
      let input = NewNotification {
        audience,
        kind,
        appointment_id: Some(appointment.appointment_id),
        message: kind.render(appointment),
      };
      match self.channel.enqueue(input).await {
        Ok(n) => delivered.push(n),
        Err(e) => {
          tracing::warn!(
            appointment_id = %appointment.appointment_id,
            %audience,
            %kind,
            error = %e,
            notification_delivery_failed = true,
            "failed to enqueue notification"
          );
          undelivered.push(DeliveryFailure {
            audience,
            kind,
            reason: e.to_string(),
          });
        }
      }
    }

    (delivered, undelivered)
  }
}

/// Map intents onto concrete audiences, dropping the actor's own inbox,
/// an unassigned veterinarian, and duplicates.
pub fn resolve_recipients(
  appointment: &Appointment,
  actor: &Actor,
  intents: &[NotificationIntent],
) -> Vec<(Audience, NotificationKind)> {
  let mut resolved: Vec<(Audience, NotificationKind)> = Vec::new();
  for intent in intents {
    let audience = match intent.recipient {
      Recipient::Client => Some(Audience::User(appointment.client_id)),
      Recipient::AssignedVet => appointment.vet_id.map(Audience::User),
      Recipient::Admins => Some(Audience::Admin),
    };
    let Some(audience) = audience else { continue };
    if audience == Audience::User(actor.id) {
      continue;
    }
    if resolved.iter().any(|(a, _)| *a == audience) {
      continue;
    }
    resolved.push((audience, intent.kind));
  }
  resolved
}

fn ensure_future(at: DateTime<Utc>) -> Result<()> {
  if at <= Utc::now() {
    return Err(Error::InvalidSchedule(format!(
      "{at} is not in the future"
    )));
  }
  Ok(())
}

#[cfg(test)]
mod tests {
  use chrono::Duration;

  use super::*;
  use crate::notification::NotificationKind::*;

  fn appointment(vet_id: Option<Uuid>) -> Appointment {
    let now = Utc::now();
    Appointment {
      appointment_id: Uuid::new_v4(),
      client_id: Uuid::new_v4(),
      pet_id: Uuid::new_v4(),
      service_id: Uuid::new_v4(),
      vet_id,
      scheduled_at: now + Duration::days(1),
      status: AppointmentStatus::Pending,
      notes: String::new(),
      created_at: now,
      updated_at: now,
    }
  }

  #[test]
  fn client_cancel_reaches_vet_and_admins() {
    let vet = Uuid::new_v4();
    let appt = appointment(Some(vet));
    let client = Actor::new(appt.client_id, Role::Client);
    let decision = authority::decide(
      AppointmentStatus::Pending,
      AppointmentStatus::Cancelled,
      Role::Client,
      ActorRelation::Owner,
    )
    .unwrap();

    let resolved = resolve_recipients(&appt, &client, &decision.fanout);
    assert_eq!(resolved, vec![
      (Audience::User(vet), AppointmentCancelled),
      (Audience::Admin, AppointmentCancelled),
    ]);
  }

  #[test]
  fn unassigned_vet_recipient_is_skipped() {
    let appt = appointment(None);
    let client = Actor::new(appt.client_id, Role::Client);
    let resolved =
      resolve_recipients(&appt, &client, &authority::creation_fanout());
    assert_eq!(resolved, vec![(Audience::Admin, AppointmentCreated)]);
  }

  #[test]
  fn admin_audience_still_hears_about_admin_actions() {
    let appt = appointment(None);
    let admin = Actor::new(Uuid::new_v4(), Role::Admin);
    let decision = authority::decide(
      AppointmentStatus::Pending,
      AppointmentStatus::Rejected,
      Role::Admin,
      ActorRelation::Administrator,
    )
    .unwrap();
    let resolved = resolve_recipients(&appt, &admin, &decision.fanout);
    assert_eq!(resolved, vec![
      (Audience::User(appt.client_id), AppointmentRejected),
      (Audience::Admin, AppointmentRejected),
    ]);
  }

  #[test]
  fn reschedule_request_shape() {
    let at = Utc::now() + Duration::days(3);
    let req = TransitionRequest::reschedule(at)
      .expecting(AppointmentStatus::Accepted);
    assert_eq!(req.target, AppointmentStatus::Pending);
    assert_eq!(req.scheduled_at, Some(at));
    assert_eq!(req.expected, Some(AppointmentStatus::Accepted));
  }
}
