//! [`SqliteStore`], the SQLite implementation of [`ClinicStore`].

use std::path::Path;

use chrono::Utc;
use rusqlite::OptionalExtension as _;
use uuid::Uuid;

use clinic_core::{
  actor::Actor,
  appointment::{
    Appointment, AppointmentStatus, NewAppointment, TransitionRecord,
  },
  notification::{Audience, NewNotification, Notification},
  store::{AppointmentQuery, ClinicStore, ConditionalUpdate, UpdateOutcome},
};

use crate::{
  Result,
  encode::{
    APPOINTMENT_COLUMNS, NOTIFICATION_COLUMNS, RawAppointment,
    RawNotification, RawTransition, decode_status, encode_dt, encode_uuid,
  },
  schema::SCHEMA,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A clinic store backed by a single SQLite file.
///
/// Cloning is cheap: the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

/// What the conditional write saw inside its transaction.
enum CasResult {
  Applied(RawAppointment),
  /// No row matched; carries the current status if the row exists at all.
  Missed(Option<String>),
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store, for tests.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}

/// `?, ?, ?` for `n` positional parameters.
fn placeholders(n: usize) -> String { vec!["?"; n].join(", ") }

fn insert_transition(
  tx: &rusqlite::Transaction<'_>,
  appointment_id: &str,
  from: Option<&str>,
  to: &str,
  actor: Actor,
  at: &str,
) -> rusqlite::Result<()> {
  tx.execute(
    "INSERT INTO appointment_transitions (
       transition_id, appointment_id, from_status, to_status,
       actor_id, actor_role, recorded_at
     ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
    rusqlite::params![
      encode_uuid(Uuid::new_v4()),
      appointment_id,
      from,
      to,
      encode_uuid(actor.id),
      actor.role.as_str(),
      at,
    ],
  )?;
  Ok(())
}

// ─── ClinicStore impl ────────────────────────────────────────────────────────

impl ClinicStore for SqliteStore {
  type Error = crate::Error;

  // ── Appointments ──────────────────────────────────────────────────────────

  async fn create_appointment(
    &self,
    input: NewAppointment,
    actor: Actor,
  ) -> Result<Appointment> {
    let now = Utc::now();
    let appointment = Appointment {
      appointment_id: Uuid::new_v4(),
      client_id:      input.client_id,
      pet_id:         input.pet_id,
      service_id:     input.service_id,
      vet_id:         input.vet_id,
      scheduled_at:   input.scheduled_at,
      status:         AppointmentStatus::Pending,
      notes:          input.notes,
      created_at:     now,
      updated_at:     now,
    };

    let id_str        = encode_uuid(appointment.appointment_id);
    let client_str    = encode_uuid(appointment.client_id);
    let pet_str       = encode_uuid(appointment.pet_id);
    let service_str   = encode_uuid(appointment.service_id);
    let vet_str       = appointment.vet_id.map(encode_uuid);
    let scheduled_str = encode_dt(appointment.scheduled_at);
    let status_str    = appointment.status.as_str();
    let notes         = appointment.notes.clone();
    let at_str        = encode_dt(now);

    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        tx.execute(
          "INSERT INTO appointments (
             appointment_id, client_id, pet_id, service_id, vet_id,
             scheduled_at, status, notes, created_at, updated_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?9)",
          rusqlite::params![
            id_str,
            client_str,
            pet_str,
            service_str,
            vet_str,
            scheduled_str,
            status_str,
            notes,
            at_str,
          ],
        )?;
        insert_transition(&tx, &id_str, None, status_str, actor, &at_str)?;
        tx.commit()?;
        Ok(())
      })
      .await?;

    Ok(appointment)
  }

  async fn get_appointment(&self, id: Uuid) -> Result<Option<Appointment>> {
    let id_str = encode_uuid(id);

    let raw: Option<RawAppointment> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!(
                "SELECT {APPOINTMENT_COLUMNS} FROM appointments
                 WHERE appointment_id = ?1"
              ),
              rusqlite::params![id_str],
              RawAppointment::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawAppointment::into_appointment).transpose()
  }

  async fn list_appointments(
    &self,
    query: &AppointmentQuery,
  ) -> Result<Vec<Appointment>> {
    let mut conds: Vec<&'static str> = vec![];
    let mut args: Vec<String> = vec![];

    if let Some(client) = query.client_id {
      conds.push("client_id = ?");
      args.push(encode_uuid(client));
    }
    if let Some(vet) = query.vet_id {
      conds.push(if query.include_unassigned {
        "(vet_id = ? OR (vet_id IS NULL AND status = 'pending'))"
      } else {
        "vet_id = ?"
      });
      args.push(encode_uuid(vet));
    }
    if let Some(status) = query.status {
      conds.push("status = ?");
      args.push(status.as_str().to_owned());
    }

    let where_clause = if conds.is_empty() {
      String::new()
    } else {
      format!("WHERE {}", conds.join(" AND "))
    };
    let sql = format!(
      "SELECT {APPOINTMENT_COLUMNS} FROM appointments
       {where_clause}
       ORDER BY scheduled_at ASC, rowid ASC"
    );

    let raws: Vec<RawAppointment> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(
            rusqlite::params_from_iter(args.iter()),
            RawAppointment::from_row,
          )?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawAppointment::into_appointment).collect()
  }

  async fn update_status(
    &self,
    update: ConditionalUpdate,
  ) -> Result<UpdateOutcome> {
    let id_str        = encode_uuid(update.appointment_id);
    let expected_str  = update.expected_status.as_str();
    let new_str       = update.new_status.as_str();
    let scheduled_str = update.scheduled_at.map(encode_dt);
    let vet_str       = update.assign_vet.map(encode_uuid);
    let at_str        = encode_dt(Utc::now());
    let actor         = update.actor;

    let result = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let changed = tx.execute(
          "UPDATE appointments
              SET status       = ?1,
                  scheduled_at = COALESCE(?2, scheduled_at),
                  vet_id       = COALESCE(vet_id, ?3),
                  updated_at   = ?4
            WHERE appointment_id = ?5
              AND status = ?6",
          rusqlite::params![
            new_str,
            scheduled_str,
            vet_str,
            at_str,
            id_str,
            expected_str,
          ],
        )?;

        if changed == 0 {
          let current: Option<String> = tx
            .query_row(
              "SELECT status FROM appointments WHERE appointment_id = ?1",
              rusqlite::params![id_str],
              |r| r.get(0),
            )
            .optional()?;
          return Ok(CasResult::Missed(current));
        }

        insert_transition(
          &tx,
          &id_str,
          Some(expected_str),
          new_str,
          actor,
          &at_str,
        )?;
        let raw = tx.query_row(
          &format!(
            "SELECT {APPOINTMENT_COLUMNS} FROM appointments
             WHERE appointment_id = ?1"
          ),
          rusqlite::params![id_str],
          RawAppointment::from_row,
        )?;
        tx.commit()?;
        Ok(CasResult::Applied(raw))
      })
      .await?;

    match result {
      CasResult::Applied(raw) => {
        Ok(UpdateOutcome::Applied(raw.into_appointment()?))
      }
      CasResult::Missed(Some(current)) => Ok(UpdateOutcome::Conflict {
        current: decode_status(&current)?,
      }),
      CasResult::Missed(None) => Ok(UpdateOutcome::NotFound),
    }
  }

  async fn transition_history(
    &self,
    appointment_id: Uuid,
  ) -> Result<Vec<TransitionRecord>> {
    let id_str = encode_uuid(appointment_id);

    let raws: Vec<RawTransition> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT transition_id, appointment_id, from_status, to_status,
                  actor_id, actor_role, recorded_at
             FROM appointment_transitions
            WHERE appointment_id = ?1
            ORDER BY recorded_at ASC, rowid ASC",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![id_str], |row| {
            Ok(RawTransition {
              transition_id:  row.get(0)?,
              appointment_id: row.get(1)?,
              from_status:    row.get(2)?,
              to_status:      row.get(3)?,
              actor_id:       row.get(4)?,
              actor_role:     row.get(5)?,
              recorded_at:    row.get(6)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawTransition::into_record).collect()
  }

  // ── Notifications ─────────────────────────────────────────────────────────

  async fn enqueue_notification(
    &self,
    input: NewNotification,
  ) -> Result<Notification> {
    let notification = Notification {
      notification_id: Uuid::new_v4(),
      audience:        input.audience,
      kind:            input.kind,
      appointment_id:  input.appointment_id,
      message:         input.message,
      read:            false,
      created_at:      Utc::now(),
    };

    let id_str       = encode_uuid(notification.notification_id);
    let audience_str = notification.audience.to_string();
    let kind_str     = notification.kind.as_str();
    let appt_str     = notification.appointment_id.map(encode_uuid);
    let message      = notification.message.clone();
    let at_str       = encode_dt(notification.created_at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO notifications (
             notification_id, audience, kind, appointment_id,
             message, read, created_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, 0, ?6)",
          rusqlite::params![
            id_str,
            audience_str,
            kind_str,
            appt_str,
            message,
            at_str,
          ],
        )?;
        Ok(())
      })
      .await?;

    Ok(notification)
  }

  async fn list_notifications(
    &self,
    audience: Audience,
  ) -> Result<Vec<Notification>> {
    let audience_str = audience.to_string();

    let raws: Vec<RawNotification> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {NOTIFICATION_COLUMNS} FROM notifications
            WHERE audience = ?1
            ORDER BY created_at DESC, rowid DESC"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![audience_str], RawNotification::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawNotification::into_notification).collect()
  }

  async fn mark_notification_read(
    &self,
    id: Uuid,
    scope: Vec<Audience>,
  ) -> Result<()> {
    if scope.is_empty() {
      return Ok(());
    }
    let sql = format!(
      "UPDATE notifications SET read = 1
        WHERE notification_id = ? AND audience IN ({})",
      placeholders(scope.len())
    );
    let args: Vec<String> = std::iter::once(encode_uuid(id))
      .chain(scope.iter().map(Audience::to_string))
      .collect();

    self
      .conn
      .call(move |conn| {
        conn.execute(&sql, rusqlite::params_from_iter(args.iter()))?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn delete_notification(
    &self,
    id: Uuid,
    scope: Vec<Audience>,
  ) -> Result<()> {
    if scope.is_empty() {
      return Ok(());
    }
    let sql = format!(
      "DELETE FROM notifications
        WHERE notification_id = ? AND audience IN ({})",
      placeholders(scope.len())
    );
    let args: Vec<String> = std::iter::once(encode_uuid(id))
      .chain(scope.iter().map(Audience::to_string))
      .collect();

    self
      .conn
      .call(move |conn| {
        conn.execute(&sql, rusqlite::params_from_iter(args.iter()))?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn unread_count(&self, audience: Audience) -> Result<usize> {
    let audience_str = audience.to_string();

    let count: i64 = self
      .conn
      .call(move |conn| {
        Ok(conn.query_row(
          "SELECT COUNT(*) FROM notifications WHERE audience = ?1 AND read = 0",
          rusqlite::params![audience_str],
          |r| r.get(0),
        )?)
      })
      .await?;

    Ok(count as usize)
  }
}
