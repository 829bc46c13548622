//! Handlers for `/appointments` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/appointments` | Appointments visible to the caller; optional `?status=` |
//! | `POST` | `/appointments` | Body: [`BookAppointment`]; returns 201 + [`AppointmentResponse`] |
//! | `GET`  | `/appointments/{id}` | Single appointment |
//! | `PUT`  | `/appointments/{id}` | Body: [`TransitionBody`]; returns [`AppointmentResponse`] |
//! | `GET`  | `/appointments/{id}/actions` | Statuses the caller may request now |
//! | `GET`  | `/appointments/{id}/history` | Transition audit log, oldest first |

use axum::{
  Json,
  extract::{Path, Query, State},
  http::StatusCode,
  response::IntoResponse,
};
use chrono::{DateTime, Utc};
use clinic_core::{
  appointment::{
    Appointment, AppointmentStatus, BookAppointment, TransitionRecord,
  },
  lifecycle::{
    DeliveryFailure, LifecycleController, TransitionOutcome, TransitionRequest,
  },
  store::ClinicStore,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  error::{ApiError, ApiJson},
  identity::Identity,
};

// ─── Wire types ──────────────────────────────────────────────────────────────

/// JSON body accepted by `PUT /appointments/{id}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransitionBody {
  pub new_status:      AppointmentStatus,
  /// The status the caller last observed; a mismatch is a 409.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub expected_status: Option<AppointmentStatus>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub scheduled_at:    Option<DateTime<Utc>>,
}

impl From<TransitionBody> for TransitionRequest {
  fn from(b: TransitionBody) -> Self {
    TransitionRequest {
      target:       b.new_status,
      scheduled_at: b.scheduled_at,
      expected:     b.expected_status,
    }
  }
}

/// A committed write. `warnings` lists fan-out notifications that could not
/// be enqueued; the appointment change itself stands.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppointmentResponse {
  pub appointment: Appointment,
  #[serde(default)]
  pub warnings:    Vec<DeliveryFailure>,
}

impl From<TransitionOutcome> for AppointmentResponse {
  fn from(o: TransitionOutcome) -> Self {
    AppointmentResponse {
      appointment: o.appointment,
      warnings:    o.undelivered,
    }
  }
}

// ─── List ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ListParams {
  pub status: Option<String>,
}

/// `GET /appointments[?status=pending]`
pub async fn list<S: ClinicStore + 'static>(
  State(lc): State<LifecycleController<S>>,
  Identity(actor): Identity,
  Query(params): Query<ListParams>,
) -> Result<Json<Vec<Appointment>>, ApiError> {
  let status = params
    .status
    .as_deref()
    .map(|s| {
      s.parse::<AppointmentStatus>()
        .map_err(|_| ApiError::BadRequest(format!("unknown status {s:?}")))
    })
    .transpose()?;
  Ok(Json(lc.list(&actor, status).await?))
}

// ─── Create ───────────────────────────────────────────────────────────────────

/// `POST /appointments`: the caller books for themselves.
pub async fn create<S: ClinicStore + 'static>(
  State(lc): State<LifecycleController<S>>,
  Identity(actor): Identity,
  ApiJson(body): ApiJson<BookAppointment>,
) -> Result<impl IntoResponse, ApiError> {
  let outcome = lc.create(&actor, body).await?;
  Ok((StatusCode::CREATED, Json(AppointmentResponse::from(outcome))))
}

// ─── Get one ──────────────────────────────────────────────────────────────────

/// `GET /appointments/{id}`
pub async fn get_one<S: ClinicStore + 'static>(
  State(lc): State<LifecycleController<S>>,
  Identity(actor): Identity,
  Path(id): Path<Uuid>,
) -> Result<Json<Appointment>, ApiError> {
  Ok(Json(lc.get(id, &actor).await?))
}

// ─── Transition ───────────────────────────────────────────────────────────────

/// `PUT /appointments/{id}`
pub async fn transition<S: ClinicStore + 'static>(
  State(lc): State<LifecycleController<S>>,
  Identity(actor): Identity,
  Path(id): Path<Uuid>,
  ApiJson(body): ApiJson<TransitionBody>,
) -> Result<Json<AppointmentResponse>, ApiError> {
  let outcome = lc.request_transition(id, body.into(), &actor).await?;
  Ok(Json(outcome.into()))
}

// ─── Affordances / history ───────────────────────────────────────────────────

/// `GET /appointments/{id}/actions`
pub async fn actions<S: ClinicStore + 'static>(
  State(lc): State<LifecycleController<S>>,
  Identity(actor): Identity,
  Path(id): Path<Uuid>,
) -> Result<Json<Vec<AppointmentStatus>>, ApiError> {
  Ok(Json(lc.available_transitions(id, &actor).await?))
}

/// `GET /appointments/{id}/history`
pub async fn history<S: ClinicStore + 'static>(
  State(lc): State<LifecycleController<S>>,
  Identity(actor): Identity,
  Path(id): Path<Uuid>,
) -> Result<Json<Vec<TransitionRecord>>, ApiError> {
  Ok(Json(lc.history(id, &actor).await?))
}
