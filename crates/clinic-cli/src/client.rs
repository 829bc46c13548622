//! Async HTTP client wrapping the clinic JSON API.
//!
//! Transitions are reconciled against the server: a lost race re-fetches the
//! appointment before reporting the conflict, and a timeout or dropped
//! connection re-fetches to find out whether the write landed.

use std::time::Duration;

use chrono::{DateTime, Utc};
use clinic_api::{
  ACTOR_ID_HEADER, ACTOR_ROLE_HEADER, ErrorBody,
  appointments::{AppointmentResponse, TransitionBody},
  notifications::UnreadCount,
};
use clinic_core::{
  actor::Actor,
  appointment::{
    Appointment, AppointmentStatus, BookAppointment, TransitionRecord,
  },
  notification::{Audience, Notification},
};
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use thiserror::Error;
use uuid::Uuid;

// ─── Errors ───────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ClientError {
  #[error("{0}")]
  PermissionDenied(String),

  #[error("{0}")]
  InvalidTransition(String),

  #[error("{0}")]
  InvalidSchedule(String),

  /// Someone else changed the appointment first. `latest` is the re-fetched
  /// record when it could be loaded.
  #[error("the appointment was changed by someone else; review it and try again")]
  Conflict {
    current: Option<AppointmentStatus>,
    latest:  Option<Box<Appointment>>,
  },

  #[error("{0}")]
  NotFound(String),

  #[error("{0}")]
  Unauthorized(String),

  #[error("{0}")]
  BadRequest(String),

  #[error("server error ({status}): {message}")]
  Server { status: u16, message: String },

  /// A proxy answered 502/503/504 on the server's behalf. The request may or
  /// may not have been applied.
  #[error("gateway error ({0})")]
  Gateway(u16),

  /// The request may or may not have been applied.
  #[error("the server did not answer in time")]
  Timeout,

  /// The request may or may not have been applied.
  #[error("network unavailable: {0}")]
  NetworkUnavailable(String),

  #[error("http error: {0}")]
  Http(reqwest::Error),
}

impl ClientError {
  /// Whether the outcome of the request is unknown.
  pub fn is_ambiguous(&self) -> bool {
    matches!(
      self,
      Self::Timeout | Self::NetworkUnavailable(_) | Self::Gateway(_)
    )
  }
}

impl From<reqwest::Error> for ClientError {
  fn from(e: reqwest::Error) -> Self {
    if e.is_timeout() {
      Self::Timeout
    } else if e.is_connect() {
      Self::NetworkUnavailable(e.to_string())
    } else {
      Self::Http(e)
    }
  }
}

/// Map a non-2xx response back onto the error taxonomy.
fn rejection(status: StatusCode, body: Option<ErrorBody>) -> ClientError {
  let Some(body) = body else {
    if matches!(
      status,
      StatusCode::BAD_GATEWAY
        | StatusCode::SERVICE_UNAVAILABLE
        | StatusCode::GATEWAY_TIMEOUT
    ) {
      return ClientError::Gateway(status.as_u16());
    }
    return ClientError::Server {
      status:  status.as_u16(),
      message: status.to_string(),
    };
  };
  match body.kind.as_str() {
    "permission_denied" => ClientError::PermissionDenied(body.error),
    "invalid_transition" => ClientError::InvalidTransition(body.error),
    "invalid_schedule" => ClientError::InvalidSchedule(body.error),
    "conflict" => ClientError::Conflict { current: body.current, latest: None },
    "not_found" => ClientError::NotFound(body.error),
    "unauthorized" => ClientError::Unauthorized(body.error),
    "bad_request" => ClientError::BadRequest(body.error),
    _ => ClientError::Server {
      status:  status.as_u16(),
      message: body.error,
    },
  }
}

// ─── Reconciliation ───────────────────────────────────────────────────────────

/// What a re-fetched appointment says about a transition whose response was
/// lost.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reconciled {
  /// The persisted record already reflects the request.
  Applied,
  /// The persisted record still shows the status the request expected.
  NotApplied,
  /// Someone else moved the appointment elsewhere.
  Diverged,
}

pub fn reconcile(
  request: &TransitionBody,
  expected: AppointmentStatus,
  observed: &Appointment,
) -> Reconciled {
  let time_matches = request.scheduled_at.is_none_or(|at| {
    at.timestamp_micros() == observed.scheduled_at.timestamp_micros()
  });
  if observed.status == request.new_status && time_matches {
    Reconciled::Applied
  } else if observed.status == expected {
    Reconciled::NotApplied
  } else {
    Reconciled::Diverged
  }
}

/// Result of [`ApiClient::transition`].
#[derive(Debug, Clone)]
pub enum Transitioned {
  /// The server confirmed the write.
  Committed(AppointmentResponse),
  /// The response was lost but the write is persisted.
  Applied(Appointment),
  /// The response was lost and the write did not happen; safe to retry.
  NotApplied(Appointment),
}

impl Transitioned {
  pub fn appointment(&self) -> &Appointment {
    match self {
      Self::Committed(r) => &r.appointment,
      Self::Applied(a) | Self::NotApplied(a) => a,
    }
  }
}

// ─── Client ───────────────────────────────────────────────────────────────────

/// Connection settings for the clinic API.
#[derive(Debug, Clone)]
pub struct ApiConfig {
  pub base_url: String,
  pub actor:    Actor,
  pub timeout:  Duration,
}

/// Async HTTP client for the clinic JSON REST API.
///
/// Cheap to clone: the inner [`reqwest::Client`] is `Arc`-based.
#[derive(Clone)]
pub struct ApiClient {
  client: Client,
  config: ApiConfig,
}

impl ApiClient {
  pub fn new(config: ApiConfig) -> Result<Self, ClientError> {
    let client = Client::builder()
      .timeout(config.timeout)
      .build()
      .map_err(ClientError::Http)?;
    Ok(Self { client, config })
  }

  pub fn actor(&self) -> &Actor { &self.config.actor }

  fn url(&self, path: &str) -> String {
    format!("{}/api{}", self.config.base_url.trim_end_matches('/'), path)
  }

  fn request(&self, method: Method, path: &str) -> RequestBuilder {
    let actor = &self.config.actor;
    self
      .client
      .request(method, self.url(path))
      .header(ACTOR_ID_HEADER, actor.id.to_string())
      .header(ACTOR_ROLE_HEADER, actor.role.as_str())
  }

  async fn send_raw(
    &self,
    req: RequestBuilder,
  ) -> Result<reqwest::Response, ClientError> {
    let resp = req.send().await?;
    let status = resp.status();
    if status.is_success() {
      return Ok(resp);
    }
    let body = resp.json::<ErrorBody>().await.ok();
    Err(rejection(status, body))
  }

  async fn send<T: DeserializeOwned>(
    &self,
    req: RequestBuilder,
  ) -> Result<T, ClientError> {
    Ok(self.send_raw(req).await?.json().await?)
  }

  // ── Appointments ──────────────────────────────────────────────────────────

  /// `GET /api/appointments[?status=<s>]`
  pub async fn list_appointments(
    &self,
    status: Option<AppointmentStatus>,
  ) -> Result<Vec<Appointment>, ClientError> {
    let mut req = self.request(Method::GET, "/appointments");
    if let Some(status) = status {
      req = req.query(&[("status", status.as_str())]);
    }
    self.send(req).await
  }

  /// `GET /api/appointments/{id}`
  pub async fn get_appointment(&self, id: Uuid) -> Result<Appointment, ClientError> {
    self
      .send(self.request(Method::GET, &format!("/appointments/{id}")))
      .await
  }

  /// `POST /api/appointments`
  pub async fn book(
    &self,
    booking: &BookAppointment,
  ) -> Result<AppointmentResponse, ClientError> {
    self
      .send(self.request(Method::POST, "/appointments").json(booking))
      .await
  }

  /// `GET /api/appointments/{id}/actions`
  pub async fn actions(
    &self,
    id: Uuid,
  ) -> Result<Vec<AppointmentStatus>, ClientError> {
    self
      .send(self.request(Method::GET, &format!("/appointments/{id}/actions")))
      .await
  }

  /// `GET /api/appointments/{id}/history`
  pub async fn history(
    &self,
    id: Uuid,
  ) -> Result<Vec<TransitionRecord>, ClientError> {
    self
      .send(self.request(Method::GET, &format!("/appointments/{id}/history")))
      .await
  }

  /// `PUT /api/appointments/{id}`, reconciled.
  ///
  /// `expected` is the status the caller last saw. On a conflict the fresh
  /// record is attached to the error. On a timeout, connection failure or
  /// gateway error the appointment is re-fetched; if that fails too the first error is
  /// returned and the outcome stays unknown.
  pub async fn transition(
    &self,
    id: Uuid,
    expected: AppointmentStatus,
    new_status: AppointmentStatus,
    scheduled_at: Option<DateTime<Utc>>,
  ) -> Result<Transitioned, ClientError> {
    let body = TransitionBody {
      new_status,
      expected_status: Some(expected),
      scheduled_at,
    };
    let sent = self
      .send::<AppointmentResponse>(
        self
          .request(Method::PUT, &format!("/appointments/{id}"))
          .json(&body),
      )
      .await;

    match sent {
      Ok(resp) => Ok(Transitioned::Committed(resp)),
      Err(ClientError::Conflict { current, .. }) => {
        let latest = self.get_appointment(id).await.ok();
        Err(ClientError::Conflict {
          current: latest.as_ref().map(|a| a.status).or(current),
          latest:  latest.map(Box::new),
        })
      }
      Err(e) if e.is_ambiguous() => {
        tracing::warn!(appointment_id = %id, error = %e, "transition outcome unknown, re-fetching");
        let Ok(observed) = self.get_appointment(id).await else {
          return Err(e);
        };
        match reconcile(&body, expected, &observed) {
          Reconciled::Applied => Ok(Transitioned::Applied(observed)),
          Reconciled::NotApplied => Ok(Transitioned::NotApplied(observed)),
          Reconciled::Diverged => Err(ClientError::Conflict {
            current: Some(observed.status),
            latest:  Some(Box::new(observed)),
          }),
        }
      }
      Err(e) => Err(e),
    }
  }

  // ── Notifications ─────────────────────────────────────────────────────────

  /// `GET /api/notifications?audience=<a>`
  pub async fn notifications(
    &self,
    audience: Audience,
  ) -> Result<Vec<Notification>, ClientError> {
    self
      .send(
        self
          .request(Method::GET, "/notifications")
          .query(&[("audience", audience.to_string())]),
      )
      .await
  }

  /// `GET /api/notifications/unread?audience=<a>`
  pub async fn unread(&self, audience: Audience) -> Result<usize, ClientError> {
    let count: UnreadCount = self
      .send(
        self
          .request(Method::GET, "/notifications/unread")
          .query(&[("audience", audience.to_string())]),
      )
      .await?;
    Ok(count.unread)
  }

  /// `PUT /api/notifications/{id}/read`
  pub async fn mark_read(&self, id: Uuid) -> Result<(), ClientError> {
    self
      .send_raw(self.request(Method::PUT, &format!("/notifications/{id}/read")))
      .await
      .map(drop)
  }

  /// `DELETE /api/notifications/{id}`
  pub async fn delete_notification(&self, id: Uuid) -> Result<(), ClientError> {
    self
      .send_raw(self.request(Method::DELETE, &format!("/notifications/{id}")))
      .await
      .map(drop)
  }
}
