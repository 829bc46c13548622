//! API error type and [`axum::response::IntoResponse`] implementation.

use axum::{
  Json,
  extract::{FromRequest, rejection::JsonRejection},
  http::StatusCode,
  response::{IntoResponse, Response},
};
use clinic_core::appointment::AppointmentStatus;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error(transparent)]
  Core(#[from] clinic_core::Error),

  /// Missing or malformed actor identity headers.
  #[error("unauthorized: {0}")]
  Unauthorized(String),

  #[error("bad request: {0}")]
  BadRequest(String),
}

impl From<JsonRejection> for ApiError {
  fn from(rejection: JsonRejection) -> Self {
    ApiError::BadRequest(rejection.body_text())
  }
}

/// `Json` extractor whose rejections use [`ErrorBody`] like every other
/// failure.
#[derive(Debug, FromRequest)]
#[from_request(via(Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

/// JSON body of every non-2xx response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
  pub error:   String,
  pub kind:    String,
  /// Persisted status at the time of a `conflict`.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub current: Option<AppointmentStatus>,
}

impl ApiError {
  pub fn status(&self) -> StatusCode {
    use clinic_core::Error as E;
    match self {
      ApiError::Core(E::PermissionDenied(_)) => StatusCode::FORBIDDEN,
      ApiError::Core(E::InvalidTransition { .. } | E::InvalidSchedule(_)) => {
        StatusCode::UNPROCESSABLE_ENTITY
      }
      ApiError::Core(E::Conflict { .. }) => StatusCode::CONFLICT,
      ApiError::Core(E::NotFound(_)) => StatusCode::NOT_FOUND,
      ApiError::Core(E::InvalidAudience(_)) | ApiError::BadRequest(_) => {
        StatusCode::BAD_REQUEST
      }
      ApiError::Core(E::Store(_)) => StatusCode::INTERNAL_SERVER_ERROR,
      ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
    }
  }

  /// Stable machine-readable discriminant.
  pub fn kind(&self) -> &'static str {
    use clinic_core::Error as E;
    match self {
      ApiError::Core(E::PermissionDenied(_)) => "permission_denied",
      ApiError::Core(E::InvalidTransition { .. }) => "invalid_transition",
      ApiError::Core(E::InvalidSchedule(_)) => "invalid_schedule",
      ApiError::Core(E::Conflict { .. }) => "conflict",
      ApiError::Core(E::NotFound(_)) => "not_found",
      ApiError::Core(E::InvalidAudience(_)) | ApiError::BadRequest(_) => {
        "bad_request"
      }
      ApiError::Core(E::Store(_)) => "internal",
      ApiError::Unauthorized(_) => "unauthorized",
    }
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let status = self.status();
    if status == StatusCode::INTERNAL_SERVER_ERROR {
      tracing::error!(error = %self, "request failed");
    }
    let current = match &self {
      ApiError::Core(clinic_core::Error::Conflict { current }) => Some(*current),
      _ => None,
    };
    let body = ErrorBody {
      error: self.to_string(),
      kind: self.kind().to_owned(),
      current,
    };
    (status, Json(body)).into_response()
  }
}
