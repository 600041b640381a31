//! API error type and [`axum::response::IntoResponse`] implementation.
//!
//! Error bodies use the same `{message, code, data}` envelope as successes.

use axum::{
  Json,
  extract::rejection::{JsonRejection, PathRejection, QueryRejection},
  http::StatusCode,
  response::{IntoResponse, Response},
};
use serde_json::{Value, json};
use thiserror::Error;

use crate::clients::ClientView;

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error("unauthorized: {0}")]
  Unauthorized(String),

  #[error("forbidden: {0}")]
  Forbidden(String),

  #[error("not found: {0}")]
  NotFound(String),

  #[error("bad request: {0}")]
  BadRequest(String),

  /// A create-or-claim that another holder's claim blocked. Reported as 400
  /// with the existing record attached.
  #[error("conflict: {message}")]
  Conflict {
    message:  String,
    existing: Option<Box<ClientView>>,
  },

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl ApiError {
  pub fn store<E: std::error::Error + Send + Sync + 'static>(e: E) -> Self {
    Self::Store(Box::new(e))
  }
}

impl From<clinic_core::Error> for ApiError {
  fn from(e: clinic_core::Error) -> Self {
    match e {
      clinic_core::Error::Validation(m) => Self::BadRequest(m),
      clinic_core::Error::Forbidden(m) => Self::Forbidden(m),
    }
  }
}

impl From<JsonRejection> for ApiError {
  fn from(r: JsonRejection) -> Self { Self::BadRequest(r.body_text()) }
}

impl From<QueryRejection> for ApiError {
  fn from(r: QueryRejection) -> Self { Self::BadRequest(r.body_text()) }
}

impl From<PathRejection> for ApiError {
  fn from(r: PathRejection) -> Self { Self::BadRequest(r.body_text()) }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let (status, message, data) = match self {
      ApiError::Unauthorized(m) => (StatusCode::UNAUTHORIZED, m, Value::Null),
      ApiError::Forbidden(m) => (StatusCode::FORBIDDEN, m, Value::Null),
      ApiError::NotFound(m) => (StatusCode::NOT_FOUND, m, Value::Null),
      ApiError::BadRequest(m) => (StatusCode::BAD_REQUEST, m, Value::Null),
      ApiError::Conflict { message, existing } => {
        let data = existing
          .and_then(|c| serde_json::to_value(c).ok())
          .unwrap_or(Value::Null);
        (StatusCode::BAD_REQUEST, message, data)
      }
      ApiError::Store(e) => {
        tracing::error!(error = %e, "store failure");
        (StatusCode::INTERNAL_SERVER_ERROR, e.to_string(), Value::Null)
      }
    };
    let body = json!({ "message": message, "code": status.as_u16(), "data": data });
    (status, Json(body)).into_response()
  }
}
