//! The `{message, code, data}` success envelope shared by every endpoint.

use axum::{
  Json,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct Envelope<T> {
  pub message: String,
  pub code:    u16,
  pub data:    T,
}

/// Wrap `data` in the envelope with `status` mirrored into `code`.
pub fn respond<T: Serialize>(
  status: StatusCode,
  message: impl Into<String>,
  data: T,
) -> Response {
  let body = Envelope { message: message.into(), code: status.as_u16(), data };
  (status, Json(body)).into_response()
}

pub fn ok<T: Serialize>(message: impl Into<String>, data: T) -> Response {
  respond(StatusCode::OK, message, data)
}
