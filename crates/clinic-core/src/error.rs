//! Error types for `clinic-core`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  /// Missing or malformed input; the caller can resubmit.
  #[error("{0}")]
  Validation(String),

  /// The caller's role or identity does not cover the request.
  #[error("{0}")]
  Forbidden(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
