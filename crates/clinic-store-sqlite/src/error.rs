//! Error type for `clinic-store-sqlite`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] clinic_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  /// A column held a value the domain types cannot represent.
  #[error("decode error: {0}")]
  Decode(String),

  /// A row read earlier in a transaction was missing when written.
  #[error("client {0} disappeared mid-transaction")]
  ClientVanished(i64),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Smuggle a store error out of a `tokio_rusqlite` call closure.
pub(crate) fn other(e: impl Into<Error>) -> tokio_rusqlite::Error {
  tokio_rusqlite::Error::Other(Box::new(e.into()))
}

/// Undo [`other`]: recover our own error if the closure produced one.
pub(crate) fn lift(e: tokio_rusqlite::Error) -> Error {
  match e {
    tokio_rusqlite::Error::Other(boxed) => match boxed.downcast::<Error>() {
      Ok(ours) => *ours,
      Err(foreign) => Error::Database(tokio_rusqlite::Error::Other(foreign)),
    },
    e => Error::Database(e),
  }
}
