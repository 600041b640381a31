//! JSON REST API for the clinic client-assignment engine.
//!
//! Exposes an axum [`Router`] backed by any [`ClientStore`]. Every endpoint
//! requires a bearer token and answers with a `{message, code, data}`
//! envelope.

pub mod auth;
pub mod clients;
pub mod consultants;
pub mod envelope;
pub mod error;
pub mod extract;
pub mod password;

pub use error::ApiError;

use std::{path::PathBuf, sync::Arc, time::Duration};

use axum::{
  Router,
  routing::{get, post},
};
use chrono::Utc;
use clinic_core::{store::ClientStore, sweep::OrphanThreshold};
use serde::Deserialize;
use tokio::{task::JoinHandle, time::MissedTickBehavior};
use tower_http::trace::TraceLayer;

use auth::TokenKeys;

// ─── Configuration ────────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `config.toml` and
/// `CLINIC_*` environment variables.
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
  #[serde(default = "default_host")]
  pub host:                    String,
  #[serde(default = "default_port")]
  pub port:                    u16,
  pub store_path:              PathBuf,
  pub jwt_secret:              String,
  #[serde(default = "default_token_ttl")]
  pub token_ttl_secs:          u64,
  #[serde(default)]
  pub orphan_threshold_days:   OrphanThreshold,
  /// Run the orphan sweep on this interval. Unset disables the scheduler.
  #[serde(default)]
  pub sweep_interval_secs:     Option<u64>,
  /// Password given to accounts auto-registered by create-or-claim.
  #[serde(default = "default_client_password")]
  pub default_client_password: String,
}

fn default_host() -> String { "127.0.0.1".into() }
fn default_port() -> u16 { 8080 }
fn default_token_ttl() -> u64 { 24 * 60 * 60 }
fn default_client_password() -> String { "123456".into() }

// ─── Application state ────────────────────────────────────────────────────────

/// Shared state threaded through all axum handlers.
#[derive(Clone)]
pub struct AppState<S: ClientStore> {
  pub store:            Arc<S>,
  pub config:           Arc<ServerConfig>,
  pub keys:             Arc<TokenKeys>,
  /// Hash of `default_client_password`, computed once at startup.
  pub placeholder_hash: Arc<str>,
}

impl<S: ClientStore> AppState<S> {
  pub fn new(store: S, config: ServerConfig, placeholder_hash: String) -> Self {
    let keys = TokenKeys::from_secret(&config.jwt_secret, config.token_ttl_secs);
    Self {
      store:            Arc::new(store),
      config:           Arc::new(config),
      keys:             Arc::new(keys),
      placeholder_hash: placeholder_hash.into(),
    }
  }
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// Build the API router.
pub fn router<S>(state: AppState<S>) -> Router
where
  S: ClientStore + Clone + Send + Sync + 'static,
{
  Router::new()
    // Clients
    .route("/clients", get(clients::list::<S>).post(clients::create::<S>))
    .route("/clients/orphan/check", post(clients::sweep::<S>))
    .route("/clients/{id}", get(clients::get_one::<S>).put(clients::update::<S>))
    .route("/clients/{id}/tags", post(clients::tag::<S>))
    .route("/clients/{id}/contact", post(clients::contact::<S>))
    .route("/clients/{id}/reassign", post(clients::reassign::<S>))
    // Consultants
    .route(
      "/consultants",
      get(consultants::list_all::<S>).post(consultants::register::<S>),
    )
    .route("/consultants/{id}", get(consultants::get_one::<S>))
    .route("/consultants/{id}/verify", post(consultants::verify::<S>))
    .route("/consultants/{id}/clients", get(consultants::clients::<S>))
    .route("/consultants/{id}/stats", get(consultants::stats::<S>))
    .layer(TraceLayer::new_for_http())
    .with_state(state)
}

// ─── Scheduled sweep ──────────────────────────────────────────────────────────

/// Run the orphan sweep every `every`, forever. Failures are logged and the
/// next tick retries.
pub fn spawn_orphan_sweeper<S>(
  store: Arc<S>,
  threshold: OrphanThreshold,
  every: Duration,
) -> JoinHandle<()>
where
  S: ClientStore + 'static,
{
  tokio::spawn(async move {
    let mut ticker = tokio::time::interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
      ticker.tick().await;
      match store.sweep(threshold, Utc::now()).await {
        Ok(0) => tracing::debug!("scheduled orphan sweep: nothing to flag"),
        Ok(n) => tracing::info!(orphan_count = n, "scheduled orphan sweep"),
        Err(e) => tracing::warn!(error = %e, "scheduled orphan sweep failed"),
      }
    }
  })
}
