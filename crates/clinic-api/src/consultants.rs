//! Handlers for `/consultants` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/consultants` | Admin only. `?kind=fulltime&verified=true` |
//! | `POST` | `/consultants` | Admin only. Registers an account plus consultant profile |
//! | `GET`  | `/consultants/{id}` | |
//! | `POST` | `/consultants/{id}/verify` | Admin only |
//! | `GET`  | `/consultants/{id}/clients` | The consultant's roster; `?is_orphan=&tag=&q=` |
//! | `GET`  | `/consultants/{id}/stats` | `?days=30` |

use axum::{extract::State, http::StatusCode, response::Response};
use chrono::Utc;
use clinic_core::{
  account::{Account, Consultant, ConsultantKind, NewAccount, Registration, Role},
  policy::{self, Action},
  store::{ClientStore, ConsultantQuery},
  sweep, validate,
};
use serde::{Deserialize, Serialize};

use crate::{
  AppState,
  auth::Caller,
  clients::{ClientView, ListParams, ensure_consultant},
  envelope::{self, ok},
  error::ApiError,
  extract::{Json, Path, Query},
  password::hash_password,
};

// ─── Register ────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct RegisterBody {
  pub username: String,
  pub phone:    String,
  pub password: String,
  pub email:    Option<String>,
  #[serde(default)]
  pub kind:     ConsultantKind,
  #[serde(default)]
  pub verified: bool,
}

#[derive(Debug, Serialize)]
struct Registered {
  account:    Account,
  consultant: Consultant,
}

/// `POST /consultants`
pub async fn register<S>(
  State(state): State<AppState<S>>,
  Caller(actor): Caller,
  Json(body): Json<RegisterBody>,
) -> Result<Response, ApiError>
where
  S: ClientStore + Clone + Send + Sync + 'static,
{
  policy::authorize(&actor, Action::ManageConsultants)?;

  let username = body.username.trim().to_owned();
  if username.is_empty() {
    return Err(ApiError::BadRequest("username is required".into()));
  }
  if body.password.is_empty() {
    return Err(ApiError::BadRequest("password is required".into()));
  }
  let phone = body.phone.trim().to_owned();
  validate::phone(&phone)?;

  let password_hash = hash_password(&body.password)
    .map_err(|e| ApiError::BadRequest(format!("unusable password: {e}")))?;
  let role = match body.kind {
    ConsultantKind::Fulltime => Role::FulltimeConsultant,
    ConsultantKind::Parttime => Role::Consultant,
  };

  let account = NewAccount { username, phone, email: body.email, role, password_hash };
  let outcome = state
    .store
    .register_consultant(account, body.kind, body.verified)
    .await
    .map_err(ApiError::store)?;
  let (account, consultant) = match outcome {
    Registration::Registered { account, consultant } => (account, consultant),
    Registration::Taken(field) => {
      return Err(ApiError::BadRequest(format!("{field} already registered")));
    }
  };

  tracing::info!(account_id = account.id, consultant_id = consultant.id, "consultant registered");
  Ok(envelope::respond(
    StatusCode::CREATED,
    "consultant registered",
    Registered { account, consultant },
  ))
}

// ─── Directory ───────────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
pub struct DirectoryParams {
  pub kind:     Option<ConsultantKind>,
  pub verified: Option<bool>,
}

/// `GET /consultants`
pub async fn list_all<S>(
  State(state): State<AppState<S>>,
  Caller(actor): Caller,
  Query(params): Query<DirectoryParams>,
) -> Result<Response, ApiError>
where
  S: ClientStore + Clone + Send + Sync + 'static,
{
  policy::authorize(&actor, Action::ManageConsultants)?;
  let query = ConsultantQuery { kind: params.kind, verified: params.verified };
  let consultants = state.store.list_consultants(&query).await.map_err(ApiError::store)?;
  Ok(ok("ok", consultants))
}

/// `GET /consultants/{id}`
pub async fn get_one<S>(
  State(state): State<AppState<S>>,
  Caller(actor): Caller,
  Path(id): Path<i64>,
) -> Result<Response, ApiError>
where
  S: ClientStore + Clone + Send + Sync + 'static,
{
  policy::authorize(&actor, Action::ViewConsultant(id))?;
  let consultant = state
    .store
    .get_consultant(id)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::NotFound(format!("consultant {id} not found")))?;
  Ok(ok("ok", consultant))
}

/// `POST /consultants/{id}/verify`
pub async fn verify<S>(
  State(state): State<AppState<S>>,
  Caller(actor): Caller,
  Path(id): Path<i64>,
) -> Result<Response, ApiError>
where
  S: ClientStore + Clone + Send + Sync + 'static,
{
  policy::authorize(&actor, Action::ManageConsultants)?;
  let consultant = state
    .store
    .set_consultant_verified(id, true)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::NotFound(format!("consultant {id} not found")))?;
  tracing::info!(consultant_id = id, "consultant verified");
  Ok(ok("consultant verified", consultant))
}

// ─── Roster ──────────────────────────────────────────────────────────────────

/// `GET /consultants/{id}/clients`
pub async fn clients<S>(
  State(state): State<AppState<S>>,
  Caller(actor): Caller,
  Path(id): Path<i64>,
  Query(params): Query<ListParams>,
) -> Result<Response, ApiError>
where
  S: ClientStore + Clone + Send + Sync + 'static,
{
  policy::authorize(&actor, Action::ViewConsultant(id))?;
  let store = state.store.as_ref();
  ensure_consultant(store, id).await?;

  let query = params.into_query(Some(id));
  let clients = store.list_clients(&query).await.map_err(ApiError::store)?;
  let views: Vec<ClientView> = clients.into_iter().map(Into::into).collect();
  Ok(ok("ok", views))
}

// ─── Stats ───────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct StatsParams {
  pub days: Option<u32>,
}

/// `GET /consultants/{id}/stats`
pub async fn stats<S>(
  State(state): State<AppState<S>>,
  Caller(actor): Caller,
  Path(id): Path<i64>,
  Query(params): Query<StatsParams>,
) -> Result<Response, ApiError>
where
  S: ClientStore + Clone + Send + Sync + 'static,
{
  policy::authorize(&actor, Action::ViewConsultant(id))?;
  let store = state.store.as_ref();
  ensure_consultant(store, id).await?;

  let days = params.days.unwrap_or(30);
  if days == 0 {
    return Err(ApiError::BadRequest("days must be positive".into()));
  }
  let now = Utc::now();
  sweep::days_before(now, days)?;
  let stats = store
    .consultant_stats(id, days, now)
    .await
    .map_err(ApiError::store)?;
  Ok(ok("ok", stats))
}
