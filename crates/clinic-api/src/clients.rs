//! Handlers for `/clients` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/clients` | Create or claim by phone; 201 created, 200 claimed/reassigned, 400 on conflict |
//! | `GET`  | `/clients` | `?is_orphan=&tag=a,b&q=`; admins may add `consultant_id` |
//! | `GET`  | `/clients/{id}` | |
//! | `PUT`  | `/clients/{id}` | Partial profile update; admins may pass `assigned_consultant_id` (`null` unassigns) |
//! | `POST` | `/clients/{id}/tags` | Body: `{"tag":"vip","add":true}` |
//! | `POST` | `/clients/{id}/contact` | Records contact, clears the orphan flag |
//! | `POST` | `/clients/{id}/reassign` | Admin only. Body: `{"consultant_id":7}` |
//! | `POST` | `/clients/orphan/check` | Admin only. Runs the orphan sweep |

use axum::{extract::State, http::StatusCode, response::Response};
use chrono::{DateTime, NaiveDate, Utc};
use clinic_core::{
  assignment::{ClaimOutcome, ClaimRequest},
  client::{AssignmentStatus, Client, ClientPatch, ClientProfile, Reassignment, Tags},
  policy::{self, Action},
  store::{ClientQuery, ClientStore},
  validate,
};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::json;

use crate::{
  AppState,
  auth::Caller,
  envelope::{self, ok},
  error::ApiError,
  extract::{Json, Path, Query},
};

// ─── Wire form ───────────────────────────────────────────────────────────────

/// A client as rendered on the wire. Tags travel as one comma-joined string.
#[derive(Debug, Clone, Serialize)]
pub struct ClientView {
  pub id:                     i64,
  pub account_id:             i64,
  pub name:                   String,
  pub gender:                 Option<String>,
  pub birth_date:             Option<NaiveDate>,
  pub address:                Option<String>,
  pub contact_phone:          String,
  pub tags:                   String,
  pub assigned_consultant_id: Option<i64>,
  pub is_orphan:              bool,
  pub assignment_status:      AssignmentStatus,
  pub last_contact:           Option<DateTime<Utc>>,
  pub created_at:             DateTime<Utc>,
  pub updated_at:             DateTime<Utc>,
}

impl From<Client> for ClientView {
  fn from(c: Client) -> Self {
    Self {
      assignment_status:      c.assignment_status(),
      tags:                   c.tags.joined(),
      id:                     c.id,
      account_id:             c.account_id,
      name:                   c.name,
      gender:                 c.gender,
      birth_date:             c.birth_date,
      address:                c.address,
      contact_phone:          c.contact_phone,
      assigned_consultant_id: c.assigned_consultant_id,
      is_orphan:              c.is_orphan,
      last_contact:           c.last_contact,
      created_at:             c.created_at,
      updated_at:             c.updated_at,
    }
  }
}

/// Success payload of create-or-claim: the client plus what happened to it.
#[derive(Debug, Serialize)]
struct ClaimView {
  status: &'static str,
  #[serde(flatten)]
  client: ClientView,
}

// ─── Shared lookups ──────────────────────────────────────────────────────────

pub(crate) async fn load_client<S: ClientStore>(
  store: &S,
  id: i64,
) -> Result<Client, ApiError> {
  store
    .get_client(id)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::NotFound(format!("client {id} not found")))
}

pub(crate) async fn ensure_consultant<S: ClientStore>(
  store: &S,
  id: i64,
) -> Result<(), ApiError> {
  store
    .get_consultant(id)
    .await
    .map_err(ApiError::store)?
    .map(|_| ())
    .ok_or_else(|| ApiError::NotFound(format!("consultant {id} not found")))
}

/// A single-row write found no row: the client disappeared after the lookup.
fn vanished(id: i64) -> ApiError { ApiError::NotFound(format!("client {id} not found")) }

fn non_blank(s: Option<String>) -> Option<String> {
  s.filter(|v| !v.trim().is_empty())
}

// ─── Create or claim ─────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CreateBody {
  pub name:                   Option<String>,
  pub phone:                  Option<String>,
  pub gender:                 Option<String>,
  pub birth_date:             Option<NaiveDate>,
  pub address:                Option<String>,
  /// Admin only; ignored for consultants.
  pub assigned_consultant_id: Option<i64>,
}

/// `POST /clients`
pub async fn create<S>(
  State(state): State<AppState<S>>,
  Caller(actor): Caller,
  Json(body): Json<CreateBody>,
) -> Result<Response, ApiError>
where
  S: ClientStore + Clone + Send + Sync + 'static,
{
  policy::authorize(&actor, Action::CreateClient)?;

  let (Some(name), Some(phone)) = (non_blank(body.name), non_blank(body.phone)) else {
    return Err(ApiError::BadRequest("name and phone are required".into()));
  };

  let requested = if actor.is_admin() { body.assigned_consultant_id } else { None };
  if let Some(id) = requested {
    ensure_consultant(state.store.as_ref(), id).await?;
  }

  let mut request = ClaimRequest {
    actor,
    phone,
    profile: ClientProfile {
      name,
      gender: body.gender,
      birth_date: body.birth_date,
      address: body.address,
    },
    requested_consultant_id: requested,
    placeholder_password_hash: state.placeholder_hash.to_string(),
  };
  request.validate()?;

  let outcome = state
    .store
    .create_or_claim(request, Utc::now())
    .await
    .map_err(ApiError::store)?;

  tracing::info!(
    user_id = actor.user_id,
    status = outcome.status(),
    client_id = outcome.client().map(|c| c.id),
    "create-or-claim"
  );

  let status = outcome.status();
  let (code, message, client) = match outcome {
    ClaimOutcome::Created(c) => (StatusCode::CREATED, "client created", c),
    ClaimOutcome::Claimed(c) => (StatusCode::OK, "orphaned client claimed", c),
    ClaimOutcome::Reassigned(c) => (StatusCode::OK, "client reassigned", c),
    ClaimOutcome::Rejected { reason, existing } => {
      return Err(ApiError::Conflict {
        message:  reason.message().to_owned(),
        existing: existing.map(|c| Box::new(ClientView::from(c))),
      });
    }
  };
  Ok(envelope::respond(code, message, ClaimView { status, client: client.into() }))
}

// ─── List ────────────────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
  pub is_orphan:     Option<bool>,
  /// Comma-separated; matches clients carrying any of them.
  pub tag:           Option<String>,
  pub q:             Option<String>,
  /// Admin only. Consultants always see their own clients.
  pub consultant_id: Option<i64>,
}

impl ListParams {
  pub(crate) fn into_query(self, consultant_id: Option<i64>) -> ClientQuery {
    ClientQuery {
      consultant_id,
      is_orphan: self.is_orphan,
      any_tags: self
        .tag
        .map(|t| Tags::parse_joined(&t).iter().map(str::to_owned).collect())
        .unwrap_or_default(),
      text: non_blank(self.q).map(|q| q.trim().to_owned()),
    }
  }
}

/// `GET /clients`
pub async fn list<S>(
  State(state): State<AppState<S>>,
  Caller(actor): Caller,
  Query(params): Query<ListParams>,
) -> Result<Response, ApiError>
where
  S: ClientStore + Clone + Send + Sync + 'static,
{
  policy::authorize(&actor, Action::ListClients)?;
  let scope = if actor.is_admin() { params.consultant_id } else { actor.consultant_id };
  let query = params.into_query(scope);

  let clients = state.store.list_clients(&query).await.map_err(ApiError::store)?;
  let views: Vec<ClientView> = clients.into_iter().map(Into::into).collect();
  Ok(ok("ok", views))
}

// ─── Get one ─────────────────────────────────────────────────────────────────

/// `GET /clients/{id}`
pub async fn get_one<S>(
  State(state): State<AppState<S>>,
  Caller(actor): Caller,
  Path(id): Path<i64>,
) -> Result<Response, ApiError>
where
  S: ClientStore + Clone + Send + Sync + 'static,
{
  let client = load_client(state.store.as_ref(), id).await?;
  policy::authorize(&actor, Action::ViewClient(&client))?;
  Ok(ok("ok", ClientView::from(client)))
}

// ─── Update ──────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct UpdateBody {
  #[serde(flatten)]
  pub patch:                  ClientPatch,
  /// Outer `None`: field absent, holder unchanged. `Some(None)`: explicit
  /// `null`, unassign.
  #[serde(default, deserialize_with = "present")]
  pub assigned_consultant_id: Option<Option<i64>>,
}

/// Marks a present field as `Some`, so `null` survives as `Some(None)`.
fn present<'de, D, T>(de: D) -> Result<Option<T>, D::Error>
where
  D: Deserializer<'de>,
  T: Deserialize<'de>,
{
  T::deserialize(de).map(Some)
}

/// `PUT /clients/{id}`
pub async fn update<S>(
  State(state): State<AppState<S>>,
  Caller(actor): Caller,
  Path(id): Path<i64>,
  Json(body): Json<UpdateBody>,
) -> Result<Response, ApiError>
where
  S: ClientStore + Clone + Send + Sync + 'static,
{
  let store = state.store.as_ref();
  let client = load_client(store, id).await?;
  policy::authorize(&actor, Action::EditProfile(&client))?;

  let reassignment = match body.assigned_consultant_id {
    None => None,
    Some(target) => {
      policy::authorize(&actor, Action::Reassign)?;
      match target {
        Some(consultant_id) => {
          ensure_consultant(store, consultant_id).await?;
          Some(Reassignment::To(consultant_id))
        }
        None => Some(Reassignment::Unassign),
      }
    }
  };
  if body.patch.is_empty() && reassignment.is_none() {
    return Err(ApiError::BadRequest("no fields to update".into()));
  }
  body.patch.validate()?;

  let updated = store
    .update_client(id, body.patch, reassignment, Utc::now())
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| vanished(id))?;
  if let Some(change) = reassignment {
    tracing::info!(client_id = id, ?change, "client holder changed");
  }
  Ok(ok("client updated", ClientView::from(updated)))
}

// ─── Tags ────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct TagBody {
  pub tag: Option<String>,
  /// `false` removes the tag. Defaults to adding.
  pub add: Option<bool>,
}

/// `POST /clients/{id}/tags`
pub async fn tag<S>(
  State(state): State<AppState<S>>,
  Caller(actor): Caller,
  Path(id): Path<i64>,
  Json(body): Json<TagBody>,
) -> Result<Response, ApiError>
where
  S: ClientStore + Clone + Send + Sync + 'static,
{
  let Some(raw) = non_blank(body.tag) else {
    return Err(ApiError::BadRequest("tag is required".into()));
  };
  let tag = validate::tag(&raw)?;

  let store = state.store.as_ref();
  let client = load_client(store, id).await?;
  policy::authorize(&actor, Action::Tag(&client))?;

  let add = body.add.unwrap_or(true);
  let updated = store
    .set_tag(id, tag, add, Utc::now())
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| vanished(id))?;
  Ok(ok(if add { "tag added" } else { "tag removed" }, ClientView::from(updated)))
}

// ─── Contact ─────────────────────────────────────────────────────────────────

/// `POST /clients/{id}/contact`
pub async fn contact<S>(
  State(state): State<AppState<S>>,
  Caller(actor): Caller,
  Path(id): Path<i64>,
) -> Result<Response, ApiError>
where
  S: ClientStore + Clone + Send + Sync + 'static,
{
  let store = state.store.as_ref();
  let client = load_client(store, id).await?;
  policy::authorize(&actor, Action::RecordContact(&client))?;

  let updated = store
    .record_contact(id, Utc::now())
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| vanished(id))?;
  Ok(ok("contact recorded", ClientView::from(updated)))
}

// ─── Reassign ────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ReassignBody {
  pub consultant_id: i64,
}

/// `POST /clients/{id}/reassign`
pub async fn reassign<S>(
  State(state): State<AppState<S>>,
  Caller(actor): Caller,
  Path(id): Path<i64>,
  Json(body): Json<ReassignBody>,
) -> Result<Response, ApiError>
where
  S: ClientStore + Clone + Send + Sync + 'static,
{
  policy::authorize(&actor, Action::Reassign)?;
  let store = state.store.as_ref();
  load_client(store, id).await?;
  ensure_consultant(store, body.consultant_id).await?;

  let updated = store
    .reassign(id, body.consultant_id, Utc::now())
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| vanished(id))?;
  tracing::info!(client_id = id, consultant_id = body.consultant_id, "client reassigned");
  Ok(ok("client reassigned", ClientView::from(updated)))
}

// ─── Orphan sweep ────────────────────────────────────────────────────────────

/// `POST /clients/orphan/check`
pub async fn sweep<S>(
  State(state): State<AppState<S>>,
  Caller(actor): Caller,
) -> Result<Response, ApiError>
where
  S: ClientStore + Clone + Send + Sync + 'static,
{
  policy::authorize(&actor, Action::Sweep)?;
  let threshold = state.config.orphan_threshold_days;
  let count = state
    .store
    .sweep(threshold, Utc::now())
    .await
    .map_err(ApiError::store)?;
  tracing::info!(orphan_count = count, days = threshold.as_days(), "orphan sweep");
  Ok(ok("orphan check complete", json!({ "orphan_count": count })))
}
