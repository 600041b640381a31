//! The `ClientStore` trait and supporting query types.
//!
//! The trait is implemented by storage backends (e.g. `clinic-store-sqlite`).
//! The API layer depends on this abstraction, not on any concrete backend.
//!
//! Operations that take `now` never read the wall clock themselves; callers
//! pass the instant so sweeps and contact events are reproducible in tests.

use std::future::Future;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
  account::{Account, Consultant, ConsultantKind, NewAccount, NewConsultant, Registration},
  assignment::{ClaimOutcome, ClaimRequest},
  client::{Client, ClientPatch, Reassignment},
  sweep::OrphanThreshold,
};

// ─── Query types ─────────────────────────────────────────────────────────────

/// Parameters for [`ClientStore::list_clients`].
#[derive(Debug, Clone, Default)]
pub struct ClientQuery {
  /// Restrict to clients assigned to this consultant.
  pub consultant_id: Option<i64>,
  pub is_orphan:     Option<bool>,
  /// Clients carrying at least one of these tags. Empty means no filter.
  pub any_tags:      Vec<String>,
  /// Substring match over name and contact phone.
  pub text:          Option<String>,
}

/// Parameters for [`ClientStore::list_consultants`].
#[derive(Debug, Clone, Default)]
pub struct ConsultantQuery {
  pub kind:     Option<ConsultantKind>,
  pub verified: Option<bool>,
}

/// Roster figures for one consultant over a trailing window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsultantStats {
  pub consultant_id:  i64,
  pub window_days:    u32,
  pub total_clients:  u64,
  /// Clients contacted within the window.
  pub active_clients: u64,
  pub orphan_clients: u64,
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over a clinic store backend.
///
/// Single-client writes return `None` when the client does not exist.
/// All methods return `Send` futures so the trait can be used in
/// multi-threaded async runtimes (e.g. tokio with `axum`).
pub trait ClientStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Accounts ──────────────────────────────────────────────────────────

  fn get_account(
    &self,
    id: i64,
  ) -> impl Future<Output = Result<Option<Account>, Self::Error>> + Send + '_;

  fn find_account_by_phone<'a>(
    &'a self,
    phone: &'a str,
  ) -> impl Future<Output = Result<Option<Account>, Self::Error>> + Send + 'a;

  fn add_account(
    &self,
    input: NewAccount,
  ) -> impl Future<Output = Result<Account, Self::Error>> + Send + '_;

  // ── Consultants ───────────────────────────────────────────────────────

  fn add_consultant(
    &self,
    input: NewConsultant,
  ) -> impl Future<Output = Result<Consultant, Self::Error>> + Send + '_;

  /// Insert a consultant account and its profile in one transaction.
  /// A username, phone or email already in use yields
  /// [`Registration::Taken`] and writes nothing.
  fn register_consultant(
    &self,
    account: NewAccount,
    kind: ConsultantKind,
    verified: bool,
  ) -> impl Future<Output = Result<Registration, Self::Error>> + Send + '_;

  fn list_consultants<'a>(
    &'a self,
    query: &'a ConsultantQuery,
  ) -> impl Future<Output = Result<Vec<Consultant>, Self::Error>> + Send + 'a;

  fn set_consultant_verified(
    &self,
    id: i64,
    verified: bool,
  ) -> impl Future<Output = Result<Option<Consultant>, Self::Error>> + Send + '_;

  fn get_consultant(
    &self,
    id: i64,
  ) -> impl Future<Output = Result<Option<Consultant>, Self::Error>> + Send + '_;

  /// The consultant profile owned by an account, if any.
  fn consultant_for_account(
    &self,
    account_id: i64,
  ) -> impl Future<Output = Result<Option<Consultant>, Self::Error>> + Send + '_;

  // ── Clients ───────────────────────────────────────────────────────────

  fn get_client(
    &self,
    id: i64,
  ) -> impl Future<Output = Result<Option<Client>, Self::Error>> + Send + '_;

  fn list_clients<'a>(
    &'a self,
    query: &'a ClientQuery,
  ) -> impl Future<Output = Result<Vec<Client>, Self::Error>> + Send + 'a;

  /// Create a client for `request.phone`, or claim/reassign the existing
  /// one, per [`crate::assignment::decide`].
  ///
  /// The read, the decision and the write form one atomic transaction: of
  /// several callers racing for the same orphan exactly one observes it as
  /// orphaned. Rejections are returned as [`ClaimOutcome::Rejected`], not as
  /// errors, and leave storage untouched.
  fn create_or_claim(
    &self,
    request: ClaimRequest,
    now: DateTime<Utc>,
  ) -> impl Future<Output = Result<ClaimOutcome, Self::Error>> + Send + '_;

  /// Apply `patch` and, when given, `reassignment` in one transaction. An
  /// invalid patch leaves the client, including its holder, untouched.
  fn update_client(
    &self,
    id: i64,
    patch: ClientPatch,
    reassignment: Option<Reassignment>,
    now: DateTime<Utc>,
  ) -> impl Future<Output = Result<Option<Client>, Self::Error>> + Send + '_;

  /// Unconditional transfer to `consultant_id`; clears the orphan flag and
  /// refreshes `last_contact`.
  fn reassign(
    &self,
    id: i64,
    consultant_id: i64,
    now: DateTime<Utc>,
  ) -> impl Future<Output = Result<Option<Client>, Self::Error>> + Send + '_;

  /// Idempotent add/remove of one tag.
  fn set_tag(
    &self,
    id: i64,
    tag: String,
    add: bool,
    now: DateTime<Utc>,
  ) -> impl Future<Output = Result<Option<Client>, Self::Error>> + Send + '_;

  /// A consultant contacted the client: refresh `last_contact` and clear the
  /// orphan flag.
  fn record_contact(
    &self,
    id: i64,
    now: DateTime<Utc>,
  ) -> impl Future<Output = Result<Option<Client>, Self::Error>> + Send + '_;

  /// Flag every non-orphan client that is unassigned or has been silent
  /// longer than `threshold`. Returns the number of newly flagged clients.
  /// Assignments are left as they are.
  fn sweep(
    &self,
    threshold: OrphanThreshold,
    now: DateTime<Utc>,
  ) -> impl Future<Output = Result<u64, Self::Error>> + Send + '_;

  fn consultant_stats(
    &self,
    consultant_id: i64,
    window_days: u32,
    now: DateTime<Utc>,
  ) -> impl Future<Output = Result<ConsultantStats, Self::Error>> + Send + '_;
}
