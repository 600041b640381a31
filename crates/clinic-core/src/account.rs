//! Accounts and consultants: the thin external entities the engine reads.
//!
//! Identity and consultant verification belong to other subsystems; the
//! engine only needs an account's id, phone and role, and a consultant's id.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

// ─── Roles ───────────────────────────────────────────────────────────────────

/// The role carried by an account and by every authenticated caller.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Role {
  Client,
  Consultant,
  FulltimeConsultant,
  Admin,
}

impl Role {
  /// Both part-time and full-time consultants act through a consultant
  /// profile.
  pub fn is_consultant(self) -> bool {
    matches!(self, Self::Consultant | Self::FulltimeConsultant)
  }

  pub fn is_admin(self) -> bool { matches!(self, Self::Admin) }
}

/// Employment type of a consultant.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Default,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ConsultantKind {
  Fulltime,
  #[default]
  Parttime,
}

// ─── Accounts ────────────────────────────────────────────────────────────────

/// A login identity. Phone numbers are unique across all accounts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
  pub id:            i64,
  pub username:      String,
  pub phone:         String,
  pub email:         Option<String>,
  pub role:          Role,
  #[serde(skip_serializing)]
  pub password_hash: String,
  pub is_active:     bool,
  pub created_at:    DateTime<Utc>,
  pub updated_at:    DateTime<Utc>,
}

/// Input for [`ClientStore::add_account`](crate::store::ClientStore::add_account).
#[derive(Debug, Clone)]
pub struct NewAccount {
  pub username:      String,
  pub phone:         String,
  pub email:         Option<String>,
  pub role:          Role,
  /// Argon2 PHC string; hashing is the caller's job.
  pub password_hash: String,
}

impl NewAccount {
  /// The account auto-registered when a consultant enters a phone number
  /// nobody has used before.
  pub fn for_client_phone(phone: &str, password_hash: &str) -> Self {
    Self {
      username:      format!("client_{phone}"),
      phone:         phone.to_owned(),
      email:         None,
      role:          Role::Client,
      password_hash: password_hash.to_owned(),
    }
  }
}

// ─── Consultants ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Consultant {
  pub id:         i64,
  pub account_id: i64,
  pub kind:       ConsultantKind,
  pub verified:   bool,
  pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewConsultant {
  pub account_id: i64,
  pub kind:       ConsultantKind,
  pub verified:   bool,
}

/// Which unique account field a registration collided with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, AsRefStr)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum TakenField {
  Username,
  Phone,
  Email,
}

/// Result of registering a consultant account together with its profile.
#[derive(Debug, Clone)]
pub enum Registration {
  Registered { account: Account, consultant: Consultant },
  /// Nothing was written.
  Taken(TakenField),
}

// ─── Callers ─────────────────────────────────────────────────────────────────

/// What the identity provider vouches for: a user id and a role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
  pub user_id: i64,
  pub role:    Role,
}

/// An authenticated caller with its consultant profile resolved.
///
/// `consultant_id` is `Some` exactly when the role is a consultant role and
/// the directory holds a profile for the account.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
  pub user_id:       i64,
  pub role:          Role,
  pub consultant_id: Option<i64>,
}

impl Actor {
  pub fn admin(user_id: i64) -> Self {
    Self { user_id, role: Role::Admin, consultant_id: None }
  }

  pub fn consultant(user_id: i64, consultant_id: i64) -> Self {
    Self { user_id, role: Role::Consultant, consultant_id: Some(consultant_id) }
  }

  pub fn client(user_id: i64) -> Self {
    Self { user_id, role: Role::Client, consultant_id: None }
  }

  pub fn is_admin(&self) -> bool { self.role.is_admin() }
}
