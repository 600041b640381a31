//! The create-or-claim decision.
//!
//! Every path that adds a client (API, back-office tooling) funnels through
//! [`decide`]. The function is pure: the store calls it inside the same
//! transaction that reads the current account/client rows and applies the
//! resulting [`Decision`], so two racing callers can never both win.

use serde::{Deserialize, Serialize};

use crate::{
  Error, Result,
  account::{Account, Actor, Role},
  client::{Client, ClientProfile},
  validate,
};

// ─── Request ─────────────────────────────────────────────────────────────────

/// Input for [`ClientStore::create_or_claim`](crate::store::ClientStore::create_or_claim).
#[derive(Debug, Clone)]
pub struct ClaimRequest {
  pub actor:                     Actor,
  pub phone:                     String,
  pub profile:                   ClientProfile,
  /// Honoured for admins only; consultants always claim for themselves.
  pub requested_consultant_id:   Option<i64>,
  /// Stored on accounts auto-registered for unknown phone numbers.
  pub placeholder_password_hash: String,
}

impl ClaimRequest {
  /// Reject malformed input before any storage is touched.
  pub fn validate(&mut self) -> Result<()> {
    self.phone = self.phone.trim().to_owned();
    if self.phone.is_empty() {
      return Err(Error::Validation("phone is required".into()));
    }
    validate::phone(&self.phone)?;
    self.profile.name = validate::name(&self.profile.name)?;
    Ok(())
  }
}

// ─── Decision ────────────────────────────────────────────────────────────────

/// What the store found for the requested phone number.
#[derive(Debug, Clone, Copy)]
pub enum Existing<'a> {
  NoAccount,
  AccountWithoutClient(&'a Account),
  Client(&'a Client),
}

/// Why a create-or-claim call changed nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rejection {
  /// The caller already holds this client (or, for admins, nothing to do).
  DuplicateAssignment,
  /// Another consultant holds an active claim.
  AlreadyClaimed,
  /// The phone belongs to staff, not to a client.
  NotAClientAccount,
}

impl Rejection {
  pub fn message(self) -> &'static str {
    match self {
      Self::DuplicateAssignment => "client is already in your client list",
      Self::AlreadyClaimed => "client is already claimed by another consultant",
      Self::NotAClientAccount => "phone number belongs to a non-client account",
    }
  }
}

/// The write plan produced by [`decide`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
  /// Register a client account for the phone, then a client bound to it.
  CreateAccount { assign_to: Option<i64> },
  /// Bind a new client to an account that has none yet.
  CreateClient { account_id: i64, assign_to: Option<i64> },
  /// Take over an orphaned client.
  Claim { client_id: i64, consultant_id: i64 },
  /// Admin transfer, unconditional.
  Reassign { client_id: i64, consultant_id: i64 },
  Reject(Rejection),
}

/// Evaluate the four-branch create-or-claim rule against current state.
pub fn decide(
  actor: &Actor,
  existing: Existing<'_>,
  requested_consultant_id: Option<i64>,
) -> Result<Decision> {
  let assign_to = if actor.role.is_consultant() {
    let id = actor
      .consultant_id
      .ok_or_else(|| Error::Forbidden("a consultant profile is required".into()))?;
    Some(id)
  } else if actor.is_admin() {
    requested_consultant_id
  } else {
    return Err(Error::Forbidden("only consultants and admins may add clients".into()));
  };

  let decision = match existing {
    Existing::NoAccount => Decision::CreateAccount { assign_to },
    Existing::AccountWithoutClient(account) if account.role != Role::Client => {
      Decision::Reject(Rejection::NotAClientAccount)
    }
    Existing::AccountWithoutClient(account) => {
      Decision::CreateClient { account_id: account.id, assign_to }
    }
    Existing::Client(client) if actor.is_admin() => match assign_to {
      Some(consultant_id) => Decision::Reassign { client_id: client.id, consultant_id },
      None => Decision::Reject(Rejection::DuplicateAssignment),
    },
    Existing::Client(client) if client.is_assigned_to(actor.consultant_id) => {
      Decision::Reject(Rejection::DuplicateAssignment)
    }
    Existing::Client(client) if client.is_orphan => match assign_to {
      Some(consultant_id) => Decision::Claim { client_id: client.id, consultant_id },
      None => Decision::Reject(Rejection::AlreadyClaimed),
    },
    Existing::Client(_) => Decision::Reject(Rejection::AlreadyClaimed),
  };
  Ok(decision)
}

// ─── Outcome ─────────────────────────────────────────────────────────────────

/// Result of a create-or-claim call.
#[derive(Debug, Clone)]
pub enum ClaimOutcome {
  Created(Client),
  Claimed(Client),
  Reassigned(Client),
  /// No mutation happened. `existing` is attached so the caller can offer
  /// to view instead of create.
  Rejected { reason: Rejection, existing: Option<Client> },
}

impl ClaimOutcome {
  pub fn status(&self) -> &'static str {
    match self {
      Self::Created(_) => "created",
      Self::Claimed(_) => "claimed",
      Self::Reassigned(_) => "reassigned",
      Self::Rejected { reason: Rejection::DuplicateAssignment, .. } => "duplicate",
      Self::Rejected { reason: Rejection::AlreadyClaimed, .. } => "already_claimed",
      Self::Rejected { reason: Rejection::NotAClientAccount, .. } => "not_a_client",
    }
  }

  pub fn client(&self) -> Option<&Client> {
    match self {
      Self::Created(c) | Self::Claimed(c) | Self::Reassigned(c) => Some(c),
      Self::Rejected { existing, .. } => existing.as_ref(),
    }
  }

  pub fn is_success(&self) -> bool { !matches!(self, Self::Rejected { .. }) }
}

#[cfg(test)]
mod tests {
  use chrono::Utc;

  use super::*;
  use crate::client::tests::client;

  fn account(role: Role) -> Account {
    let now = Utc::now();
    Account {
      id: 10,
      username: "client_13800000001".into(),
      phone: "13800000001".into(),
      email: None,
      role,
      password_hash: String::new(),
      is_active: true,
      created_at: now,
      updated_at: now,
    }
  }

  #[test]
  fn unknown_phone_creates_account_for_consultant() {
    let d = decide(&Actor::consultant(1, 5), Existing::NoAccount, Some(99)).unwrap();
    assert_eq!(d, Decision::CreateAccount { assign_to: Some(5) });
  }

  #[test]
  fn admin_assigns_requested_or_nobody() {
    let admin = Actor::admin(1);
    assert_eq!(
      decide(&admin, Existing::NoAccount, Some(7)).unwrap(),
      Decision::CreateAccount { assign_to: Some(7) }
    );
    assert_eq!(
      decide(&admin, Existing::NoAccount, None).unwrap(),
      Decision::CreateAccount { assign_to: None }
    );
  }

  #[test]
  fn account_without_client_gets_one() {
    let acc = account(Role::Client);
    let d = decide(&Actor::consultant(1, 5), Existing::AccountWithoutClient(&acc), None)
      .unwrap();
    assert_eq!(d, Decision::CreateClient { account_id: 10, assign_to: Some(5) });
  }

  #[test]
  fn staff_phone_is_not_a_client() {
    let acc = account(Role::Consultant);
    let d = decide(&Actor::consultant(1, 5), Existing::AccountWithoutClient(&acc), None)
      .unwrap();
    assert_eq!(d, Decision::Reject(Rejection::NotAClientAccount));
  }

  #[test]
  fn own_client_is_duplicate_even_when_orphaned() {
    let c = client(Some(5), true);
    let d = decide(&Actor::consultant(1, 5), Existing::Client(&c), None).unwrap();
    assert_eq!(d, Decision::Reject(Rejection::DuplicateAssignment));
  }

  #[test]
  fn orphan_is_claimable() {
    let c = client(Some(5), true);
    let d = decide(&Actor::consultant(2, 7), Existing::Client(&c), None).unwrap();
    assert_eq!(d, Decision::Claim { client_id: 1, consultant_id: 7 });
  }

  #[test]
  fn active_client_of_someone_else_is_already_claimed() {
    let c = client(Some(5), false);
    let d = decide(&Actor::consultant(2, 7), Existing::Client(&c), None).unwrap();
    assert_eq!(d, Decision::Reject(Rejection::AlreadyClaimed));
  }

  #[test]
  fn admin_reassigns_unconditionally() {
    let c = client(Some(5), false);
    let d = decide(&Actor::admin(1), Existing::Client(&c), Some(7)).unwrap();
    assert_eq!(d, Decision::Reassign { client_id: 1, consultant_id: 7 });

    let d = decide(&Actor::admin(1), Existing::Client(&c), None).unwrap();
    assert_eq!(d, Decision::Reject(Rejection::DuplicateAssignment));
  }

  #[test]
  fn clients_and_profileless_consultants_are_forbidden() {
    assert!(matches!(
      decide(&Actor::client(3), Existing::NoAccount, None),
      Err(Error::Forbidden(_))
    ));
    let no_profile = Actor { user_id: 4, role: Role::Consultant, consultant_id: None };
    assert!(matches!(
      decide(&no_profile, Existing::NoAccount, None),
      Err(Error::Forbidden(_))
    ));
  }

  #[test]
  fn request_validation() {
    let mut req = ClaimRequest {
      actor:                     Actor::consultant(1, 5),
      phone:                     " 13800000001 ".into(),
      profile:                   ClientProfile { name: " Zhang ".into(), ..Default::default() },
      requested_consultant_id:   None,
      placeholder_password_hash: String::new(),
    };
    req.validate().unwrap();
    assert_eq!(req.phone, "13800000001");
    assert_eq!(req.profile.name, "Zhang");

    req.profile.name = String::new();
    assert!(matches!(req.validate(), Err(Error::Validation(_))));
  }
}
