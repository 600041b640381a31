//! The capability check.
//!
//! Every operation asks [`authorize`] before touching storage, so role rules
//! live in one table instead of being repeated per endpoint.

use crate::{Error, Result, account::Actor, client::Client};

/// Something an actor wants to do, with the client it targets where one
/// exists.
#[derive(Debug, Clone, Copy)]
pub enum Action<'a> {
  CreateClient,
  ListClients,
  ViewClient(&'a Client),
  EditProfile(&'a Client),
  Tag(&'a Client),
  RecordContact(&'a Client),
  Reassign,
  Sweep,
  /// Read a consultant's roster or statistics.
  ViewConsultant(i64),
  ManageConsultants,
}

impl Action<'_> {
  fn describe(&self) -> &'static str {
    match self {
      Self::CreateClient => "add clients",
      Self::ListClients => "list clients",
      Self::ViewClient(_) => "view this client",
      Self::EditProfile(_) => "edit this client",
      Self::Tag(_) => "tag this client",
      Self::RecordContact(_) => "contact this client",
      Self::Reassign => "reassign clients",
      Self::Sweep => "run the orphan check",
      Self::ViewConsultant(_) => "view this consultant",
      Self::ManageConsultants => "manage consultants",
    }
  }
}

pub fn is_allowed(actor: &Actor, action: Action<'_>) -> bool {
  if actor.is_admin() {
    return true;
  }

  if actor.role.is_consultant() {
    return match action {
      Action::CreateClient | Action::ListClients => actor.consultant_id.is_some(),
      Action::ViewClient(c)
      | Action::EditProfile(c)
      | Action::Tag(c)
      | Action::RecordContact(c) => c.is_assigned_to(actor.consultant_id),
      Action::ViewConsultant(id) => actor.consultant_id == Some(id),
      Action::Reassign | Action::Sweep | Action::ManageConsultants => false,
    };
  }

  // Clients see and edit their own profile, nothing more.
  match action {
    Action::ViewClient(c) | Action::EditProfile(c) => c.account_id == actor.user_id,
    _ => false,
  }
}

/// [`is_allowed`] as a `Result`, for use with `?`.
pub fn authorize(actor: &Actor, action: Action<'_>) -> Result<()> {
  if is_allowed(actor, action) {
    Ok(())
  } else {
    Err(Error::Forbidden(format!("not permitted to {}", action.describe())))
  }
}
