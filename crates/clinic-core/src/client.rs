//! The `Client` entity, the only record the assignment engine owns.
//!
//! A client is bound to exactly one account for life. Its link to a
//! consultant and its orphan flag are mutated only through the methods on
//! this type, so that every surface applies the same transitions.

use std::collections::BTreeSet;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::{Result, validate};

// ─── Tags ────────────────────────────────────────────────────────────────────

/// A set of free-text labels used to target group messages.
///
/// Labels are trimmed, non-empty, and never contain a comma so the
/// comma-joined wire form stays unambiguous.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Tags(BTreeSet<String>);

impl Tags {
  pub fn new() -> Self { Self::default() }

  /// Parse the comma-joined wire form. Blank segments are skipped.
  pub fn parse_joined(s: &str) -> Self {
    Self(
      s.split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_owned)
        .collect(),
    )
  }

  /// Render the comma-joined wire form (sorted).
  pub fn joined(&self) -> String {
    self.0.iter().map(String::as_str).collect::<Vec<_>>().join(",")
  }

  /// Add `tag`. Returns `false` if it was already present.
  pub fn insert(&mut self, tag: &str) -> Result<bool> {
    let tag = validate::tag(tag)?;
    Ok(self.0.insert(tag))
  }

  /// Remove `tag`. Returns `false` if it was absent.
  pub fn remove(&mut self, tag: &str) -> bool { self.0.remove(tag.trim()) }

  pub fn contains(&self, tag: &str) -> bool { self.0.contains(tag) }

  /// True if at least one of `wanted` is present.
  pub fn contains_any<S: AsRef<str>>(&self, wanted: &[S]) -> bool {
    wanted.iter().any(|t| self.0.contains(t.as_ref().trim()))
  }

  pub fn iter(&self) -> impl Iterator<Item = &str> { self.0.iter().map(String::as_str) }

  pub fn len(&self) -> usize { self.0.len() }

  pub fn is_empty(&self) -> bool { self.0.is_empty() }
}

impl<S: Into<String>> FromIterator<S> for Tags {
  fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
    Self(iter.into_iter().map(Into::into).collect())
  }
}

// ─── Assignment status ───────────────────────────────────────────────────────

/// Derived view over `assigned_consultant_id` and `is_orphan`; never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentStatus {
  Unclaimed,
  Active,
  Orphaned,
}

// ─── Client ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Client {
  pub id:                     i64,
  /// Set at creation and never changed.
  pub account_id:             i64,
  pub name:                   String,
  pub gender:                 Option<String>,
  pub birth_date:             Option<NaiveDate>,
  pub address:                Option<String>,
  pub contact_phone:          String,
  pub tags:                   Tags,
  pub assigned_consultant_id: Option<i64>,
  /// Cached "unattended" flag. Set only by the sweep; cleared by contact,
  /// claim and reassignment.
  pub is_orphan:              bool,
  pub last_contact:           Option<DateTime<Utc>>,
  pub created_at:             DateTime<Utc>,
  pub updated_at:             DateTime<Utc>,
}

impl Client {
  pub fn assignment_status(&self) -> AssignmentStatus {
    if self.is_orphan {
      AssignmentStatus::Orphaned
    } else if self.assigned_consultant_id.is_some() {
      AssignmentStatus::Active
    } else {
      AssignmentStatus::Unclaimed
    }
  }

  pub fn is_assigned_to(&self, consultant_id: Option<i64>) -> bool {
    consultant_id.is_some() && self.assigned_consultant_id == consultant_id
  }

  /// Hand the client to `consultant_id`. Used by both claim and admin
  /// reassignment.
  pub fn assign(&mut self, consultant_id: i64, now: DateTime<Utc>) {
    self.assigned_consultant_id = Some(consultant_id);
    self.is_orphan = false;
    self.last_contact = Some(now);
    self.updated_at = now;
  }

  /// Drop the holder. Orphan flag and contact history are left alone; the
  /// next sweep flags the client if it is not already in the pool.
  pub fn unassign(&mut self, now: DateTime<Utc>) {
    self.assigned_consultant_id = None;
    self.updated_at = now;
  }

  /// A consultant reached out; the client is attended again regardless of
  /// how long it was quiet.
  pub fn touch(&mut self, now: DateTime<Utc>) {
    self.is_orphan = false;
    self.last_contact = Some(now);
    self.updated_at = now;
  }
}

// ─── Inputs ──────────────────────────────────────────────────────────────────

/// Descriptive fields supplied when a client is first created.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClientProfile {
  pub name:       String,
  pub gender:     Option<String>,
  pub birth_date: Option<NaiveDate>,
  pub address:    Option<String>,
}

/// A change of holder requested together with a profile edit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reassignment {
  To(i64),
  Unassign,
}

impl Reassignment {
  pub fn apply(self, client: &mut Client, now: DateTime<Utc>) {
    match self {
      Self::To(consultant_id) => client.assign(consultant_id, now),
      Self::Unassign => client.unassign(now),
    }
  }
}

/// A partial update of descriptive fields. Assignment is not editable here.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClientPatch {
  pub name:          Option<String>,
  pub gender:        Option<String>,
  pub birth_date:    Option<NaiveDate>,
  pub address:       Option<String>,
  pub contact_phone: Option<String>,
}

impl ClientPatch {
  pub fn is_empty(&self) -> bool {
    self.name.is_none()
      && self.gender.is_none()
      && self.birth_date.is_none()
      && self.address.is_none()
      && self.contact_phone.is_none()
  }

  pub fn validate(&self) -> Result<()> {
    if let Some(name) = self.name.as_deref() {
      validate::name(name)?;
    }
    if let Some(phone) = self.contact_phone.as_deref() {
      validate::phone(phone)?;
    }
    Ok(())
  }

  /// Apply the patch in place. Validation runs first so a rejected patch
  /// leaves `client` untouched.
  pub fn apply(self, client: &mut Client, now: DateTime<Utc>) -> Result<()> {
    self.validate()?;

    if let Some(name) = self.name.as_deref() {
      client.name = validate::name(name)?;
    }
    if let Some(gender) = self.gender {
      client.gender = Some(gender);
    }
    if let Some(birth_date) = self.birth_date {
      client.birth_date = Some(birth_date);
    }
    if let Some(address) = self.address {
      client.address = Some(address);
    }
    if let Some(phone) = self.contact_phone {
      client.contact_phone = phone;
    }
    client.updated_at = now;
    Ok(())
  }
}

#[cfg(test)]
pub(crate) mod tests {
  use chrono::Duration;

  use super::*;

  pub(crate) fn client(assigned: Option<i64>, is_orphan: bool) -> Client {
    let now = Utc::now();
    Client {
      id: 1,
      account_id: 10,
      name: "Zhang".into(),
      gender: None,
      birth_date: None,
      address: None,
      contact_phone: "13800000001".into(),
      tags: Tags::new(),
      assigned_consultant_id: assigned,
      is_orphan,
      last_contact: Some(now - Duration::days(3)),
      created_at: now,
      updated_at: now,
    }
  }

  #[test]
  fn tags_are_a_set() {
    let mut tags = Tags::new();
    assert!(tags.insert("vip").unwrap());
    assert!(!tags.insert(" vip ").unwrap());
    assert_eq!(tags.len(), 1);
    assert!(!tags.remove("implant"));
    assert!(tags.remove("vip"));
    assert!(tags.is_empty());
  }

  #[test]
  fn tags_reject_commas_and_blanks() {
    let mut tags = Tags::new();
    assert!(tags.insert("a,b").is_err());
    assert!(tags.insert("   ").is_err());
  }

  #[test]
  fn tags_wire_form() {
    let tags = Tags::parse_joined("vip, implant,,vip ,");
    assert_eq!(tags.len(), 2);
    assert_eq!(tags.joined(), "implant,vip");
    assert!(tags.contains_any(&["ortho", "implant"]));
    assert!(!tags.contains_any(&["ortho"]));
  }

  #[test]
  fn status_is_derived() {
    assert_eq!(client(None, false).assignment_status(), AssignmentStatus::Unclaimed);
    assert_eq!(client(Some(5), false).assignment_status(), AssignmentStatus::Active);
    assert_eq!(client(Some(5), true).assignment_status(), AssignmentStatus::Orphaned);
    assert_eq!(client(None, true).assignment_status(), AssignmentStatus::Orphaned);
  }

  #[test]
  fn touch_un_orphans() {
    let mut c = client(Some(5), true);
    let now = Utc::now() + Duration::days(400);
    c.touch(now);
    assert!(!c.is_orphan);
    assert_eq!(c.last_contact, Some(now));
    assert_eq!(c.assigned_consultant_id, Some(5));
  }

  #[test]
  fn rejected_patch_leaves_client_untouched() {
    let mut c = client(Some(5), false);
    let patch = ClientPatch {
      address: Some("Chaoyang".into()),
      name: Some("  ".into()),
      ..Default::default()
    };
    assert!(patch.apply(&mut c, Utc::now()).is_err());
    assert_eq!(c.address, None);
    assert_eq!(c.name, "Zhang");
  }

  #[test]
  fn reassignment_to_and_away() {
    let now = Utc::now();
    let mut c = client(Some(5), true);
    Reassignment::To(7).apply(&mut c, now);
    assert_eq!(c.assigned_consultant_id, Some(7));
    assert!(!c.is_orphan);
    assert_eq!(c.last_contact, Some(now));

    let later = now + Duration::days(1);
    Reassignment::Unassign.apply(&mut c, later);
    assert_eq!(c.assigned_consultant_id, None);
    assert_eq!(c.last_contact, Some(now));
    assert_eq!(c.updated_at, later);
    assert_eq!(c.assignment_status(), AssignmentStatus::Unclaimed);
  }
}
