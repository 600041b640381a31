//! Encoding and decoding helpers between domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as fixed-width RFC 3339 strings (microsecond
//! precision, `Z` suffix) so that SQL string comparison orders them the same
//! way as time does; the sweep relies on that. Tags are stored as a JSON
//! array.

use chrono::{DateTime, NaiveDate, SecondsFormat, SubsecRound as _, Utc};
use clinic_core::{
  account::{Account, Consultant, ConsultantKind, Role},
  client::{Client, Tags},
};

use crate::{Error, Result};

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

/// Drop precision the column cannot hold, so values handed back to callers
/// equal what a later read returns.
pub fn normalize_dt(dt: DateTime<Utc>) -> DateTime<Utc> { dt.trunc_subsecs(6) }

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::Decode(format!("bad timestamp {s:?}: {e}")))
}

// ─── NaiveDate ───────────────────────────────────────────────────────────────

pub fn encode_date(d: NaiveDate) -> String { d.format("%Y-%m-%d").to_string() }

pub fn decode_date(s: &str) -> Result<NaiveDate> {
  NaiveDate::parse_from_str(s, "%Y-%m-%d")
    .map_err(|e| Error::Decode(format!("bad date {s:?}: {e}")))
}

// ─── Enums ───────────────────────────────────────────────────────────────────

pub fn decode_role(s: &str) -> Result<Role> {
  s.parse().map_err(|_| Error::Decode(format!("unknown role: {s:?}")))
}

pub fn decode_kind(s: &str) -> Result<ConsultantKind> {
  s.parse()
    .map_err(|_| Error::Decode(format!("unknown consultant kind: {s:?}")))
}

// ─── Tags ────────────────────────────────────────────────────────────────────

pub fn encode_tags(tags: &Tags) -> Result<String> { Ok(serde_json::to_string(tags)?) }

pub fn decode_tags(s: &str) -> Result<Tags> { Ok(serde_json::from_str(s)?) }

// ─── Row types ───────────────────────────────────────────────────────────────

pub const ACCOUNT_COLUMNS: &str = "id, username, phone, email, role, password_hash, \
                                   is_active, created_at, updated_at";

/// Raw values read directly from an `accounts` row.
pub struct RawAccount {
  pub id:            i64,
  pub username:      String,
  pub phone:         String,
  pub email:         Option<String>,
  pub role:          String,
  pub password_hash: String,
  pub is_active:     bool,
  pub created_at:    String,
  pub updated_at:    String,
}

impl RawAccount {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id:            row.get(0)?,
      username:      row.get(1)?,
      phone:         row.get(2)?,
      email:         row.get(3)?,
      role:          row.get(4)?,
      password_hash: row.get(5)?,
      is_active:     row.get(6)?,
      created_at:    row.get(7)?,
      updated_at:    row.get(8)?,
    })
  }

  pub fn into_account(self) -> Result<Account> {
    Ok(Account {
      id:            self.id,
      username:      self.username,
      phone:         self.phone,
      email:         self.email,
      role:          decode_role(&self.role)?,
      password_hash: self.password_hash,
      is_active:     self.is_active,
      created_at:    decode_dt(&self.created_at)?,
      updated_at:    decode_dt(&self.updated_at)?,
    })
  }
}

pub const CONSULTANT_COLUMNS: &str = "id, account_id, kind, verified, created_at";

/// Raw values read directly from a `consultants` row.
pub struct RawConsultant {
  pub id:         i64,
  pub account_id: i64,
  pub kind:       String,
  pub verified:   bool,
  pub created_at: String,
}

impl RawConsultant {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id:         row.get(0)?,
      account_id: row.get(1)?,
      kind:       row.get(2)?,
      verified:   row.get(3)?,
      created_at: row.get(4)?,
    })
  }

  pub fn into_consultant(self) -> Result<Consultant> {
    Ok(Consultant {
      id:         self.id,
      account_id: self.account_id,
      kind:       decode_kind(&self.kind)?,
      verified:   self.verified,
      created_at: decode_dt(&self.created_at)?,
    })
  }
}

pub const CLIENT_COLUMNS: &str = "id, account_id, name, gender, birth_date, address, \
                                  contact_phone, tags, assigned_consultant_id, is_orphan, \
                                  last_contact, created_at, updated_at";

/// Raw values read directly from a `clients` row.
pub struct RawClient {
  pub id:                     i64,
  pub account_id:             i64,
  pub name:                   String,
  pub gender:                 Option<String>,
  pub birth_date:             Option<String>,
  pub address:                Option<String>,
  pub contact_phone:          String,
  pub tags:                   String,
  pub assigned_consultant_id: Option<i64>,
  pub is_orphan:              bool,
  pub last_contact:           Option<String>,
  pub created_at:             String,
  pub updated_at:             String,
}

impl RawClient {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id:                     row.get(0)?,
      account_id:             row.get(1)?,
      name:                   row.get(2)?,
      gender:                 row.get(3)?,
      birth_date:             row.get(4)?,
      address:                row.get(5)?,
      contact_phone:          row.get(6)?,
      tags:                   row.get(7)?,
      assigned_consultant_id: row.get(8)?,
      is_orphan:              row.get(9)?,
      last_contact:           row.get(10)?,
      created_at:             row.get(11)?,
      updated_at:             row.get(12)?,
    })
  }

  pub fn into_client(self) -> Result<Client> {
    Ok(Client {
      id:                     self.id,
      account_id:             self.account_id,
      name:                   self.name,
      gender:                 self.gender,
      birth_date:             self.birth_date.as_deref().map(decode_date).transpose()?,
      address:                self.address,
      contact_phone:          self.contact_phone,
      tags:                   decode_tags(&self.tags)?,
      assigned_consultant_id: self.assigned_consultant_id,
      is_orphan:              self.is_orphan,
      last_contact:           self.last_contact.as_deref().map(decode_dt).transpose()?,
      created_at:             decode_dt(&self.created_at)?,
      updated_at:             decode_dt(&self.updated_at)?,
    })
  }
}

#[cfg(test)]
mod tests {
  use chrono::{Duration, TimeZone};

  use super::*;

  #[test]
  fn timestamps_sort_as_strings() {
    let a = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    let b = a + Duration::microseconds(1);
    let c = a + Duration::milliseconds(500);
    let (ea, eb, ec) = (encode_dt(a), encode_dt(b), encode_dt(c));
    assert_eq!(ea.len(), eb.len());
    assert!(ea < eb && eb < ec);
    assert_eq!(decode_dt(&eb).unwrap(), b);
  }

  #[test]
  fn dates_roundtrip() {
    let d = NaiveDate::from_ymd_opt(1990, 4, 7).unwrap();
    assert_eq!(encode_date(d), "1990-04-07");
    assert_eq!(decode_date("1990-04-07").unwrap(), d);
    assert!(decode_date("07/04/1990").is_err());
  }
}
