//! [`SqliteStore`], the SQLite implementation of [`ClientStore`].

use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::{OptionalExtension as _, TransactionBehavior, types::Value};

use clinic_core::{
  account::{
    Account, Consultant, ConsultantKind, NewAccount, NewConsultant, Registration, TakenField,
  },
  assignment::{self, ClaimOutcome, ClaimRequest, Decision, Existing},
  client::{Client, ClientPatch, ClientProfile, Reassignment, Tags},
  store::{ClientQuery, ClientStore, ConsultantQuery, ConsultantStats},
  sweep::{self, OrphanThreshold},
};

use crate::{
  Error, Result,
  encode::{
    ACCOUNT_COLUMNS, CLIENT_COLUMNS, CONSULTANT_COLUMNS, RawAccount, RawClient,
    RawConsultant, encode_date, encode_dt, encode_tags, normalize_dt,
  },
  error::{lift, other},
  schema::SCHEMA,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A clinic store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store, mostly for tests.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Load a client, let `f` mutate it, and write it back, all in one
  /// transaction. `Ok(None)` if the client does not exist.
  async fn modify_client<F>(&self, id: i64, f: F) -> Result<Option<Client>>
  where
    F: FnOnce(&mut Client) -> Result<()> + Send + 'static,
  {
    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let Some(mut client) = load_client(&tx, id)? else {
          return Ok(None);
        };
        f(&mut client).map_err(other)?;
        write_client(&tx, &client)?;
        tx.commit()?;
        Ok(Some(client))
      })
      .await
      .map_err(lift)
  }
}

// ─── Row helpers (run on the connection thread) ──────────────────────────────

type CallResult<T> = std::result::Result<T, tokio_rusqlite::Error>;

fn load_client(conn: &rusqlite::Connection, id: i64) -> CallResult<Option<Client>> {
  let raw = conn
    .query_row(
      &format!("SELECT {CLIENT_COLUMNS} FROM clients WHERE id = ?1"),
      rusqlite::params![id],
      RawClient::from_row,
    )
    .optional()?;
  raw.map(RawClient::into_client).transpose().map_err(other)
}

fn load_client_by_account(
  conn: &rusqlite::Connection,
  account_id: i64,
) -> CallResult<Option<Client>> {
  let raw = conn
    .query_row(
      &format!("SELECT {CLIENT_COLUMNS} FROM clients WHERE account_id = ?1"),
      rusqlite::params![account_id],
      RawClient::from_row,
    )
    .optional()?;
  raw.map(RawClient::into_client).transpose().map_err(other)
}

fn load_account_by_phone(
  conn: &rusqlite::Connection,
  phone: &str,
) -> CallResult<Option<Account>> {
  let raw = conn
    .query_row(
      &format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE phone = ?1"),
      rusqlite::params![phone],
      RawAccount::from_row,
    )
    .optional()?;
  raw.map(RawAccount::into_account).transpose().map_err(other)
}

fn insert_account(
  conn: &rusqlite::Connection,
  input: NewAccount,
  now: DateTime<Utc>,
) -> CallResult<Account> {
  let at_str = encode_dt(now);
  conn.execute(
    "INSERT INTO accounts (
       username, phone, email, role, password_hash, is_active, created_at, updated_at
     ) VALUES (?1, ?2, ?3, ?4, ?5, 1, ?6, ?6)",
    rusqlite::params![
      input.username,
      input.phone,
      input.email,
      input.role.as_ref(),
      input.password_hash,
      at_str,
    ],
  )?;

  Ok(Account {
    id:            conn.last_insert_rowid(),
    username:      input.username,
    phone:         input.phone,
    email:         input.email,
    role:          input.role,
    password_hash: input.password_hash,
    is_active:     true,
    created_at:    now,
    updated_at:    now,
  })
}

fn insert_consultant(
  conn: &rusqlite::Connection,
  input: NewConsultant,
  now: DateTime<Utc>,
) -> CallResult<Consultant> {
  conn.execute(
    "INSERT INTO consultants (account_id, kind, verified, created_at)
     VALUES (?1, ?2, ?3, ?4)",
    rusqlite::params![input.account_id, input.kind.as_ref(), input.verified, encode_dt(now)],
  )?;

  Ok(Consultant {
    id:         conn.last_insert_rowid(),
    account_id: input.account_id,
    kind:       input.kind,
    verified:   input.verified,
    created_at: now,
  })
}

/// `column` is one of the unique `accounts` columns, never caller input.
fn account_field_taken(
  conn: &rusqlite::Connection,
  column: &'static str,
  value: &str,
) -> CallResult<bool> {
  let hits: i64 = conn.query_row(
    &format!("SELECT COUNT(*) FROM accounts WHERE {column} = ?1"),
    rusqlite::params![value],
    |row| row.get(0),
  )?;
  Ok(hits > 0)
}

fn insert_client(
  conn: &rusqlite::Connection,
  account_id: i64,
  phone: &str,
  profile: ClientProfile,
  assign_to: Option<i64>,
  now: DateTime<Utc>,
) -> CallResult<Client> {
  let client = Client {
    id: 0,
    account_id,
    name: profile.name,
    gender: profile.gender,
    birth_date: profile.birth_date,
    address: profile.address,
    contact_phone: phone.to_owned(),
    tags: Tags::new(),
    assigned_consultant_id: assign_to,
    is_orphan: false,
    last_contact: Some(now),
    created_at: now,
    updated_at: now,
  };

  let birth_str = client.birth_date.map(encode_date);
  let tags_str  = encode_tags(&client.tags).map_err(other)?;
  let at_str    = encode_dt(now);

  conn.execute(
    "INSERT INTO clients (
       account_id, name, gender, birth_date, address, contact_phone, tags,
       assigned_consultant_id, is_orphan, last_contact, created_at, updated_at
     ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, 0, ?9, ?9, ?9)",
    rusqlite::params![
      client.account_id,
      client.name,
      client.gender,
      birth_str,
      client.address,
      client.contact_phone,
      tags_str,
      client.assigned_consultant_id,
      at_str,
    ],
  )?;

  Ok(Client { id: conn.last_insert_rowid(), ..client })
}

/// Persist every mutable column of `client`. `account_id` is never written.
fn write_client(conn: &rusqlite::Connection, client: &Client) -> CallResult<()> {
  let birth_str   = client.birth_date.map(encode_date);
  let tags_str    = encode_tags(&client.tags).map_err(other)?;
  let contact_str = client.last_contact.map(encode_dt);
  let updated_str = encode_dt(client.updated_at);

  let changed = conn.execute(
    "UPDATE clients SET
       name = ?2, gender = ?3, birth_date = ?4, address = ?5, contact_phone = ?6,
       tags = ?7, assigned_consultant_id = ?8, is_orphan = ?9, last_contact = ?10,
       updated_at = ?11
     WHERE id = ?1",
    rusqlite::params![
      client.id,
      client.name,
      client.gender,
      birth_str,
      client.address,
      client.contact_phone,
      tags_str,
      client.assigned_consultant_id,
      client.is_orphan,
      contact_str,
      updated_str,
    ],
  )?;

  if changed == 0 {
    return Err(other(Error::ClientVanished(client.id)));
  }
  Ok(())
}

// ─── ClientStore impl ────────────────────────────────────────────────────────

impl ClientStore for SqliteStore {
  type Error = Error;

  // ── Accounts ──────────────────────────────────────────────────────────────

  async fn get_account(&self, id: i64) -> Result<Option<Account>> {
    let raw: Option<RawAccount> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE id = ?1"),
              rusqlite::params![id],
              RawAccount::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawAccount::into_account).transpose()
  }

  async fn find_account_by_phone<'a>(&'a self, phone: &'a str) -> Result<Option<Account>> {
    let phone = phone.to_owned();
    self
      .conn
      .call(move |conn| load_account_by_phone(conn, &phone))
      .await
      .map_err(lift)
  }

  async fn add_account(&self, input: NewAccount) -> Result<Account> {
    let now = normalize_dt(Utc::now());
    self
      .conn
      .call(move |conn| insert_account(conn, input, now))
      .await
      .map_err(lift)
  }

  // ── Consultants ───────────────────────────────────────────────────────────

  async fn add_consultant(&self, input: NewConsultant) -> Result<Consultant> {
    let now = normalize_dt(Utc::now());
    self
      .conn
      .call(move |conn| insert_consultant(conn, input, now))
      .await
      .map_err(lift)
  }

  async fn register_consultant(
    &self,
    account: NewAccount,
    kind: ConsultantKind,
    verified: bool,
  ) -> Result<Registration> {
    let now = normalize_dt(Utc::now());
    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let taken = if account_field_taken(&tx, "username", &account.username)? {
          Some(TakenField::Username)
        } else if account_field_taken(&tx, "phone", &account.phone)? {
          Some(TakenField::Phone)
        } else if let Some(email) = account.email.as_deref()
          && account_field_taken(&tx, "email", email)?
        {
          Some(TakenField::Email)
        } else {
          None
        };
        if let Some(field) = taken {
          return Ok(Registration::Taken(field));
        }

        let account = insert_account(&tx, account, now)?;
        let consultant = insert_consultant(
          &tx,
          NewConsultant { account_id: account.id, kind, verified },
          now,
        )?;
        tx.commit()?;
        Ok(Registration::Registered { account, consultant })
      })
      .await
      .map_err(lift)
  }

  async fn list_consultants<'a>(
    &'a self,
    query: &'a ConsultantQuery,
  ) -> Result<Vec<Consultant>> {
    let mut conds: Vec<String> = vec![];
    let mut params: Vec<Value> = vec![];

    if let Some(kind) = query.kind {
      params.push(Value::Text(kind.as_ref().to_owned()));
      conds.push(format!("kind = ?{}", params.len()));
    }
    if let Some(verified) = query.verified {
      params.push(Value::Integer(i64::from(verified)));
      conds.push(format!("verified = ?{}", params.len()));
    }

    let where_clause = if conds.is_empty() {
      String::new()
    } else {
      format!("WHERE {}", conds.join(" AND "))
    };
    let sql = format!("SELECT {CONSULTANT_COLUMNS} FROM consultants {where_clause} ORDER BY id");

    let raws: Vec<RawConsultant> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(rusqlite::params_from_iter(params), RawConsultant::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawConsultant::into_consultant).collect()
  }

  async fn set_consultant_verified(&self, id: i64, verified: bool) -> Result<Option<Consultant>> {
    let raw: Option<RawConsultant> = self
      .conn
      .call(move |conn| {
        let changed = conn.execute(
          "UPDATE consultants SET verified = ?2 WHERE id = ?1",
          rusqlite::params![id, verified],
        )?;
        if changed == 0 {
          return Ok(None);
        }
        Ok(
          conn
            .query_row(
              &format!("SELECT {CONSULTANT_COLUMNS} FROM consultants WHERE id = ?1"),
              rusqlite::params![id],
              RawConsultant::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawConsultant::into_consultant).transpose()
  }

  async fn get_consultant(&self, id: i64) -> Result<Option<Consultant>> {
    let raw: Option<RawConsultant> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!("SELECT {CONSULTANT_COLUMNS} FROM consultants WHERE id = ?1"),
              rusqlite::params![id],
              RawConsultant::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawConsultant::into_consultant).transpose()
  }

  async fn consultant_for_account(&self, account_id: i64) -> Result<Option<Consultant>> {
    let raw: Option<RawConsultant> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!(
                "SELECT {CONSULTANT_COLUMNS} FROM consultants WHERE account_id = ?1"
              ),
              rusqlite::params![account_id],
              RawConsultant::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawConsultant::into_consultant).transpose()
  }

  // ── Clients ───────────────────────────────────────────────────────────────

  async fn get_client(&self, id: i64) -> Result<Option<Client>> {
    self
      .conn
      .call(move |conn| load_client(conn, id))
      .await
      .map_err(lift)
  }

  async fn list_clients<'a>(&'a self, query: &'a ClientQuery) -> Result<Vec<Client>> {
    // Build WHERE clause dynamically; placeholders are numbered as pushed.
    let mut conds: Vec<String> = vec![];
    let mut params: Vec<Value> = vec![];

    if let Some(consultant_id) = query.consultant_id {
      params.push(Value::Integer(consultant_id));
      conds.push(format!("assigned_consultant_id = ?{}", params.len()));
    }
    if let Some(is_orphan) = query.is_orphan {
      params.push(Value::Integer(i64::from(is_orphan)));
      conds.push(format!("is_orphan = ?{}", params.len()));
    }
    if let Some(text) = query.text.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
      params.push(Value::Text(format!("%{text}%")));
      let n = params.len();
      conds.push(format!("(name LIKE ?{n} OR contact_phone LIKE ?{n})"));
    }

    let mut slots: Vec<String> = vec![];
    for tag in query.any_tags.iter().map(|t| t.trim()).filter(|t| !t.is_empty()) {
      params.push(Value::Text(tag.to_owned()));
      slots.push(format!("?{}", params.len()));
    }
    if !slots.is_empty() {
      conds.push(format!(
        "EXISTS (SELECT 1 FROM json_each(clients.tags) WHERE json_each.value IN ({}))",
        slots.join(", ")
      ));
    }

    let where_clause = if conds.is_empty() {
      String::new()
    } else {
      format!("WHERE {}", conds.join(" AND "))
    };

    let sql = format!(
      "SELECT {CLIENT_COLUMNS} FROM clients {where_clause}
       ORDER BY last_contact DESC, id"
    );

    let raws: Vec<RawClient> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(rusqlite::params_from_iter(params), RawClient::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawClient::into_client).collect()
  }

  async fn create_or_claim(
    &self,
    request: ClaimRequest,
    now: DateTime<Utc>,
  ) -> Result<ClaimOutcome> {
    let ClaimRequest {
      actor,
      phone,
      profile,
      requested_consultant_id,
      placeholder_password_hash,
    } = request;
    let now = normalize_dt(now);

    self
      .conn
      .call(move |conn| {
        // IMMEDIATE takes the write lock before the read, so the state the
        // decision sees is the state the write lands on.
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let account = load_account_by_phone(&tx, &phone)?;
        let client = match &account {
          Some(a) => load_client_by_account(&tx, a.id)?,
          None => None,
        };
        let existing = match (&account, &client) {
          (None, _) => Existing::NoAccount,
          (Some(a), None) => Existing::AccountWithoutClient(a),
          (Some(_), Some(c)) => Existing::Client(c),
        };

        let decision = assignment::decide(&actor, existing, requested_consultant_id)
          .map_err(other)?;

        let outcome = match (decision, client) {
          (Decision::Reject(reason), existing) => {
            // Dropping `tx` rolls back; nothing was written.
            return Ok(ClaimOutcome::Rejected { reason, existing });
          }
          (Decision::CreateAccount { assign_to }, _) => {
            let new_account =
              NewAccount::for_client_phone(&phone, &placeholder_password_hash);
            let account = insert_account(&tx, new_account, now)?;
            let client = insert_client(&tx, account.id, &phone, profile, assign_to, now)?;
            ClaimOutcome::Created(client)
          }
          (Decision::CreateClient { account_id, assign_to }, _) => {
            let client = insert_client(&tx, account_id, &phone, profile, assign_to, now)?;
            ClaimOutcome::Created(client)
          }
          (Decision::Claim { consultant_id, .. }, Some(mut client)) => {
            client.assign(consultant_id, now);
            write_client(&tx, &client)?;
            ClaimOutcome::Claimed(client)
          }
          (Decision::Reassign { consultant_id, .. }, Some(mut client)) => {
            client.assign(consultant_id, now);
            write_client(&tx, &client)?;
            ClaimOutcome::Reassigned(client)
          }
          (Decision::Claim { client_id, .. } | Decision::Reassign { client_id, .. }, None) => {
            return Err(other(Error::ClientVanished(client_id)));
          }
        };

        tx.commit()?;
        Ok(outcome)
      })
      .await
      .map_err(lift)
  }

  async fn update_client(
    &self,
    id: i64,
    patch: ClientPatch,
    reassignment: Option<Reassignment>,
    now: DateTime<Utc>,
  ) -> Result<Option<Client>> {
    let now = normalize_dt(now);
    self
      .modify_client(id, move |client| {
        patch.apply(client, now)?;
        if let Some(change) = reassignment {
          change.apply(client, now);
        }
        Ok(())
      })
      .await
  }

  async fn reassign(
    &self,
    id: i64,
    consultant_id: i64,
    now: DateTime<Utc>,
  ) -> Result<Option<Client>> {
    let now = normalize_dt(now);
    self
      .modify_client(id, move |client| {
        client.assign(consultant_id, now);
        Ok(())
      })
      .await
  }

  async fn set_tag(
    &self,
    id: i64,
    tag: String,
    add: bool,
    now: DateTime<Utc>,
  ) -> Result<Option<Client>> {
    let now = normalize_dt(now);
    self
      .modify_client(id, move |client| {
        let changed = if add {
          client.tags.insert(&tag)?
        } else {
          client.tags.remove(&tag)
        };
        if changed {
          client.updated_at = now;
        }
        Ok(())
      })
      .await
  }

  async fn record_contact(&self, id: i64, now: DateTime<Utc>) -> Result<Option<Client>> {
    let now = normalize_dt(now);
    self
      .modify_client(id, move |client| {
        client.touch(now);
        Ok(())
      })
      .await
  }

  async fn sweep(&self, threshold: OrphanThreshold, now: DateTime<Utc>) -> Result<u64> {
    let cutoff_str = encode_dt(threshold.cutoff(now)?);
    let now_str    = encode_dt(now);

    let flagged = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE clients SET is_orphan = 1, updated_at = ?2
           WHERE is_orphan = 0
             AND (assigned_consultant_id IS NULL
                  OR last_contact IS NULL
                  OR last_contact < ?1)",
          rusqlite::params![cutoff_str, now_str],
        )?)
      })
      .await?;

    Ok(flagged as u64)
  }

  async fn consultant_stats(
    &self,
    consultant_id: i64,
    window_days: u32,
    now: DateTime<Utc>,
  ) -> Result<ConsultantStats> {
    let since_str = encode_dt(sweep::days_before(now, window_days)?);

    let (total, active, orphan): (i64, i64, i64) = self
      .conn
      .call(move |conn| {
        Ok(conn.query_row(
          "SELECT
             COUNT(*),
             COALESCE(SUM(CASE WHEN last_contact >= ?2 THEN 1 ELSE 0 END), 0),
             COALESCE(SUM(is_orphan), 0)
           FROM clients
           WHERE assigned_consultant_id = ?1",
          rusqlite::params![consultant_id, since_str],
          |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )?)
      })
      .await?;

    Ok(ConsultantStats {
      consultant_id,
      window_days,
      total_clients: total as u64,
      active_clients: active as u64,
      orphan_clients: orphan as u64,
    })
  }
}
