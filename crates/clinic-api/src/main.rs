//! clinic-api server binary.
//!
//! Reads `config.toml` (or the path specified with `--config`) plus
//! `CLINIC_*` environment overrides, opens the SQLite store, and serves the
//! JSON API over HTTP.
//!
//! # Helper modes
//!
//! ```text
//! cargo run -p clinic-api --bin server -- --hash-password
//! cargo run -p clinic-api --bin server -- --issue-token 1 --role admin
//! ```

use std::{
  path::{Path, PathBuf},
  time::Duration,
};

use anyhow::Context as _;
use clap::Parser;
use clinic_api::{AppState, ServerConfig, password::hash_password, spawn_orphan_sweeper};
use clinic_core::account::{Identity, Role};
use clinic_store_sqlite::SqliteStore;
use tokio::net::TcpListener;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Clinic client-assignment API server")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,

  /// Print the argon2 hash for a password entered on stdin and exit.
  #[arg(long)]
  hash_password: bool,

  /// Print a bearer token for this account id and exit.
  #[arg(long, value_name = "ACCOUNT_ID")]
  issue_token: Option<i64>,

  /// Role embedded in the token printed by `--issue-token`.
  #[arg(long, default_value = "admin", requires = "issue_token")]
  role: Role,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  if cli.hash_password {
    let password = read_password()?;
    let hash = hash_password(&password).map_err(|e| anyhow::anyhow!("argon2 error: {e}"))?;
    println!("{hash}");
    return Ok(());
  }

  let settings = config::Config::builder()
    .add_source(config::File::from(cli.config).required(false))
    .add_source(config::Environment::with_prefix("CLINIC"))
    .build()
    .context("failed to read config file")?;

  let server_cfg: ServerConfig = settings
    .try_deserialize()
    .context("failed to deserialise ServerConfig")?;
  server_cfg
    .orphan_threshold_days
    .cutoff(chrono::Utc::now())
    .context("orphan_threshold_days is unusable")?;

  if let Some(user_id) = cli.issue_token {
    let keys = clinic_api::auth::TokenKeys::from_secret(
      &server_cfg.jwt_secret,
      server_cfg.token_ttl_secs,
    );
    let token = keys
      .issue(Identity { user_id, role: cli.role })
      .context("failed to sign token")?;
    println!("{token}");
    return Ok(());
  }

  let store_path = expand_tilde(&server_cfg.store_path);
  let store = SqliteStore::open(&store_path)
    .await
    .with_context(|| format!("failed to open store at {store_path:?}"))?;

  let placeholder_hash = hash_password(&server_cfg.default_client_password)
    .map_err(|e| anyhow::anyhow!("argon2 error: {e}"))?;

  let address = format!("{}:{}", server_cfg.host, server_cfg.port);
  let sweep_every = server_cfg.sweep_interval_secs;
  let threshold = server_cfg.orphan_threshold_days;
  let state = AppState::new(store, server_cfg, placeholder_hash);

  if let Some(secs) = sweep_every.filter(|s| *s > 0) {
    tracing::info!(every_secs = secs, days = threshold.as_days(), "orphan sweep scheduled");
    // Detached; lives as long as the runtime.
    drop(spawn_orphan_sweeper(state.store.clone(), threshold, Duration::from_secs(secs)));
  }

  let app = clinic_api::router(state);

  tracing::info!("Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app).await.context("server error")?;

  Ok(())
}

/// Read a password from stdin.
fn read_password() -> anyhow::Result<String> {
  use std::io::{self, BufRead, Write};
  print!("Password: ");
  io::stdout().flush().ok();
  let mut line = String::new();
  io::stdin().lock().read_line(&mut line)?;
  Ok(line.trim_end_matches(['\n', '\r']).to_string())
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
