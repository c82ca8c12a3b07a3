use anyhow::{Context, Result, anyhow};
use reqwest::StatusCode;
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use std::io::{self, Write};
use std::path::Path;
use std::time::Duration;

use crate::cli::{LoginArgs, SyncArgs, SyncCmd};
use crate::config::{AppConfig, now_utc, today_local, write_config};
use crate::domain::LedgerSnapshot;
use crate::session::Session;
use crate::store::LedgerStore;

/// Remote requests must not hang the CLI; the hosted API itself gives up
/// after about this long.
const SYNC_TIMEOUT: Duration = Duration::from_secs(9);

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// The bearer token was rejected; the session is over.
    #[error("session expired")]
    SessionExpired,

    #[error("request timed out")]
    Timeout,

    #[error("server replied with status {0}")]
    Server(u16),

    #[error("malformed remote snapshot: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error(transparent)]
    Transport(reqwest::Error),
}

fn transport(err: reqwest::Error) -> SyncError {
    if err.is_timeout() {
        SyncError::Timeout
    } else {
        SyncError::Transport(err)
    }
}

#[derive(Debug, Serialize)]
struct LoginRequest<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    token: String,
}

/// Client for the hosted JSON store. The whole ledger travels as one
/// snapshot document; the client is authoritative and the last write
/// wins.
pub struct RemoteStore {
    client: Client,
    base_url: String,
    token: String,
}

impl RemoteStore {
    pub fn new(base_url: &str, token: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(SYNC_TIMEOUT)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
        })
    }

    fn sync_url(&self) -> String {
        format!("{}/api/sync", self.base_url)
    }

    /// `Ok(None)` means the remote store has no data yet; that is a
    /// normal first-run state, not an error.
    pub fn load(&self) -> Result<Option<LedgerSnapshot>, SyncError> {
        let resp = self
            .client
            .get(self.sync_url())
            .bearer_auth(&self.token)
            .send()
            .map_err(transport)?;

        match resp.status() {
            StatusCode::UNAUTHORIZED => return Err(SyncError::SessionExpired),
            StatusCode::NOT_FOUND => return Ok(None),
            status if !status.is_success() => return Err(SyncError::Server(status.as_u16())),
            _ => {}
        }

        let body = resp.text().map_err(transport)?;
        let trimmed = body.trim();
        if trimmed.is_empty() || trimmed == "null" {
            return Ok(None);
        }

        let snapshot: LedgerSnapshot = serde_json::from_str(trimmed)?;
        Ok(Some(snapshot))
    }

    pub fn save(&self, snapshot: &LedgerSnapshot) -> Result<(), SyncError> {
        let resp = self
            .client
            .post(self.sync_url())
            .bearer_auth(&self.token)
            .json(snapshot)
            .send()
            .map_err(transport)?;

        match resp.status() {
            StatusCode::UNAUTHORIZED => Err(SyncError::SessionExpired),
            status if !status.is_success() => Err(SyncError::Server(status.as_u16())),
            _ => Ok(()),
        }
    }
}

pub fn login(api_url: &str, username: &str, password: &str) -> Result<String> {
    let client = Client::builder()
        .timeout(SYNC_TIMEOUT)
        .build()
        .context("Failed to build HTTP client")?;

    let resp = client
        .post(format!("{}/api/login", api_url.trim_end_matches('/')))
        .json(&LoginRequest { username, password })
        .send()
        .context("Login request failed")?;

    if resp.status() == StatusCode::UNAUTHORIZED {
        return Err(anyhow!("Invalid credentials"));
    }
    if !resp.status().is_success() {
        return Err(anyhow!("Login failed with status {}", resp.status()));
    }

    let body: LoginResponse = resp.json().context("Malformed login response")?;
    Ok(body.token)
}

pub fn handle_login(args: LoginArgs, cfg: &mut AppConfig, cfg_path: &Path) -> Result<()> {
    let api_url = args
        .url
        .or_else(|| cfg.api_url.clone())
        .ok_or_else(|| anyhow!("No API URL configured. Run: rutero login --url <https://...>"))?;

    let username = args
        .user
        .or_else(|| cfg.username.clone())
        .unwrap_or_else(|| "admin".to_string());

    let password = match args.password {
        Some(p) => p,
        None => prompt_password("Password: ")?,
    };

    let token = login(&api_url, &username, &password)?;

    cfg.api_url = Some(api_url.clone());
    cfg.username = Some(username.clone());
    cfg.token = Some(token);
    write_config(cfg_path, cfg)?;

    println!("api\t{api_url}");
    println!("user\t{username}");
    println!("token\tstored");
    Ok(())
}

pub fn handle_logout(cfg: &mut AppConfig, cfg_path: &Path) -> Result<()> {
    cfg.token = None;
    write_config(cfg_path, cfg)?;
    println!("Logged out. Local data kept.");
    Ok(())
}

fn remote_from_config(cfg: &AppConfig) -> Result<RemoteStore> {
    let api_url = cfg
        .api_url
        .as_deref()
        .ok_or_else(|| anyhow!("No API URL configured. Run: rutero login --url <https://...>"))?;
    let token = cfg
        .token
        .as_deref()
        .ok_or_else(|| anyhow!("Not logged in. Run: rutero login"))?;
    RemoteStore::new(api_url, token)
}

/// Drop the stored credential after an authorization failure; in-memory
/// and on-disk records are untouched.
fn expire_session(cfg: &mut AppConfig, cfg_path: &Path) {
    cfg.token = None;
    if let Err(err) = write_config(cfg_path, cfg) {
        eprintln!("Failed to clear stored token: {err:#}");
    }
}

pub fn handle_sync(
    session: &mut Session,
    args: SyncArgs,
    cfg: &mut AppConfig,
    cfg_path: &Path,
    ledger_path: &Path,
) -> Result<()> {
    match args.cmd {
        SyncCmd::Status => {
            println!("api\t{}", cfg.api_url.as_deref().unwrap_or("<not set>"));
            println!("user\t{}", cfg.username.as_deref().unwrap_or("<not set>"));
            println!(
                "token\t{}",
                if cfg.token.is_some() { "stored" } else { "<not set>" }
            );
            println!("local_trips\t{}", session.store.trips.len());
            println!("local_expenses\t{}", session.store.expenses.len());
            match session.store.updated_at {
                Some(ts) => println!("updated_at\t{}", ts.to_rfc3339()),
                None => println!("updated_at\t<never>"),
            }
            match cfg.last_sync_at {
                Some(ts) => println!("last_sync_at\t{}", ts.to_rfc3339()),
                None => println!("last_sync_at\t<never>"),
            }
            Ok(())
        }
        SyncCmd::Pull => {
            let remote = remote_from_config(cfg)?;
            if !session.try_begin_sync() {
                return Err(anyhow!("A sync is already in progress"));
            }
            let result = remote.load();
            session.end_sync();

            match result {
                Ok(None) => {
                    session.store = LedgerStore::default();
                    session.mark_loaded();
                    session.reconcile_day();
                    session.store.save(ledger_path, now_utc())?;
                    cfg.last_sync_at = Some(now_utc());
                    write_config(cfg_path, cfg)?;
                    println!("remote empty\t(no data yet)");
                    Ok(())
                }
                Ok(Some(snapshot)) => {
                    session.store = LedgerStore::from_snapshot(snapshot, today_local());
                    session.mark_loaded();
                    session.reconcile_day();
                    session.store.save(ledger_path, now_utc())?;
                    cfg.last_sync_at = Some(now_utc());
                    write_config(cfg_path, cfg)?;
                    println!(
                        "pulled\t{} trips, {} expenses",
                        session.store.trips.len(),
                        session.store.expenses.len()
                    );
                    Ok(())
                }
                Err(SyncError::SessionExpired) => {
                    expire_session(cfg, cfg_path);
                    Err(anyhow!("Session expired. Run: rutero login"))
                }
                Err(err) => {
                    // Local copy stays authoritative; the user can keep working.
                    eprintln!("sync failed: {err}");
                    println!(
                        "using local copy\t{} trips, {} expenses",
                        session.store.trips.len(),
                        session.store.expenses.len()
                    );
                    Ok(())
                }
            }
        }
        SyncCmd::Push => {
            if !session.is_loaded() {
                return Err(anyhow!("Local data has not been loaded yet"));
            }
            // Never clobber server data with an empty startup state.
            if cfg.last_sync_at.is_none() && session.store.is_empty() {
                return Err(anyhow!(
                    "Refusing to overwrite the remote store with an empty ledger before the first pull. Run: rutero sync pull"
                ));
            }

            let remote = remote_from_config(cfg)?;
            if !session.try_begin_sync() {
                return Err(anyhow!("A sync is already in progress"));
            }
            let result = remote.save(&session.store.snapshot(now_utc()));
            session.end_sync();

            match result {
                Ok(()) => {
                    cfg.last_sync_at = Some(now_utc());
                    write_config(cfg_path, cfg)?;
                    println!(
                        "pushed\t{} trips, {} expenses",
                        session.store.trips.len(),
                        session.store.expenses.len()
                    );
                    Ok(())
                }
                Err(SyncError::SessionExpired) => {
                    expire_session(cfg, cfg_path);
                    Err(anyhow!("Session expired. Run: rutero login"))
                }
                Err(err) => {
                    eprintln!("sync failed: {err}");
                    println!("kept local copy");
                    Ok(())
                }
            }
        }
    }
}

/// Best-effort background save after a local mutation. The local change
/// is already committed; a remote failure only warns. Skipped entirely
/// until a first pull has succeeded (startup-overwrite guard).
pub fn auto_push(session: &mut Session, cfg: &mut AppConfig, cfg_path: &Path) {
    if !session.is_loaded() {
        return;
    }
    if cfg.token.is_none() || cfg.api_url.is_none() {
        return;
    }
    if cfg.last_sync_at.is_none() {
        return;
    }
    if !session.try_begin_sync() {
        return;
    }

    let result = match remote_from_config(cfg) {
        Ok(remote) => remote.save(&session.store.snapshot(now_utc())),
        Err(err) => {
            session.end_sync();
            eprintln!("sync skipped: {err:#}");
            return;
        }
    };
    session.end_sync();

    match result {
        Ok(()) => {
            cfg.last_sync_at = Some(now_utc());
            if let Err(err) = write_config(cfg_path, cfg) {
                eprintln!("Failed to record sync time: {err:#}");
            }
        }
        Err(SyncError::SessionExpired) => {
            expire_session(cfg, cfg_path);
            eprintln!("Session expired; changes kept locally. Run: rutero login");
        }
        Err(err) => {
            eprintln!("sync failed: {err} (changes kept locally)");
        }
    }
}

fn prompt_password(prompt: &str) -> Result<String> {
    eprint!("{prompt}");
    io::stderr().flush().ok();
    let mut line = String::new();
    io::stdin().read_line(&mut line)?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}
