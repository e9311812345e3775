use std::env;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{Error, Result};

pub const DATABASE_ENV: &str = "BOOKMARK_SYNC_DATABASE";
pub const DEBOUNCE_ENV: &str = "BOOKMARK_SYNC_DEBOUNCE_MS";
pub const POLL_ENV: &str = "BOOKMARK_SYNC_POLL_MS";

/// Timing knobs for the live list view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncOptions {
    /// Window in which refresh triggers are collapsed into one fetch.
    pub debounce: Duration,
    /// How often a change subscription checks for new events.
    pub poll_interval: Duration,
}

impl Default for SyncOptions {
    fn default() -> Self {
        SyncOptions {
            debounce: Duration::from_millis(100),
            poll_interval: Duration::from_millis(250),
        }
    }
}

impl SyncOptions {
    /// Applies `BOOKMARK_SYNC_DEBOUNCE_MS` / `BOOKMARK_SYNC_POLL_MS` on top of the defaults.
    pub fn from_env() -> Result<Self> {
        let mut options = SyncOptions::default();
        if let Some(ms) = millis_from_env(DEBOUNCE_ENV)? {
            options.debounce = ms;
        }
        if let Some(ms) = millis_from_env(POLL_ENV)? {
            if ms.is_zero() {
                return Err(Error::config(format!("{} must be greater than zero", POLL_ENV)));
            }
            options.poll_interval = ms;
        }
        Ok(options)
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database: PathBuf,
    pub sync: SyncOptions,
}

impl Config {
    /// Resolves the database location: explicit flag, then the environment,
    /// then `~/.bookmark/bookmarks.db`.
    pub fn load(database_flag: Option<&str>) -> Result<Self> {
        let database = match database_flag {
            Some(value) => PathBuf::from(value),
            None => match env::var(DATABASE_ENV) {
                Ok(value) if !value.trim().is_empty() => PathBuf::from(value),
                _ => default_database_path()?,
            },
        };
        Ok(Config {
            database,
            sync: SyncOptions::from_env()?,
        })
    }

    pub fn database_str(&self) -> Result<&str> {
        self.database
            .to_str()
            .ok_or_else(|| Error::config("database path is not valid UTF-8"))
    }
}

pub fn default_database_path() -> Result<PathBuf> {
    let home_var = if cfg!(windows) { "APPDATA" } else { "HOME" };
    let home = env::var(home_var)
        .map_err(|_| Error::config(format!("{} is not set, pass --database", home_var)))?;
    let mut path = PathBuf::from(home);
    path.push(".bookmark");
    fs::create_dir_all(&path)?;
    path.push("bookmarks.db");
    Ok(path)
}

fn millis_from_env(key: &str) -> Result<Option<Duration>> {
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<u64>()
            .map(|ms| Some(Duration::from_millis(ms)))
            .map_err(|_| Error::config(format!("{} must be a number of milliseconds", key))),
        Err(_) => Ok(None),
    }
}
