//! SQLite connection handling for the bundled platform.
//!
//! Diesel is synchronous, so every job runs on tokio's blocking pool while
//! holding the single shared connection.

use std::sync::{Arc, Mutex};

use chrono::{Duration, Utc};
use diesel::connection::SimpleConnection;
use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::schema::bookmark_changes;

const MIGRATIONS: EmbeddedMigrations = embed_migrations!();

/// Change log rows older than this are dropped on open. Live subscriptions
/// read new rows within one poll interval, so nothing this old is pending.
const CHANGE_LOG_RETENTION_HOURS: i64 = 24;

#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<SqliteConnection>>,
}

impl Database {
    /// Opens (or creates) the database file and applies pending migrations.
    pub fn open(path: &str) -> Result<Self> {
        let mut conn = SqliteConnection::establish(path)?;
        // https://sqlite.org/foreignkeys.html#fk_enable
        conn.batch_execute(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA foreign_keys = ON;
            PRAGMA busy_timeout = 5000;
            PRAGMA synchronous = NORMAL;
            ",
        )?;
        run_migrations(&mut conn)?;
        prune_change_log(&mut conn)?;
        debug!(path, "database ready");
        Ok(Database {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Private to this handle; clones share it, separate calls do not.
    pub fn open_in_memory() -> Result<Self> {
        Self::open(":memory:")
    }

    /// Runs `job` against the connection on the blocking pool.
    pub async fn exec<F, T>(&self, job: F) -> Result<T>
    where
        F: FnOnce(&mut SqliteConnection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut guard = conn
                .lock()
                .map_err(|_| Error::Task("database connection lock poisoned".to_string()))?;
            job(&mut *guard)
        })
        .await?
    }
}

fn run_migrations(conn: &mut SqliteConnection) -> Result<()> {
    let applied = conn
        .run_pending_migrations(MIGRATIONS)
        .map_err(|e| Error::Migration(e.to_string()))?;
    for version in &applied {
        info!(%version, "applied migration");
    }
    Ok(())
}

fn prune_change_log(conn: &mut SqliteConnection) -> Result<()> {
    let cutoff = Utc::now().naive_utc() - Duration::hours(CHANGE_LOG_RETENTION_HOURS);
    let pruned = diesel::delete(bookmark_changes::table.filter(bookmark_changes::changed_at.lt(cutoff)))
        .execute(conn)?;
    if pruned > 0 {
        debug!(pruned, "pruned change log");
    }
    Ok(())
}
