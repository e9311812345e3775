//! Capabilities of the hosted backend: storage, identity, change
//! notifications and a small durable key/value store.
//!
//! Components never reach for a global client. They receive a [`Platform`]
//! (or the individual `Arc<dyn ...>` handles inside it) when constructed.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDateTime;

use crate::config::Config;
use crate::db::Database;
use crate::error::{Error, Result};
use crate::models::{Bookmark, NewBookmark, Session, User};

pub mod auth;
pub mod markers;
pub mod realtime;
pub mod store;

pub use auth::{OAuthProvider, OAuthSignIn, SqliteAuth};
pub use markers::SqliteMarkerStore;
pub use realtime::{
    ChangeEvent, ChangeFilter, ChangeKind, ChannelStatus, SqliteChangeFeed, Subscription,
};
pub use store::SqliteBookmarkStore;

/// The `bookmarks` table. Every call is scoped to one owning user.
#[async_trait]
pub trait BookmarkStore: Send + Sync {
    /// Inserts one row and returns it as stored.
    async fn insert(&self, bookmark: NewBookmark) -> Result<Bookmark>;

    /// All rows owned by `user_id`, most recent first.
    async fn list_for_user(&self, user_id: &str) -> Result<Vec<Bookmark>>;

    /// Counts rows owned by `user_id`, optionally only those created at or after `since`.
    async fn count_for_user(&self, user_id: &str, since: Option<NaiveDateTime>) -> Result<i64>;

    /// Fails with [`Error::NotFound`] when no row with `id` belongs to `user_id`.
    async fn delete(&self, user_id: &str, id: &str) -> Result<()>;
}

#[async_trait]
pub trait AuthProvider: Send + Sync {
    async fn get_session(&self) -> Result<Option<Session>>;

    async fn get_user(&self) -> Result<User> {
        self.get_session()
            .await?
            .map(|session| session.user)
            .ok_or(Error::Unauthenticated)
    }

    async fn sign_in_with_oauth(&self, request: OAuthSignIn) -> Result<()>;

    async fn sign_out(&self) -> Result<()>;
}

#[async_trait]
pub trait ChangeNotifier: Send + Sync {
    async fn subscribe(&self, filter: ChangeFilter) -> Result<Subscription>;
}

#[async_trait]
pub trait MarkerStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;

    async fn set(&self, key: &str, value: &str) -> Result<()>;

    async fn has(&self, key: &str) -> Result<bool> {
        Ok(self.get(key).await?.is_some())
    }
}

/// Handle to every backend capability, built once per process.
#[derive(Clone)]
pub struct Platform {
    pub store: Arc<dyn BookmarkStore>,
    pub auth: Arc<dyn AuthProvider>,
    pub notifier: Arc<dyn ChangeNotifier>,
    pub markers: Arc<dyn MarkerStore>,
}

impl Platform {
    pub fn new(
        store: Arc<dyn BookmarkStore>,
        auth: Arc<dyn AuthProvider>,
        notifier: Arc<dyn ChangeNotifier>,
        markers: Arc<dyn MarkerStore>,
    ) -> Self {
        Platform {
            store,
            auth,
            notifier,
            markers,
        }
    }

    /// Opens the SQLite-backed platform described by `config`.
    pub fn open(config: &Config) -> Result<Self> {
        let db = Database::open(config.database_str()?)?;
        Ok(Self::sqlite(db, config.sync.poll_interval))
    }

    pub fn sqlite(db: Database, poll_interval: std::time::Duration) -> Self {
        Platform::new(
            Arc::new(SqliteBookmarkStore::new(db.clone())),
            Arc::new(SqliteAuth::new(db.clone())),
            Arc::new(SqliteChangeFeed::new(db.clone(), poll_interval)),
            Arc::new(SqliteMarkerStore::new(db)),
        )
    }
}
