//! Change notification subscriptions.
//!
//! Delivery is best effort: events can arrive late, more than once, or not at
//! all once the channel has failed. Consumers treat every event as "something
//! changed" and re-read the authoritative list.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use diesel::dsl::max;
use diesel::prelude::*;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

use super::ChangeNotifier;
use crate::db::Database;
use crate::error::{Error, Result};
use crate::models::ChangeRecord;
use crate::schema::bookmark_changes;

pub const BOOKMARKS_TABLE: &str = "bookmarks";

const EVENT_BUFFER: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

impl ChangeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeKind::Insert => "insert",
            ChangeKind::Update => "update",
            ChangeKind::Delete => "delete",
        }
    }

    fn parse(value: &str) -> Option<Self> {
        match value {
            "insert" => Some(ChangeKind::Insert),
            "update" => Some(ChangeKind::Update),
            "delete" => Some(ChangeKind::Delete),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    pub kind: ChangeKind,
    pub bookmark_id: String,
    pub user_id: String,
    pub changed_at: NaiveDateTime,
}

/// Server-side filter for a subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeFilter {
    pub table: String,
    pub user_id: String,
}

impl ChangeFilter {
    pub fn bookmarks_for(user_id: &str) -> Self {
        ChangeFilter {
            table: BOOKMARKS_TABLE.to_string(),
            user_id: user_id.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelStatus {
    Joining,
    Subscribed,
    ChannelError(String),
    Closed,
}

impl fmt::Display for ChannelStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelStatus::Joining => write!(f, "joining"),
            ChannelStatus::Subscribed => write!(f, "subscribed"),
            ChannelStatus::ChannelError(message) => write!(f, "channel error: {}", message),
            ChannelStatus::Closed => write!(f, "closed"),
        }
    }
}

/// A live subscription. Dropping it stops delivery and reports `Closed`.
pub struct Subscription {
    events: mpsc::Receiver<ChangeEvent>,
    status: Arc<watch::Sender<ChannelStatus>>,
    task: Option<JoinHandle<()>>,
}

impl Subscription {
    pub fn new(
        events: mpsc::Receiver<ChangeEvent>,
        status: impl Into<Arc<watch::Sender<ChannelStatus>>>,
    ) -> Self {
        Subscription {
            events,
            status: status.into(),
            task: None,
        }
    }

    /// Ties a delivery task to this subscription so it is aborted on drop.
    pub fn with_task(mut self, task: JoinHandle<()>) -> Self {
        self.task = Some(task);
        self
    }

    /// Next event, or `None` once the channel has closed.
    pub async fn recv(&mut self) -> Option<ChangeEvent> {
        self.events.recv().await
    }

    pub fn status(&self) -> watch::Receiver<ChannelStatus> {
        self.status.subscribe()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
        self.status.send_replace(ChannelStatus::Closed);
    }
}

/// Notifier over the `bookmark_changes` log. Each subscription polls the log
/// for rows newer than its cursor, so commits from other processes sharing
/// the database file are delivered too.
pub struct SqliteChangeFeed {
    db: Database,
    poll_interval: Duration,
}

impl SqliteChangeFeed {
    pub fn new(db: Database, poll_interval: Duration) -> Self {
        SqliteChangeFeed { db, poll_interval }
    }
}

#[async_trait]
impl ChangeNotifier for SqliteChangeFeed {
    async fn subscribe(&self, filter: ChangeFilter) -> Result<Subscription> {
        if filter.table != BOOKMARKS_TABLE {
            return Err(Error::Channel(format!("unknown table '{}'", filter.table)));
        }

        let (status_tx, _) = watch::channel(ChannelStatus::Joining);
        let status = Arc::new(status_tx);
        let cursor = self
            .db
            .exec(|conn| {
                Ok(bookmark_changes::table
                    .select(max(bookmark_changes::id))
                    .first::<Option<i64>>(conn)?
                    .unwrap_or(0))
            })
            .await?;

        let (events_tx, events_rx) = mpsc::channel(EVENT_BUFFER);
        let task = tokio::spawn(poll_changes(
            self.db.clone(),
            filter.user_id,
            cursor,
            self.poll_interval,
            events_tx,
            Arc::clone(&status),
        ));

        Ok(Subscription::new(events_rx, status).with_task(task))
    }
}

async fn poll_changes(
    db: Database,
    user_id: String,
    mut cursor: i64,
    poll_interval: Duration,
    events: mpsc::Sender<ChangeEvent>,
    status: Arc<watch::Sender<ChannelStatus>>,
) {
    status.send_replace(ChannelStatus::Subscribed);
    debug!(%user_id, cursor, "change subscription active");

    let mut ticker = tokio::time::interval(poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;

        let filter_user = user_id.clone();
        let rows = db
            .exec(move |conn| {
                Ok(bookmark_changes::table
                    .filter(bookmark_changes::id.gt(cursor))
                    .filter(bookmark_changes::user_id.eq(&filter_user))
                    .order(bookmark_changes::id.asc())
                    .select(ChangeRecord::as_select())
                    .load(conn)?)
            })
            .await;

        let rows = match rows {
            Ok(rows) => rows,
            Err(err) => {
                warn!(%user_id, error = %err, "change subscription failed");
                status.send_replace(ChannelStatus::ChannelError(err.to_string()));
                return;
            }
        };

        for row in rows {
            cursor = row.id;
            let Some(kind) = ChangeKind::parse(&row.kind) else {
                warn!(kind = %row.kind, "skipping change with unknown kind");
                continue;
            };
            let event = ChangeEvent {
                kind,
                bookmark_id: row.bookmark_id,
                user_id: row.user_id,
                changed_at: row.changed_at,
            };
            if events.send(event).await.is_err() {
                status.send_replace(ChannelStatus::Closed);
                return;
            }
        }
    }
}
