use async_trait::async_trait;
use chrono::{NaiveDateTime, Utc};
use diesel::prelude::*;
use diesel::SqliteConnection;
use tracing::debug;
use uuid::Uuid;

use super::realtime::ChangeKind;
use super::BookmarkStore;
use crate::db::Database;
use crate::error::{Error, Result};
use crate::models::{Bookmark, BookmarkToInsert, ChangeToInsert, NewBookmark};
use crate::schema::{bookmark_changes, bookmarks};

pub struct SqliteBookmarkStore {
    db: Database,
}

impl SqliteBookmarkStore {
    pub fn new(db: Database) -> Self {
        SqliteBookmarkStore { db }
    }
}

/// Appends to the feed read by change subscriptions. Call inside the
/// mutation's transaction so the two commit together.
fn record_change(
    conn: &mut SqliteConnection,
    bookmark_id: &str,
    user_id: &str,
    kind: ChangeKind,
) -> QueryResult<usize> {
    diesel::insert_into(bookmark_changes::table)
        .values(&ChangeToInsert {
            bookmark_id,
            user_id,
            kind: kind.as_str(),
            changed_at: Utc::now().naive_utc(),
        })
        .execute(conn)
}

#[async_trait]
impl BookmarkStore for SqliteBookmarkStore {
    async fn insert(&self, bookmark: NewBookmark) -> Result<Bookmark> {
        self.db
            .exec(move |conn| {
                conn.immediate_transaction::<_, Error, _>(|conn| {
                    let id = Uuid::new_v4().to_string();
                    let inserted = diesel::insert_into(bookmarks::table)
                        .values(&BookmarkToInsert {
                            id: &id,
                            title: &bookmark.title,
                            url: &bookmark.url,
                            user_id: &bookmark.user_id,
                            created_at: Utc::now().naive_utc(),
                        })
                        .returning(Bookmark::as_returning())
                        .get_result(conn)?;
                    record_change(conn, &inserted.id, &inserted.user_id, ChangeKind::Insert)?;
                    debug!(id = %inserted.id, user_id = %inserted.user_id, "bookmark inserted");
                    Ok(inserted)
                })
            })
            .await
    }

    async fn list_for_user(&self, user_id: &str) -> Result<Vec<Bookmark>> {
        let user_id = user_id.to_string();
        self.db
            .exec(move |conn| {
                Ok(bookmarks::table
                    .filter(bookmarks::user_id.eq(&user_id))
                    .order(bookmarks::created_at.desc())
                    .select(Bookmark::as_select())
                    .load(conn)?)
            })
            .await
    }

    async fn count_for_user(&self, user_id: &str, since: Option<NaiveDateTime>) -> Result<i64> {
        let user_id = user_id.to_string();
        self.db
            .exec(move |conn| {
                let mut query = bookmarks::table
                    .filter(bookmarks::user_id.eq(&user_id))
                    .into_boxed();
                if let Some(since) = since {
                    query = query.filter(bookmarks::created_at.ge(since));
                }
                Ok(query.count().get_result(conn)?)
            })
            .await
    }

    async fn delete(&self, user_id: &str, id: &str) -> Result<()> {
        let user_id = user_id.to_string();
        let id = id.to_string();
        self.db
            .exec(move |conn| {
                conn.immediate_transaction::<_, Error, _>(|conn| {
                    let removed = diesel::delete(
                        bookmarks::table
                            .filter(bookmarks::id.eq(&id))
                            .filter(bookmarks::user_id.eq(&user_id)),
                    )
                    .execute(conn)?;
                    if removed == 0 {
                        return Err(Error::NotFound(id.clone()));
                    }
                    record_change(conn, &id, &user_id, ChangeKind::Delete)?;
                    debug!(%id, %user_id, "bookmark deleted");
                    Ok(())
                })
            })
            .await
    }
}
