use super::schema::*;
use chrono::NaiveDateTime;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};

/// One bookmark as stored remotely. Never edited after insert.
#[derive(Queryable, Selectable, Identifiable, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[diesel(table_name = bookmarks)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct Bookmark {
    pub id: String,
    pub title: String,
    pub url: String,
    pub user_id: String,
    /// Server-assigned, UTC.
    pub created_at: NaiveDateTime,
}

/// What a client submits; the store assigns `id` and `created_at`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewBookmark {
    pub title: String,
    pub url: String,
    pub user_id: String,
}

#[derive(Insertable)]
#[diesel(table_name = bookmarks)]
pub struct BookmarkToInsert<'a> {
    pub id: &'a str,
    pub title: &'a str,
    pub url: &'a str,
    pub user_id: &'a str,
    pub created_at: NaiveDateTime,
}

#[derive(Queryable, Selectable, Debug, Clone)]
#[diesel(table_name = bookmark_changes)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct ChangeRecord {
    pub id: i64,
    pub bookmark_id: String,
    pub user_id: String,
    pub kind: String,
    pub changed_at: NaiveDateTime,
}

#[derive(Insertable)]
#[diesel(table_name = bookmark_changes)]
pub struct ChangeToInsert<'a> {
    pub bookmark_id: &'a str,
    pub user_id: &'a str,
    pub kind: &'a str,
    pub changed_at: NaiveDateTime,
}

/// An identity known to the auth provider.
#[derive(Queryable, Selectable, Insertable, Serialize, Debug, Clone, PartialEq, Eq)]
#[diesel(table_name = users)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct User {
    pub id: String,
    pub provider: String,
    pub email: String,
    pub created_at: NaiveDateTime,
}

#[derive(Queryable, Selectable, Insertable, Debug, Clone)]
#[diesel(table_name = sessions)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct SessionRecord {
    pub id: String,
    pub user_id: String,
    pub created_at: NaiveDateTime,
}

/// The signed-in identity on this device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub id: String,
    pub user: User,
    pub created_at: NaiveDateTime,
}

#[derive(Queryable, Insertable, Debug, Clone)]
#[diesel(table_name = markers)]
pub struct Marker {
    pub key: String,
    pub value: String,
}
