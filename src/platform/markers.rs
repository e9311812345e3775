use async_trait::async_trait;
use diesel::prelude::*;

use super::MarkerStore;
use crate::db::Database;
use crate::error::Result;
use crate::models::Marker;
use crate::schema::markers;

/// Durable per-device key/value markers.
pub struct SqliteMarkerStore {
    db: Database,
}

impl SqliteMarkerStore {
    pub fn new(db: Database) -> Self {
        SqliteMarkerStore { db }
    }
}

#[async_trait]
impl MarkerStore for SqliteMarkerStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let key = key.to_string();
        self.db
            .exec(move |conn| {
                Ok(markers::table
                    .find(&key)
                    .select(markers::value)
                    .first::<String>(conn)
                    .optional()?)
            })
            .await
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        let marker = Marker {
            key: key.to_string(),
            value: value.to_string(),
        };
        self.db
            .exec(move |conn| {
                diesel::insert_into(markers::table)
                    .values(&marker)
                    .on_conflict(markers::key)
                    .do_update()
                    .set(markers::value.eq(&marker.value))
                    .execute(conn)?;
                Ok(())
            })
            .await
    }
}
