use chrono::{Duration, NaiveDateTime};
use serde::Serialize;

use crate::error::Result;
use crate::models::Bookmark;
use crate::platform::BookmarkStore;

/// Dashboard counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Stats {
    pub total: i64,
    pub last_week: i64,
    pub last_day: i64,
}

impl Stats {
    /// Asks the store, using count queries.
    pub async fn fetch(store: &dyn BookmarkStore, user_id: &str, now: NaiveDateTime) -> Result<Stats> {
        Ok(Stats {
            total: store.count_for_user(user_id, None).await?,
            last_week: store.count_for_user(user_id, Some(now - Duration::days(7))).await?,
            last_day: store.count_for_user(user_id, Some(now - Duration::hours(24))).await?,
        })
    }

    /// Same counters computed from an already fetched list.
    pub fn tally(bookmarks: &[Bookmark], now: NaiveDateTime) -> Stats {
        let week_ago = now - Duration::days(7);
        let day_ago = now - Duration::hours(24);
        Stats {
            total: bookmarks.len() as i64,
            last_week: bookmarks.iter().filter(|b| b.created_at >= week_ago).count() as i64,
            last_day: bookmarks.iter().filter(|b| b.created_at >= day_ago).count() as i64,
        }
    }
}
