//! Tests for list reconciliation: full replacement, ordering guard, trigger coalescing.

mod common;

use std::sync::atomic::Ordering;
use std::time::Duration;

use bookmark_sync::{NewBookmark, Reconciler, RefreshOutcome, Trigger, ViewState};
use bookmark_sync::platform::BookmarkStore;
use common::{bookmark, eventually, minutes_ago, MockStore};

fn spawn(store: &std::sync::Arc<MockStore>, user_id: &str, debounce: Duration) -> Reconciler {
    let (reconciler, _worker) = Reconciler::spawn(store.clone(), user_id, ViewState::new(), debounce);
    reconciler
}

#[tokio::test]
async fn test_refresh_replaces_view_with_own_rows_newest_first() {
    let store = MockStore::new();
    store.seed(bookmark("old", "alice", minutes_ago(30)));
    store.seed(bookmark("new", "alice", minutes_ago(1)));
    store.seed(bookmark("mid", "alice", minutes_ago(10)));
    store.seed(bookmark("bob", "bob", minutes_ago(5)));

    let reconciler = spawn(&store, "alice", Duration::from_millis(10));
    let outcome = reconciler.refresh().await.expect("refresh failed");
    assert_eq!(outcome, RefreshOutcome::Applied { revision: 1, count: 3 });

    let ids: Vec<String> = reconciler
        .view()
        .current()
        .bookmarks
        .into_iter()
        .map(|b| b.id)
        .collect();
    assert_eq!(ids, vec!["new", "mid", "old"]);
}

#[tokio::test]
async fn test_rows_of_other_users_never_reach_the_view() {
    let store = MockStore::new();
    store.seed(bookmark("mine", "alice", minutes_ago(2)));
    store.seed(bookmark("theirs", "bob", minutes_ago(1)));
    store.leak_other_users.store(true, Ordering::SeqCst);

    let reconciler = spawn(&store, "alice", Duration::from_millis(10));
    reconciler.refresh().await.unwrap();

    let snapshot = reconciler.view().current();
    assert!(snapshot.bookmarks.iter().all(|b| b.user_id == "alice"));
    assert!(snapshot.contains("mine"));
    assert!(!snapshot.contains("theirs"));
}

#[tokio::test]
async fn test_failed_refresh_keeps_previous_snapshot() {
    let store = MockStore::new();
    store.seed(bookmark("a", "alice", minutes_ago(1)));
    let reconciler = spawn(&store, "alice", Duration::from_millis(10));
    reconciler.refresh().await.unwrap();
    let before = reconciler.view().current();

    store.fail_lists.store(true, Ordering::SeqCst);
    assert!(reconciler.refresh().await.is_err());

    assert_eq!(reconciler.view().current(), before);
}

#[tokio::test]
async fn test_slow_older_response_does_not_overwrite_newer_one() {
    let store = MockStore::new();
    store.seed(bookmark("first", "alice", minutes_ago(5)));
    let reconciler = spawn(&store, "alice", Duration::from_millis(10));

    // The first fetch reads the one-row list, then stalls.
    store.delay_next_list(Duration::from_millis(300));
    let slow = {
        let reconciler = reconciler.clone();
        tokio::spawn(async move { reconciler.refresh().await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;

    store
        .insert(NewBookmark {
            title: "Second".to_string(),
            url: "https://example.com/second".to_string(),
            user_id: "alice".to_string(),
        })
        .await
        .unwrap();
    let fast = reconciler.refresh().await.unwrap();
    assert_eq!(fast, RefreshOutcome::Applied { revision: 2, count: 2 });

    let stale = slow.await.unwrap().unwrap();
    assert_eq!(stale, RefreshOutcome::Superseded { revision: 1 });

    let snapshot = reconciler.view().current();
    assert_eq!(snapshot.revision, 2);
    assert_eq!(snapshot.bookmarks.len(), 2);
}

#[tokio::test]
async fn test_triggers_within_window_share_one_fetch() {
    let store = MockStore::new();
    store.seed(bookmark("a", "alice", minutes_ago(1)));
    let reconciler = spawn(&store, "alice", Duration::from_millis(80));

    reconciler.request(Trigger::InitialLoad);
    reconciler.request(Trigger::LocalMutation);
    reconciler.request(Trigger::Push);
    reconciler.request(Trigger::Push);
    reconciler.request(Trigger::Manual);

    eventually(reconciler.view(), |s| s.is_loaded()).await;
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(store.lists(), 1);
}

#[tokio::test]
async fn test_triggers_in_separate_windows_fetch_again() {
    let store = MockStore::new();
    let reconciler = spawn(&store, "alice", Duration::from_millis(20));

    reconciler.request(Trigger::InitialLoad);
    eventually(reconciler.view(), |s| s.revision == 1).await;

    store.seed(bookmark("late", "alice", minutes_ago(0)));
    reconciler.request(Trigger::Push);
    let snapshot = eventually(reconciler.view(), |s| s.revision == 2).await;

    assert!(snapshot.contains("late"));
    assert_eq!(store.lists(), 2);
}

#[tokio::test]
async fn test_back_to_back_refreshes_are_idempotent() {
    let store = MockStore::new();
    store.seed(bookmark("a", "alice", minutes_ago(3)));
    store.seed(bookmark("b", "alice", minutes_ago(2)));
    let reconciler = spawn(&store, "alice", Duration::from_millis(10));

    reconciler.refresh().await.unwrap();
    let first = reconciler.view().current();
    reconciler.refresh().await.unwrap();
    let second = reconciler.view().current();

    assert_eq!(first.bookmarks, second.bookmarks);
    assert!(second.revision > first.revision);
}

#[tokio::test]
async fn test_steady_pushes_with_slow_fetches_still_update_the_view() {
    let store = MockStore::new();
    store.seed(bookmark("a", "alice", minutes_ago(1)));
    store.slow_down_lists(Duration::from_millis(150));
    let reconciler = spawn(&store, "alice", Duration::from_millis(20));

    let started = tokio::time::Instant::now();
    let pushes = {
        let reconciler = reconciler.clone();
        tokio::spawn(async move {
            for _ in 0..30 {
                reconciler.request(Trigger::Push);
                tokio::time::sleep(Duration::from_millis(40)).await;
            }
        })
    };

    // Loads while pushes are still arriving, not only once they stop.
    eventually(reconciler.view(), |s| s.is_loaded()).await;
    assert!(started.elapsed() < Duration::from_millis(1000));

    pushes.await.unwrap();
    store.seed(bookmark("b", "alice", minutes_ago(0)));
    reconciler.request(Trigger::Push);
    eventually(reconciler.view(), |s| s.contains("b")).await;

    // One fetch at a time: pushes during a fetch share a single follow-up.
    assert!(store.lists() <= 14, "too many fetches: {}", store.lists());
}

#[tokio::test]
async fn test_failed_newer_fetch_does_not_discard_older_result() {
    let store = MockStore::new();
    store.seed(bookmark("a", "alice", minutes_ago(1)));
    let reconciler = spawn(&store, "alice", Duration::from_millis(10));

    store.delay_next_list(Duration::from_millis(200));
    let slow = {
        let reconciler = reconciler.clone();
        tokio::spawn(async move { reconciler.refresh().await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;

    store.fail_lists.store(true, Ordering::SeqCst);
    assert!(reconciler.refresh().await.is_err());

    let outcome = slow.await.unwrap().unwrap();
    assert_eq!(outcome, RefreshOutcome::Applied { revision: 1, count: 1 });
    assert!(reconciler.view().current().contains("a"));
}
