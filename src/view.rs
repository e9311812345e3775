use std::sync::Arc;

use tokio::sync::watch;

use crate::models::Bookmark;

/// What the list view renders: the result of one complete fetch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    /// Sequence number of the fetch that produced this list; 0 before the first load.
    pub revision: u64,
    pub bookmarks: Vec<Bookmark>,
}

impl Snapshot {
    pub fn contains(&self, id: &str) -> bool {
        self.bookmarks.iter().any(|bookmark| bookmark.id == id)
    }

    pub fn is_loaded(&self) -> bool {
        self.revision > 0
    }
}

/// Holds the current list. Written only by the reconciler, read by anyone.
#[derive(Clone)]
pub struct ViewState {
    tx: Arc<watch::Sender<Snapshot>>,
}

impl Default for ViewState {
    fn default() -> Self {
        Self::new()
    }
}

impl ViewState {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(Snapshot::default());
        ViewState { tx: Arc::new(tx) }
    }

    pub fn current(&self) -> Snapshot {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Snapshot> {
        self.tx.subscribe()
    }

    /// Waits until the snapshot satisfies `predicate` and returns it.
    pub async fn wait_for(&self, mut predicate: impl FnMut(&Snapshot) -> bool) -> Snapshot {
        let mut rx = self.subscribe();
        // The sender lives as long as `self`, so this cannot observe a closed channel.
        let snapshot = match rx.wait_for(|snapshot| predicate(snapshot)).await {
            Ok(snapshot) => snapshot.clone(),
            Err(_) => self.current(),
        };
        snapshot
    }

    /// Swaps in a whole new list unless a newer revision is already shown.
    pub(crate) fn replace(&self, revision: u64, bookmarks: Vec<Bookmark>) -> bool {
        self.tx.send_if_modified(|snapshot| {
            if revision <= snapshot.revision {
                return false;
            }
            *snapshot = Snapshot {
                revision,
                bookmarks,
            };
            true
        })
    }
}
