//! Keeps a [`ViewState`] in line with the store.
//!
//! Every trigger (initial load, a local mutation, a push event) asks for the
//! same thing: fetch the user's full list and replace the view. Triggers go
//! through a queue that collects them for a short window and then issues one
//! fetch; triggers arriving while that fetch runs collapse into one follow-up.
//! Each fetch takes a sequence number when it starts, and a response is
//! applied only if no later-started fetch has already been applied.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::platform::BookmarkStore;
use crate::view::ViewState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    InitialLoad,
    LocalMutation,
    Push,
    Manual,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// The fetched list is now the view's contents.
    Applied { revision: u64, count: usize },
    /// A fetch started later was applied first; result dropped.
    Superseded { revision: u64 },
}

struct Inner {
    store: Arc<dyn BookmarkStore>,
    user_id: String,
    view: ViewState,
    issued: AtomicU64,
}

/// Cloneable handle. The queue worker stops once every handle is dropped.
#[derive(Clone)]
pub struct Reconciler {
    inner: Arc<Inner>,
    queue: mpsc::UnboundedSender<Trigger>,
}

impl Reconciler {
    /// Starts the trigger queue worker. Must be called inside a tokio runtime.
    pub fn spawn(
        store: Arc<dyn BookmarkStore>,
        user_id: impl Into<String>,
        view: ViewState,
        debounce: Duration,
    ) -> (Reconciler, JoinHandle<()>) {
        let inner = Arc::new(Inner {
            store,
            user_id: user_id.into(),
            view,
            issued: AtomicU64::new(0),
        });
        let (queue, rx) = mpsc::unbounded_channel();
        let worker = tokio::spawn(run_queue(Arc::clone(&inner), rx, debounce));
        (Reconciler { inner, queue }, worker)
    }

    pub fn view(&self) -> &ViewState {
        &self.inner.view
    }

    pub fn user_id(&self) -> &str {
        &self.inner.user_id
    }

    /// Asks for a refresh soon. Triggers arriving close together share one fetch.
    pub fn request(&self, trigger: Trigger) {
        if self.queue.send(trigger).is_err() {
            warn!(?trigger, "refresh queue is closed, trigger dropped");
        }
    }

    /// Fetches and applies immediately, bypassing the queue.
    ///
    /// On error the view keeps its previous snapshot.
    pub async fn refresh(&self) -> Result<RefreshOutcome> {
        self.inner.refresh().await
    }
}

impl Inner {
    async fn refresh(&self) -> Result<RefreshOutcome> {
        let revision = self.issued.fetch_add(1, Ordering::SeqCst) + 1;

        let mut bookmarks = match self.store.list_for_user(&self.user_id).await {
            Ok(bookmarks) => bookmarks,
            Err(err) => {
                warn!(revision, error = %err, "refresh failed, keeping previous list");
                return Err(err);
            }
        };

        let fetched = bookmarks.len();
        bookmarks.retain(|bookmark| bookmark.user_id == self.user_id);
        if bookmarks.len() != fetched {
            warn!(
                revision,
                dropped = fetched - bookmarks.len(),
                "store returned rows owned by another user"
            );
        }

        let count = bookmarks.len();
        if self.view.replace(revision, bookmarks) {
            debug!(revision, count, "view refreshed");
            Ok(RefreshOutcome::Applied { revision, count })
        } else {
            debug!(revision, "discarding superseded refresh");
            Ok(RefreshOutcome::Superseded { revision })
        }
    }
}

/// Collects triggers from the first one until `debounce` has elapsed, then
/// runs one refresh for the whole batch. Triggers sent during that refresh
/// wait in the channel and form the next batch.
async fn run_queue(
    inner: Arc<Inner>,
    mut rx: mpsc::UnboundedReceiver<Trigger>,
    debounce: Duration,
) {
    debug!(user_id = %inner.user_id, "refresh queue started");

    while let Some(first) = rx.recv().await {
        let mut batch = vec![first];
        let deadline = Instant::now() + debounce;
        let mut closed = false;

        loop {
            tokio::select! {
                next = rx.recv() => match next {
                    Some(trigger) => batch.push(trigger),
                    None => {
                        closed = true;
                        break;
                    }
                },
                _ = tokio::time::sleep_until(deadline) => break,
            }
        }

        debug!(triggers = batch.len(), first = ?batch[0], "collapsed refresh triggers");
        // Failures are logged inside `refresh`; the next trigger retries.
        let _ = inner.refresh().await;

        if closed {
            break;
        }
    }

    info!("refresh queue stopped");
}
