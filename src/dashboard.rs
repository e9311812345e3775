//! The mounted bookmark view for one signed-in user.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::SyncOptions;
use crate::error::Result;
use crate::models::User;
use crate::mutations::MutationIssuer;
use crate::platform::{BookmarkStore, ChangeFilter, ChannelStatus, Platform, Subscription};
use crate::reconciler::{Reconciler, Trigger};
use crate::stats::Stats;
use crate::view::ViewState;

pub struct Dashboard {
    user: User,
    store: Arc<dyn BookmarkStore>,
    view: ViewState,
    reconciler: Reconciler,
    issuer: MutationIssuer,
    channel: Option<watch::Receiver<ChannelStatus>>,
    worker: JoinHandle<()>,
    listener: Option<JoinHandle<()>>,
}

impl Dashboard {
    /// Starts the refresh queue, subscribes to changes for `user` and
    /// requests the initial load.
    pub async fn mount(platform: &Platform, user: User, options: &SyncOptions) -> Dashboard {
        let view = ViewState::new();
        let (reconciler, worker) = Reconciler::spawn(
            Arc::clone(&platform.store),
            user.id.clone(),
            view.clone(),
            options.debounce,
        );
        let issuer = MutationIssuer::new(Arc::clone(&platform.store), reconciler.clone());

        let (channel, listener) = match platform
            .notifier
            .subscribe(ChangeFilter::bookmarks_for(&user.id))
            .await
        {
            Ok(subscription) => {
                let status = subscription.status();
                let listener = tokio::spawn(forward_changes(subscription, reconciler.clone()));
                (Some(status), Some(listener))
            }
            Err(err) => {
                warn!(user_id = %user.id, error = %err, "live updates unavailable");
                (None, None)
            }
        };

        reconciler.request(Trigger::InitialLoad);
        info!(user_id = %user.id, "dashboard mounted");

        Dashboard {
            user,
            store: Arc::clone(&platform.store),
            view,
            reconciler,
            issuer,
            channel,
            worker,
            listener,
        }
    }

    pub fn user(&self) -> &User {
        &self.user
    }

    pub fn view(&self) -> &ViewState {
        &self.view
    }

    pub fn reconciler(&self) -> &Reconciler {
        &self.reconciler
    }

    pub fn issuer(&self) -> &MutationIssuer {
        &self.issuer
    }

    /// `None` when the subscription could not be opened.
    pub fn channel_status(&self) -> Option<watch::Receiver<ChannelStatus>> {
        self.channel.clone()
    }

    pub async fn stats(&self) -> Result<Stats> {
        Stats::fetch(self.store.as_ref(), &self.user.id, Utc::now().naive_utc()).await
    }

    /// Stops live updates and the refresh queue. Dropping does the same.
    pub fn unmount(self) {}
}

impl Drop for Dashboard {
    fn drop(&mut self) {
        if let Some(listener) = self.listener.take() {
            listener.abort();
        }
        self.worker.abort();
        debug!(user_id = %self.user.id, "dashboard unmounted");
    }
}

async fn forward_changes(mut subscription: Subscription, reconciler: Reconciler) {
    let mut status = subscription.status();
    let mut status_open = true;

    loop {
        tokio::select! {
            event = subscription.recv() => match event {
                Some(event) => {
                    debug!(kind = ?event.kind, bookmark_id = %event.bookmark_id, "change received");
                    reconciler.request(Trigger::Push);
                }
                None => {
                    warn!("change channel closed, relying on local refresh triggers");
                    return;
                }
            },
            changed = status.changed(), if status_open => {
                if changed.is_err() {
                    status_open = false;
                    continue;
                }
                let current = status.borrow_and_update().clone();
                match &current {
                    ChannelStatus::Subscribed => info!("live updates active"),
                    ChannelStatus::ChannelError(_) => {
                        warn!(status = %current, "live updates degraded, relying on local refresh triggers")
                    }
                    other => debug!(status = %other, "change channel status"),
                }
            }
        }
    }
}
