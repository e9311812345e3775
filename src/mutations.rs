use std::sync::Arc;

use tracing::{error, info};
use url::Url;

use crate::error::{Error, Result};
use crate::models::{Bookmark, NewBookmark};
use crate::platform::BookmarkStore;
use crate::reconciler::{Reconciler, Trigger};

/// The add-bookmark form. Cleared only after a successful insert.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BookmarkForm {
    pub title: String,
    pub url: String,
}

impl BookmarkForm {
    pub fn new(title: impl Into<String>, url: impl Into<String>) -> Self {
        BookmarkForm {
            title: title.into(),
            url: url.into(),
        }
    }

    /// Field constraints: a title is required and the URL must be absolute.
    pub fn validate(&self, user_id: &str) -> Result<NewBookmark> {
        let title = self.title.trim();
        if title.is_empty() {
            return Err(Error::validation("title is required"));
        }
        let url = self.url.trim();
        if url.is_empty() {
            return Err(Error::validation("URL is required"));
        }
        Url::parse(url).map_err(|e| Error::validation(format!("'{}' is not a valid URL: {}", url, e)))?;
        Ok(NewBookmark {
            title: title.to_string(),
            url: url.to_string(),
            user_id: user_id.to_string(),
        })
    }

    pub fn clear(&mut self) {
        self.title.clear();
        self.url.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.title.is_empty() && self.url.is_empty()
    }
}

/// A blocking yes/no prompt.
pub trait Confirm {
    fn confirm(&self, prompt: &str) -> bool;
}

impl<F> Confirm for F
where
    F: Fn(&str) -> bool,
{
    fn confirm(&self, prompt: &str) -> bool {
        self(prompt)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    /// The prompt was declined; nothing was sent.
    Declined,
}

/// Sends creates and deletes. Never edits the view directly: the list only
/// changes when the follow-up refresh lands.
#[derive(Clone)]
pub struct MutationIssuer {
    store: Arc<dyn BookmarkStore>,
    reconciler: Reconciler,
}

impl MutationIssuer {
    pub fn new(store: Arc<dyn BookmarkStore>, reconciler: Reconciler) -> Self {
        MutationIssuer { store, reconciler }
    }

    pub async fn create(&self, form: &mut BookmarkForm) -> Result<Bookmark> {
        let bookmark = form.validate(self.reconciler.user_id())?;
        let created = self.store.insert(bookmark).await.map_err(|err| {
            error!(error = %err, "failed to add bookmark");
            err
        })?;
        info!(id = %created.id, "bookmark added");
        form.clear();
        self.reconciler.request(Trigger::LocalMutation);
        Ok(created)
    }

    pub async fn delete(&self, id: &str, confirm: &dyn Confirm) -> Result<DeleteOutcome> {
        if !confirm.confirm("Delete this bookmark?") {
            return Ok(DeleteOutcome::Declined);
        }
        self.store
            .delete(self.reconciler.user_id(), id)
            .await
            .map_err(|err| {
                error!(%id, error = %err, "failed to delete bookmark");
                err
            })?;
        info!(%id, "bookmark deleted");
        self.reconciler.request(Trigger::LocalMutation);
        Ok(DeleteOutcome::Deleted)
    }
}
