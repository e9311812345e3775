//! Personal bookmarks kept in a hosted store, with a list view that
//! reconciles itself against push notifications.
//!
//! ```text
//!   MutationIssuer ──insert/delete──▶ BookmarkStore ──▶ change log
//!         │                                ▲                 │
//!         │ Trigger::LocalMutation         │ list_for_user   │ ChangeNotifier
//!         ▼                                │                 ▼
//!   Reconciler (debounced queue, sequence guard) ◀── Trigger::Push
//!         │
//!         ▼ replace(revision, list)
//!     ViewState ──▶ renderers
//! ```

pub mod config;
pub mod dashboard;
pub mod db;
pub mod error;
pub mod models;
pub mod mutations;
pub mod platform;
pub mod reconciler;
pub mod schema;
pub mod session;
pub mod stats;
pub mod view;

pub use config::{Config, SyncOptions};
pub use dashboard::Dashboard;
pub use error::{Error, Result};
pub use models::{Bookmark, NewBookmark, Session, User};
pub use mutations::{BookmarkForm, Confirm, DeleteOutcome, MutationIssuer};
pub use platform::Platform;
pub use reconciler::{Reconciler, RefreshOutcome, Trigger};
pub use session::{Admission, SessionGatekeeper};
pub use stats::Stats;
pub use view::{Snapshot, ViewState};
