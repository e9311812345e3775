use std::sync::Arc;

use tracing::{debug, warn};

use crate::error::Result;
use crate::models::Session;
use crate::platform::{AuthProvider, MarkerStore};

pub fn welcome_marker_key(user_id: &str) -> String {
    format!("welcome-shown-{}", user_id)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admission {
    /// No session; send the user to sign in.
    Login,
    Admitted {
        session: Session,
        /// True the first time this user is admitted on this device.
        show_welcome: bool,
    },
}

/// Decides whether the bookmark view may be shown.
pub struct SessionGatekeeper {
    auth: Arc<dyn AuthProvider>,
    markers: Arc<dyn MarkerStore>,
}

impl SessionGatekeeper {
    pub fn new(auth: Arc<dyn AuthProvider>, markers: Arc<dyn MarkerStore>) -> Self {
        SessionGatekeeper { auth, markers }
    }

    pub async fn admit(&self) -> Result<Admission> {
        let Some(session) = self.auth.get_session().await? else {
            debug!("no active session");
            return Ok(Admission::Login);
        };

        let key = welcome_marker_key(&session.user.id);
        let show_welcome = !self.markers.has(&key).await?;
        if show_welcome {
            if let Err(err) = self.markers.set(&key, "true").await {
                warn!(user_id = %session.user.id, error = %err, "could not record welcome marker");
            }
        }
        Ok(Admission::Admitted {
            session,
            show_welcome,
        })
    }
}
