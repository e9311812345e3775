use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::Utc;
use diesel::prelude::*;
use tracing::info;
use uuid::Uuid;

use super::AuthProvider;
use crate::db::Database;
use crate::error::{Error, Result};
use crate::models::{Session, SessionRecord, User};
use crate::schema::{sessions, users};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OAuthProvider {
    Google,
    Github,
}

impl OAuthProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            OAuthProvider::Google => "google",
            OAuthProvider::Github => "github",
        }
    }
}

impl fmt::Display for OAuthProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OAuthProvider {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.to_ascii_lowercase().as_str() {
            "google" => Ok(OAuthProvider::Google),
            "github" => Ok(OAuthProvider::Github),
            other => Err(Error::config(format!("unsupported OAuth provider '{}'", other))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OAuthSignIn {
    pub provider: OAuthProvider,
    /// Account the provider should authenticate, usually an email address.
    pub login_hint: String,
}

/// Local identity provider. Completes the OAuth round trip immediately and
/// keeps a single current session for this device.
pub struct SqliteAuth {
    db: Database,
}

impl SqliteAuth {
    pub fn new(db: Database) -> Self {
        SqliteAuth { db }
    }
}

#[async_trait]
impl AuthProvider for SqliteAuth {
    async fn get_session(&self) -> Result<Option<Session>> {
        self.db
            .exec(|conn| {
                let row = sessions::table
                    .inner_join(users::table)
                    .order(sessions::created_at.desc())
                    .select((SessionRecord::as_select(), User::as_select()))
                    .first::<(SessionRecord, User)>(conn)
                    .optional()?;
                Ok(row.map(|(session, user)| Session {
                    id: session.id,
                    user,
                    created_at: session.created_at,
                }))
            })
            .await
    }

    async fn sign_in_with_oauth(&self, request: OAuthSignIn) -> Result<()> {
        let email = request.login_hint.trim().to_lowercase();
        if email.is_empty() {
            return Err(Error::validation("a login hint is required to sign in"));
        }
        let provider = request.provider;
        let user = self
            .db
            .exec(move |conn| {
                conn.immediate_transaction::<_, Error, _>(|conn| {
                    let existing = users::table
                        .filter(users::provider.eq(provider.as_str()))
                        .filter(users::email.eq(&email))
                        .select(User::as_select())
                        .first(conn)
                        .optional()?;
                    let user = match existing {
                        Some(user) => user,
                        None => {
                            let user = User {
                                id: Uuid::new_v4().to_string(),
                                provider: provider.as_str().to_string(),
                                email: email.clone(),
                                created_at: Utc::now().naive_utc(),
                            };
                            diesel::insert_into(users::table).values(&user).execute(conn)?;
                            user
                        }
                    };

                    diesel::delete(sessions::table).execute(conn)?;
                    diesel::insert_into(sessions::table)
                        .values(&SessionRecord {
                            id: Uuid::new_v4().to_string(),
                            user_id: user.id.clone(),
                            created_at: Utc::now().naive_utc(),
                        })
                        .execute(conn)?;
                    Ok(user)
                })
            })
            .await?;
        info!(user_id = %user.id, provider = %provider, "signed in");
        Ok(())
    }

    async fn sign_out(&self) -> Result<()> {
        let removed = self
            .db
            .exec(|conn| Ok(diesel::delete(sessions::table).execute(conn)?))
            .await?;
        if removed > 0 {
            info!("signed out");
        }
        Ok(())
    }
}
