//! Tests for sign-in state, the session gate and the welcome marker.

use std::sync::Arc;

use async_trait::async_trait;
use bookmark_sync::db::Database;
use bookmark_sync::platform::{
    AuthProvider, MarkerStore, OAuthProvider, OAuthSignIn, SqliteAuth, SqliteMarkerStore,
};
use bookmark_sync::session::welcome_marker_key;
use bookmark_sync::{Admission, Error, Result, SessionGatekeeper};

struct Fixture {
    auth: Arc<SqliteAuth>,
    markers: Arc<SqliteMarkerStore>,
    gatekeeper: SessionGatekeeper,
}

fn fixture() -> Fixture {
    let db = Database::open_in_memory().expect("open_in_memory failed");
    let auth = Arc::new(SqliteAuth::new(db.clone()));
    let markers = Arc::new(SqliteMarkerStore::new(db));
    let gatekeeper = SessionGatekeeper::new(auth.clone(), markers.clone());
    Fixture {
        auth,
        markers,
        gatekeeper,
    }
}

fn google(email: &str) -> OAuthSignIn {
    OAuthSignIn {
        provider: OAuthProvider::Google,
        login_hint: email.to_string(),
    }
}

fn welcome_of(admission: Admission) -> bool {
    match admission {
        Admission::Admitted { show_welcome, .. } => show_welcome,
        Admission::Login => panic!("expected to be admitted"),
    }
}

#[tokio::test]
async fn test_no_session_redirects_to_login() {
    let f = fixture();
    assert_eq!(f.gatekeeper.admit().await.unwrap(), Admission::Login);
    assert!(matches!(f.auth.get_user().await, Err(Error::Unauthenticated)));
}

#[tokio::test]
async fn test_welcome_is_shown_once_per_user() {
    let f = fixture();
    f.auth.sign_in_with_oauth(google("alice@example.com")).await.unwrap();

    assert!(welcome_of(f.gatekeeper.admit().await.unwrap()));
    assert!(!welcome_of(f.gatekeeper.admit().await.unwrap()));

    f.auth.sign_in_with_oauth(google("bob@example.com")).await.unwrap();
    assert!(welcome_of(f.gatekeeper.admit().await.unwrap()));

    // Survives signing out and back in.
    f.auth.sign_out().await.unwrap();
    f.auth.sign_in_with_oauth(google("alice@example.com")).await.unwrap();
    assert!(!welcome_of(f.gatekeeper.admit().await.unwrap()));
}

/// Reads as empty and refuses every write.
struct ReadOnlyMarkers;

#[async_trait]
impl MarkerStore for ReadOnlyMarkers {
    async fn get(&self, _key: &str) -> Result<Option<String>> {
        Ok(None)
    }

    async fn set(&self, _key: &str, _value: &str) -> Result<()> {
        Err(Error::Io(std::io::Error::new(
            std::io::ErrorKind::PermissionDenied,
            "read-only storage",
        )))
    }
}

#[tokio::test]
async fn test_unwritable_welcome_marker_still_admits() {
    let f = fixture();
    f.auth.sign_in_with_oauth(google("alice@example.com")).await.unwrap();
    let gatekeeper = SessionGatekeeper::new(f.auth.clone(), Arc::new(ReadOnlyMarkers));

    match gatekeeper.admit().await.expect("admit should not fail on marker errors") {
        Admission::Admitted {
            session,
            show_welcome,
        } => {
            assert_eq!(session.user.email, "alice@example.com");
            assert!(show_welcome);
        }
        Admission::Login => panic!("expected to be admitted"),
    }
}

#[tokio::test]
async fn test_admitted_session_carries_the_user() {
    let f = fixture();
    f.auth.sign_in_with_oauth(google("Alice@Example.com")).await.unwrap();

    match f.gatekeeper.admit().await.unwrap() {
        Admission::Admitted { session, .. } => {
            assert_eq!(session.user.email, "alice@example.com");
            assert_eq!(session.user.provider, "google");
            let marker = welcome_marker_key(&session.user.id);
            assert!(f.markers.has(&marker).await.unwrap());
        }
        Admission::Login => panic!("expected to be admitted"),
    }
}

#[tokio::test]
async fn test_same_identity_keeps_its_user_id() {
    let f = fixture();
    f.auth.sign_in_with_oauth(google("alice@example.com")).await.unwrap();
    let first = f.auth.get_user().await.unwrap();
    f.auth.sign_out().await.unwrap();
    f.auth.sign_in_with_oauth(google("alice@example.com")).await.unwrap();
    let second = f.auth.get_user().await.unwrap();
    assert_eq!(first.id, second.id);

    f.auth
        .sign_in_with_oauth(OAuthSignIn {
            provider: OAuthProvider::Github,
            login_hint: "alice@example.com".to_string(),
        })
        .await
        .unwrap();
    let github = f.auth.get_user().await.unwrap();
    assert_ne!(github.id, first.id);
}

#[tokio::test]
async fn test_sign_out_ends_the_session() {
    let f = fixture();
    f.auth.sign_in_with_oauth(google("alice@example.com")).await.unwrap();
    f.auth.sign_out().await.unwrap();
    assert!(f.auth.get_session().await.unwrap().is_none());
    assert_eq!(f.gatekeeper.admit().await.unwrap(), Admission::Login);
}

#[tokio::test]
async fn test_blank_login_hint_is_rejected() {
    let f = fixture();
    let result = f.auth.sign_in_with_oauth(google("   ")).await;
    assert!(matches!(result, Err(Error::Validation(_))));
}

#[tokio::test]
async fn test_markers_get_set_has() {
    let f = fixture();
    assert!(!f.markers.has("welcome-shown-x").await.unwrap());
    assert_eq!(f.markers.get("welcome-shown-x").await.unwrap(), None);

    f.markers.set("welcome-shown-x", "true").await.unwrap();
    f.markers.set("welcome-shown-x", "again").await.unwrap();

    assert!(f.markers.has("welcome-shown-x").await.unwrap());
    assert_eq!(
        f.markers.get("welcome-shown-x").await.unwrap().as_deref(),
        Some("again")
    );
}

#[test]
fn test_provider_names_parse() {
    assert_eq!("google".parse::<OAuthProvider>().unwrap(), OAuthProvider::Google);
    assert_eq!("GitHub".parse::<OAuthProvider>().unwrap(), OAuthProvider::Github);
    assert!("myspace".parse::<OAuthProvider>().is_err());
}
