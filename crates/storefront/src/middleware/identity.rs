//! Identity resolution and extractors.
//!
//! A request carries up to two identities in its session: a signed-in user
//! (written by the authentication service) and a guest session id (minted by
//! `POST /session/guest`). The user id is confirmed against the database
//! through [`IdentityCache`], a read-through cache with a TTL and a background
//! sweep, so a deleted account stops resolving within one TTL.

use std::time::Duration;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use moka::future::Cache;
use sqlx::PgPool;
use tokio::task::JoinHandle;
use tower_sessions::Session;

use pantry_core::{GuestSessionId, Owner, UserId};

use crate::db::{RepositoryError, UserRepository};
use crate::error::{AppError, set_sentry_user};
use crate::models::{CurrentUser, session_keys};
use crate::state::AppState;

/// How often expired identity entries are evicted.
const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

// =============================================================================
// Identity Cache
// =============================================================================

/// Read-through cache of "does this user id exist".
#[derive(Clone)]
pub struct IdentityCache {
    pool: PgPool,
    users: Cache<UserId, bool>,
}

impl IdentityCache {
    /// Create a cache whose entries live for `ttl`.
    #[must_use]
    pub fn new(pool: PgPool, ttl: Duration) -> Self {
        let users = Cache::builder()
            .max_capacity(10_000)
            .time_to_live(ttl)
            .build();
        Self { pool, users }
    }

    /// Whether `id` refers to an existing user, consulting the database on a miss.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the lookup fails. Failures are
    /// not cached.
    pub async fn user_exists(&self, id: UserId) -> Result<bool, RepositoryError> {
        if let Some(exists) = self.users.get(&id).await {
            return Ok(exists);
        }
        let exists = UserRepository::new(&self.pool).exists(id).await?;
        self.users.insert(id, exists).await;
        Ok(exists)
    }

    /// Drop a cached entry (e.g. after the account changed).
    pub async fn invalidate(&self, id: UserId) {
        self.users.invalidate(&id).await;
    }

    /// Start the background sweep that evicts expired entries.
    ///
    /// The task runs until aborted.
    #[must_use]
    pub fn spawn_sweeper(&self) -> JoinHandle<()> {
        let users = self.users.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(SWEEP_INTERVAL);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                users.run_pending_tasks().await;
                tracing::trace!(entries = users.entry_count(), "Swept identity cache");
            }
        })
    }
}

// =============================================================================
// Extractors
// =============================================================================

/// Both identities of a request, either of which may be absent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Identity {
    pub user: Option<UserId>,
    pub guest: Option<GuestSessionId>,
}

impl Identity {
    /// The cart owner for this request: the user if signed in, else the guest.
    #[must_use]
    pub fn owner(&self) -> Option<Owner> {
        self.user
            .map(Owner::User)
            .or_else(|| self.guest.map(Owner::Guest))
    }
}

impl FromRequestParts<AppState> for Identity {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let Some(session) = parts.extensions.get::<Session>() else {
            return Ok(Self::default());
        };

        let (guest, current) = read_session(session).await?;

        let user = match current {
            Some(current) if state.identity().user_exists(current.id).await? => {
                set_sentry_user(&current.id, None);
                Some(current.id)
            }
            Some(current) => {
                tracing::warn!(user_id = %current.id, "Session refers to unknown user");
                None
            }
            None => None,
        };

        Ok(Self { user, guest })
    }
}

/// Read both identity keys from the session.
///
/// A store or decode failure is an error, not an anonymous request.
async fn read_session(
    session: &Session,
) -> Result<(Option<GuestSessionId>, Option<CurrentUser>), AppError> {
    let guest = session
        .get::<GuestSessionId>(session_keys::GUEST_SESSION_ID)
        .await?;
    let current = session
        .get::<CurrentUser>(session_keys::CURRENT_USER)
        .await?;
    Ok((guest, current))
}

/// Extractor that requires a cart owner (user or guest); 401 otherwise.
pub struct RequireOwner(pub Owner);

impl FromRequestParts<AppState> for RequireOwner {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let identity = Identity::from_request_parts(parts, state).await?;
        identity
            .owner()
            .map(Self)
            .ok_or_else(|| AppError::Unauthorized("no user or guest session".to_string()))
    }
}

/// Extractor that requires a signed-in user; 401 otherwise.
pub struct RequireUser(pub UserId);

impl FromRequestParts<AppState> for RequireUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let identity = Identity::from_request_parts(parts, state).await?;
        identity
            .user
            .map(Self)
            .ok_or_else(|| AppError::Unauthorized("sign in required".to_string()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use axum::http::StatusCode;
    use axum::response::IntoResponse;
    use tower_sessions::MemoryStore;

    use super::*;

    fn session() -> Session {
        Session::new(None, Arc::new(MemoryStore::default()), None)
    }

    #[tokio::test]
    async fn test_read_session_returns_stored_identities() {
        let session = session();
        let guest = GuestSessionId::generate();
        session
            .insert(session_keys::GUEST_SESSION_ID, guest)
            .await
            .unwrap();
        session
            .insert(
                session_keys::CURRENT_USER,
                CurrentUser {
                    id: UserId::new(7),
                },
            )
            .await
            .unwrap();

        let (read_guest, current) = read_session(&session).await.unwrap();
        assert_eq!(read_guest, Some(guest));
        assert_eq!(current.map(|c| c.id), Some(UserId::new(7)));
    }

    #[tokio::test]
    async fn test_read_session_of_empty_session_is_anonymous() {
        let (guest, current) = read_session(&session()).await.unwrap();
        assert!(guest.is_none());
        assert!(current.is_none());
    }

    #[tokio::test]
    async fn test_unreadable_session_is_server_error_not_unauthorized() {
        let session = session();
        session
            .insert(session_keys::GUEST_SESSION_ID, "not-a-uuid")
            .await
            .unwrap();

        let err = read_session(&session).await.unwrap_err();
        assert!(matches!(err, AppError::Internal(_)));
        assert_eq!(
            err.into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_owner_prefers_user() {
        let guest = GuestSessionId::generate();
        let both = Identity {
            user: Some(UserId::new(4)),
            guest: Some(guest),
        };
        assert_eq!(both.owner(), Some(Owner::User(UserId::new(4))));

        let guest_only = Identity {
            user: None,
            guest: Some(guest),
        };
        assert_eq!(guest_only.owner(), Some(Owner::Guest(guest)));

        assert_eq!(Identity::default().owner(), None);
    }
}
