//! Authenticated sessions.
//!
//! A session is created by a successful login. It ends on logout, when it
//! outlives the configured TTL, or when the upstream API stops accepting its
//! token. Each one is an immutable [`Session`] behind an `Arc`, keyed by an
//! opaque id handed to the browser.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::models::User;

// ---

#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub id: Uuid,
    /// Bearer token for the upstream API.
    pub token: String,
    pub user: User,
    pub issued_at: DateTime<Utc>,
}

impl Session {
    pub fn is_expired(&self, ttl: Duration, now: DateTime<Utc>) -> bool {
        now - self.issued_at >= ttl
    }
}

#[derive(Debug)]
pub struct SessionStore {
    sessions: RwLock<HashMap<Uuid, Arc<Session>>>,
    ttl: Duration,
}

impl SessionStore {
    // ---
    pub fn new(ttl: Duration) -> Self {
        SessionStore {
            sessions: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    pub async fn login(&self, token: String, user: User) -> Arc<Session> {
        self.login_at(token, user, Utc::now()).await
    }

    async fn login_at(&self, token: String, user: User, now: DateTime<Utc>) -> Arc<Session> {
        // ---
        let session = Arc::new(Session {
            id: Uuid::new_v4(),
            token,
            user,
            issued_at: now,
        });
        self.sessions
            .write()
            .await
            .insert(session.id, Arc::clone(&session));
        tracing::info!("Session opened for {}", session.user.username);
        session
    }

    /// Live session for `id`. Finding an expired one prunes every expired
    /// entry.
    pub async fn get(&self, id: &Uuid) -> Option<Arc<Session>> {
        self.get_at(id, Utc::now()).await
    }

    async fn get_at(&self, id: &Uuid, now: DateTime<Utc>) -> Option<Arc<Session>> {
        // ---
        let session = self.sessions.read().await.get(id).cloned()?;
        if !session.is_expired(self.ttl, now) {
            return Some(session);
        }
        self.purge_expired_at(now).await;
        None
    }

    /// Drop every session older than the TTL. Returns how many were removed.
    async fn purge_expired_at(&self, now: DateTime<Utc>) -> usize {
        // ---
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, s| !s.is_expired(self.ttl, now));
        let removed = before - sessions.len();
        if removed > 0 {
            tracing::info!("Expired {} session(s)", removed);
        }
        removed
    }

    /// Returns `false` if no such session existed.
    pub async fn logout(&self, id: &Uuid) -> bool {
        // ---
        match self.sessions.write().await.remove(id) {
            Some(session) => {
                tracing::info!("Session closed for {}", session.user.username);
                true
            }
            None => false,
        }
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use crate::models::Id;

    fn user() -> User {
        User {
            id: Id::from("1"),
            username: "admin".to_string(),
            full_name: None,
            role: "admin".to_string(),
        }
    }

    fn store() -> SessionStore {
        SessionStore::new(Duration::hours(8))
    }

    #[tokio::test]
    async fn test_login_then_logout() {
        // ---
        let store = store();
        let session = store.login("tok".to_string(), user()).await;

        let found = store.get(&session.id).await.expect("session stored");
        assert_eq!(found.token, "tok");
        assert_eq!(store.len().await, 1);

        assert!(store.logout(&session.id).await);
        assert!(store.get(&session.id).await.is_none());
        assert!(!store.logout(&session.id).await);
    }

    #[tokio::test]
    async fn test_sessions_are_independent() {
        // ---
        let store = store();
        let a = store.login("a".to_string(), user()).await;
        let b = store.login("b".to_string(), user()).await;
        assert_ne!(a.id, b.id);

        store.logout(&a.id).await;
        assert_eq!(store.get(&b.id).await.map(|s| s.token.clone()), Some("b".to_string()));
    }

    #[tokio::test]
    async fn test_session_expires_after_ttl() {
        // ---
        let store = SessionStore::new(Duration::seconds(60));
        let t0 = Utc::now();
        let old = store.login_at("old".to_string(), user(), t0).await;
        let fresh = store
            .login_at("fresh".to_string(), user(), t0 + Duration::seconds(50))
            .await;

        assert!(store.get_at(&old.id, t0 + Duration::seconds(59)).await.is_some());

        let later = t0 + Duration::seconds(60);
        assert!(store.get_at(&old.id, later).await.is_none());
        assert_eq!(store.len().await, 1, "expired entry is pruned");
        assert!(store.get_at(&fresh.id, later).await.is_some());
    }

    #[tokio::test]
    async fn test_abandoned_sessions_are_purged() {
        // ---
        let store = SessionStore::new(Duration::seconds(60));
        let t0 = Utc::now();
        for n in 0..100 {
            store.login_at(format!("tok-{n}"), user(), t0).await;
        }
        assert_eq!(store.len().await, 100);

        assert_eq!(store.purge_expired_at(t0 + Duration::seconds(30)).await, 0);
        assert_eq!(store.purge_expired_at(t0 + Duration::minutes(2)).await, 100);
        assert_eq!(store.len().await, 0);
    }
}
