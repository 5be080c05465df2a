use async_trait::async_trait;
use dashmap::DashMap;
use thiserror::Error;

use super::{session_id, Session, User};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("session store unavailable: {0}")]
    Unavailable(String),

    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

/// Persistence behind session lookups.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Find the session bound to `token` as seen from `client_ip`.
    async fn find_session(&self, client_ip: &str, token: &str)
        -> Result<Option<Session>, StoreError>;

    /// Return `session` with its user record brought up to date.
    async fn refresh_user(&self, session: Session) -> Result<Session, StoreError> {
        Ok(session)
    }
}

/// In-process session store keyed by session id.
#[derive(Default)]
pub struct MemorySessionStore {
    sessions: DashMap<String, Session>,
    users: DashMap<String, User>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, token: &str, session: Session) {
        self.sessions.insert(session_id(token), session);
    }

    pub fn remove(&self, token: &str) -> Option<Session> {
        self.sessions.remove(&session_id(token)).map(|(_, s)| s)
    }

    /// Store the current record for a user; sessions pick it up on refresh.
    pub fn put_user(&self, user: User) {
        self.users.insert(user.uid.clone(), user);
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn find_session(
        &self,
        _client_ip: &str,
        token: &str,
    ) -> Result<Option<Session>, StoreError> {
        Ok(self
            .sessions
            .get(&session_id(token))
            .map(|entry| entry.value().clone()))
    }

    async fn refresh_user(&self, session: Session) -> Result<Session, StoreError> {
        let current = session
            .user()
            .and_then(|u| self.users.get(&u.uid))
            .map(|entry| entry.value().clone());

        Ok(match current {
            Some(user) => session.with_user(user),
            None => session,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acl::Role;

    #[tokio::test]
    async fn test_find_by_token() {
        let store = MemorySessionStore::new();
        store.insert("tok-1", Session::new("tok-1"));
        assert_eq!(store.len(), 1);

        let found = store.find_session("10.0.0.1", "tok-1").await.unwrap();
        assert_eq!(found.unwrap().id(), session_id("tok-1"));
        assert!(store
            .find_session("10.0.0.1", "tok-2")
            .await
            .unwrap()
            .is_none());

        assert!(store.remove("tok-1").is_some());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_refresh_user_picks_up_changes() {
        let store = MemorySessionStore::new();
        let session = Session::new("tok").with_user(User::new("u1", "alice", Role::User));

        let same = store.refresh_user(session.clone()).await.unwrap();
        assert_eq!(same.user_role(), Role::User);

        let mut demoted = User::new("u1", "alice", Role::Viewer);
        demoted.disabled = true;
        store.put_user(demoted);

        let refreshed = store.refresh_user(session).await.unwrap();
        assert_eq!(refreshed.user_role(), Role::Viewer);
        assert!(refreshed.user().unwrap().is_disabled());
    }
}
