use chrono::Utc;
use std::sync::Arc;
use tokio::time::timeout;

use super::{Session, SessionStore};
use crate::config::ConfigProvider;

/// Looks up the session for a token. Any failure resolves to "no session".
pub struct SessionResolver {
    store: Arc<dyn SessionStore>,
    config: Arc<dyn ConfigProvider>,
}

impl SessionResolver {
    pub fn new(store: Arc<dyn SessionStore>, config: Arc<dyn ConfigProvider>) -> Self {
        Self { store, config }
    }

    pub async fn resolve(&self, client_ip: &str, token: &str) -> Option<Session> {
        let config = self.config.current();

        if config.public() {
            return Some(Session::public().with_client_ip(client_ip));
        }

        if client_ip.is_empty() || token.is_empty() {
            return None;
        }

        let limit = config.timeouts.session_store();

        let session = match timeout(limit, self.store.find_session(client_ip, token)).await {
            Ok(Ok(Some(session))) => session,
            Ok(Ok(None)) => return None,
            Ok(Err(e)) => {
                tracing::warn!(client_ip, error = %e, "Session lookup failed");
                return None;
            }
            Err(_) => {
                tracing::warn!(client_ip, "Session lookup timed out");
                return None;
            }
        };

        if !session.is_active() || session.is_expired(Utc::now()) {
            tracing::debug!(client_ip, ref_id = session.ref_id(), "Session is no longer valid");
            return None;
        }

        match timeout(limit, self.store.refresh_user(session)).await {
            Ok(Ok(session)) => Some(session.with_client_ip(client_ip)),
            Ok(Err(e)) => {
                tracing::warn!(client_ip, error = %e, "Failed to refresh session user");
                None
            }
            Err(_) => {
                tracing::warn!(client_ip, "Session user refresh timed out");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acl::Role;
    use crate::config::{AuthzConfig, StaticConfig};
    use crate::session::{MemorySessionStore, StoreError, User};
    use async_trait::async_trait;
    use chrono::Duration;
    use uuid::Uuid;

    fn config(public: bool) -> Arc<dyn ConfigProvider> {
        let mut config = AuthzConfig::new(Uuid::new_v4());
        config.public = public;
        config.timeouts.session_store_ms = 50;
        Arc::new(StaticConfig::new(config))
    }

    struct FailingStore;

    #[async_trait]
    impl SessionStore for FailingStore {
        async fn find_session(&self, _: &str, _: &str) -> Result<Option<Session>, StoreError> {
            Err(StoreError::Unavailable("connection refused".to_string()))
        }
    }

    struct SlowStore;

    #[async_trait]
    impl SessionStore for SlowStore {
        async fn find_session(&self, _: &str, token: &str) -> Result<Option<Session>, StoreError> {
            tokio::time::sleep(std::time::Duration::from_secs(5)).await;
            Ok(Some(Session::new(token)))
        }
    }

    #[tokio::test]
    async fn test_public_mode_ignores_token() {
        let resolver = SessionResolver::new(Arc::new(MemorySessionStore::new()), config(true));
        let session = resolver.resolve("10.0.0.1", "").await.unwrap();
        assert_eq!(session.user_role(), Role::Admin);
        assert_eq!(session.client_ip(), "10.0.0.1");
    }

    #[tokio::test]
    async fn test_missing_inputs_resolve_to_none() {
        let store = Arc::new(MemorySessionStore::new());
        store.insert("tok", Session::new("tok"));
        let resolver = SessionResolver::new(store, config(false));

        assert!(resolver.resolve("", "tok").await.is_none());
        assert!(resolver.resolve("10.0.0.1", "").await.is_none());
        assert!(resolver.resolve("10.0.0.1", "other").await.is_none());
    }

    #[tokio::test]
    async fn test_resolves_and_binds_client_ip() {
        let store = Arc::new(MemorySessionStore::new());
        store.insert(
            "tok",
            Session::new("tok").with_user(User::new("u1", "alice", Role::User)),
        );
        store.put_user(User::new("u1", "alice", Role::Admin));
        let resolver = SessionResolver::new(store, config(false));

        let session = resolver.resolve("192.168.1.5", "tok").await.unwrap();
        assert_eq!(session.client_ip(), "192.168.1.5");
        assert_eq!(session.user_role(), Role::Admin);
    }

    #[tokio::test]
    async fn test_expired_session_is_ignored() {
        let store = Arc::new(MemorySessionStore::new());
        store.insert(
            "tok",
            Session::new("tok").with_expiry(Utc::now() - Duration::minutes(1)),
        );
        let resolver = SessionResolver::new(store, config(false));
        assert!(resolver.resolve("10.0.0.1", "tok").await.is_none());
    }

    #[tokio::test]
    async fn test_store_failure_fails_closed() {
        let resolver = SessionResolver::new(Arc::new(FailingStore), config(false));
        assert!(resolver.resolve("10.0.0.1", "tok").await.is_none());
    }

    #[tokio::test]
    async fn test_store_timeout_fails_closed() {
        let resolver = SessionResolver::new(Arc::new(SlowStore), config(false));
        assert!(resolver.resolve("10.0.0.1", "tok").await.is_none());
    }
}
