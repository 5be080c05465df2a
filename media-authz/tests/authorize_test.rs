mod common;

use common::*;
use media_authz::audit::{AuditOutcome, ChannelAuditSink, MemoryAuditSink};
use media_authz::cluster::{JwksVerifier, StaticKeySetSource};
use media_authz::config::{AuthzConfig, StaticConfig};
use media_authz::session::{Client, User};
use media_authz::{
    AuthRequest, Authorizer, MemorySessionStore, Permission, Resource, Role, Session,
    SessionStatus,
};
use std::sync::Arc;
use uuid::Uuid;

fn public_engine() -> TestEngine {
    let mut config = AuthzConfig::new(Uuid::new_v4());
    config.public = true;
    engine(
        Arc::new(StaticConfig::new(config)),
        Arc::new(StaticKeySetSource::new()),
    )
}

fn private_engine() -> TestEngine {
    engine(
        Arc::new(StaticConfig::new(AuthzConfig::new(Uuid::new_v4()))),
        Arc::new(StaticKeySetSource::new()),
    )
}

fn anonymous() -> AuthRequest {
    AuthRequest::new("192.0.2.10", "")
}

fn with_token(token: &str) -> AuthRequest {
    AuthRequest::new("192.0.2.10", token)
}

#[tokio::test]
async fn test_public_mode_grants_admin_actions() {
    let t = public_engine();
    let session = t
        .authorizer
        .authorize(&anonymous(), Resource::Files, Permission::Update)
        .await;

    assert_eq!(session.http_status(), 200);
    assert_eq!(session.user_role(), Role::Admin);
    assert_eq!(session.user_name(), "admin");
    assert_eq!(t.audit.last().unwrap().outcome, AuditOutcome::Granted);
}

#[tokio::test]
async fn test_public_mode_is_still_role_scoped() {
    let t = public_engine();
    let session = t
        .authorizer
        .authorize(&anonymous(), Resource::Users, Permission::Upload)
        .await;

    assert_eq!(session.http_status(), 403);
    let event = t.audit.last().unwrap();
    assert_eq!(event.outcome, AuditOutcome::Denied);
    assert_eq!(event.role, Some(Role::Admin));
}

#[tokio::test]
async fn test_client_without_user_uses_client_role() {
    let t = private_engine();
    t.store.insert(
        "client-token",
        Session::new("client-token").with_client(Client::new("cs1", "backup", Role::Client)),
    );

    let session = t
        .authorizer
        .authorize(&with_token("client-token"), Resource::Files, Permission::Update)
        .await;
    assert!(session.is_active());
    assert_eq!(t.audit.last().unwrap().role, Some(Role::Client));
}

#[tokio::test]
async fn test_client_scope_is_enforced() {
    let t = private_engine();
    t.store.insert(
        "client-token",
        Session::new("client-token")
            .with_client(Client::new("cs1", "backup", Role::Client))
            .with_scope("read files"),
    );

    let denied = t
        .authorizer
        .authorize(&with_token("client-token"), Resource::Files, Permission::Update)
        .await;
    assert_eq!(denied.status(), SessionStatus::Forbidden);
    assert_eq!(t.audit.last().unwrap().outcome, AuditOutcome::Error);

    let granted = t
        .authorizer
        .authorize(&with_token("client-token"), Resource::Files, Permission::Download)
        .await;
    assert!(granted.is_active());

    let other = t
        .authorizer
        .authorize(&with_token("client-token"), Resource::Photos, Permission::View)
        .await;
    assert_eq!(other.status(), SessionStatus::Forbidden);
}

#[tokio::test]
async fn test_client_role_denial_is_forbidden() {
    let t = private_engine();
    t.store.insert(
        "svc",
        Session::new("svc").with_client(Client::new("cs2", "indexer", Role::Service)),
    );

    let session = t
        .authorizer
        .authorize(&with_token("svc"), Resource::Metrics, Permission::View)
        .await;
    assert_eq!(session.status(), SessionStatus::Forbidden);
    assert_eq!(t.audit.last().unwrap().role, Some(Role::Service));
}

#[tokio::test]
async fn test_client_with_user_checks_both_roles() {
    let t = private_engine();
    t.store.insert(
        "app",
        Session::new("app")
            .with_client(Client::new("cs3", "mobile", Role::Client))
            .with_user(User::new("u7", "vic", Role::Viewer)),
    );

    let granted = t
        .authorizer
        .authorize(&with_token("app"), Resource::Photos, Permission::View)
        .await;
    assert!(granted.is_active());

    let denied = t
        .authorizer
        .authorize(&with_token("app"), Resource::Photos, Permission::Delete)
        .await;
    assert_eq!(denied.status(), SessionStatus::Forbidden);
    assert_eq!(t.audit.last().unwrap().role, Some(Role::Viewer));
}

#[tokio::test]
async fn test_client_with_unusable_user_is_forbidden() {
    let t = private_engine();

    let mut disabled = User::new("u8", "mallory", Role::Admin);
    disabled.disabled = true;
    t.store.insert(
        "disabled",
        Session::new("disabled")
            .with_client(Client::new("cs4", "cli", Role::Client))
            .with_user(disabled),
    );

    let mut unregistered = User::new("u9", "guest", Role::Admin);
    unregistered.registered = false;
    t.store.insert(
        "unregistered",
        Session::new("unregistered")
            .with_client(Client::new("cs5", "cli", Role::Client))
            .with_user(unregistered),
    );

    for token in ["disabled", "unregistered"] {
        let session = t
            .authorizer
            .authorize(&with_token(token), Resource::Photos, Permission::View)
            .await;
        assert_eq!(session.status(), SessionStatus::Forbidden, "{token}");
    }
}

#[tokio::test]
async fn test_user_refresh_applies_current_role() {
    let t = private_engine();
    t.store.insert(
        "tok",
        Session::new("tok").with_user(User::new("u1", "ann", Role::Admin)),
    );

    let session = t
        .authorizer
        .authorize(&with_token("tok"), Resource::Settings, Permission::Update)
        .await;
    assert!(session.is_active());

    // Demoted after the session was created.
    t.store.put_user(User::new("u1", "ann", Role::Visitor));

    let session = t
        .authorizer
        .authorize(&with_token("tok"), Resource::Settings, Permission::Update)
        .await;
    assert_eq!(session.status(), SessionStatus::Forbidden);
}

#[tokio::test]
async fn test_configured_overrides_apply() {
    let config: AuthzConfig = service_core::config::from_toml_str(
        r#"
        [node]
        uuid = "9d1e6a44-7f0e-4c6f-8c35-0a7f2f3b9e11"

        [acl.metrics]
        viewer = ["view"]
        "#,
    )
    .unwrap();

    let store = Arc::new(MemorySessionStore::new());
    store.insert(
        "tok",
        Session::new("tok").with_user(User::new("u2", "vic", Role::Viewer)),
    );

    let verifier = JwksVerifier::from_config(Arc::new(StaticKeySetSource::new()), &config.jwks);
    let authorizer = Authorizer::from_config(
        config,
        store,
        Arc::new(verifier),
        Arc::new(MemoryAuditSink::new()),
    )
    .unwrap();

    let session = authorizer
        .authorize(&with_token("tok"), Resource::Metrics, Permission::View)
        .await;
    assert!(session.is_active());
}

#[tokio::test]
async fn test_audit_through_channel() {
    let memory = Arc::new(MemoryAuditSink::new());
    let (sink, forwarder) = ChannelAuditSink::spawn(16, memory.clone());

    let mut config = AuthzConfig::new(Uuid::new_v4());
    config.public = true;
    let authorizer = Authorizer::new(
        media_authz::acl::default_rules(),
        Arc::new(StaticConfig::new(config)),
        Arc::new(MemorySessionStore::new()),
        Arc::new(JwksVerifier::new(Arc::new(StaticKeySetSource::new()), 60)),
        Arc::new(sink),
    );

    authorizer
        .authorize(&anonymous(), Resource::Photos, Permission::View)
        .await;
    authorizer
        .authorize(&anonymous(), Resource::Users, Permission::Upload)
        .await;

    drop(authorizer);
    forwarder.await.unwrap();

    let outcomes: Vec<_> = memory.events().into_iter().map(|e| e.outcome).collect();
    assert_eq!(outcomes, vec![AuditOutcome::Granted, AuditOutcome::Denied]);
}

#[tokio::test]
async fn test_audit_never_contains_token() {
    let t = private_engine();
    let secret = "tok-7f3a9c1e5b";
    t.store.insert(
        secret,
        Session::new(secret).with_user(User::new("u1", "ann", Role::Viewer)),
    );

    t.authorizer
        .authorize(&with_token(secret), Resource::Photos, Permission::Delete)
        .await;
    t.authorizer
        .authorize(&with_token("missing-token"), Resource::Photos, Permission::View)
        .await;

    for event in t.audit.events() {
        let json = serde_json::to_string(&event).unwrap();
        assert!(!json.contains(secret));
        assert!(!json.contains("missing-token"));
        assert!(!event.to_string().contains(secret));
    }
}
