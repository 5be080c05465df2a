//! The authorization pipeline.
//!
//! Every call ends in a [`Session`]: an active one when the request may
//! proceed, or an `unauthorized`/`forbidden` sentinel. Denials are values, not
//! errors, and each terminal branch emits exactly one audit event.

use secrecy::ExposeSecret;
use std::sync::Arc;
use subtle::ConstantTimeEq;

use crate::acl::{Acl, Permission, Resource, Role};
use crate::audit::{AuditEvent, AuditLevel, AuditOutcome, AuditSink};
use crate::cluster::{TokenVerifier, TrustBridge};
use crate::config::{AuthzConfig, ConfigProvider, StaticConfig};
use crate::error::AuthzError;
use crate::http::AuthRequest;
use crate::session::{
    AuthMethod, AuthProvider, Client, GrantType, Session, SessionResolver, SessionStore,
};

const VISION_SERVICE_UID: &str = "vision";
const VISION_SERVICE_NAME: &str = "Vision Service";

pub struct Authorizer {
    acl: Arc<Acl>,
    config: Arc<dyn ConfigProvider>,
    sessions: SessionResolver,
    bridge: TrustBridge,
    audit: Arc<dyn AuditSink>,
}

/// Per-call audit context.
struct Decision<'a> {
    request: &'a AuthRequest,
    resource: Resource,
    perms: &'a [Permission],
}

impl Decision<'_> {
    fn event(&self, level: AuditLevel, outcome: AuditOutcome, message: &str) -> AuditEvent {
        AuditEvent::new(
            level,
            outcome,
            self.request.client_ip(),
            self.resource,
            self.perms,
            message,
        )
        .with_request_id(self.request.request_id())
        .with_role(Role::None)
    }

    fn for_session(
        &self,
        session: &Session,
        role: Role,
        level: AuditLevel,
        outcome: AuditOutcome,
        message: &str,
    ) -> AuditEvent {
        self.event(level, outcome, message)
            .with_ref_id(session.ref_id())
            .with_subject(session.subject())
            .with_role(role)
    }
}

impl Authorizer {
    pub fn new(
        acl: Acl,
        config: Arc<dyn ConfigProvider>,
        store: Arc<dyn SessionStore>,
        verifier: Arc<dyn TokenVerifier>,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        Self {
            acl: Arc::new(acl),
            sessions: SessionResolver::new(store, config.clone()),
            bridge: TrustBridge::new(config.clone(), verifier),
            config,
            audit,
        }
    }

    /// Validate `config`, build its access control list and wire the
    /// pipeline around a fixed configuration.
    pub fn from_config(
        config: AuthzConfig,
        store: Arc<dyn SessionStore>,
        verifier: Arc<dyn TokenVerifier>,
        audit: Arc<dyn AuditSink>,
    ) -> Result<Self, AuthzError> {
        config.validate()?;
        let acl = config.build_acl()?;

        tracing::info!(
            node = %config.node_uuid(),
            name = config.node_name(),
            public = config.public(),
            portal = config.is_portal(),
            cluster_tokens = config.jwks_url().is_some(),
            "Authorization engine configured"
        );

        Ok(Self::new(
            acl,
            Arc::new(StaticConfig::new(config)),
            store,
            verifier,
            audit,
        ))
    }

    pub fn acl(&self) -> &Acl {
        &self.acl
    }

    pub fn config(&self) -> Arc<AuthzConfig> {
        self.config.current()
    }

    pub async fn authorize(
        &self,
        request: &AuthRequest,
        resource: Resource,
        perm: Permission,
    ) -> Session {
        self.authorize_any(request, resource, &[perm]).await
    }

    /// Authorize a request that needs at least one of `perms` on `resource`.
    pub async fn authorize_any(
        &self,
        request: &AuthRequest,
        resource: Resource,
        perms: &[Permission],
    ) -> Session {
        let decision = Decision {
            request,
            resource,
            perms,
        };

        if request.from_cdn() {
            self.audit.emit(decision.event(
                AuditLevel::Warn,
                AuditOutcome::Denied,
                "authenticated request relayed by cdn",
            ));
            return Session::forbidden();
        }

        let config = self.config.current();

        if let Some(session) = self.service_key_session(&config, request, resource) {
            self.audit.emit(decision.for_session(
                &session,
                Role::Service,
                AuditLevel::Info,
                AuditOutcome::Granted,
                "service key accepted",
            ));
            return session;
        }

        let token = request.auth_token();
        let client_ip = request.client_ip();

        let session = match self.sessions.resolve(client_ip, token).await {
            Some(session) => session,
            None => {
                return match self.bridge.authenticate(client_ip, token, resource).await {
                    Ok(session) => {
                        self.audit.emit(decision.for_session(
                            &session,
                            session.client_role(),
                            AuditLevel::Info,
                            AuditOutcome::Granted,
                            "cluster token accepted",
                        ));
                        session
                    }
                    Err(rejection) => {
                        tracing::debug!(client_ip, reason = rejection.as_str(), "No session for request");
                        self.audit.emit(decision.event(
                            AuditLevel::Warn,
                            AuditOutcome::Denied,
                            "invalid session",
                        ));
                        Session::unauthorized()
                    }
                };
            }
        };

        if session.is_client() {
            self.authorize_client(&decision, session)
        } else {
            self.authorize_user(&decision, session)
        }
    }

    fn service_key_session(
        &self,
        config: &AuthzConfig,
        request: &AuthRequest,
        resource: Resource,
    ) -> Option<Session> {
        if resource != Resource::Vision || !config.vision_api() {
            return None;
        }

        let token = request.auth_token();
        let key = config.vision_key()?;
        if token.is_empty() || !bool::from(token.as_bytes().ct_eq(key.expose_secret().as_bytes())) {
            return None;
        }

        Some(
            Session::new(token)
                .with_client_ip(request.client_ip())
                .with_client(Client::new(
                    VISION_SERVICE_UID,
                    VISION_SERVICE_NAME,
                    Role::Service,
                ))
                .with_scope(resource.as_str())
                .with_auth(
                    AuthProvider::Service,
                    AuthMethod::ServiceKey,
                    GrantType::ServiceKey,
                ),
        )
    }

    fn authorize_client(&self, decision: &Decision<'_>, session: Session) -> Session {
        let role = session.client_role();
        let (resource, perms) = (decision.resource, decision.perms);

        if session.insufficient_scope(resource, perms) {
            self.audit.emit(decision.for_session(
                &session,
                role,
                AuditLevel::Error,
                AuditOutcome::Error,
                "insufficient scope",
            ));
            return Session::forbidden();
        }

        if self.acl.deny_all(resource, role, perms) {
            self.audit.emit(decision.for_session(
                &session,
                role,
                AuditLevel::Error,
                AuditOutcome::Denied,
                "client role not permitted",
            ));
            return Session::forbidden();
        }

        if session.no_user() {
            self.audit.emit(decision.for_session(
                &session,
                role,
                AuditLevel::Info,
                AuditOutcome::Granted,
                "client role permitted",
            ));
            return session;
        }

        let usable = session
            .user()
            .is_some_and(|u| u.is_registered() && !u.is_disabled());
        if !usable {
            self.audit.emit(decision.for_session(
                &session,
                role,
                AuditLevel::Error,
                AuditOutcome::Denied,
                "client user account is disabled or unregistered",
            ));
            return Session::forbidden();
        }

        let user_role = session.user_role();
        if self.acl.deny_all(resource, user_role, perms) {
            self.audit.emit(decision.for_session(
                &session,
                user_role,
                AuditLevel::Error,
                AuditOutcome::Denied,
                "client user role not permitted",
            ));
            return Session::forbidden();
        }

        self.audit.emit(decision.for_session(
            &session,
            user_role,
            AuditLevel::Info,
            AuditOutcome::Granted,
            "client and user roles permitted",
        ));
        session
    }

    fn authorize_user(&self, decision: &Decision<'_>, session: Session) -> Session {
        let role = session.user_role();
        let (resource, perms) = (decision.resource, decision.perms);

        let known = session
            .user()
            .is_some_and(|u| !u.is_unknown() && !u.is_disabled());
        if !known {
            self.audit.emit(decision.for_session(
                &session,
                role,
                AuditLevel::Error,
                AuditOutcome::Denied,
                "unknown or disabled user",
            ));
            return Session::unauthorized();
        }

        if session.insufficient_scope(resource, perms) {
            self.audit.emit(decision.for_session(
                &session,
                role,
                AuditLevel::Error,
                AuditOutcome::Error,
                "insufficient scope",
            ));
            return Session::forbidden();
        }

        if self.acl.deny_all(resource, role, perms) {
            self.audit.emit(decision.for_session(
                &session,
                role,
                AuditLevel::Error,
                AuditOutcome::Denied,
                "user role not permitted",
            ));
            return Session::forbidden();
        }

        self.audit.emit(decision.for_session(
            &session,
            role,
            AuditLevel::Info,
            AuditOutcome::Granted,
            "user role permitted",
        ));
        session
    }
}
