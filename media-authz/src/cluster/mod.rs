//! Cross-node trust: accepts signed tokens minted by the cluster portal in
//! place of a local session.

mod claims;
mod keys;
mod verifier;

pub use claims::{Claims, ExpectedClaims};
pub use keys::{HttpKeySetSource, KeySetSource, KeySourceError, StaticKeySetSource};
pub use verifier::{JwksVerifier, TokenVerifier, VerifyError};

use chrono::{TimeZone, Utc};
use std::sync::Arc;
use tokio::time::timeout;

use crate::acl::{Resource, Role};
use crate::config::{AuthzConfig, ConfigProvider};
use crate::session::{AuthMethod, AuthProvider, Client, GrantType, Session};

pub const SCOPE_CLUSTER: &str = "cluster";
pub const SCOPE_VISION: &str = "vision";

/// Why the bridge did not produce a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeRejection {
    /// Not shaped like a signed token.
    Malformed,
    /// The resource does not accept cross-node tokens.
    IneligibleResource,
    /// This node is the portal and never trusts its own tokens.
    PortalNode,
    /// No key set URL configured.
    NoKeySource,
    /// No issuer could be derived from configuration.
    NoIssuer,
    /// Every issuer candidate was rejected.
    VerificationFailed,
    TimedOut,
}

impl BridgeRejection {
    pub fn as_str(&self) -> &'static str {
        match self {
            BridgeRejection::Malformed => "malformed token",
            BridgeRejection::IneligibleResource => "resource does not accept cluster tokens",
            BridgeRejection::PortalNode => "portal node",
            BridgeRejection::NoKeySource => "no key set configured",
            BridgeRejection::NoIssuer => "no issuer configured",
            BridgeRejection::VerificationFailed => "token verification failed",
            BridgeRejection::TimedOut => "token verification timed out",
        }
    }
}

/// Three non-empty dot separated segments.
pub fn is_signed_token_shape(token: &str) -> bool {
    let mut parts = token.split('.');
    matches!(
        (parts.next(), parts.next(), parts.next(), parts.next()),
        (Some(h), Some(p), Some(s), None) if !h.is_empty() && !p.is_empty() && !s.is_empty()
    )
}

/// Scope a cross-node token must carry for `resource`.
pub fn required_scope(resource: Resource) -> &'static str {
    match resource {
        Resource::Vision => SCOPE_VISION,
        _ => SCOPE_CLUSTER,
    }
}

/// Issuers a cross-node token may carry, in the order they are tried.
pub fn issuer_candidates(config: &AuthzConfig) -> Vec<String> {
    let mut issuers: Vec<String> = Vec::new();
    let candidates = [
        config.cluster_uuid().map(|uuid| format!("portal:{}", uuid)),
        config.portal_url().map(str::to_string),
        config.site_url().map(str::to_string),
    ];

    for issuer in candidates.into_iter().flatten() {
        if !issuers.contains(&issuer) {
            issuers.push(issuer);
        }
    }

    issuers
}

pub struct TrustBridge {
    config: Arc<dyn ConfigProvider>,
    verifier: Arc<dyn TokenVerifier>,
}

impl TrustBridge {
    pub fn new(config: Arc<dyn ConfigProvider>, verifier: Arc<dyn TokenVerifier>) -> Self {
        Self { config, verifier }
    }

    /// Verify `token` as a cross-node token for `resource` and synthesize a
    /// client session from its claims.
    pub async fn authenticate(
        &self,
        client_ip: &str,
        token: &str,
        resource: Resource,
    ) -> Result<Session, BridgeRejection> {
        if !is_signed_token_shape(token) {
            return Err(BridgeRejection::Malformed);
        }

        if !resource.accepts_cluster_tokens() {
            return Err(BridgeRejection::IneligibleResource);
        }

        // Read once; node and cluster identity may rotate between requests.
        let config = self.config.current();

        if config.is_portal() {
            return Err(BridgeRejection::PortalNode);
        }

        let Some(jwks_url) = config.jwks_url() else {
            return Err(BridgeRejection::NoKeySource);
        };

        let issuers = issuer_candidates(&config);
        if issuers.is_empty() {
            return Err(BridgeRejection::NoIssuer);
        }

        let audience = format!("node:{}", config.node_uuid());
        let scope = required_scope(resource);

        let attempt = async {
            for issuer in &issuers {
                let expected = ExpectedClaims {
                    audience: audience.clone(),
                    scope: vec![scope.to_string()],
                    jwks_url: jwks_url.to_string(),
                    issuer: issuer.clone(),
                };

                match self.verifier.verify(token, &expected).await {
                    Ok(claims) => return Some((issuer, claims)),
                    Err(e) => {
                        tracing::debug!(client_ip, issuer = %issuer, error = %e, "Cluster token rejected");
                    }
                }
            }
            None
        };

        let (issuer, claims) = match timeout(config.timeouts.verify(), attempt).await {
            Ok(Some(found)) => found,
            Ok(None) => return Err(BridgeRejection::VerificationFailed),
            Err(_) => {
                tracing::warn!(client_ip, "Cluster token verification timed out");
                return Err(BridgeRejection::TimedOut);
            }
        };

        tracing::debug!(client_ip, issuer = %issuer, subject = %claims.sub, "Cluster token accepted");

        let mut session = Session::new(token)
            .with_client_ip(client_ip)
            .with_client(Client::new(claims.sub.clone(), claims.sub.clone(), Role::Client))
            .with_scope(&claims.scope)
            .with_auth(AuthProvider::Cluster, AuthMethod::Jwt, GrantType::JwtBearer)
            .with_issuer(issuer.clone(), claims.jti.clone());

        if let Some(exp) = Utc.timestamp_opt(claims.exp, 0).single() {
            session = session.with_expiry(exp);
        }

        Ok(session)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StaticConfig;
    use uuid::Uuid;

    #[test]
    fn test_token_shape() {
        assert!(is_signed_token_shape("a.b.c"));
        assert!(!is_signed_token_shape("a.b"));
        assert!(!is_signed_token_shape("a.b.c.d"));
        assert!(!is_signed_token_shape("a..c"));
        assert!(!is_signed_token_shape("opaque-session-token"));
    }

    #[test]
    fn test_required_scope() {
        assert_eq!(required_scope(Resource::Vision), "vision");
        assert_eq!(required_scope(Resource::Cluster), "cluster");
    }

    #[test]
    fn test_issuer_candidates_order_and_dedup() {
        let cluster = Uuid::new_v4();
        let mut config = AuthzConfig::new(Uuid::new_v4());
        assert!(issuer_candidates(&config).is_empty());

        config.cluster.uuid = Some(cluster);
        config.cluster.portal_url = Some("https://portal.example.com/".to_string());
        config.site_url = Some("https://portal.example.com".to_string());

        assert_eq!(
            issuer_candidates(&config),
            vec![
                format!("portal:{}", cluster),
                "https://portal.example.com".to_string(),
            ]
        );
    }

    struct RejectAll;

    #[async_trait::async_trait]
    impl TokenVerifier for RejectAll {
        async fn verify(&self, _: &str, _: &ExpectedClaims) -> Result<Claims, VerifyError> {
            Err(VerifyError::Malformed)
        }
    }

    #[tokio::test]
    async fn test_preconditions() {
        let mut config = AuthzConfig::new(Uuid::new_v4());
        config.cluster.jwks_url = Some("https://portal/jwks".to_string());
        config.cluster.uuid = Some(Uuid::new_v4());
        let bridge = TrustBridge::new(Arc::new(StaticConfig::new(config)), Arc::new(RejectAll));

        assert_eq!(
            bridge.authenticate("10.0.0.1", "opaque", Resource::Cluster).await,
            Err(BridgeRejection::Malformed)
        );
        assert_eq!(
            bridge.authenticate("10.0.0.1", "a.b.c", Resource::Photos).await,
            Err(BridgeRejection::IneligibleResource)
        );
        assert_eq!(
            bridge.authenticate("10.0.0.1", "a.b.c", Resource::Cluster).await,
            Err(BridgeRejection::VerificationFailed)
        );

        let mut portal = AuthzConfig::new(Uuid::new_v4());
        portal.node.role = crate::config::NodeRole::Portal;
        portal.cluster.jwks_url = Some("https://portal/jwks".to_string());
        let bridge = TrustBridge::new(Arc::new(StaticConfig::new(portal)), Arc::new(RejectAll));
        assert_eq!(
            bridge.authenticate("10.0.0.1", "a.b.c", Resource::Vision).await,
            Err(BridgeRejection::PortalNode)
        );
    }
}
