//! Request authorization for the media library.
//!
//! Combines the static role/permission matrix, token scopes, the session
//! store and portal-signed cluster tokens into one audited decision per
//! request.

pub mod acl;
pub mod audit;
pub mod authorize;
pub mod cluster;
pub mod config;
pub mod error;
pub mod http;
pub mod session;

pub use acl::{Acl, Permission, Resource, Role};
pub use audit::{AuditEvent, AuditSink, ChannelAuditSink, MemoryAuditSink, TracingAuditSink};
pub use authorize::Authorizer;
pub use cluster::{HttpKeySetSource, JwksVerifier, TrustBridge};
pub use config::{AuthzConfig, ConfigProvider, StaticConfig};
pub use error::AuthzError;
pub use http::{authorize_middleware, resolve_auth_token, AuthRequest, AuthSession, RouteGuard};
pub use session::{MemorySessionStore, Session, SessionStatus, SessionStore};
