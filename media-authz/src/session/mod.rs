//! Authenticated request context.
//!
//! A [`Session`] is an immutable value. Builders return new values, and the
//! pipeline never mutates a session it did not create.

mod resolver;
mod store;

pub use resolver::SessionResolver;
pub use store::{MemorySessionStore, SessionStore, StoreError};

use anyhow::anyhow;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use service_core::error::AppError;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::acl::{clean_scope, scope_permits, Permission, Resource, Role};

/// Session id for a token: the hex SHA-256 digest, so the raw token is never
/// stored or logged.
pub fn session_id(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

fn new_ref_id() -> String {
    let id = Uuid::new_v4().simple().to_string();
    format!("sess{}", &id[..12])
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Active,
    Unauthorized,
    Forbidden,
}

impl SessionStatus {
    pub fn http_code(&self) -> u16 {
        match self {
            SessionStatus::Active => 200,
            SessionStatus::Unauthorized => 401,
            SessionStatus::Forbidden => 403,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthProvider {
    #[default]
    None,
    Local,
    Client,
    Cluster,
    Service,
    Public,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthMethod {
    #[default]
    None,
    Session,
    OAuth2,
    Jwt,
    ServiceKey,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrantType {
    #[default]
    None,
    Password,
    Session,
    ClientCredentials,
    JwtBearer,
    ServiceKey,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub uid: String,
    pub name: String,
    pub role: Role,
    #[serde(default)]
    pub disabled: bool,
    #[serde(default)]
    pub registered: bool,
}

impl User {
    pub fn new(uid: impl Into<String>, name: impl Into<String>, role: Role) -> Self {
        Self {
            uid: uid.into(),
            name: name.into(),
            role,
            disabled: false,
            registered: true,
        }
    }

    /// The built-in administrator used in public mode.
    pub fn public_admin() -> Self {
        User::new("u000000000000001", "admin", Role::Admin)
    }

    pub fn is_unknown(&self) -> bool {
        self.uid.is_empty()
    }

    pub fn is_disabled(&self) -> bool {
        self.disabled
    }

    pub fn is_registered(&self) -> bool {
        self.registered && !self.is_unknown()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Client {
    pub uid: String,
    pub name: String,
    pub role: Role,
}

impl Client {
    pub fn new(uid: impl Into<String>, name: impl Into<String>, role: Role) -> Self {
        Self {
            uid: uid.into(),
            name: name.into(),
            role,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    id: String,
    ref_id: String,
    status: SessionStatus,
    client_ip: String,
    auth_scope: String,
    auth_provider: AuthProvider,
    auth_method: AuthMethod,
    grant_type: GrantType,
    auth_issuer: String,
    auth_id: String,
    user: Option<User>,
    client: Option<Client>,
    created_at: DateTime<Utc>,
    expires_at: Option<DateTime<Utc>>,
}

impl Session {
    /// A new active session bound to `token`.
    pub fn new(token: &str) -> Self {
        Self {
            id: session_id(token),
            ref_id: new_ref_id(),
            status: SessionStatus::Active,
            client_ip: String::new(),
            auth_scope: String::new(),
            auth_provider: AuthProvider::None,
            auth_method: AuthMethod::None,
            grant_type: GrantType::None,
            auth_issuer: String::new(),
            auth_id: String::new(),
            user: None,
            client: None,
            created_at: Utc::now(),
            expires_at: None,
        }
    }

    fn sentinel(status: SessionStatus) -> Self {
        Self {
            id: String::new(),
            ref_id: String::new(),
            status,
            ..Session::new("")
        }
    }

    pub fn unauthorized() -> Self {
        Session::sentinel(SessionStatus::Unauthorized)
    }

    pub fn forbidden() -> Self {
        Session::sentinel(SessionStatus::Forbidden)
    }

    /// The fixed session used when the node runs without authentication.
    pub fn public() -> Self {
        Session::new("public")
            .with_user(User::public_admin())
            .with_scope("*")
            .with_auth(AuthProvider::Public, AuthMethod::None, GrantType::None)
    }

    pub fn with_user(mut self, user: User) -> Self {
        self.user = Some(user);
        self
    }

    pub fn with_client(mut self, client: Client) -> Self {
        self.client = Some(client);
        self
    }

    pub fn with_scope(mut self, scope: &str) -> Self {
        self.auth_scope = clean_scope(scope);
        self
    }

    pub fn with_client_ip(mut self, client_ip: impl Into<String>) -> Self {
        self.client_ip = client_ip.into();
        self
    }

    pub fn with_auth(
        mut self,
        provider: AuthProvider,
        method: AuthMethod,
        grant_type: GrantType,
    ) -> Self {
        self.auth_provider = provider;
        self.auth_method = method;
        self.grant_type = grant_type;
        self
    }

    pub fn with_issuer(mut self, issuer: impl Into<String>, auth_id: impl Into<String>) -> Self {
        self.auth_issuer = issuer.into();
        self.auth_id = auth_id.into();
        self
    }

    pub fn with_expiry(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn ref_id(&self) -> &str {
        &self.ref_id
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn http_status(&self) -> u16 {
        self.status.http_code()
    }

    pub fn is_active(&self) -> bool {
        self.status == SessionStatus::Active
    }

    pub fn client_ip(&self) -> &str {
        &self.client_ip
    }

    pub fn auth_scope(&self) -> &str {
        &self.auth_scope
    }

    pub fn auth_provider(&self) -> AuthProvider {
        self.auth_provider
    }

    pub fn auth_method(&self) -> AuthMethod {
        self.auth_method
    }

    pub fn grant_type(&self) -> GrantType {
        self.grant_type
    }

    pub fn auth_issuer(&self) -> &str {
        &self.auth_issuer
    }

    pub fn auth_id(&self) -> &str {
        &self.auth_id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }

    pub fn client(&self) -> Option<&Client> {
        self.client.as_ref()
    }

    pub fn is_client(&self) -> bool {
        self.client.as_ref().is_some_and(|c| !c.uid.is_empty())
    }

    pub fn client_uid(&self) -> &str {
        self.client.as_ref().map_or("", |c| c.uid.as_str())
    }

    pub fn client_name(&self) -> &str {
        self.client.as_ref().map_or("", |c| c.name.as_str())
    }

    /// Role of the client application; clients without one act as `client`.
    pub fn client_role(&self) -> Role {
        match &self.client {
            Some(client) if client.role != Role::None => client.role,
            _ => Role::Client,
        }
    }

    pub fn user(&self) -> Option<&User> {
        self.user.as_ref()
    }

    pub fn no_user(&self) -> bool {
        self.user.as_ref().map_or(true, |u| u.is_unknown())
    }

    pub fn user_role(&self) -> Role {
        self.user.as_ref().map_or(Role::None, |u| u.role)
    }

    pub fn user_name(&self) -> &str {
        self.user.as_ref().map_or("", |u| u.name.as_str())
    }

    pub fn has_scope(&self) -> bool {
        !self.auth_scope.is_empty()
    }

    /// True if the session carries a scope that does not cover `perms` on
    /// `resource`. Sessions without a scope are never limited by it.
    pub fn insufficient_scope(&self, resource: Resource, perms: &[Permission]) -> bool {
        self.has_scope() && !scope_permits(&self.auth_scope, resource, perms)
    }

    /// Label identifying who acts through this session, for audit records.
    pub fn subject(&self) -> Option<String> {
        if self.is_client() {
            Some(format!("client {} ({})", self.client_uid(), self.client_name()))
        } else {
            self.user
                .as_ref()
                .filter(|u| !u.is_unknown())
                .map(|u| format!("user {} ({})", u.uid, u.name))
        }
    }

    /// Turn the outcome into a handler result.
    pub fn check(self) -> Result<Session, AppError> {
        match self.status {
            SessionStatus::Active => Ok(self),
            SessionStatus::Unauthorized => Err(AppError::Unauthorized(anyhow!("Unauthorized"))),
            SessionStatus::Forbidden => Err(AppError::Forbidden(anyhow!("Permission denied"))),
        }
    }
}
