//! Engine configuration and the provider interface the pipeline reads it
//! through.

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use service_core::error::AppError;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::acl::{default_rules, Acl, AclOverrides};
use crate::error::AuthzError;

#[derive(Debug, Deserialize)]
pub struct AuthzConfig {
    /// Serve every request with the public session.
    #[serde(default)]
    pub public: bool,
    pub node: NodeConfig,
    #[serde(default)]
    pub cluster: ClusterConfig,
    #[serde(default)]
    pub site_url: Option<String>,
    #[serde(default)]
    pub vision: VisionConfig,
    #[serde(default)]
    pub timeouts: TimeoutConfig,
    #[serde(default)]
    pub jwks: JwksConfig,
    #[serde(default)]
    pub trusted_proxies: Vec<IpAddr>,
    #[serde(default)]
    pub acl: AclOverrides,
}

#[derive(Debug, Deserialize)]
pub struct NodeConfig {
    pub uuid: Uuid,
    #[serde(default)]
    pub role: NodeRole,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum NodeRole {
    #[default]
    Instance,
    Service,
    Portal,
}

#[derive(Debug, Default, Deserialize)]
pub struct ClusterConfig {
    #[serde(default)]
    pub uuid: Option<Uuid>,
    #[serde(default)]
    pub portal_url: Option<String>,
    #[serde(default)]
    pub jwks_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct VisionConfig {
    #[serde(default)]
    pub api: bool,
    #[serde(default)]
    pub key: Option<SecretString>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TimeoutConfig {
    #[serde(default = "default_session_store_ms")]
    pub session_store_ms: u64,
    #[serde(default = "default_verify_ms")]
    pub verify_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JwksConfig {
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,
    #[serde(default = "default_min_refresh_secs")]
    pub min_refresh_secs: u64,
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,
    #[serde(default = "default_leeway_secs")]
    pub leeway_secs: u64,
}

fn default_session_store_ms() -> u64 {
    5_000
}

fn default_verify_ms() -> u64 {
    10_000
}

fn default_cache_ttl_secs() -> u64 {
    300
}

fn default_min_refresh_secs() -> u64 {
    30
}

fn default_fetch_timeout_secs() -> u64 {
    5
}

fn default_leeway_secs() -> u64 {
    60
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            session_store_ms: default_session_store_ms(),
            verify_ms: default_verify_ms(),
        }
    }
}

impl TimeoutConfig {
    pub fn session_store(&self) -> Duration {
        Duration::from_millis(self.session_store_ms)
    }

    pub fn verify(&self) -> Duration {
        Duration::from_millis(self.verify_ms)
    }
}

impl Default for JwksConfig {
    fn default() -> Self {
        Self {
            cache_ttl_secs: default_cache_ttl_secs(),
            min_refresh_secs: default_min_refresh_secs(),
            fetch_timeout_secs: default_fetch_timeout_secs(),
            leeway_secs: default_leeway_secs(),
        }
    }
}

impl AuthzConfig {
    /// Minimal configuration for a node; everything else takes defaults.
    pub fn new(node_uuid: Uuid) -> Self {
        Self {
            public: false,
            node: NodeConfig {
                uuid: node_uuid,
                role: NodeRole::Instance,
                name: None,
            },
            cluster: ClusterConfig::default(),
            site_url: None,
            vision: VisionConfig::default(),
            timeouts: TimeoutConfig::default(),
            jwks: JwksConfig::default(),
            trusted_proxies: Vec::new(),
            acl: AclOverrides::new(),
        }
    }

    /// Load from an optional `authz` file and `AUTHZ__*` environment variables.
    pub fn load() -> Result<Self, AppError> {
        let config: AuthzConfig = service_core::config::load_section("authz", "AUTHZ")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), AuthzError> {
        if self.node.uuid.is_nil() {
            return Err(AuthzError::Config("node.uuid must not be nil".to_string()));
        }

        if self.timeouts.session_store_ms == 0 || self.timeouts.verify_ms == 0 {
            return Err(AuthzError::Config("timeouts must be positive".to_string()));
        }

        if self.vision.api && self.vision_key().is_none() {
            return Err(AuthzError::Config(
                "vision.api requires vision.key".to_string(),
            ));
        }

        for (name, url) in [
            ("cluster.jwks_url", self.jwks_url()),
            ("cluster.portal_url", self.portal_url()),
            ("site_url", self.site_url()),
        ] {
            if let Some(url) = url {
                validate_http_url(name, url)?;
            }
        }

        self.build_acl()?;
        Ok(())
    }

    /// Built-in rules with the configured overrides applied.
    pub fn build_acl(&self) -> Result<Acl, AuthzError> {
        Ok(default_rules().with_overrides(&self.acl)?)
    }

    pub fn node_uuid(&self) -> String {
        self.node.uuid.to_string()
    }

    pub fn node_name(&self) -> &str {
        self.node.name.as_deref().unwrap_or_default()
    }

    pub fn cluster_uuid(&self) -> Option<String> {
        self.cluster.uuid.map(|u| u.to_string())
    }

    pub fn portal_url(&self) -> Option<&str> {
        trimmed_url(self.cluster.portal_url.as_deref())
    }

    pub fn site_url(&self) -> Option<&str> {
        trimmed_url(self.site_url.as_deref())
    }

    pub fn jwks_url(&self) -> Option<&str> {
        self.cluster
            .jwks_url
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    pub fn is_portal(&self) -> bool {
        self.node.role == NodeRole::Portal
    }

    pub fn public(&self) -> bool {
        self.public
    }

    pub fn vision_api(&self) -> bool {
        self.vision.api
    }

    pub fn vision_key(&self) -> Option<&SecretString> {
        self.vision
            .key
            .as_ref()
            .filter(|k| !k.expose_secret().trim().is_empty())
    }
}

fn trimmed_url(url: Option<&str>) -> Option<&str> {
    url.map(|u| u.trim().trim_end_matches('/'))
        .filter(|u| !u.is_empty())
}

fn validate_http_url(name: &str, url: &str) -> Result<(), AuthzError> {
    let parsed = reqwest::Url::parse(url)
        .map_err(|e| AuthzError::Config(format!("{} is not a valid URL: {}", name, e)))?;
    match parsed.scheme() {
        "http" | "https" => Ok(()),
        other => Err(AuthzError::Config(format!(
            "{} must use http or https, got {}",
            name, other
        ))),
    }
}

/// Source of the current configuration.
///
/// Called once per authorization, so a provider that swaps its snapshot
/// (for example after a node identity change) affects the next request.
pub trait ConfigProvider: Send + Sync {
    fn current(&self) -> Arc<AuthzConfig>;
}

/// A configuration fixed at startup.
pub struct StaticConfig(Arc<AuthzConfig>);

impl StaticConfig {
    pub fn new(config: AuthzConfig) -> Self {
        Self(Arc::new(config))
    }
}

impl ConfigProvider for StaticConfig {
    fn current(&self) -> Arc<AuthzConfig> {
        self.0.clone()
    }
}
