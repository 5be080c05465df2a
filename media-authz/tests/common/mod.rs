//! Shared fixtures for media-authz integration tests: Ed25519 signing keys,
//! cluster token minting and engine wiring.

#![allow(dead_code)]

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::Utc;
use ed25519_dalek::SigningKey;
use jsonwebtoken::jwk::JwkSet;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use media_authz::audit::MemoryAuditSink;
use media_authz::cluster::{JwksVerifier, KeySetSource};
use media_authz::config::{AuthzConfig, ConfigProvider};
use media_authz::{acl::default_rules, Authorizer, MemorySessionStore};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex, RwLock};
use uuid::Uuid;

pub const JWKS_URL: &str = "https://portal.example.test/.well-known/jwks.json";
pub const PORTAL_URL: &str = "https://portal.example.test/";
pub const SITE_URL: &str = "https://photos.example.test/";
pub const CLIENT_UID: &str = "cs5gfen1bgxz7s9i";

/// PKCS#8 v1 prefix for a raw Ed25519 seed.
const ED25519_PKCS8_PREFIX: [u8; 16] = [
    0x30, 0x2e, 0x02, 0x01, 0x00, 0x30, 0x05, 0x06, 0x03, 0x2b, 0x65, 0x70, 0x04, 0x22, 0x04, 0x20,
];

pub struct TestSigner {
    kid: String,
    encoding: EncodingKey,
    public_key: [u8; 32],
}

impl TestSigner {
    pub fn new(kid: &str, seed: [u8; 32]) -> Self {
        let public_key = SigningKey::from_bytes(&seed).verifying_key().to_bytes();

        let mut der = ED25519_PKCS8_PREFIX.to_vec();
        der.extend_from_slice(&seed);

        Self {
            kid: kid.to_string(),
            encoding: EncodingKey::from_ed_der(&der),
            public_key,
        }
    }

    pub fn kid(&self) -> &str {
        &self.kid
    }

    pub fn jwk(&self) -> Value {
        json!({
            "kty": "OKP",
            "crv": "Ed25519",
            "x": URL_SAFE_NO_PAD.encode(self.public_key),
            "kid": self.kid,
            "alg": "EdDSA",
            "use": "sig"
        })
    }

    pub fn jwks_json(&self) -> Value {
        json!({ "keys": [self.jwk()] })
    }

    pub fn jwks(&self) -> JwkSet {
        serde_json::from_value(self.jwks_json()).unwrap()
    }

    pub fn sign(&self, claims: &Value) -> String {
        let mut header = Header::new(Algorithm::EdDSA);
        header.kid = Some(self.kid.clone());
        encode(&header, claims, &self.encoding).unwrap()
    }
}

pub fn portal_signer() -> TestSigner {
    TestSigner::new("portal-2024", [7u8; 32])
}

pub fn rotated_signer() -> TestSigner {
    TestSigner::new("portal-2025", [9u8; 32])
}

/// Claims for a cluster token valid for the next ten minutes.
pub fn cluster_claims(issuer: &str, node: Uuid, scope: &str) -> Value {
    let now = Utc::now().timestamp();
    json!({
        "iss": issuer,
        "sub": CLIENT_UID,
        "aud": format!("node:{}", node),
        "scope": scope,
        "jti": Uuid::new_v4().to_string(),
        "iat": now,
        "exp": now + 600,
    })
}

/// Instance node configuration that trusts the test portal.
pub fn instance_config(node: Uuid, cluster: Uuid) -> AuthzConfig {
    let mut config = AuthzConfig::new(node);
    config.cluster.uuid = Some(cluster);
    config.cluster.portal_url = Some(PORTAL_URL.to_string());
    config.cluster.jwks_url = Some(JWKS_URL.to_string());
    config.site_url = Some(SITE_URL.to_string());
    config
}

/// Config provider whose snapshot can be replaced while the engine runs.
pub struct SwappableConfig(RwLock<Arc<AuthzConfig>>);

impl SwappableConfig {
    pub fn new(config: AuthzConfig) -> Self {
        Self(RwLock::new(Arc::new(config)))
    }

    pub fn replace(&self, config: AuthzConfig) {
        *self.0.write().unwrap() = Arc::new(config);
    }
}

impl ConfigProvider for SwappableConfig {
    fn current(&self) -> Arc<AuthzConfig> {
        self.0.read().unwrap().clone()
    }
}

pub struct TestEngine {
    pub authorizer: Authorizer,
    pub store: Arc<MemorySessionStore>,
    pub audit: Arc<MemoryAuditSink>,
}

pub fn engine(config: Arc<dyn ConfigProvider>, keys: Arc<dyn KeySetSource>) -> TestEngine {
    let store = Arc::new(MemorySessionStore::new());
    let audit = Arc::new(MemoryAuditSink::new());
    let verifier = JwksVerifier::from_config(keys, &config.current().jwks);
    let authorizer = Authorizer::new(
        default_rules(),
        config,
        store.clone(),
        Arc::new(verifier),
        audit.clone(),
    );

    TestEngine {
        authorizer,
        store,
        audit,
    }
}

/// Collects formatted log output written through a `fmt` subscriber.
#[derive(Clone, Default)]
pub struct LogCapture(Arc<Mutex<Vec<u8>>>);

impl LogCapture {
    pub fn subscriber(&self) -> impl tracing::Subscriber + Send + Sync {
        let writer = self.clone();
        tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .finish()
    }

    pub fn output(&self) -> String {
        String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
    }
}

impl std::io::Write for LogCapture {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}
