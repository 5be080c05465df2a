use async_trait::async_trait;
use jsonwebtoken::jwk::{Jwk, JwkSet, KeyAlgorithm, PublicKeyUse};
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use std::sync::Arc;
use thiserror::Error;

use super::claims::{Claims, ExpectedClaims};
use super::keys::{KeySetSource, KeySourceError};
use crate::config::JwksConfig;

#[derive(Debug, Error)]
pub enum VerifyError {
    #[error("malformed token")]
    Malformed,

    #[error("unsupported signing algorithm {0:?}")]
    UnsupportedAlgorithm(Algorithm),

    #[error("no verification key for kid {0:?}")]
    UnknownKey(Option<String>),

    #[error(transparent)]
    KeySource(#[from] KeySourceError),

    #[error("invalid token: {0}")]
    Invalid(#[from] jsonwebtoken::errors::Error),

    #[error("token scope lacks '{0}'")]
    MissingScope(String),
}

/// Verifies a signed cross-node token against one set of expectations.
#[async_trait]
pub trait TokenVerifier: Send + Sync {
    async fn verify(&self, raw_token: &str, expected: &ExpectedClaims) -> Result<Claims, VerifyError>;
}

/// EdDSA verifier backed by a JWKS source.
///
/// The algorithm is pinned; the token header cannot select another one.
/// An unknown `kid` triggers one forced key set refresh before failing.
pub struct JwksVerifier {
    keys: Arc<dyn KeySetSource>,
    leeway_secs: u64,
}

impl JwksVerifier {
    pub fn new(keys: Arc<dyn KeySetSource>, leeway_secs: u64) -> Self {
        Self { keys, leeway_secs }
    }

    pub fn from_config(keys: Arc<dyn KeySetSource>, config: &JwksConfig) -> Self {
        Self::new(keys, config.leeway_secs)
    }

    fn validation(&self, expected: &ExpectedClaims) -> Validation {
        let mut validation = Validation::new(Algorithm::EdDSA);
        validation.leeway = self.leeway_secs;
        validation.validate_exp = true;
        validation.validate_nbf = true;
        validation.set_issuer(&[expected.issuer.as_str()]);
        validation.set_audience(&[expected.audience.as_str()]);
        validation.set_required_spec_claims(&["exp", "iss", "aud", "sub"]);
        validation
    }
}

fn select_key<'a>(set: &'a JwkSet, kid: Option<&str>) -> Option<&'a Jwk> {
    let usable = |jwk: &&Jwk| {
        let alg_ok = matches!(jwk.common.key_algorithm, None | Some(KeyAlgorithm::EdDSA));
        let use_ok = !matches!(jwk.common.public_key_use, Some(PublicKeyUse::Encryption));
        alg_ok && use_ok
    };

    match kid {
        Some(kid) => set
            .keys
            .iter()
            .filter(usable)
            .find(|jwk| jwk.common.key_id.as_deref() == Some(kid)),
        None => {
            let mut candidates = set.keys.iter().filter(usable);
            match (candidates.next(), candidates.next()) {
                (Some(only), None) => Some(only),
                _ => None,
            }
        }
    }
}

#[async_trait]
impl TokenVerifier for JwksVerifier {
    async fn verify(&self, raw_token: &str, expected: &ExpectedClaims) -> Result<Claims, VerifyError> {
        let header = decode_header(raw_token).map_err(|_| VerifyError::Malformed)?;
        if header.alg != Algorithm::EdDSA {
            return Err(VerifyError::UnsupportedAlgorithm(header.alg));
        }
        let kid = header.kid.as_deref();

        let set = self.keys.key_set(&expected.jwks_url, false).await?;
        let key = match select_key(&set, kid) {
            Some(jwk) => DecodingKey::from_jwk(jwk)?,
            None => {
                tracing::debug!(kid, url = %expected.jwks_url, "Unknown key id, refreshing key set");
                let refreshed = self.keys.key_set(&expected.jwks_url, true).await?;
                let jwk = select_key(&refreshed, kid)
                    .ok_or_else(|| VerifyError::UnknownKey(header.kid.clone()))?;
                DecodingKey::from_jwk(jwk)?
            }
        };

        let data = decode::<Claims>(raw_token, &key, &self.validation(expected))?;

        let scopes = data.claims.scopes();
        if let Some(missing) = expected.scope.iter().find(|s| !scopes.has_explicit(s)) {
            return Err(VerifyError::MissingScope(missing.clone()));
        }

        Ok(data.claims)
    }
}
