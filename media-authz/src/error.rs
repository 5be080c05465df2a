use service_core::error::AppError;
use thiserror::Error;

use crate::acl::AclError;

/// Errors raised while setting up the authorization engine.
///
/// Authorization outcomes themselves are never errors: a denied request
/// yields a sentinel session, not an `AuthzError`.
#[derive(Debug, Error)]
pub enum AuthzError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Access control list error: {0}")]
    Acl(#[from] AclError),
}

impl From<AuthzError> for AppError {
    fn from(err: AuthzError) -> Self {
        AppError::ConfigError(anyhow::Error::new(err))
    }
}
