use axum::{
    extract::{ConnectInfo, FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap, HeaderValue},
    middleware::Next,
    response::Response,
};
use service_core::error::AppError;
use std::net::SocketAddr;
use std::sync::{Arc, Once};

use super::AuthRequest;
use crate::acl::{Permission, Resource};
use crate::authorize::Authorizer;
use crate::session::Session;

/// What a route requires; used as middleware state.
#[derive(Clone)]
pub struct RouteGuard {
    authorizer: Arc<Authorizer>,
    resource: Resource,
    perms: Arc<[Permission]>,
}

impl RouteGuard {
    pub fn new(
        authorizer: Arc<Authorizer>,
        resource: Resource,
        perms: impl Into<Vec<Permission>>,
    ) -> Self {
        let perms: Vec<Permission> = perms.into();
        Self {
            authorizer,
            resource,
            perms: perms.into(),
        }
    }

    pub fn resource(&self) -> Resource {
        self.resource
    }

    pub fn permissions(&self) -> &[Permission] {
        &self.perms
    }
}

/// Authenticated responses must not be stored by shared caches.
pub fn disable_caching(headers: &mut HeaderMap) {
    headers.insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static("no-store, no-cache, must-revalidate"),
    );
    headers.insert(header::PRAGMA, HeaderValue::from_static("no-cache"));
}

static MISSING_PEER: Once = Once::new();

/// Authorize the request for the guard's resource and permissions.
///
/// On success the [`Session`] is placed in the request extensions, where
/// handlers read it through [`AuthSession`].
pub async fn authorize_middleware(
    State(guard): State<RouteGuard>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let peer = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip());

    if peer.is_none() {
        MISSING_PEER.call_once(|| {
            tracing::warn!(
                "Peer address unavailable, client IPs cannot be resolved; serve the router with into_make_service_with_connect_info"
            );
        });
    }

    let config = guard.authorizer.config();
    let request = AuthRequest::from_headers(req.headers(), peer, &config.trusted_proxies);

    let session = guard
        .authorizer
        .authorize_any(&request, guard.resource, &guard.perms)
        .await
        .check()?;

    req.extensions_mut().insert(session);

    let mut response = next.run(req).await;
    disable_caching(response.headers_mut());
    Ok(response)
}

/// Extractor for the session established by [`authorize_middleware`].
pub struct AuthSession(pub Session);

#[axum::async_trait]
impl<S> FromRequestParts<S> for AuthSession
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Session>()
            .cloned()
            .map(AuthSession)
            .ok_or_else(|| {
                AppError::InternalError(anyhow::anyhow!(
                    "Session missing from request extensions"
                ))
            })
    }
}
