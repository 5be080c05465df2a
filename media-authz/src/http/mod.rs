//! HTTP surface: credential extraction and the axum guard.

mod middleware;
mod request;

pub use middleware::{authorize_middleware, disable_caching, AuthSession, RouteGuard};
pub use request::{
    is_cdn, resolve_auth_token, resolve_client_ip, AuthRequest, CDN_HOST, X_AUTH_TOKEN,
    X_FORWARDED_FOR, X_REQUEST_ID, X_SESSION_ID,
};
