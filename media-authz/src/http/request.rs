use axum::http::{header, HeaderMap};
use std::fmt;
use std::net::IpAddr;

pub const X_AUTH_TOKEN: &str = "x-auth-token";
pub const X_SESSION_ID: &str = "x-session-id";
pub const X_FORWARDED_FOR: &str = "x-forwarded-for";
pub const X_REQUEST_ID: &str = "x-request-id";
pub const CDN_HOST: &str = "cdn-host";

const MAX_TOKEN_LEN: usize = 4096;

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

/// Empty unless `token` is a bounded run of token68 characters.
fn sanitize_token(token: &str) -> String {
    let token = token.trim();
    let valid = token.len() <= MAX_TOKEN_LEN
        && token
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b"-._~+/=".contains(&b));

    if valid {
        token.to_string()
    } else {
        String::new()
    }
}

/// Credential presented with the request.
///
/// Checked in order: `X-Auth-Token`, `X-Session-ID`, then an
/// `Authorization: Bearer` header. Returns an empty string when none is usable.
pub fn resolve_auth_token(headers: &HeaderMap) -> String {
    if let Some(token) = header_str(headers, X_AUTH_TOKEN) {
        return sanitize_token(token);
    }

    if let Some(token) = header_str(headers, X_SESSION_ID) {
        return sanitize_token(token);
    }

    header_str(headers, header::AUTHORIZATION.as_str())
        .and_then(|v| {
            let (scheme, token) = v.split_once(' ')?;
            scheme.eq_ignore_ascii_case("bearer").then_some(token)
        })
        .map(sanitize_token)
        .unwrap_or_default()
}

/// Client address for `peer`.
///
/// `X-Forwarded-For` is honored only when `peer` is a trusted proxy; the
/// chain is walked from the right and the first untrusted hop wins.
pub fn resolve_client_ip(headers: &HeaderMap, peer: Option<IpAddr>, trusted: &[IpAddr]) -> String {
    let Some(peer) = peer else {
        return String::new();
    };

    if !trusted.contains(&peer) {
        return peer.to_string();
    }

    let hops: Option<Vec<IpAddr>> = headers
        .get_all(X_FORWARDED_FOR)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .map(|hop| hop.trim().parse::<IpAddr>().ok())
        .collect();

    match hops {
        Some(hops) => hops
            .into_iter()
            .rev()
            .find(|ip| !trusted.contains(ip))
            .unwrap_or(peer)
            .to_string(),
        None => peer.to_string(),
    }
}

/// True if the request was relayed by a CDN.
pub fn is_cdn(headers: &HeaderMap) -> bool {
    header_str(headers, CDN_HOST).is_some()
}

/// The request facts the pipeline needs.
#[derive(Clone, Default)]
pub struct AuthRequest {
    client_ip: String,
    auth_token: String,
    from_cdn: bool,
    request_id: Option<String>,
}

impl AuthRequest {
    pub fn new(client_ip: impl Into<String>, auth_token: impl Into<String>) -> Self {
        Self {
            client_ip: client_ip.into(),
            auth_token: auth_token.into(),
            from_cdn: false,
            request_id: None,
        }
    }

    pub fn from_headers(headers: &HeaderMap, peer: Option<IpAddr>, trusted: &[IpAddr]) -> Self {
        Self {
            client_ip: resolve_client_ip(headers, peer, trusted),
            auth_token: resolve_auth_token(headers),
            from_cdn: is_cdn(headers),
            request_id: header_str(headers, X_REQUEST_ID).map(str::to_string),
        }
    }

    pub fn with_cdn(mut self, from_cdn: bool) -> Self {
        self.from_cdn = from_cdn;
        self
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    pub fn client_ip(&self) -> &str {
        &self.client_ip
    }

    pub fn auth_token(&self) -> &str {
        &self.auth_token
    }

    pub fn from_cdn(&self) -> bool {
        self.from_cdn
    }

    pub fn request_id(&self) -> Option<&str> {
        self.request_id.as_deref()
    }
}

impl fmt::Debug for AuthRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let token = if self.auth_token.is_empty() {
            ""
        } else {
            "[REDACTED]"
        };

        f.debug_struct("AuthRequest")
            .field("client_ip", &self.client_ip)
            .field("auth_token", &token)
            .field("from_cdn", &self.from_cdn)
            .field("request_id", &self.request_id)
            .finish()
    }
}
