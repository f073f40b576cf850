//! Common API utilities and shared types

use axum::extract::{ConnectInfo, FromRequestParts};
use axum::http::{request::Parts, HeaderMap};
use serde::Deserialize;
use std::convert::Infallible;
use std::net::{IpAddr, SocketAddr};

use crate::api::middleware::AppState;
use crate::models::ListParams;

// ============================================================================
// Pagination Query Types
// ============================================================================

/// Pagination query parameters, normalized by [`ListParams::new`]
#[derive(Debug, Default, Deserialize)]
pub struct PaginationQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

impl PaginationQuery {
    pub fn params(&self) -> ListParams {
        ListParams::new(self.page, self.per_page)
    }
}

// ============================================================================
// Request Metadata
// ============================================================================

/// Client IP used for login rate limiting.
///
/// Forwarded headers are honoured only when `trust_proxy_headers` is set;
/// otherwise the socket peer address is used. The peer is absent when the
/// router is served without connect info.
#[derive(Debug, Clone, Copy)]
pub struct ClientIp(pub Option<IpAddr>);

impl FromRequestParts<AppState> for ClientIp {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip());
        Ok(Self(resolve_client_ip(&parts.headers, peer, state.trust_proxy_headers)))
    }
}

fn resolve_client_ip(
    headers: &HeaderMap,
    peer: Option<IpAddr>,
    trust_proxy: bool,
) -> Option<IpAddr> {
    if trust_proxy {
        if let Some(ip) = extract_ip_address(headers) {
            return Some(ip);
        }
    }
    peer
}

/// Client IP from proxy headers
pub fn extract_ip_address(headers: &HeaderMap) -> Option<IpAddr> {
    if let Some(forwarded) = headers.get("x-forwarded-for").and_then(|h| h.to_str().ok()) {
        if let Some(first) = forwarded.split(',').next() {
            if let Ok(ip) = first.trim().parse() {
                return Some(ip);
            }
        }
    }

    headers
        .get("x-real-ip")
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.trim().parse().ok())
}

/// `Set-Cookie` value carrying a session token
pub fn session_cookie(token: &str, max_age_secs: i64) -> String {
    format!(
        "session={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        token,
        max_age_secs.max(0)
    )
}

pub const CLEAR_SESSION_COOKIE: &str = "session=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pagination_defaults_and_clamp() {
        let params = PaginationQuery::default().params();
        assert_eq!((params.page, params.per_page), (1, 20));

        let params = PaginationQuery {
            page: Some(0),
            per_page: Some(500),
        }
        .params();
        assert_eq!((params.page, params.per_page), (1, 100));
    }

    #[test]
    fn test_extract_ip_prefers_forwarded_for() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", "203.0.113.7, 10.0.0.1".parse().unwrap());
        headers.insert("x-real-ip", "198.51.100.2".parse().unwrap());
        assert_eq!(extract_ip_address(&headers), Some("203.0.113.7".parse().unwrap()));

        headers.remove("x-forwarded-for");
        assert_eq!(extract_ip_address(&headers), Some("198.51.100.2".parse().unwrap()));

        assert!(extract_ip_address(&HeaderMap::new()).is_none());
    }

    #[test]
    fn test_forwarded_headers_need_trust() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", "203.0.113.7".parse().unwrap());
        let peer: IpAddr = "192.0.2.10".parse().unwrap();

        assert_eq!(resolve_client_ip(&headers, Some(peer), false), Some(peer));
        assert_eq!(
            resolve_client_ip(&headers, Some(peer), true),
            Some("203.0.113.7".parse().unwrap())
        );
        assert_eq!(resolve_client_ip(&HeaderMap::new(), Some(peer), true), Some(peer));
        assert!(resolve_client_ip(&headers, None, false).is_none());
    }

    #[test]
    fn test_session_cookie() {
        let cookie = session_cookie("abc", 3600);
        assert!(cookie.starts_with("session=abc;"));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.ends_with("Max-Age=3600"));
    }
}
