//! Client IP resolution for rate limiting.

use std::convert::Infallible;
use std::net::{IpAddr, SocketAddr};

use axum::extract::{ConnectInfo, FromRequestParts};
use axum::http::{HeaderMap, request::Parts};

use crate::state::AppState;

/// Forwarding headers consulted in order when the service sits behind a proxy.
const FORWARDING_HEADERS: &[&str] = &["x-forwarded-for", "x-real-ip", "cf-connecting-ip"];

/// Resolves the caller's IP.
///
/// With `behind_proxy`, the first hop of `X-Forwarded-For`, then `X-Real-IP`, then
/// `CF-Connecting-IP` win over the socket address. Values that are not IP addresses are
/// skipped. Returns `"unknown"` when nothing is available.
pub fn resolve_client_ip(headers: &HeaderMap, peer: Option<SocketAddr>, behind_proxy: bool) -> String {
    if behind_proxy {
        let forwarded = FORWARDING_HEADERS.iter().find_map(|name| {
            let value = headers.get(*name)?.to_str().ok()?;
            let first = value.split(',').next()?.trim();
            first.parse::<IpAddr>().ok()
        });

        if let Some(ip) = forwarded {
            return ip.to_string();
        }
    }

    peer.map(|addr| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Extractor yielding the resolved client IP as a string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientIp(pub String);

impl FromRequestParts<AppState> for ClientIp {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr);

        Ok(Self(resolve_client_ip(
            &parts.headers,
            peer,
            state.behind_proxy,
        )))
    }
}
