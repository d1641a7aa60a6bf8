// Request admission: client address allow-list plus shared-token check
use super::error::ApiError;
use super::ApiState;
use axum::extract::{ConnectInfo, Query, Request, State};
use axum::http::{HeaderMap, Uri};
use axum::middleware::Next;
use axum::response::Response;
use serde::Deserialize;
use std::net::{IpAddr, SocketAddr};

pub const AUTH_HEADER: &str = "x-auth-token";

/// CIDR block, e.g. `192.168.0.0/16`; a bare address means a single host
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Subnet {
    network: IpAddr,
    prefix: u8,
}

impl Subnet {
    pub fn parse(text: &str) -> Result<Self, String> {
        let text = text.trim();
        let (addr, prefix) = match text.split_once('/') {
            Some((addr, prefix)) => (addr, Some(prefix)),
            None => (text, None),
        };
        let network: IpAddr = addr
            .parse()
            .map_err(|_| format!("'{}' is not an IP address", addr))?;
        let max_prefix = match network {
            IpAddr::V4(_) => 32,
            IpAddr::V6(_) => 128,
        };
        let prefix = match prefix {
            Some(p) => p
                .parse::<u8>()
                .ok()
                .filter(|p| *p <= max_prefix)
                .ok_or_else(|| format!("'{}' has an invalid prefix length", text))?,
            None => max_prefix,
        };
        Ok(Self { network, prefix })
    }

    pub fn contains(&self, ip: IpAddr) -> bool {
        // IPv4-mapped IPv6 peers compare as IPv4
        match (self.network, ip.to_canonical()) {
            (IpAddr::V4(net), IpAddr::V4(ip)) => {
                let mask = u32::MAX.checked_shl(32 - self.prefix as u32).unwrap_or(0);
                u32::from(net) & mask == u32::from(ip) & mask
            }
            (IpAddr::V6(net), IpAddr::V6(ip)) => {
                let mask = u128::MAX.checked_shl(128 - self.prefix as u32).unwrap_or(0);
                u128::from(net) & mask == u128::from(ip) & mask
            }
            _ => false,
        }
    }
}

pub fn ip_allowed(ip: IpAddr, subnets: &[Subnet]) -> bool {
    subnets.iter().any(|s| s.contains(ip))
}

#[derive(Debug, Deserialize)]
struct TokenQuery {
    token: Option<String>,
}

/// Header token first, then `?token=` (browsers cannot set headers on WebSocket upgrades).
/// The query value is percent-decoded before comparison.
pub fn token_matches(headers: &HeaderMap, uri: &Uri, expected: &str) -> bool {
    if let Some(value) = headers.get(AUTH_HEADER) {
        return value.to_str().is_ok_and(|v| v == expected);
    }
    Query::<TokenQuery>::try_from_uri(uri)
        .ok()
        .and_then(|Query(query)| query.token)
        .is_some_and(|token| token == expected)
}

pub async fn require_auth(
    State(state): State<ApiState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let (expected, subnets) = {
        let config = state.config.read().await;
        (config.auth_token.clone(), config.subnets())
    };

    if !ip_allowed(peer.ip(), &subnets) {
        log::warn!("🚫 Rejected request from {} (not in allowed subnets)", peer.ip());
        return Err(ApiError::Forbidden);
    }
    if !token_matches(request.headers(), request.uri(), &expected) {
        log::warn!("🔒 Rejected request from {} (bad token)", peer.ip());
        return Err(ApiError::Unauthorized);
    }
    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    #[test]
    fn test_subnet_contains() {
        let lan = Subnet::parse("192.168.0.0/16").unwrap();
        assert!(lan.contains(ip("192.168.1.20")));
        assert!(!lan.contains(ip("192.169.0.1")));

        let host = Subnet::parse("127.0.0.1").unwrap();
        assert!(host.contains(ip("127.0.0.1")));
        assert!(!host.contains(ip("127.0.0.2")));

        let any = Subnet::parse("0.0.0.0/0").unwrap();
        assert!(any.contains(ip("8.8.8.8")));
        assert!(!any.contains(ip("::1")));
    }

    #[test]
    fn test_ipv6_and_mapped_addresses() {
        let loopback = Subnet::parse("::1/128").unwrap();
        assert!(loopback.contains(ip("::1")));

        let lan = Subnet::parse("10.0.0.0/8").unwrap();
        assert!(lan.contains(ip("::ffff:10.1.2.3")));
    }

    #[test]
    fn test_subnet_parse_errors() {
        assert!(Subnet::parse("not-an-ip/8").is_err());
        assert!(Subnet::parse("10.0.0.0/33").is_err());
        assert!(Subnet::parse("10.0.0.0/x").is_err());
        assert!(Subnet::parse("fe80::/129").is_err());
    }

    #[test]
    fn test_token_from_header_or_query() {
        let bare = Uri::from_static("/status");
        let mut headers = HeaderMap::new();
        assert!(!token_matches(&headers, &bare, "secret"));
        assert!(token_matches(
            &headers,
            &Uri::from_static("/ws?a=1&token=secret"),
            "secret"
        ));
        assert!(!token_matches(
            &headers,
            &Uri::from_static("/ws?token=wrong"),
            "secret"
        ));

        headers.insert(AUTH_HEADER, HeaderValue::from_static("secret"));
        assert!(token_matches(&headers, &bare, "secret"));

        // A wrong header is not rescued by the query
        headers.insert(AUTH_HEADER, HeaderValue::from_static("nope"));
        assert!(!token_matches(
            &headers,
            &Uri::from_static("/ws?token=secret"),
            "secret"
        ));
    }

    #[test]
    fn test_query_token_is_percent_decoded() {
        let headers = HeaderMap::new();
        let uri = Uri::from_static("/status?token=a%20b%26c");
        assert!(token_matches(&headers, &uri, "a b&c"));
        assert!(!token_matches(&headers, &uri, "a%20b%26c"));

        let unicode = Uri::from_static("/ws?token=%C3%A9t%C3%A9%2B1");
        assert!(token_matches(&headers, &unicode, "été+1"));
    }
}
