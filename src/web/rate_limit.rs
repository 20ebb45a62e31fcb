//! Fixed-window request limiting backed by the shared database.

use std::net::SocketAddr;

use axum::http::HeaderMap;
use tracing::{debug, warn};

use crate::db::{self, Database};

const WINDOW_SECS: i64 = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitDecision {
    Allowed,
    Limited { retry_after_secs: i64 },
}

/// Count a request from `client` against `limit` hits per minute.
///
/// A `limit` of 0 disables the check. Storage failures let the request
/// through.
pub async fn check_rate_limit(
    db: &Database,
    scope: &str,
    client: &str,
    limit: u32,
    now_unix: i64,
) -> RateLimitDecision {
    if limit == 0 {
        return RateLimitDecision::Allowed;
    }

    let window_start = now_unix - now_unix.rem_euclid(WINDOW_SECS);
    let bucket = format!("{scope}:{client}");

    let hits = match db::hit_rate_limit_window(db.pool(), &bucket, window_start).await {
        Ok(hits) => hits,
        Err(e) => {
            warn!(error = %e, "Rate limit storage failed, allowing request");
            return RateLimitDecision::Allowed;
        }
    };

    // First hit of a fresh window: a good moment to drop old windows.
    if hits == 1 {
        match db::prune_rate_limit_windows(db.pool(), window_start - WINDOW_SECS).await {
            Ok(pruned) if pruned > 0 => debug!(pruned, "Pruned rate limit windows"),
            Ok(_) => {}
            Err(e) => warn!(error = %e, "Failed to prune rate limit windows"),
        }
    }

    if hits > i64::from(limit) {
        RateLimitDecision::Limited {
            retry_after_secs: window_start + WINDOW_SECS - now_unix,
        }
    } else {
        RateLimitDecision::Allowed
    }
}

/// Address a request is counted against.
///
/// With `trust_forwarded` set, the right-most `X-Forwarded-For` hop is used.
/// That hop is appended by the reverse proxy in front of the service, so
/// clients cannot choose it. Otherwise the header is ignored and the socket
/// peer is used.
pub fn client_key(
    headers: &HeaderMap,
    peer: Option<SocketAddr>,
    trust_forwarded: bool,
) -> String {
    let forwarded = headers
        .get("x-forwarded-for")
        .filter(|_| trust_forwarded)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.rsplit(',').next())
        .map(str::trim)
        .filter(|h| !h.is_empty())
        .map(str::to_string);

    forwarded
        .or_else(|| peer.map(|addr| addr.ip().to_string()))
        .unwrap_or_else(|| "unknown".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_key_uses_peer_by_default() {
        let mut headers = HeaderMap::new();
        let peer: SocketAddr = "10.0.0.1:5000".parse().unwrap();
        assert_eq!(client_key(&headers, Some(peer), false), "10.0.0.1");
        assert_eq!(client_key(&headers, None, false), "unknown");

        headers.insert("x-forwarded-for", "203.0.113.7".parse().unwrap());
        assert_eq!(client_key(&headers, Some(peer), false), "10.0.0.1");
    }

    #[test]
    fn test_client_key_takes_proxy_appended_hop() {
        let peer: SocketAddr = "10.0.0.1:5000".parse().unwrap();
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", "1.1.1.1, 203.0.113.7".parse().unwrap());
        assert_eq!(client_key(&headers, Some(peer), true), "203.0.113.7");

        // A spoofed leading hop does not change the key.
        headers.insert("x-forwarded-for", "9.9.9.9, 203.0.113.7".parse().unwrap());
        assert_eq!(client_key(&headers, Some(peer), true), "203.0.113.7");

        headers.remove("x-forwarded-for");
        assert_eq!(client_key(&headers, Some(peer), true), "10.0.0.1");
    }
}
