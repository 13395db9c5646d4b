use std::net::SocketAddr;

use axum::{
    body::Body,
    extract::ConnectInfo,
    http::{HeaderMap, HeaderValue, Request, header},
    middleware::Next,
    response::Response,
};

pub const UNKNOWN: &str = "unknown";
const FORWARDED_FOR_HEADER: &str = "x-forwarded-for";
const REQUEST_ID_HEADER: &str = "x-request-id";

// Per-request origin data, captured once in middleware and carried as an
// extension. Audit writes read it instead of reaching back into the request.
#[derive(Clone, Debug)]
pub struct RequestMeta {
    pub request_id: String,
    pub remote_addr: String,
    pub user_agent: String,
}

impl Default for RequestMeta {
    fn default() -> Self {
        Self {
            request_id: uuid::Uuid::new_v4().to_string(),
            remote_addr: UNKNOWN.to_string(),
            user_agent: UNKNOWN.to_string(),
        }
    }
}

pub fn remote_addr(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    // First hop of x-forwarded-for when a proxy is in front, otherwise the peer.
    if let Some(forwarded) = headers
        .get(FORWARDED_FOR_HEADER)
        .and_then(|v| v.to_str().ok())
    {
        if let Some(first) = forwarded
            .split(',')
            .next()
            .map(str::trim)
            .filter(|s| !s.is_empty())
        {
            return first.to_string();
        }
    }

    peer.map(|p| p.ip().to_string())
        .unwrap_or_else(|| UNKNOWN.to_string())
}

pub fn user_agent(headers: &HeaderMap) -> String {
    headers
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .filter(|s| !s.trim().is_empty())
        .map(|s| s.to_string())
        .unwrap_or_else(|| UNKNOWN.to_string())
}

pub async fn capture(mut req: Request<Body>, next: Next) -> Response {
    let peer = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|c| c.0);
    let meta = RequestMeta {
        request_id: uuid::Uuid::new_v4().to_string(),
        remote_addr: remote_addr(req.headers(), peer),
        user_agent: user_agent(req.headers()),
    };
    let request_id = meta.request_id.clone();
    req.extensions_mut().insert(meta);

    let mut res = next.run(req).await;
    if let Ok(value) = HeaderValue::from_str(&request_id) {
        res.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    res
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forwarded_for_wins_over_peer() {
        let mut headers = HeaderMap::new();
        headers.insert(
            FORWARDED_FOR_HEADER,
            HeaderValue::from_static("203.0.113.9, 10.0.0.1"),
        );
        let peer: SocketAddr = "127.0.0.1:9999".parse().unwrap();
        assert_eq!(remote_addr(&headers, Some(peer)), "203.0.113.9");
    }

    #[test]
    fn peer_is_the_fallback() {
        let peer: SocketAddr = "192.0.2.4:1234".parse().unwrap();
        assert_eq!(remote_addr(&HeaderMap::new(), Some(peer)), "192.0.2.4");
    }

    #[test]
    fn unknowns_default_to_literal() {
        assert_eq!(remote_addr(&HeaderMap::new(), None), UNKNOWN);
        assert_eq!(user_agent(&HeaderMap::new()), UNKNOWN);
    }

    #[test]
    fn user_agent_passes_through() {
        let mut headers = HeaderMap::new();
        headers.insert(header::USER_AGENT, HeaderValue::from_static("curl/8.0"));
        assert_eq!(user_agent(&headers), "curl/8.0");
    }
}
