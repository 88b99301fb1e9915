use std::sync::Arc;
use std::time::Instant;

use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::{header, HeaderMap, HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{DateTime, Utc};
use serde_json::json;
use tracing::error;

use crate::metrics::{GATE_PROXY_LATENCY, GATE_REQUESTS_TOTAL, GATE_THROTTLED_TOTAL};
use crate::rate_limit::Decision;
use crate::state::GateState;

// Quota annotation added to admitted responses.
struct Quota {
    limit: u32,
    remaining: u32,
    reset_at: DateTime<Utc>,
}

// Identity derivation: edge-provided client ip, else the first forwarded hop,
// else a shared sentinel that pools all unidentifiable clients together.
pub fn client_identity(headers: &HeaderMap) -> String {
    if let Some(ip) = headers.get("cf-connecting-ip").and_then(|v| v.to_str().ok()) {
        let ip = ip.trim();
        if !ip.is_empty() {
            return ip.to_string();
        }
    }
    if let Some(forwarded) = headers.get("x-forwarded-for").and_then(|v| v.to_str().ok()) {
        if let Some(first) = forwarded.split(',').next() {
            let first = first.trim();
            if !first.is_empty() {
                return first.to_string();
            }
        }
    }
    "unknown".to_string()
}

// Catch-all: POSTs under the protected prefix go through the throttle, every
// other request is forwarded untouched (no kv traffic at all).
pub async fn proxy_handler(State(state): State<Arc<GateState>>, request: Request) -> Response {
    GATE_REQUESTS_TOTAL.inc();

    let protected = request.method() == Method::POST
        && request.uri().path().starts_with(&state.protected_prefix);
    if !protected {
        return forward(&state, request, None).await;
    }

    let identity = client_identity(request.headers());
    match state.gate.admit(&identity, Utc::now()).await {
        Decision::Allow {
            limit,
            remaining,
            reset_at,
        } => {
            forward(
                &state,
                request,
                Some(Quota {
                    limit,
                    remaining,
                    reset_at,
                }),
            )
            .await
        }
        Decision::Deny {
            limit,
            reset_at,
            retry_after_secs,
        } => {
            GATE_THROTTLED_TOTAL.inc();
            rejection(limit, reset_at, retry_after_secs)
        }
        Decision::FailOpen => forward(&state, request, None).await,
    }
}

fn rejection(limit: u32, reset_at: DateTime<Utc>, retry_after_secs: u64) -> Response {
    let body = Json(json!({
        "error": "Too Many Requests",
        "message": format!("Rate limit exceeded. Maximum {limit} requests per hour allowed."),
        "retryAfter": retry_after_secs,
    }));
    let mut response = (StatusCode::TOO_MANY_REQUESTS, body).into_response();
    let headers = response.headers_mut();
    insert_header(headers, "x-ratelimit-limit", &limit.to_string());
    insert_header(headers, "x-ratelimit-remaining", "0");
    insert_header(headers, "x-ratelimit-reset", &reset_at.to_rfc3339());
    insert_header(headers, "retry-after", &retry_after_secs.to_string());
    response
}

async fn forward(state: &GateState, request: Request, quota: Option<Quota>) -> Response {
    let (parts, body) = request.into_parts();
    let bytes = match axum::body::to_bytes(body, usize::MAX).await {
        Ok(bytes) => bytes,
        Err(err) => {
            error!("reading request body failed: {err}");
            return bad_gateway("reading request body failed");
        }
    };

    let path_and_query = parts
        .uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");
    let url = format!("{}{}", state.origin, path_and_query);

    let mut request_headers = parts.headers.clone();
    request_headers.remove(header::HOST);

    let started = Instant::now();
    let upstream = state
        .client
        .request(parts.method.clone(), &url)
        .headers(request_headers)
        .body(bytes)
        .send()
        .await;
    GATE_PROXY_LATENCY.observe(started.elapsed().as_secs_f64());

    let upstream = match upstream {
        Ok(upstream) => upstream,
        Err(err) => {
            error!("forwarding to {url} failed: {err}");
            return bad_gateway("origin unreachable");
        }
    };

    let status = upstream.status();
    let mut headers = upstream.headers().clone();
    // the body is re-emitted from a buffer, so framing headers no longer apply
    headers.remove(header::TRANSFER_ENCODING);
    headers.remove(header::CONTENT_LENGTH);
    let body = upstream.bytes().await.unwrap_or_default();

    let mut response = Response::new(Body::from(body));
    *response.status_mut() = status;
    *response.headers_mut() = headers;
    if let Some(quota) = quota {
        let headers = response.headers_mut();
        insert_header(headers, "x-ratelimit-limit", &quota.limit.to_string());
        insert_header(headers, "x-ratelimit-remaining", &quota.remaining.to_string());
        insert_header(headers, "x-ratelimit-reset", &quota.reset_at.to_rfc3339());
    }
    response
}

fn bad_gateway(message: &str) -> Response {
    (
        StatusCode::BAD_GATEWAY,
        Json(json!({ "error": "Bad Gateway", "message": message })),
    )
        .into_response()
}

fn insert_header(headers: &mut HeaderMap, name: &'static str, value: &str) {
    if let Ok(value) = HeaderValue::from_str(value) {
        headers.insert(name, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(pairs: &[(&'static str, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(*name, HeaderValue::from_str(value).unwrap());
        }
        map
    }

    #[test]
    fn prefers_the_edge_provided_ip() {
        let map = headers(&[
            ("cf-connecting-ip", "203.0.113.7"),
            ("x-forwarded-for", "10.0.0.1, 10.0.0.2"),
        ]);
        assert_eq!(client_identity(&map), "203.0.113.7");
    }

    #[test]
    fn falls_back_to_first_forwarded_hop() {
        let map = headers(&[("x-forwarded-for", " 10.0.0.1 , 10.0.0.2")]);
        assert_eq!(client_identity(&map), "10.0.0.1");
    }

    #[test]
    fn unidentifiable_clients_pool_under_the_sentinel() {
        assert_eq!(client_identity(&HeaderMap::new()), "unknown");
        assert_eq!(client_identity(&headers(&[("x-forwarded-for", " ")])), "unknown");
    }
}
