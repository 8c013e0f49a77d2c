//! CORS for the webhook ingress.
//!
//! Preflight requests are answered here with 204 and never reach a gateway
//! handler. Every other response gets the same policy headers appended.

use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::header::{self, HeaderMap, HeaderValue};
use axum::http::{Method, StatusCode};
use axum::middleware::Next;
use axum::response::Response;

const ALLOWED_METHODS: &str = "POST, OPTIONS";
const ALLOWED_HEADERS: &str = "authorization, x-client-info, apikey, content-type, stripe-signature";
const MAX_AGE_SECS: &str = "86400";

/// Allowed origins. `*` allows any origin.
#[derive(Debug, Clone)]
pub struct CorsPolicy {
    origins: Arc<Vec<String>>,
}

impl CorsPolicy {
    pub fn new(origins: Vec<String>) -> Self {
        Self {
            origins: Arc::new(origins),
        }
    }

    pub fn allow_any() -> Self {
        Self::new(vec!["*".to_string()])
    }

    /// Value for `Access-Control-Allow-Origin`, if the origin is allowed.
    fn allowed_origin(&self, origin: Option<&str>) -> Option<HeaderValue> {
        if self.origins.iter().any(|o| o == "*") {
            return Some(HeaderValue::from_static("*"));
        }
        let origin = origin?;
        if self.origins.iter().any(|o| o == origin) {
            HeaderValue::from_str(origin).ok()
        } else {
            tracing::debug!(origin, "CORS origin not allowed");
            None
        }
    }

    fn apply(&self, origin: Option<&str>, headers: &mut HeaderMap) {
        if let Some(allowed) = self.allowed_origin(origin) {
            headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, allowed);
        }
        headers.insert(
            header::ACCESS_CONTROL_ALLOW_METHODS,
            HeaderValue::from_static(ALLOWED_METHODS),
        );
        headers.insert(
            header::ACCESS_CONTROL_ALLOW_HEADERS,
            HeaderValue::from_static(ALLOWED_HEADERS),
        );
        headers.insert(header::VARY, HeaderValue::from_static("origin"));
    }
}

impl Default for CorsPolicy {
    fn default() -> Self {
        Self::allow_any()
    }
}

pub async fn cors_middleware(
    State(policy): State<CorsPolicy>,
    req: Request,
    next: Next,
) -> Response {
    let origin = req
        .headers()
        .get(header::ORIGIN)
        .and_then(|v| v.to_str().ok())
        .map(String::from);

    if req.method() == Method::OPTIONS {
        let mut response = Response::new(Body::empty());
        *response.status_mut() = StatusCode::NO_CONTENT;
        policy.apply(origin.as_deref(), response.headers_mut());
        response.headers_mut().insert(
            header::ACCESS_CONTROL_MAX_AGE,
            HeaderValue::from_static(MAX_AGE_SECS),
        );
        return response;
    }

    let mut response = next.run(req).await;
    policy.apply(origin.as_deref(), response.headers_mut());
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wildcard_allows_any_origin() {
        let policy = CorsPolicy::allow_any();
        assert_eq!(
            policy.allowed_origin(Some("https://app.example.com")),
            Some(HeaderValue::from_static("*"))
        );
        assert!(policy.allowed_origin(None).is_some());
    }

    #[test]
    fn listed_origin_is_reflected() {
        let policy = CorsPolicy::new(vec!["https://app.example.com".to_string()]);
        assert_eq!(
            policy.allowed_origin(Some("https://app.example.com")),
            Some(HeaderValue::from_static("https://app.example.com"))
        );
        assert_eq!(policy.allowed_origin(Some("https://evil.example.com")), None);
        assert_eq!(policy.allowed_origin(None), None);
    }

    #[test]
    fn apply_always_sets_method_and_header_lists() {
        let policy = CorsPolicy::new(vec![]);
        let mut headers = HeaderMap::new();
        policy.apply(None, &mut headers);
        assert!(!headers.contains_key(header::ACCESS_CONTROL_ALLOW_ORIGIN));
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_METHODS], ALLOWED_METHODS);
    }
}
