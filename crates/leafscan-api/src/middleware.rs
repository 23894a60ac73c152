//! API middleware.

use std::net::{IpAddr, SocketAddr};
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::body::Body;
use axum::extract::{ConnectInfo, State};
use axum::http::{HeaderMap, HeaderValue, Request, Response};
use axum::middleware::Next;
use axum::response::IntoResponse;
use governor::{DefaultKeyedRateLimiter, Quota, RateLimiter};
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::config::ApiConfig;
use crate::error::{redacted_internal_error, ApiError, InternalErrorMarker};
use crate::metrics;

const REQUEST_ID_HEADER: &str = "X-Request-ID";

/// Tracked clients above which idle limiter state is pruned.
const MAX_TRACKED_CLIENTS: usize = 10_000;

/// Per-client-IP limiter for the prediction routes.
///
/// A client's entry disappears once its bucket has refilled, so active
/// clients keep their state and idle ones cost nothing.
pub struct ClientRateLimiter {
    limiter: DefaultKeyedRateLimiter<IpAddr>,
}

impl ClientRateLimiter {
    /// A zero rate falls back to 10 requests per second.
    pub fn new(requests_per_second: u32) -> Self {
        let rps = NonZeroU32::new(requests_per_second).unwrap_or(NonZeroU32::MIN.saturating_add(9));
        Self {
            limiter: RateLimiter::keyed(Quota::per_second(rps)),
        }
    }

    /// Whether `ip` may make another request now.
    pub fn check(&self, ip: IpAddr) -> bool {
        if self.limiter.len() > MAX_TRACKED_CLIENTS {
            self.prune();
        }
        self.limiter.check_key(&ip).is_ok()
    }

    /// Drop state for clients whose bucket is full again.
    pub fn prune(&self) {
        self.limiter.retain_recent();
        self.limiter.shrink_to_fit();
    }

    pub fn tracked_clients(&self) -> usize {
        self.limiter.len()
    }
}

/// Create CORS layer.
///
/// `*` allows any origin without credentials. Anything else is an explicit,
/// credentialed allow-list.
pub fn cors_layer(origins: &[String]) -> CorsLayer {
    use axum::http::{header, Method};

    let base = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .max_age(Duration::from_secs(600));

    if origins.iter().any(|o| o == "*") {
        return base.allow_origin(Any).allow_headers(Any).expose_headers(Any);
    }

    let origins: Vec<HeaderValue> = origins.iter().filter_map(|o| o.parse().ok()).collect();
    // Wildcard headers are rejected by tower-http when credentials are allowed
    base.allow_origin(origins)
        .allow_credentials(true)
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT, header::ORIGIN])
        .expose_headers([
            header::CONTENT_TYPE,
            header::CONTENT_LENGTH,
            header::HeaderName::from_static("x-request-id"),
        ])
}

/// Security headers middleware.
pub async fn security_headers(request: Request<Body>, next: Next) -> Response<Body> {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();

    headers.insert("X-Content-Type-Options", HeaderValue::from_static("nosniff"));
    headers.insert("X-Frame-Options", HeaderValue::from_static("DENY"));
    headers.insert("Referrer-Policy", HeaderValue::from_static("no-referrer"));
    // Annotated images are embedded by front-ends served from other origins
    headers.insert(
        "Cross-Origin-Resource-Policy",
        HeaderValue::from_static("cross-origin"),
    );

    response
}

/// Identifier attached to every request and echoed in the response.
#[derive(Debug, Clone)]
pub struct RequestId(pub String);

/// Request ID middleware.
///
/// Reuses a caller-supplied `X-Request-ID` when it is a valid header value.
pub async fn request_id(mut request: Request<Body>, next: Next) -> Response<Body> {
    let id = request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty() && v.len() <= 128)
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    request.extensions_mut().insert(RequestId(id.clone()));

    let mut response = next.run(request).await;
    if let Ok(value) = HeaderValue::from_str(&id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    response
}

/// Request logging middleware.
///
/// Everything logged while handling the request carries its ID, method and
/// path. Health and metrics endpoints are not logged on completion.
pub async fn request_logging(request: Request<Body>, next: Next) -> Response<Body> {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let id = request
        .extensions()
        .get::<RequestId>()
        .map(|id| id.0.clone())
        .unwrap_or_default();
    let span = info_span!("request", request_id = %id, method = %method, path = %path);
    let start = Instant::now();

    let response = next.run(request).instrument(span.clone()).await;

    if !matches!(path.as_str(), "/health" | "/healthz" | "/ready" | "/metrics") {
        span.in_scope(|| {
            info!(
                status = response.status().as_u16(),
                duration_ms = start.elapsed().as_millis() as u64,
                "Request completed"
            )
        });
    }

    response
}

/// Replace internal error details with a generic message in production.
pub async fn hide_internal_errors(
    State(config): State<Arc<ApiConfig>>,
    request: Request<Body>,
    next: Next,
) -> Response<Body> {
    let response = next.run(request).await;

    if config.is_production() && response.extensions().get::<InternalErrorMarker>().is_some() {
        return redacted_internal_error();
    }
    response
}

/// Rate limiting middleware for the prediction routes.
pub async fn rate_limit_middleware(
    State(limiter): State<Arc<ClientRateLimiter>>,
    request: Request<Body>,
    next: Next,
) -> Response<Body> {
    let connected = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ci| ci.0.ip());

    if let Some(ip) = client_ip(request.headers(), connected) {
        if !limiter.check(ip) {
            warn!(ip = %ip, "Rate limit exceeded");
            metrics::record_rate_limit_hit(&metrics::path_label(&request));
            return ApiError::RateLimited.into_response();
        }
    }

    next.run(request).await
}

/// Client address: the first `X-Forwarded-For` hop, then `X-Real-IP`, then
/// the socket peer.
fn client_ip(headers: &HeaderMap, connected: Option<IpAddr>) -> Option<IpAddr> {
    let header_ip = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .and_then(|v| v.trim().parse::<IpAddr>().ok())
    };

    header_ip("X-Forwarded-For")
        .or_else(|| header_ip("X-Real-IP"))
        .or(connected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use axum::routing::get;
    use axum::{middleware, Router};
    use tower::ServiceExt;

    #[test]
    fn test_rate_limiter_blocks_after_quota() {
        let limiter = ClientRateLimiter::new(2);
        let ip: IpAddr = "10.0.0.1".parse().unwrap();

        assert!(limiter.check(ip));
        assert!(limiter.check(ip));
        assert!(!limiter.check(ip));

        let other: IpAddr = "10.0.0.2".parse().unwrap();
        assert!(limiter.check(other));
        assert_eq!(limiter.tracked_clients(), 2);
    }

    #[test]
    fn test_client_ip_precedence() {
        let peer: IpAddr = "192.0.2.1".parse().unwrap();

        let mut headers = HeaderMap::new();
        assert_eq!(client_ip(&headers, Some(peer)), Some(peer));
        assert_eq!(client_ip(&headers, None), None);

        headers.insert("X-Real-IP", "198.51.100.2".parse().unwrap());
        assert_eq!(client_ip(&headers, Some(peer)), Some("198.51.100.2".parse().unwrap()));

        headers.insert("X-Forwarded-For", "203.0.113.7, 10.0.0.1".parse().unwrap());
        assert_eq!(client_ip(&headers, Some(peer)), Some("203.0.113.7".parse().unwrap()));

        headers.insert("X-Forwarded-For", "not-an-ip".parse().unwrap());
        assert_eq!(client_ip(&headers, None), Some("198.51.100.2".parse().unwrap()));
    }

    async fn failing() -> Result<&'static str, ApiError> {
        Err(ApiError::internal("disk /var/leafscan is full"))
    }

    async fn error_body(environment: &str) -> (StatusCode, serde_json::Value) {
        let config = Arc::new(ApiConfig {
            environment: environment.to_string(),
            ..Default::default()
        });
        let router = Router::new()
            .route("/fail", get(failing))
            .layer(middleware::from_fn_with_state(config, hide_internal_errors));

        let response = router
            .oneshot(Request::builder().uri("/fail").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_internal_errors_hidden_in_production() {
        let (status, body) = error_body("Production").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["code"], "internal");
        assert_eq!(body["error"], "An internal error occurred");

        let (status, body) = error_body("development").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body["error"].as_str().unwrap().contains("/var/leafscan"));
    }

    #[tokio::test]
    async fn test_request_id_is_generated_or_echoed() {
        let router = Router::new()
            .route("/", get(|| async { "ok" }))
            .layer(middleware::from_fn(request_logging))
            .layer(middleware::from_fn(request_id));

        let response = router
            .clone()
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let generated = response.headers()[REQUEST_ID_HEADER].to_str().unwrap();
        assert!(Uuid::parse_str(generated).is_ok());

        let response = router
            .oneshot(
                Request::builder()
                    .uri("/")
                    .header(REQUEST_ID_HEADER, "trace-42")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.headers()[REQUEST_ID_HEADER], "trace-42");
    }
}
