//! HTTP API for the invoice service.
//!
//! This module provides the REST API endpoints for:
//! - Liveness, health and metrics
//! - File upload, blob delivery and extraction
//! - Invoice CRUD and search

use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, State},
    http::{HeaderValue, Method, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::config::ServerConfig;
use crate::error::{I18nError, ServiceError};
use crate::service::InvoiceService;

pub mod files;
pub mod invoices;
use files::{extract_handler, get_blob_handler, list_files_handler, upload_file_handler};
use invoices::{
    create_invoice_handler, delete_invoice_handler, get_invoice_handler, list_invoices_handler,
    update_invoice_handler,
};

/// Headroom above the file size limit for multipart framing
const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

/// Application state
pub struct AppState {
    pub service: Arc<InvoiceService>,
    pub start_time: Instant,
    /// Prometheus exporter; absent when no recorder is installed
    pub metrics: Option<PrometheusHandle>,
}

impl AppState {
    /// Create an i18n-aware error from a service error
    pub fn i18n_error(&self, error: ServiceError) -> I18nError {
        I18nError::new(error, self.service.i18n.clone(), "en")
    }
}

/// Build the API router
pub fn router(service: Arc<InvoiceService>, metrics: Option<PrometheusHandle>) -> Router {
    let server = service.config.server.clone();
    let max_upload = service.config.limits.max_upload_size_bytes as usize;

    let state = Arc::new(AppState {
        service,
        start_time: Instant::now(),
        metrics,
    });

    let api_routes = Router::new()
        // File endpoints - with the upload limit on the upload route only
        .route("/files", get(list_files_handler))
        .route(
            "/files/upload",
            post(upload_file_handler)
                .layer(DefaultBodyLimit::max(max_upload + MULTIPART_OVERHEAD_BYTES)),
        )
        .route("/files/blob/{pathname}", get(get_blob_handler))
        .route("/files/extract", post(extract_handler))
        // Invoice endpoints
        .route(
            "/invoices",
            get(list_invoices_handler).post(create_invoice_handler),
        )
        .route(
            "/invoices/{id}",
            get(get_invoice_handler)
                .put(update_invoice_handler)
                .post(update_invoice_handler)
                .delete(delete_invoice_handler),
        );

    Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .nest("/api/v1", api_routes)
        .layer(cors_layer(&server))
        .layer(timeout_layer(server.request_timeout()))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Slow requests are cut off with 408
fn timeout_layer(timeout: Duration) -> TimeoutLayer {
    TimeoutLayer::with_status_code(StatusCode::REQUEST_TIMEOUT, timeout)
}

fn cors_layer(server: &ServerConfig) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::ACCEPT]);

    // Credentials cannot be combined with a wildcard origin
    if server.cors_origins.iter().any(|origin| origin == "*") {
        return cors.allow_origin(AllowOrigin::any());
    }

    let origins: Vec<HeaderValue> = server
        .cors_origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    cors.allow_origin(AllowOrigin::list(origins))
        .allow_credentials(true)
}

// === Liveness, Health & Metrics ===

async fn root_handler(State(state): State<Arc<AppState>>) -> String {
    state.service.i18n.get("en", "server-working", None)
}

async fn health_handler(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let gemini_configured = state.service.gemini.is_configured();
    let groq_configured = state.service.groq.is_configured();

    let status = if gemini_configured || groq_configured {
        state.service.i18n.get("en", "health-status-healthy", None)
    } else {
        state.service.i18n.format(
            "en",
            "health-status-degraded",
            &[("reason", "no extraction provider configured")],
        )
    };

    Json(HealthResponse {
        status,
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        gemini_configured,
        groq_configured,
    })
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
    uptime_seconds: u64,
    gemini_configured: bool,
    groq_configured: bool,
}

async fn metrics_handler(State(state): State<Arc<AppState>>) -> Response {
    match &state.metrics {
        Some(handle) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            handle.render(),
        )
            .into_response(),
        None => (
            StatusCode::SERVICE_UNAVAILABLE,
            "Metrics recorder not installed",
        )
            .into_response(),
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use axum::Router;
    use axum::body::{Body, Bytes, to_bytes};
    use axum::http::{Request, StatusCode};
    use std::sync::Arc;
    use tempfile::TempDir;
    use tower::ServiceExt;

    use crate::service::test_support::test_service;

    pub(crate) fn test_app(dir: &TempDir, provider_url: &str) -> Router {
        super::router(Arc::new(test_service(dir, provider_url)), None)
    }

    pub(crate) async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Bytes) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, body)
    }

    pub(crate) async fn send_json(
        app: &Router,
        request: Request<Body>,
    ) -> (StatusCode, serde_json::Value) {
        let (status, body) = send(app, request).await;
        let value = if body.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(&body).unwrap()
        };
        (status, value)
    }

    pub(crate) fn json_request(method: &str, uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    pub(crate) fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use std::time::Duration;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_root_and_health() {
        let dir = TempDir::new().unwrap();
        let app = test_app(&dir, "http://unused.test");

        let (status, body) = send(&app, get("/")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(&body[..], b"Server is working");

        let (status, health) = send_json(&app, get("/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(health["status"], "Service is healthy");
        assert_eq!(health["gemini_configured"], true);
    }

    #[tokio::test]
    async fn test_metrics_without_recorder() {
        let dir = TempDir::new().unwrap();
        let app = test_app(&dir, "http://unused.test");

        let (status, _) = send(&app, get("/metrics")).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_slow_requests_time_out() {
        let app = axum::Router::new()
            .route(
                "/slow",
                axum::routing::get(|| async {
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    "done"
                }),
            )
            .layer(super::timeout_layer(Duration::from_millis(20)));

        let (status, _) = send(&app, get("/slow")).await;
        assert_eq!(status, StatusCode::REQUEST_TIMEOUT);
    }

    #[tokio::test]
    async fn test_cors_preflight_allows_frontend() {
        let dir = TempDir::new().unwrap();
        let app = test_app(&dir, "http://unused.test");

        let request = Request::builder()
            .method("OPTIONS")
            .uri("/api/v1/invoices")
            .header("origin", "http://localhost:3000")
            .header("access-control-request-method", "PUT")
            .body(Body::empty())
            .unwrap();
        let response = tower::ServiceExt::oneshot(app, request).await.unwrap();

        let headers = response.headers();
        assert_eq!(
            headers["access-control-allow-origin"],
            "http://localhost:3000"
        );
        assert_eq!(headers["access-control-allow-credentials"], "true");
    }
}
