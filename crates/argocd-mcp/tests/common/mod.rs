// crates/argocd-mcp/tests/common/mod.rs
// ============================================================================
// Module: Common Test Fixtures
// Description: Scripted control plane, config builders, and audit capture.
// Purpose: Share deterministic infrastructure across integration tests.
// Dependencies: argocd-mcp, argocd-mcp-config, tiny_http
// ============================================================================

//! ## Overview
//! [`FakeControlPlane`] is a `tiny_http` server on `127.0.0.1:0` that answers
//! each request from a routing closure and records what it received.
//! [`RecordingAuditSink`] keeps request audit events in memory.

#![allow(dead_code, reason = "Shared test helpers may be unused in some cases.")]
#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::missing_docs_in_private_items,
    reason = "Test fixtures."
)]

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;
use std::sync::Mutex;
use std::thread;
use std::thread::JoinHandle;

use argocd_mcp::audit::CatalogAuditEvent;
use argocd_mcp::audit::GatewayAuditSink;
use argocd_mcp::audit::LifecycleAuditEvent;
use argocd_mcp::audit::RequestAuditEvent;
use argocd_mcp_config::GatewayConfig;
use tiny_http::Header;
use tiny_http::Response;
use tiny_http::Server;
use tiny_http::StatusCode;

// ============================================================================
// SECTION: Fake Control Plane
// ============================================================================

/// What the fake control plane saw for one request.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    /// HTTP method.
    pub method: String,
    /// Path and query as received.
    pub url: String,
    /// `Authorization` header value.
    pub authorization: Option<String>,
    /// `Content-Type` header value.
    pub content_type: Option<String>,
}

/// Scripted HTTP stand-in for the Argo CD API.
pub struct FakeControlPlane {
    /// Listening server, shared with the worker thread.
    server: Arc<Server>,
    /// Worker thread.
    handle: Option<JoinHandle<()>>,
    /// Requests received so far.
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
    /// `http://127.0.0.1:<port>`.
    pub base_url: String,
}

impl FakeControlPlane {
    /// Starts the server; `route` maps a request URL to `(status, body)`.
    pub fn start<F>(route: F) -> Self
    where
        F: Fn(&str) -> (u16, String) + Send + 'static,
    {
        Self::start_with(route, false)
    }

    /// Like [`FakeControlPlane::start`], but bodies are sent chunked without
    /// a `Content-Length` header.
    pub fn start_chunked<F>(route: F) -> Self
    where
        F: Fn(&str) -> (u16, String) + Send + 'static,
    {
        Self::start_with(route, true)
    }

    fn start_with<F>(route: F, chunked: bool) -> Self
    where
        F: Fn(&str) -> (u16, String) + Send + 'static,
    {
        let server = Arc::new(Server::http("127.0.0.1:0").unwrap());
        let port = server.server_addr().to_ip().unwrap().port();
        let requests = Arc::new(Mutex::new(Vec::new()));
        let worker_server = Arc::clone(&server);
        let worker_requests = Arc::clone(&requests);
        let handle = thread::spawn(move || {
            for request in worker_server.incoming_requests() {
                let header = |name: &'static str| {
                    request
                        .headers()
                        .iter()
                        .find(|header| header.field.equiv(name))
                        .map(|header| header.value.as_str().to_string())
                };
                let recorded = RecordedRequest {
                    method: request.method().as_str().to_string(),
                    url: request.url().to_string(),
                    authorization: header("Authorization"),
                    content_type: header("Content-Type"),
                };
                let (status, body) = route(&recorded.url);
                worker_requests.lock().unwrap().push(recorded);
                let content_type = Header::from_bytes("Content-Type", "application/json").unwrap();
                let response = if chunked {
                    Response::new(
                        StatusCode(status),
                        vec![content_type],
                        Cursor::new(body.into_bytes()),
                        None,
                        None,
                    )
                } else {
                    Response::from_string(body).with_status_code(status).with_header(content_type)
                };
                let _ = request.respond(response);
            }
        });
        Self {
            server,
            handle: Some(handle),
            requests,
            base_url: format!("http://127.0.0.1:{port}"),
        }
    }

    /// Returns a copy of the requests received so far.
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl Drop for FakeControlPlane {
    fn drop(&mut self) {
        self.server.unblock();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

/// Routes used by most tests: `checkout` exists, everything else is 404.
pub fn argocd_routes(url: &str) -> (u16, String) {
    match url {
        "/api/v1/applications" => {
            (200, r#"{"metadata":{},"items":[{"metadata":{"name":"checkout"}}]}"#.to_string())
        }
        "/api/v1/applications?search=check" => {
            (200, r#"{"metadata":{},"items":[{"metadata":{"name":"checkout"}}]}"#.to_string())
        }
        "/api/v1/applications/checkout" => {
            (200, r#"{"metadata":{"name":"checkout"},"status":{"sync":{"status":"Synced"}}}"#.to_string())
        }
        "/api/v1/applications/checkout/resource-tree" => {
            (200, r#"{"nodes":[{"kind":"Deployment","name":"checkout"}]}"#.to_string())
        }
        _ => (
            404,
            r#"{"error":"application not found","code":5,"message":"application not found"}"#
                .to_string(),
        ),
    }
}

// ============================================================================
// SECTION: Config
// ============================================================================

/// Valid gateway config pointing at `base_url` and `catalog_path`.
pub fn gateway_config(base_url: &str, catalog_path: &Path) -> GatewayConfig {
    let mut config = GatewayConfig::default();
    config.server.bind = "127.0.0.1:0".to_string();
    config.control_plane.base_url = base_url.to_string();
    config.control_plane.token = "test-token".to_string();
    config.catalog.path = catalog_path.to_path_buf();
    config.catalog.interval_ms = 50;
    config.audit.enabled = false;
    config.validate().unwrap();
    config
}

// ============================================================================
// SECTION: Audit Capture
// ============================================================================

/// Audit sink that keeps events in memory.
#[derive(Default)]
pub struct RecordingAuditSink {
    /// Request events.
    pub requests: Mutex<Vec<RequestAuditEvent>>,
    /// Catalog events.
    pub catalog: Mutex<Vec<CatalogAuditEvent>>,
    /// Lifecycle events.
    pub lifecycle: Mutex<Vec<LifecycleAuditEvent>>,
}

impl GatewayAuditSink for RecordingAuditSink {
    fn record_request(&self, event: &RequestAuditEvent) {
        self.requests.lock().unwrap().push(event.clone());
    }

    fn record_catalog(&self, event: &CatalogAuditEvent) {
        self.catalog.lock().unwrap().push(event.clone());
    }

    fn record_lifecycle(&self, event: &LifecycleAuditEvent) {
        self.lifecycle.lock().unwrap().push(event.clone());
    }
}
