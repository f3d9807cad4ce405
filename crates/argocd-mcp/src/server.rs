// crates/argocd-mcp/src/server.rs
// ============================================================================
// Module: Gateway HTTP Front
// Description: axum router for JSON-RPC dispatch and catalog streaming.
// Purpose: Compose config, control plane, tools, and publisher into a server.
// Dependencies: argocd-mcp-config, axum, tokio, tokio-stream
// ============================================================================

//! ## Overview
//! [`McpGateway`] exposes two routes:
//! - `POST /jsonrpc` answers every body with one JSON-RPC envelope and HTTP
//!   200; failures live in the envelope, not the status line.
//! - `GET /sse` streams [`crate::catalog::CatalogEvent`]s as
//!   `data: <json>` events until the client disconnects.
//!
//! Bodies above `server.max_body_bytes` are answered with an invalid-request
//! envelope and `id: null`. Every request is written to the audit sink.
//!
//! Security posture: the inbound endpoint is unauthenticated and expected to
//! sit behind a deployment layer that handles access control.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use std::time::Instant;

use argocd_mcp_config::AuditConfig;
use argocd_mcp_config::GatewayConfig;
use axum::Router;
use axum::body::Body;
use axum::extract::State;
use axum::http::header::CONTENT_TYPE;
use axum::response::IntoResponse;
use axum::response::Response;
use axum::response::Sse;
use axum::response::sse::Event;
use axum::routing::get;
use axum::routing::post;
use serde_json::Value;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio_stream::Stream;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::ReceiverStream;

use crate::audit::GatewayAuditSink;
use crate::audit::GatewayFileAuditSink;
use crate::audit::GatewayNoopAuditSink;
use crate::audit::GatewayStderrAuditSink;
use crate::audit::LifecycleAuditEvent;
use crate::audit::LifecycleEventKind;
use crate::audit::RequestAuditEvent;
use crate::audit::RequestAuditEventParams;
use crate::audit::RequestOutcome;
use crate::catalog::CatalogPublisher;
use crate::control_plane::ControlPlaneApi;
use crate::control_plane::ControlPlaneClient;
use crate::jsonrpc::DispatchOutcome;
use crate::jsonrpc::JsonRpcDispatcher;
use crate::jsonrpc::JsonRpcError;
use crate::jsonrpc::JsonRpcErrorKind;
use crate::jsonrpc::JsonRpcResponse;
use crate::tools::ToolRegistry;
use crate::tools::argocd::default_registry;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// JSON-RPC route.
pub const JSONRPC_PATH: &str = "/jsonrpc";
/// Catalog stream route.
pub const SSE_PATH: &str = "/sse";
/// Body sent if a response envelope cannot be serialized.
const SERIALIZATION_FAILED: &[u8] = b"{\"jsonrpc\":\"2.0\",\"id\":null,\"error\":{\"code\":-32603,\
                                      \"message\":\"response serialization failed\"}}";

// ============================================================================
// SECTION: Gateway
// ============================================================================

/// Assembled gateway, ready to serve.
pub struct McpGateway {
    /// Validated configuration.
    config: GatewayConfig,
    /// Shared request dispatcher.
    dispatcher: JsonRpcDispatcher,
    /// Catalog stream source.
    publisher: CatalogPublisher,
    /// Audit sink shared by all components.
    audit: Arc<dyn GatewayAuditSink>,
}

impl McpGateway {
    /// Builds the gateway from configuration: audit sink, control-plane
    /// client, and the built-in tool set.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError`] when the audit log or client cannot be built.
    pub fn from_config(config: GatewayConfig) -> Result<Self, GatewayError> {
        let audit = build_audit_sink(&config.audit)?;
        let client = ControlPlaneClient::new(&config.control_plane)
            .map_err(|err| GatewayError::Init(err.to_string()))?;
        Self::with_control_plane(config, Arc::new(client), audit)
    }

    /// Builds the gateway over a caller-supplied control plane.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Init`] if the built-in tools fail to register.
    pub fn with_control_plane(
        config: GatewayConfig,
        control_plane: Arc<dyn ControlPlaneApi>,
        audit: Arc<dyn GatewayAuditSink>,
    ) -> Result<Self, GatewayError> {
        let registry =
            default_registry(control_plane).map_err(|err| GatewayError::Init(err.to_string()))?;
        Ok(Self::new(config, Arc::new(registry), audit))
    }

    /// Builds the gateway over an explicit registry.
    #[must_use]
    pub fn new(
        config: GatewayConfig,
        registry: Arc<ToolRegistry>,
        audit: Arc<dyn GatewayAuditSink>,
    ) -> Self {
        let publisher = CatalogPublisher::new(
            config.catalog.path.clone(),
            Duration::from_millis(config.catalog.interval_ms),
            Arc::clone(&audit),
        );
        Self {
            config,
            dispatcher: JsonRpcDispatcher::new(registry),
            publisher,
            audit,
        }
    }

    /// Returns the request dispatcher.
    #[must_use]
    pub const fn dispatcher(&self) -> &JsonRpcDispatcher {
        &self.dispatcher
    }

    /// Builds the axum router.
    #[must_use]
    pub fn router(&self) -> Router {
        let state = Arc::new(ServerState {
            dispatcher: self.dispatcher.clone(),
            publisher: self.publisher.clone(),
            audit: Arc::clone(&self.audit),
            max_body_bytes: self.config.server.max_body_bytes,
        });
        Router::new()
            .route(JSONRPC_PATH, post(handle_jsonrpc))
            .route(SSE_PATH, get(handle_sse))
            .with_state(state)
    }

    /// Binds `server.bind` and serves until the listener fails.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError`] on an invalid bind address or bind failure.
    pub async fn serve(self) -> Result<(), GatewayError> {
        let addr =
            self.config.server.bind_addr().map_err(|err| GatewayError::Config(err.to_string()))?;
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|err| GatewayError::Transport(format!("bind {addr} failed: {err}")))?;
        self.serve_listener(listener).await
    }

    /// Serves on an already-bound listener.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Transport`] when the server stops with an error.
    pub async fn serve_listener(self, listener: TcpListener) -> Result<(), GatewayError> {
        let local = listener
            .local_addr()
            .map_err(|err| GatewayError::Transport(format!("listener address: {err}")))?;
        if !self.config.control_plane.verify_tls {
            self.audit.record_lifecycle(&LifecycleAuditEvent::new(
                LifecycleEventKind::TlsVerificationDisabled,
                format!(
                    "certificate verification disabled for {}",
                    self.config.control_plane.base_url
                ),
            ));
        }
        self.audit.record_lifecycle(&LifecycleAuditEvent::new(
            LifecycleEventKind::ServerStarted,
            format!("listening on {local}"),
        ));
        axum::serve(listener, self.router())
            .await
            .map_err(|err| GatewayError::Transport(format!("server failed: {err}")))
    }
}

/// Chooses the audit sink for `config`.
///
/// # Errors
///
/// Returns [`GatewayError::Init`] when the audit file cannot be opened.
pub fn build_audit_sink(config: &AuditConfig) -> Result<Arc<dyn GatewayAuditSink>, GatewayError> {
    if !config.enabled {
        return Ok(Arc::new(GatewayNoopAuditSink));
    }
    match &config.path {
        Some(path) => {
            let sink = GatewayFileAuditSink::new(path).map_err(|err| {
                GatewayError::Init(format!("audit log {}: {err}", path.display()))
            })?;
            Ok(Arc::new(sink))
        }
        None => Ok(Arc::new(GatewayStderrAuditSink)),
    }
}

// ============================================================================
// SECTION: Handlers
// ============================================================================

/// Shared handler state.
struct ServerState {
    /// Request dispatcher.
    dispatcher: JsonRpcDispatcher,
    /// Catalog stream source.
    publisher: CatalogPublisher,
    /// Audit sink.
    audit: Arc<dyn GatewayAuditSink>,
    /// Maximum accepted request body size.
    max_body_bytes: usize,
}

/// Handles `POST /jsonrpc`.
async fn handle_jsonrpc(State(state): State<Arc<ServerState>>, body: Body) -> Response {
    let started = Instant::now();
    let (outcome, request_bytes) = match axum::body::to_bytes(body, state.max_body_bytes).await {
        Ok(bytes) => (state.dispatcher.dispatch_bytes(&bytes).await, bytes.len()),
        Err(_) => (oversized_body(state.max_body_bytes), 0),
    };
    let payload =
        serde_json::to_vec(&outcome.response).unwrap_or_else(|_| SERIALIZATION_FAILED.to_vec());
    state.audit.record_request(&RequestAuditEvent::new(RequestAuditEventParams {
        request_id: match &outcome.response.id {
            Value::Null => None,
            id => Some(id.to_string()),
        },
        method: outcome.method,
        tool: outcome.tool,
        outcome: if outcome.response.error.is_some() {
            RequestOutcome::Error
        } else {
            RequestOutcome::Success
        },
        error_code: outcome.response.error_code(),
        upstream_status: outcome.upstream_status,
        request_bytes,
        response_bytes: payload.len(),
        latency_ms: started.elapsed().as_millis(),
    }));
    ([(CONTENT_TYPE, "application/json")], payload).into_response()
}

/// Handles `GET /sse`.
async fn handle_sse(
    State(state): State<Arc<ServerState>>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let events = ReceiverStream::new(state.publisher.subscribe())
        .map(|event| Ok(Event::default().data(event.to_json())));
    Sse::new(events)
}

/// Outcome for a body that exceeded the size limit or could not be read.
fn oversized_body(limit: usize) -> DispatchOutcome {
    DispatchOutcome {
        response: JsonRpcResponse::failure(
            Value::Null,
            JsonRpcError::new(
                JsonRpcErrorKind::InvalidRequest,
                format!("request body exceeds {limit} bytes or could not be read"),
            ),
        ),
        method: None,
        tool: None,
        upstream_status: None,
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Gateway startup and transport failures.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Configuration rejected at startup.
    #[error("gateway config error: {0}")]
    Config(String),
    /// A component could not be constructed.
    #[error("gateway init error: {0}")]
    Init(String),
    /// Listener or server failure.
    #[error("gateway transport error: {0}")]
    Transport(String),
}
