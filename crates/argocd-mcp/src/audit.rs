// crates/argocd-mcp/src/audit.rs
// ============================================================================
// Module: Gateway Audit Logging
// Description: Structured JSON-line events for requests, catalog streams, and
//              server lifecycle.
// Purpose: Emit redacted operational logs without a logging framework.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! Every JSON-RPC request produces one [`RequestAuditEvent`]. Catalog stream
//! activity and read failures produce [`CatalogAuditEvent`]s, and startup
//! posture produces [`LifecycleAuditEvent`]s. Sinks serialize each event as a
//! single JSON line.
//!
//! Security posture: events never carry the control-plane token, request
//! params, or tool results; only names, codes, and sizes are recorded.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs::OpenOptions;
use std::io;
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use serde::Serialize;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Outcome classification for a handled request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestOutcome {
    /// The response carried a result.
    #[serde(rename = "ok")]
    Success,
    /// The response carried an error.
    Error,
}

/// Audit event for one JSON-RPC request.
#[derive(Debug, Clone, Serialize)]
pub struct RequestAuditEvent {
    /// Event identifier.
    pub event: &'static str,
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: u128,
    /// Request id rendered as JSON text, when the envelope carried one.
    pub request_id: Option<String>,
    /// JSON-RPC method when the envelope was readable.
    pub method: Option<String>,
    /// Tool name when a tool was resolved.
    pub tool: Option<String>,
    /// Request outcome.
    pub outcome: RequestOutcome,
    /// JSON-RPC error code when present.
    pub error_code: Option<i64>,
    /// Control-plane HTTP status when a proxy call failed upstream.
    pub upstream_status: Option<u16>,
    /// Request body size in bytes.
    pub request_bytes: usize,
    /// Response body size in bytes.
    pub response_bytes: usize,
    /// Handling latency in milliseconds.
    pub latency_ms: u128,
}

/// Inputs for [`RequestAuditEvent::new`].
#[derive(Debug, Clone)]
pub struct RequestAuditEventParams {
    /// Request id rendered as JSON text.
    pub request_id: Option<String>,
    /// JSON-RPC method.
    pub method: Option<String>,
    /// Tool name.
    pub tool: Option<String>,
    /// Request outcome.
    pub outcome: RequestOutcome,
    /// JSON-RPC error code.
    pub error_code: Option<i64>,
    /// Control-plane HTTP status.
    pub upstream_status: Option<u16>,
    /// Request body size in bytes.
    pub request_bytes: usize,
    /// Response body size in bytes.
    pub response_bytes: usize,
    /// Handling latency in milliseconds.
    pub latency_ms: u128,
}

/// Catalog stream audit event kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CatalogEventKind {
    /// A subscriber opened the stream.
    StreamOpened,
    /// The stream task ended.
    StreamClosed,
    /// A tick failed to read or parse the catalog file.
    CatalogReadFailed,
}

/// Audit event for catalog stream activity.
#[derive(Debug, Clone, Serialize)]
pub struct CatalogAuditEvent {
    /// Event identifier.
    pub event: &'static str,
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: u128,
    /// Event kind.
    pub kind: CatalogEventKind,
    /// Catalog file path.
    pub path: String,
    /// Failure detail for read failures.
    pub message: Option<String>,
}

/// Lifecycle audit event kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleEventKind {
    /// The listener is bound and serving.
    ServerStarted,
    /// Control-plane certificate verification is off.
    TlsVerificationDisabled,
}

/// Audit event for server lifecycle and security posture.
#[derive(Debug, Clone, Serialize)]
pub struct LifecycleAuditEvent {
    /// Event identifier.
    pub event: &'static str,
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: u128,
    /// Event kind.
    pub kind: LifecycleEventKind,
    /// Human-readable detail.
    pub message: String,
}

impl RequestAuditEvent {
    /// Creates a new request audit event with a consistent timestamp.
    #[must_use]
    pub fn new(params: RequestAuditEventParams) -> Self {
        Self {
            event: "jsonrpc_request",
            timestamp_ms: now_ms(),
            request_id: params.request_id,
            method: params.method,
            tool: params.tool,
            outcome: params.outcome,
            error_code: params.error_code,
            upstream_status: params.upstream_status,
            request_bytes: params.request_bytes,
            response_bytes: params.response_bytes,
            latency_ms: params.latency_ms,
        }
    }
}

impl CatalogAuditEvent {
    /// Creates a new catalog audit event.
    #[must_use]
    pub fn new(kind: CatalogEventKind, path: &Path, message: Option<String>) -> Self {
        Self {
            event: "catalog_stream",
            timestamp_ms: now_ms(),
            kind,
            path: path.display().to_string(),
            message,
        }
    }
}

impl LifecycleAuditEvent {
    /// Creates a new lifecycle audit event.
    #[must_use]
    pub fn new(kind: LifecycleEventKind, message: impl Into<String>) -> Self {
        Self {
            event: "gateway_lifecycle",
            timestamp_ms: now_ms(),
            kind,
            message: message.into(),
        }
    }
}

// ============================================================================
// SECTION: Trait
// ============================================================================

/// Audit sink for gateway events.
pub trait GatewayAuditSink: Send + Sync {
    /// Record a request audit event.
    fn record_request(&self, event: &RequestAuditEvent);

    /// Record a catalog stream audit event.
    fn record_catalog(&self, _event: &CatalogAuditEvent) {}

    /// Record a lifecycle audit event.
    fn record_lifecycle(&self, _event: &LifecycleAuditEvent) {}
}

/// Audit sink that logs JSON lines to stderr.
pub struct GatewayStderrAuditSink;

impl GatewayAuditSink for GatewayStderrAuditSink {
    fn record_request(&self, event: &RequestAuditEvent) {
        write_line(&mut io::stderr(), event);
    }

    fn record_catalog(&self, event: &CatalogAuditEvent) {
        write_line(&mut io::stderr(), event);
    }

    fn record_lifecycle(&self, event: &LifecycleAuditEvent) {
        write_line(&mut io::stderr(), event);
    }
}

/// Audit sink that logs JSON lines to a file.
pub struct GatewayFileAuditSink {
    /// File handle used for append-only logging.
    file: Mutex<std::fs::File>,
}

impl GatewayFileAuditSink {
    /// Opens the audit log file in append mode.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened.
    pub fn new(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            file: Mutex::new(file),
        })
    }

    /// Appends one serialized event under the file lock.
    fn append<T: Serialize>(&self, event: &T) {
        if let Ok(mut file) = self.file.lock() {
            write_line(&mut *file, event);
            let _ = file.flush();
        }
    }
}

impl GatewayAuditSink for GatewayFileAuditSink {
    fn record_request(&self, event: &RequestAuditEvent) {
        self.append(event);
    }

    fn record_catalog(&self, event: &CatalogAuditEvent) {
        self.append(event);
    }

    fn record_lifecycle(&self, event: &LifecycleAuditEvent) {
        self.append(event);
    }
}

/// No-op audit sink.
pub struct GatewayNoopAuditSink;

impl GatewayAuditSink for GatewayNoopAuditSink {
    fn record_request(&self, _event: &RequestAuditEvent) {}
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Milliseconds since the Unix epoch, zero if the clock is before it.
fn now_ms() -> u128 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis()
}

/// Serializes `event` as one JSON line; write failures are dropped.
fn write_line<W: Write, T: Serialize>(writer: &mut W, event: &T) {
    if let Ok(payload) = serde_json::to_string(event) {
        let _ = writeln!(writer, "{payload}");
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
