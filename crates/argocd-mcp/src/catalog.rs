// crates/argocd-mcp/src/catalog.rs
// ============================================================================
// Module: Catalog Publisher
// Description: Interval-driven re-publication of the tool catalog document.
// Purpose: Feed the server-push stream with fresh catalog events.
// Dependencies: serde, serde_json, tokio
// ============================================================================

//! ## Overview
//! [`CatalogPublisher::subscribe`] spawns one task per subscriber. On every
//! tick the task reads the catalog document from disk (capped at
//! [`MAX_CATALOG_FILE_SIZE`]), parses it as a list of [`ToolSpec`]s, and
//! sends one [`CatalogEvent`]. Read and parse failures are sent as
//! `params: {"error": ...}` events; they never end the loop.
//!
//! The first tick fires immediately. The task stops at its next suspend point
//! once the receiver is dropped, and the file handle never outlives a tick.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use serde_json::json;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;

use crate::audit::CatalogAuditEvent;
use crate::audit::CatalogEventKind;
use crate::audit::GatewayAuditSink;
use crate::jsonrpc::JSONRPC_VERSION;
use crate::jsonrpc::TOOLS_LIST;
use crate::tools::ToolSpec;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Per-subscriber channel depth; one event in flight keeps ticks ordered and
/// applies backpressure to slow readers.
const SUBSCRIBER_BUFFER: usize = 1;
/// Largest catalog document read from disk, in bytes.
pub const MAX_CATALOG_FILE_SIZE: u64 = 1024 * 1024;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Server-push notification carrying the catalog or a read failure.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CatalogEvent {
    /// JSON-RPC protocol version.
    pub jsonrpc: &'static str,
    /// Always `tools/list`.
    pub method: &'static str,
    /// Parsed catalog array, or `{"error": message}`.
    pub params: Value,
}

impl CatalogEvent {
    /// Builds an event carrying a parsed catalog.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogReadError::Parse`] if the specs cannot be serialized.
    pub fn catalog(tools: &[ToolSpec]) -> Result<Self, CatalogReadError> {
        let params =
            serde_json::to_value(tools).map_err(|err| CatalogReadError::Parse(err.to_string()))?;
        Ok(Self::with_params(params))
    }

    /// Builds an event reporting a failed tick.
    #[must_use]
    pub fn error(message: &str) -> Self {
        Self::with_params(json!({ "error": message }))
    }

    /// Returns true when this event reports a failure.
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.params.get("error").is_some()
    }

    /// Serializes the event as a single JSON line for the SSE `data` field.
    #[must_use]
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| {
            format!(
                "{{\"jsonrpc\":\"{JSONRPC_VERSION}\",\"method\":\"{TOOLS_LIST}\",\"params\":\
                 {{\"error\":\"event serialization failed\"}}}}"
            )
        })
    }

    /// Wraps params in the fixed envelope.
    const fn with_params(params: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            method: TOOLS_LIST,
            params,
        }
    }
}

/// Catalog read failures; reported on the stream, never fatal.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CatalogReadError {
    /// The document could not be read.
    #[error("catalog read failed: {0}")]
    Io(String),
    /// The document is larger than [`MAX_CATALOG_FILE_SIZE`].
    #[error("catalog file exceeds {limit} bytes")]
    TooLarge {
        /// Size limit in bytes.
        limit: u64,
    },
    /// The document is not a valid tool list.
    #[error("catalog parse failed: {0}")]
    Parse(String),
}

// ============================================================================
// SECTION: Publisher
// ============================================================================

/// Re-reads the catalog document on a fixed interval for each subscriber.
#[derive(Clone)]
pub struct CatalogPublisher {
    /// Catalog document path.
    path: PathBuf,
    /// Tick interval.
    interval: Duration,
    /// Audit sink for stream lifecycle and read failures.
    audit: Arc<dyn GatewayAuditSink>,
}

impl CatalogPublisher {
    /// Creates a publisher for the document at `path`.
    #[must_use]
    pub fn new(path: PathBuf, interval: Duration, audit: Arc<dyn GatewayAuditSink>) -> Self {
        Self {
            path,
            interval,
            audit,
        }
    }

    /// Returns the catalog document path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Produces the event for one tick.
    pub async fn next_event(&self) -> CatalogEvent {
        match read_catalog(&self.path).await.and_then(|tools| CatalogEvent::catalog(&tools)) {
            Ok(event) => event,
            Err(err) => {
                let message = err.to_string();
                self.audit.record_catalog(&CatalogAuditEvent::new(
                    CatalogEventKind::CatalogReadFailed,
                    &self.path,
                    Some(message.clone()),
                ));
                CatalogEvent::error(&message)
            }
        }
    }

    /// Starts a publishing task bound to the returned receiver.
    ///
    /// Must be called from within a Tokio runtime.
    #[must_use]
    pub fn subscribe(&self) -> mpsc::Receiver<CatalogEvent> {
        let (tx, rx) = mpsc::channel(SUBSCRIBER_BUFFER);
        self.audit.record_catalog(&CatalogAuditEvent::new(
            CatalogEventKind::StreamOpened,
            &self.path,
            None,
        ));
        tokio::spawn(self.clone().run(tx));
        rx
    }

    /// Tick loop; ends when the subscriber goes away.
    async fn run(self, tx: mpsc::Sender<CatalogEvent>) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                () = tx.closed() => break,
                _ = ticker.tick() => {}
            }
            let event = self.next_event().await;
            if tx.send(event).await.is_err() {
                break;
            }
        }
        self.audit.record_catalog(&CatalogAuditEvent::new(
            CatalogEventKind::StreamClosed,
            &self.path,
            None,
        ));
    }
}

// ============================================================================
// SECTION: Document IO
// ============================================================================

/// Accepted catalog document shapes.
#[derive(Deserialize)]
#[serde(untagged)]
enum CatalogDocument {
    /// Bare descriptor array, as written by `catalog export`.
    List(Vec<ToolSpec>),
    /// Descriptor array under a `tools` key.
    Wrapped(WrappedCatalog),
}

/// `{"tools": [...]}` form of the catalog document.
#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct WrappedCatalog {
    /// Tool descriptors.
    tools: Vec<ToolSpec>,
}

/// Reads and parses the catalog document.
///
/// The document is either a descriptor array or an object whose only key is
/// `tools`. Files over [`MAX_CATALOG_FILE_SIZE`] are rejected before parsing.
///
/// # Errors
///
/// Returns [`CatalogReadError`] when the file is unreadable, too large, or
/// malformed.
pub async fn read_catalog(path: &Path) -> Result<Vec<ToolSpec>, CatalogReadError> {
    let io_error = |err: std::io::Error| CatalogReadError::Io(format!("{}: {err}", path.display()));
    let too_large = CatalogReadError::TooLarge {
        limit: MAX_CATALOG_FILE_SIZE,
    };
    let metadata = tokio::fs::metadata(path).await.map_err(io_error)?;
    if metadata.len() > MAX_CATALOG_FILE_SIZE {
        return Err(too_large);
    }
    let bytes = tokio::fs::read(path).await.map_err(io_error)?;
    // The file may grow between the metadata check and the read.
    if u64::try_from(bytes.len()).unwrap_or(u64::MAX) > MAX_CATALOG_FILE_SIZE {
        return Err(too_large);
    }
    let document: CatalogDocument =
        serde_json::from_slice(&bytes).map_err(|err| CatalogReadError::Parse(err.to_string()))?;
    Ok(match document {
        CatalogDocument::List(tools)
        | CatalogDocument::Wrapped(WrappedCatalog {
            tools,
        }) => tools,
    })
}

/// Serializes specs as a pretty-printed catalog document.
///
/// # Errors
///
/// Returns [`CatalogReadError::Parse`] if serialization fails.
pub fn render_catalog(tools: &[ToolSpec]) -> Result<String, CatalogReadError> {
    serde_json::to_string_pretty(tools).map_err(|err| CatalogReadError::Parse(err.to_string()))
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(
        clippy::panic,
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::use_debug,
        clippy::missing_docs_in_private_items,
        reason = "Test-only assertions and fixtures."
    )]

    use std::path::Path;
    use std::sync::Arc;
    use std::sync::Mutex;
    use std::time::Duration;

    use serde_json::Value;
    use tokio::sync::mpsc;

    use super::CatalogEvent;
    use super::CatalogPublisher;
    use super::CatalogReadError;
    use super::MAX_CATALOG_FILE_SIZE;
    use super::read_catalog;
    use super::render_catalog;
    use crate::audit::CatalogAuditEvent;
    use crate::audit::CatalogEventKind;
    use crate::audit::GatewayAuditSink;
    use crate::audit::GatewayNoopAuditSink;
    use crate::audit::RequestAuditEvent;
    use crate::tools::ToolSpec;
    use crate::tools::argocd::default_tool_specs;

    #[derive(Default)]
    struct RecordingSink {
        catalog: Mutex<Vec<CatalogEventKind>>,
    }

    impl GatewayAuditSink for RecordingSink {
        fn record_request(&self, _event: &RequestAuditEvent) {}

        fn record_catalog(&self, event: &CatalogAuditEvent) {
            self.catalog.lock().unwrap().push(event.kind);
        }
    }

    fn write_catalog(path: &Path) {
        std::fs::write(path, render_catalog(&default_tool_specs()).unwrap()).unwrap();
    }

    fn publisher(path: &Path, audit: Arc<dyn GatewayAuditSink>) -> CatalogPublisher {
        CatalogPublisher::new(path.to_path_buf(), Duration::from_millis(20), audit)
    }

    async fn recv_until(
        rx: &mut mpsc::Receiver<CatalogEvent>,
        want_error: bool,
    ) -> CatalogEvent {
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                let event = rx.recv().await.unwrap();
                if event.is_error() == want_error {
                    return event;
                }
            }
        })
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn event_params_round_trip_to_source_specs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tools.json");
        write_catalog(&path);

        let event = publisher(&path, Arc::new(GatewayNoopAuditSink)).next_event().await;
        assert_eq!(event.jsonrpc, "2.0");
        assert_eq!(event.method, "tools/list");
        let specs: Vec<ToolSpec> = serde_json::from_value(event.params).unwrap();
        assert_eq!(specs, default_tool_specs());
    }

    #[tokio::test]
    async fn missing_file_reports_error_params() {
        let dir = tempfile::tempdir().unwrap();
        let event = publisher(&dir.path().join("absent.json"), Arc::new(GatewayNoopAuditSink))
            .next_event()
            .await;
        let message = event.params["error"].as_str().unwrap();
        assert!(!message.is_empty());
    }

    #[tokio::test]
    async fn malformed_document_reports_error_params() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tools.json");
        std::fs::write(&path, r#"[{"name":"x","parameters":[{"name":"a","type":"uuid","required":true}]}]"#)
            .unwrap();
        let event = publisher(&path, Arc::new(GatewayNoopAuditSink)).next_event().await;
        assert!(event.is_error());

        std::fs::write(&path, r#"{"tools":[],"version":2}"#).unwrap();
        let event = publisher(&path, Arc::new(GatewayNoopAuditSink)).next_event().await;
        assert!(event.is_error());
    }

    #[tokio::test]
    async fn wrapped_document_parses_like_bare_array() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tools.json");
        let tools: Value = serde_json::to_value(default_tool_specs()).unwrap();
        std::fs::write(&path, serde_json::json!({ "tools": tools }).to_string()).unwrap();

        assert_eq!(read_catalog(&path).await.unwrap(), default_tool_specs());
        let event = publisher(&path, Arc::new(GatewayNoopAuditSink)).next_event().await;
        assert_eq!(event.params, tools);

        std::fs::write(&path, r#"{"tools":[]}"#).unwrap();
        assert!(read_catalog(&path).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn oversized_document_reports_error_params() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tools.json");
        let padding = " ".repeat(usize::try_from(MAX_CATALOG_FILE_SIZE).unwrap());
        std::fs::write(&path, format!("[{padding}]")).unwrap();

        assert_eq!(
            read_catalog(&path).await.unwrap_err(),
            CatalogReadError::TooLarge {
                limit: MAX_CATALOG_FILE_SIZE,
            }
        );
        let event = publisher(&path, Arc::new(GatewayNoopAuditSink)).next_event().await;
        assert!(event.params["error"].as_str().unwrap().contains("exceeds"));
    }

    #[tokio::test]
    async fn stream_survives_deleted_and_restored_source() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tools.json");
        write_catalog(&path);
        let mut rx = publisher(&path, Arc::new(GatewayNoopAuditSink)).subscribe();

        let first = recv_until(&mut rx, false).await;
        assert!(first.params.is_array());

        std::fs::remove_file(&path).unwrap();
        let failed = recv_until(&mut rx, true).await;
        assert!(!failed.params["error"].as_str().unwrap().is_empty());

        write_catalog(&path);
        let restored = recv_until(&mut rx, false).await;
        assert_eq!(restored.params, first.params);
    }

    #[tokio::test]
    async fn dropping_receiver_stops_task() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tools.json");
        write_catalog(&path);
        let sink = Arc::new(RecordingSink::default());
        let mut rx = publisher(&path, Arc::clone(&sink) as Arc<dyn GatewayAuditSink>).subscribe();
        let _ = rx.recv().await.unwrap();
        drop(rx);

        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                if sink.catalog.lock().unwrap().contains(&CatalogEventKind::StreamClosed) {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();
        let kinds = sink.catalog.lock().unwrap().clone();
        assert_eq!(kinds.first(), Some(&CatalogEventKind::StreamOpened));
    }

    #[test]
    fn event_json_has_fixed_envelope() {
        let json: Value = serde_json::from_str(&CatalogEvent::error("boom").to_json()).unwrap();
        assert_eq!(json, serde_json::json!({
            "jsonrpc": "2.0",
            "method": "tools/list",
            "params": { "error": "boom" },
        }));
    }
}
