// crates/argocd-mcp/src/jsonrpc.rs
// ============================================================================
// Module: JSON-RPC Dispatcher
// Description: Envelope parsing, tool resolution, and error translation.
// Purpose: Turn any request body into exactly one JSON-RPC 2.0 response.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! [`JsonRpcDispatcher`] walks each request through parse, resolve, bind, and
//! invoke. A failure at any stage short-circuits into an error envelope; the
//! dispatcher never returns anything else and never panics on input.
//!
//! Methods are either a tool name (called directly) or one of the meta
//! methods `tools/list` and `tools/call`. `tools/call` takes
//! `{"name", "arguments"}` and follows the same path as a direct call.
//!
//! Notifications (requests without an `id`) are answered like any other
//! request, with `id: null`. Batch arrays are rejected as invalid requests.

// ============================================================================
// SECTION: Modules
// ============================================================================


// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use serde::Serialize;
use serde_json::Map;
use serde_json::Value;
use serde_json::json;

use crate::control_plane::ControlPlaneError;
use crate::tools::ToolError;
use crate::tools::ToolRegistry;
use crate::tools::ToolSpec;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Protocol version carried by every envelope.
pub const JSONRPC_VERSION: &str = "2.0";
/// Meta method listing registered tools.
pub const TOOLS_LIST: &str = "tools/list";
/// Meta method calling a tool by name.
pub const TOOLS_CALL: &str = "tools/call";

// ============================================================================
// SECTION: Envelope Types
// ============================================================================

/// Validated JSON-RPC request.
#[derive(Debug, Clone, PartialEq)]
pub struct JsonRpcRequest {
    /// Request identifier; `None` for notifications.
    pub id: Option<Value>,
    /// Method name.
    pub method: String,
    /// Object or array params, if any.
    pub params: Option<Value>,
}

/// JSON-RPC response envelope; exactly one of `result` and `error` is set.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JsonRpcResponse {
    /// JSON-RPC protocol version.
    pub jsonrpc: &'static str,
    /// Echoed request identifier, or `null`.
    pub id: Value,
    /// Successful result payload.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// Error payload when the request fails.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

impl JsonRpcResponse {
    /// Builds a success envelope.
    #[must_use]
    pub const fn success(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            id,
            result: Some(result),
            error: None,
        }
    }

    /// Builds an error envelope.
    #[must_use]
    pub const fn failure(id: Value, error: JsonRpcError) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            id,
            result: None,
            error: Some(error),
        }
    }

    /// Returns the error code, if this is an error envelope.
    #[must_use]
    pub fn error_code(&self) -> Option<i64> {
        self.error.as_ref().map(|error| error.code)
    }
}

/// JSON-RPC error payload.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JsonRpcError {
    /// Error code.
    pub code: i64,
    /// Human-readable error message.
    pub message: String,
    /// Structured detail, e.g. upstream status and body.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl JsonRpcError {
    /// Builds an error of the given kind without data.
    #[must_use]
    pub fn new(kind: JsonRpcErrorKind, message: impl Into<String>) -> Self {
        Self {
            code: kind.code(),
            message: message.into(),
            data: None,
        }
    }

    /// Attaches structured data.
    #[must_use]
    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }
}

/// Error taxonomy and its JSON-RPC codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JsonRpcErrorKind {
    /// Body is not valid JSON.
    ParseError,
    /// JSON is not a well-formed request envelope.
    InvalidRequest,
    /// No tool or meta method has this name.
    MethodNotFound,
    /// Arguments do not match the tool schema.
    InvalidParams,
    /// The tool failed, including upstream control-plane failures.
    ApplicationError,
    /// The result could not be serialized.
    InternalError,
}

impl JsonRpcErrorKind {
    /// Returns the wire error code.
    #[must_use]
    pub const fn code(self) -> i64 {
        match self {
            Self::ParseError => -32700,
            Self::InvalidRequest => -32600,
            Self::MethodNotFound => -32601,
            Self::InvalidParams => -32602,
            Self::ApplicationError => -32000,
            Self::InternalError => -32603,
        }
    }
}

// ============================================================================
// SECTION: Dispatcher
// ============================================================================

/// Result of dispatching one request, with routing details for auditing.
#[derive(Debug, Clone)]
pub struct DispatchOutcome {
    /// Response envelope to send.
    pub response: JsonRpcResponse,
    /// Method name when the envelope was readable.
    pub method: Option<String>,
    /// Tool name when a tool was resolved.
    pub tool: Option<String>,
    /// Control-plane HTTP status when an upstream call failed.
    pub upstream_status: Option<u16>,
}

/// Routing details collected while handling a request.
#[derive(Debug, Default)]
struct CallTrace {
    /// Resolved tool name.
    tool: Option<String>,
    /// Upstream HTTP status of a failed control-plane call.
    upstream_status: Option<u16>,
}

/// Stateless JSON-RPC dispatcher over a read-only tool registry.
#[derive(Clone)]
pub struct JsonRpcDispatcher {
    /// Registered tools.
    registry: Arc<ToolRegistry>,
}

impl JsonRpcDispatcher {
    /// Creates a dispatcher over `registry`.
    #[must_use]
    pub const fn new(registry: Arc<ToolRegistry>) -> Self {
        Self {
            registry,
        }
    }

    /// Returns the tool registry.
    #[must_use]
    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Dispatches a raw request body.
    pub async fn dispatch_bytes(&self, bytes: &[u8]) -> DispatchOutcome {
        match serde_json::from_slice::<Value>(bytes) {
            Ok(value) => self.dispatch_value(value).await,
            Err(err) => unparsed(JsonRpcError::new(
                JsonRpcErrorKind::ParseError,
                format!("parse error: {err}"),
            )),
        }
    }

    /// Dispatches an already-decoded JSON value.
    pub async fn dispatch_value(&self, value: Value) -> DispatchOutcome {
        match parse_envelope(value) {
            Ok(request) => self.dispatch(request).await,
            Err((id, error)) => DispatchOutcome {
                response: JsonRpcResponse::failure(id, error),
                method: None,
                tool: None,
                upstream_status: None,
            },
        }
    }

    /// Dispatches a validated request.
    pub async fn dispatch(&self, request: JsonRpcRequest) -> DispatchOutcome {
        let JsonRpcRequest {
            id,
            method,
            params,
        } = request;
        let id = id.unwrap_or(Value::Null);
        let mut trace = CallTrace::default();
        let response = match self.route(&method, params.as_ref(), &mut trace).await {
            Ok(result) => JsonRpcResponse::success(id, result),
            Err(error) => JsonRpcResponse::failure(id, error),
        };
        DispatchOutcome {
            response,
            method: Some(method),
            tool: trace.tool,
            upstream_status: trace.upstream_status,
        }
    }

    /// Routes a method to a meta handler or a tool.
    async fn route(
        &self,
        method: &str,
        params: Option<&Value>,
        trace: &mut CallTrace,
    ) -> Result<Value, JsonRpcError> {
        match method {
            TOOLS_LIST => self.list_tools(),
            TOOLS_CALL => {
                let (name, arguments) = tool_call_params(params)?;
                self.call_tool(name, arguments, trace).await
            }
            _ => self.call_tool(method, params, trace).await,
        }
    }

    /// Returns `{"tools": [...]}` in registration order.
    fn list_tools(&self) -> Result<Value, JsonRpcError> {
        /// `tools/list` result payload.
        #[derive(Serialize)]
        struct ToolList {
            /// Registered tool specs.
            tools: Vec<ToolSpec>,
        }

        serde_json::to_value(ToolList {
            tools: self.registry.specs(),
        })
        .map_err(|err| {
            JsonRpcError::new(
                JsonRpcErrorKind::InternalError,
                format!("result serialization failed: {err}"),
            )
        })
    }

    /// Resolves, binds, and invokes a tool.
    async fn call_tool(
        &self,
        name: &str,
        params: Option<&Value>,
        trace: &mut CallTrace,
    ) -> Result<Value, JsonRpcError> {
        let tool = self.registry.resolve(name).ok_or_else(|| {
            JsonRpcError::new(JsonRpcErrorKind::MethodNotFound, format!("method not found: {name}"))
                .with_data(json!({ "method": name }))
        })?;
        trace.tool = Some(tool.name().to_string());
        let args = tool.bind(params).map_err(|err| tool_error(err, trace))?;
        tool.invoke(&args).await.map_err(|err| tool_error(err, trace))
    }
}

// ============================================================================
// SECTION: Parsing
// ============================================================================

/// Validates the envelope shape; on failure returns the id to echo and the
/// error.
fn parse_envelope(value: Value) -> Result<JsonRpcRequest, (Value, JsonRpcError)> {
    let mut object = match value {
        Value::Object(object) => object,
        Value::Array(_) => {
            return Err(invalid_request(Value::Null, "batch requests are not supported"));
        }
        _ => return Err(invalid_request(Value::Null, "request must be a JSON object")),
    };
    let id = match object.remove("id") {
        None => None,
        Some(id @ (Value::String(_) | Value::Number(_) | Value::Null)) => Some(id),
        Some(_) => {
            return Err(invalid_request(Value::Null, "id must be a string, number, or null"));
        }
    };
    let echo_id = id.clone().unwrap_or(Value::Null);
    if object.get("jsonrpc").and_then(Value::as_str) != Some(JSONRPC_VERSION) {
        return Err(invalid_request(echo_id, "jsonrpc must be \"2.0\""));
    }
    let method = match object.remove("method") {
        Some(Value::String(method)) if !method.is_empty() => method,
        _ => return Err(invalid_request(echo_id, "method must be a non-empty string")),
    };
    let params = match object.remove("params") {
        None | Some(Value::Null) => None,
        Some(params @ (Value::Object(_) | Value::Array(_))) => Some(params),
        Some(_) => return Err(invalid_request(echo_id, "params must be an object or array")),
    };
    Ok(JsonRpcRequest {
        id,
        method,
        params,
    })
}

/// Extracts `name` and `arguments` from `tools/call` params.
fn tool_call_params(params: Option<&Value>) -> Result<(&str, Option<&Value>), JsonRpcError> {
    let object: Option<&Map<String, Value>> = params.and_then(Value::as_object);
    let name = object.and_then(|object| object.get("name")).and_then(Value::as_str).ok_or_else(
        || {
            JsonRpcError::new(
                JsonRpcErrorKind::InvalidParams,
                "tools/call requires a string name",
            )
        },
    )?;
    Ok((name, object.and_then(|object| object.get("arguments"))))
}

// ============================================================================
// SECTION: Error Translation
// ============================================================================

/// Builds an invalid-request failure.
fn invalid_request(id: Value, message: &str) -> (Value, JsonRpcError) {
    (id, JsonRpcError::new(JsonRpcErrorKind::InvalidRequest, message))
}

/// Outcome for a body that never became a request.
fn unparsed(error: JsonRpcError) -> DispatchOutcome {
    DispatchOutcome {
        response: JsonRpcResponse::failure(Value::Null, error),
        method: None,
        tool: None,
        upstream_status: None,
    }
}

/// Maps a tool failure to its JSON-RPC error.
fn tool_error(error: ToolError, trace: &mut CallTrace) -> JsonRpcError {
    match error {
        ToolError::InvalidParams(message) => {
            JsonRpcError::new(JsonRpcErrorKind::InvalidParams, message)
        }
        ToolError::ControlPlane(err) => {
            trace.upstream_status = err.upstream_status();
            JsonRpcError::new(JsonRpcErrorKind::ApplicationError, err.to_string())
                .with_data(control_plane_data(&err))
        }
    }
}

/// Structured `data` for control-plane failures.
fn control_plane_data(error: &ControlPlaneError) -> Value {
    match error {
        ControlPlaneError::Remote(remote) => json!({
            "status": remote.status,
            "body": serde_json::from_str::<Value>(&remote.body)
                .unwrap_or_else(|_| Value::String(remote.body.clone())),
            "endpoint": remote.endpoint,
        }),
        ControlPlaneError::Transport {
            endpoint,
            message,
        } => json!({
            "endpoint": endpoint,
            "reason": "transport",
            "detail": message,
        }),
        ControlPlaneError::ResponseTooLarge {
            endpoint,
            limit,
        } => json!({
            "endpoint": endpoint,
            "reason": "response_too_large",
            "limit": limit,
        }),
        ControlPlaneError::Decode {
            endpoint,
            message,
        } => json!({
            "endpoint": endpoint,
            "reason": "decode",
            "detail": message,
        }),
        ControlPlaneError::Build(message) => json!({
            "reason": "client",
            "detail": message,
        }),
    }
}
