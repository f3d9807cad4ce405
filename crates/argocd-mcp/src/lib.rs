// crates/argocd-mcp/src/lib.rs
// ============================================================================
// Module: Argo CD MCP Gateway Library
// Description: JSON-RPC tool gateway with an Argo CD control-plane proxy.
// Purpose: Expose tool dispatch and catalog streaming over HTTP.
// Dependencies: argocd-mcp-config, axum, reqwest, serde, tokio
// ============================================================================

//! ## Overview
//! The gateway answers JSON-RPC 2.0 requests on `POST /jsonrpc` by routing
//! them to named tools, and republishes the tool catalog on `GET /sse`.
//! Three tools proxy reads to the Argo CD REST API; five administrative tools
//! are pending and return fixed acknowledgements.
//!
//! Components, leaf first: [`control_plane`], [`tools`], [`jsonrpc`],
//! [`catalog`], and [`server`]. [`audit`] is shared by all of them.
//!
//! Security posture: request bodies and catalog documents are untrusted; the
//! control-plane token is configuration-only and never logged.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod audit;
pub mod catalog;
pub mod control_plane;
pub mod jsonrpc;
pub mod server;
pub mod tools;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use audit::GatewayAuditSink;
pub use audit::GatewayFileAuditSink;
pub use audit::GatewayNoopAuditSink;
pub use audit::GatewayStderrAuditSink;
pub use catalog::CatalogEvent;
pub use catalog::CatalogPublisher;
pub use catalog::CatalogReadError;
pub use control_plane::ControlPlaneApi;
pub use control_plane::ControlPlaneClient;
pub use control_plane::ControlPlaneError;
pub use control_plane::RemoteApiError;
pub use jsonrpc::JsonRpcDispatcher;
pub use jsonrpc::JsonRpcErrorKind;
pub use jsonrpc::JsonRpcResponse;
pub use server::GatewayError;
pub use server::McpGateway;
pub use tools::ToolDescriptor;
pub use tools::ToolError;
pub use tools::ToolRegistry;
pub use tools::ToolSpec;
