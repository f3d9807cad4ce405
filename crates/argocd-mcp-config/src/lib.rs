// crates/argocd-mcp-config/src/lib.rs
// ============================================================================
// Module: Argo CD MCP Config Library
// Description: Canonical config model, loading, and validation.
// Purpose: Single source of truth for argocd-mcp.toml semantics.
// Dependencies: serde, toml, thiserror
// ============================================================================

//! ## Overview
//! `argocd-mcp-config` defines the canonical configuration model for the
//! Argo CD MCP gateway. Configuration is read once at startup, validated
//! fail-closed, and then passed explicitly to every component that needs it.
//!
//! Security posture: config inputs are untrusted and the control-plane token is
//! a secret; it never appears in `Debug` output.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod config;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use config::*;
