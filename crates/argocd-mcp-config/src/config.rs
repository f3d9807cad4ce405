// crates/argocd-mcp-config/src/config.rs
// ============================================================================
// Module: Gateway Configuration
// Description: Configuration loading and validation for the MCP gateway.
// Purpose: Provide strict, fail-closed config parsing with hard limits.
// Dependencies: serde, toml, thiserror
// ============================================================================

//! ## Overview
//! Configuration is loaded from a TOML file with strict size and range limits,
//! then overlaid with the `ARGOCD_BASE_URL` / `ARGOCD_API_TOKEN` environment
//! variables so the bearer token can stay out of the file. Missing required
//! values fail closed: the gateway refuses to start without a control-plane
//! base URL and token.
//!
//! TLS verification toward the control plane defaults to enabled. Turning it
//! off is an explicit trust decision recorded in the config file.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::env;
use std::fmt;
use std::fs;
use std::net::SocketAddr;
use std::path::Path;
use std::path::PathBuf;

use serde::Deserialize;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default configuration filename when no path is specified.
const DEFAULT_CONFIG_NAME: &str = "argocd-mcp.toml";
/// Environment variable used to override the config path.
pub const CONFIG_ENV_VAR: &str = "ARGOCD_MCP_CONFIG";
/// Environment variable overriding the control-plane base URL.
pub const BASE_URL_ENV_VAR: &str = "ARGOCD_BASE_URL";
/// Environment variable overriding the control-plane bearer token.
pub const TOKEN_ENV_VAR: &str = "ARGOCD_API_TOKEN";
/// Maximum configuration file size in bytes.
pub(crate) const MAX_CONFIG_FILE_SIZE: usize = 1024 * 1024;
/// Maximum total path length.
pub(crate) const MAX_TOTAL_PATH_LENGTH: usize = 4096;
/// Maximum length of a control-plane bearer token.
pub(crate) const MAX_TOKEN_LENGTH: usize = 4096;
/// Maximum length of the control-plane base URL.
pub(crate) const MAX_BASE_URL_LENGTH: usize = 2048;
/// Default bind address for the HTTP front.
pub(crate) const DEFAULT_BIND: &str = "127.0.0.1:8000";
/// Default maximum inbound request body size in bytes.
pub(crate) const DEFAULT_MAX_BODY_BYTES: usize = 1024 * 1024;
/// Default control-plane connect timeout in milliseconds.
pub(crate) const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 2_000;
/// Minimum control-plane connect timeout in milliseconds.
pub(crate) const MIN_CONNECT_TIMEOUT_MS: u64 = 100;
/// Maximum control-plane connect timeout in milliseconds.
pub(crate) const MAX_CONNECT_TIMEOUT_MS: u64 = 10_000;
/// Default control-plane request timeout in milliseconds.
pub(crate) const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 10_000;
/// Minimum control-plane request timeout in milliseconds.
pub(crate) const MIN_REQUEST_TIMEOUT_MS: u64 = 500;
/// Maximum control-plane request timeout in milliseconds.
pub(crate) const MAX_REQUEST_TIMEOUT_MS: u64 = 60_000;
/// Default cap on a control-plane response body.
pub(crate) const DEFAULT_MAX_RESPONSE_BYTES: u64 = 4 * 1024 * 1024;
/// Minimum control-plane response body cap.
pub(crate) const MIN_MAX_RESPONSE_BYTES: u64 = 1024;
/// Maximum control-plane response body cap.
pub(crate) const MAX_MAX_RESPONSE_BYTES: u64 = 64 * 1024 * 1024;
/// Default catalog document path.
pub(crate) const DEFAULT_CATALOG_PATH: &str = "tools.json";
/// Default catalog publish interval in milliseconds.
pub(crate) const DEFAULT_CATALOG_INTERVAL_MS: u64 = 1_000;
/// Minimum catalog publish interval in milliseconds.
pub(crate) const MIN_CATALOG_INTERVAL_MS: u64 = 50;
/// Maximum catalog publish interval in milliseconds.
pub(crate) const MAX_CATALOG_INTERVAL_MS: u64 = 60_000;

// ============================================================================
// SECTION: Configuration Types
// ============================================================================

/// Argo CD MCP gateway configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GatewayConfig {
    /// Inbound HTTP server configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Outbound control-plane client configuration.
    #[serde(default)]
    pub control_plane: ControlPlaneConfig,
    /// Catalog publisher configuration.
    #[serde(default)]
    pub catalog: CatalogConfig,
    /// Audit logging configuration.
    #[serde(default)]
    pub audit: AuditConfig,
}

impl GatewayConfig {
    /// Loads configuration using the process environment for path resolution
    /// and control-plane overrides.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when loading or validation fails.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        Self::load_with_overrides(path, &EnvOverrides::from_process())
    }

    /// Loads configuration with explicitly supplied environment overrides.
    ///
    /// A missing config file is only acceptable when no path was requested
    /// explicitly and the overrides supply the required control-plane values.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when loading or validation fails.
    pub fn load_with_overrides(
        path: Option<&Path>,
        overrides: &EnvOverrides,
    ) -> Result<Self, ConfigError> {
        let explicit = path.is_some() || overrides.config_path.is_some();
        let resolved = resolve_path(path, overrides)?;
        let mut config = match read_config_text(&resolved) {
            Ok(content) => Self::from_toml(&content)?,
            Err(ConfigError::Io(_)) if !explicit && !resolved.exists() => Self::default(),
            Err(err) => return Err(err),
        };
        config.apply_overrides(overrides);
        config.validate()?;
        Ok(config)
    }

    /// Parses configuration from TOML text without validating it.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] when the TOML is malformed.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|err| ConfigError::Parse(err.to_string()))
    }

    /// Applies environment overrides on top of file values.
    pub fn apply_overrides(&mut self, overrides: &EnvOverrides) {
        if let Some(base_url) = &overrides.base_url {
            self.control_plane.base_url.clone_from(base_url);
        }
        if let Some(token) = &overrides.token {
            self.control_plane.token.clone_from(token);
        }
    }

    /// Validates the configuration for internal consistency.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when configuration is invalid.
    pub fn validate(&mut self) -> Result<(), ConfigError> {
        self.server.validate()?;
        self.control_plane.validate()?;
        self.catalog.validate()?;
        self.audit.validate()?;
        Ok(())
    }
}

/// Environment-derived overrides captured once at startup.
#[derive(Clone, Default)]
pub struct EnvOverrides {
    /// Config path override (`ARGOCD_MCP_CONFIG`).
    pub config_path: Option<PathBuf>,
    /// Control-plane base URL override (`ARGOCD_BASE_URL`).
    pub base_url: Option<String>,
    /// Control-plane bearer token override (`ARGOCD_API_TOKEN`).
    pub token: Option<String>,
}

impl EnvOverrides {
    /// Captures overrides from the current process environment.
    #[must_use]
    pub fn from_process() -> Self {
        Self {
            config_path: non_empty_env(CONFIG_ENV_VAR).map(PathBuf::from),
            base_url: non_empty_env(BASE_URL_ENV_VAR),
            token: non_empty_env(TOKEN_ENV_VAR),
        }
    }
}

impl fmt::Debug for EnvOverrides {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EnvOverrides")
            .field("config_path", &self.config_path)
            .field("base_url", &self.base_url)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Inbound HTTP server configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// Bind address for the JSON-RPC and SSE endpoints.
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Maximum request body size in bytes.
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

impl ServerConfig {
    /// Returns the parsed bind address.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when the bind address is malformed.
    pub fn bind_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.bind.parse().map_err(|_| {
            ConfigError::Invalid(format!("server.bind is not a socket address: {}", self.bind))
        })
    }

    /// Validates server configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.max_body_bytes == 0 {
            return Err(ConfigError::Invalid(
                "server.max_body_bytes must be greater than zero".to_string(),
            ));
        }
        self.bind_addr()?;
        Ok(())
    }
}

/// Outbound control-plane client configuration.
#[derive(Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ControlPlaneConfig {
    /// Control-plane base URL (trailing slash is trimmed on validation).
    #[serde(default)]
    pub base_url: String,
    /// Bearer token sent on every control-plane request.
    #[serde(default)]
    pub token: String,
    /// Whether to verify the control plane's TLS certificate.
    #[serde(default = "default_verify_tls")]
    pub verify_tls: bool,
    /// Connect timeout in milliseconds.
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    /// Total request timeout in milliseconds.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    /// Largest response body accepted from the control plane, in bytes.
    #[serde(default = "default_max_response_bytes")]
    pub max_response_bytes: u64,
}

impl Default for ControlPlaneConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            token: String::new(),
            verify_tls: default_verify_tls(),
            connect_timeout_ms: default_connect_timeout_ms(),
            request_timeout_ms: default_request_timeout_ms(),
            max_response_bytes: default_max_response_bytes(),
        }
    }
}

impl fmt::Debug for ControlPlaneConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ControlPlaneConfig")
            .field("base_url", &self.base_url)
            .field("token", &"<redacted>")
            .field("verify_tls", &self.verify_tls)
            .field("connect_timeout_ms", &self.connect_timeout_ms)
            .field("request_timeout_ms", &self.request_timeout_ms)
            .field("max_response_bytes", &self.max_response_bytes)
            .finish()
    }
}

impl ControlPlaneConfig {
    /// Validates and normalizes control-plane configuration.
    fn validate(&mut self) -> Result<(), ConfigError> {
        let trimmed = self.base_url.trim().trim_end_matches('/').to_string();
        if trimmed.is_empty() {
            return Err(ConfigError::Invalid(format!(
                "control_plane.base_url is required (set it in the config file or {BASE_URL_ENV_VAR})"
            )));
        }
        if trimmed.len() > MAX_BASE_URL_LENGTH {
            return Err(ConfigError::Invalid("control_plane.base_url exceeds max length".to_string()));
        }
        if !(trimmed.starts_with("https://") || trimmed.starts_with("http://")) {
            return Err(ConfigError::Invalid(
                "control_plane.base_url must use http or https".to_string(),
            ));
        }
        self.base_url = trimmed;
        if self.token.trim().is_empty() {
            return Err(ConfigError::Invalid(format!(
                "control_plane.token is required (set it in the config file or {TOKEN_ENV_VAR})"
            )));
        }
        if self.token.len() > MAX_TOKEN_LENGTH {
            return Err(ConfigError::Invalid("control_plane.token exceeds max length".to_string()));
        }
        if self.token.chars().any(char::is_control) {
            return Err(ConfigError::Invalid(
                "control_plane.token must not contain control characters".to_string(),
            ));
        }
        validate_range(
            "control_plane.connect_timeout_ms",
            self.connect_timeout_ms,
            MIN_CONNECT_TIMEOUT_MS,
            MAX_CONNECT_TIMEOUT_MS,
        )?;
        validate_range(
            "control_plane.request_timeout_ms",
            self.request_timeout_ms,
            MIN_REQUEST_TIMEOUT_MS,
            MAX_REQUEST_TIMEOUT_MS,
        )?;
        validate_range(
            "control_plane.max_response_bytes",
            self.max_response_bytes,
            MIN_MAX_RESPONSE_BYTES,
            MAX_MAX_RESPONSE_BYTES,
        )?;
        Ok(())
    }
}

/// Catalog publisher configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CatalogConfig {
    /// Path to the declarative catalog document.
    #[serde(default = "default_catalog_path")]
    pub path: PathBuf,
    /// Publish interval in milliseconds.
    #[serde(default = "default_catalog_interval_ms")]
    pub interval_ms: u64,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            path: default_catalog_path(),
            interval_ms: default_catalog_interval_ms(),
        }
    }
}

impl CatalogConfig {
    /// Validates catalog configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        validate_path("catalog.path", &self.path)?;
        validate_range(
            "catalog.interval_ms",
            self.interval_ms,
            MIN_CATALOG_INTERVAL_MS,
            MAX_CATALOG_INTERVAL_MS,
        )
    }
}

/// Audit logging configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AuditConfig {
    /// Enable audit logging.
    #[serde(default = "default_audit_enabled")]
    pub enabled: bool,
    /// Optional JSON-lines file; stderr when unset.
    #[serde(default)]
    pub path: Option<PathBuf>,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            enabled: default_audit_enabled(),
            path: None,
        }
    }
}

impl AuditConfig {
    /// Validates audit configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if let Some(path) = &self.path {
            validate_path("audit.path", path)?;
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// I/O failure while reading configuration.
    #[error("config io error: {0}")]
    Io(String),
    /// TOML parsing error.
    #[error("config parse error: {0}")]
    Parse(String),
    /// Invalid configuration data.
    #[error("invalid config: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Default bind address.
fn default_bind() -> String {
    DEFAULT_BIND.to_string()
}

/// Default max request body size.
const fn default_max_body_bytes() -> usize {
    DEFAULT_MAX_BODY_BYTES
}

/// TLS verification is on unless explicitly disabled.
const fn default_verify_tls() -> bool {
    true
}

/// Default connect timeout.
const fn default_connect_timeout_ms() -> u64 {
    DEFAULT_CONNECT_TIMEOUT_MS
}

/// Default request timeout.
const fn default_request_timeout_ms() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_MS
}

/// Default control-plane response body cap.
const fn default_max_response_bytes() -> u64 {
    DEFAULT_MAX_RESPONSE_BYTES
}

/// Default catalog document path.
fn default_catalog_path() -> PathBuf {
    PathBuf::from(DEFAULT_CATALOG_PATH)
}

/// Default catalog publish interval.
const fn default_catalog_interval_ms() -> u64 {
    DEFAULT_CATALOG_INTERVAL_MS
}

/// Audit logging is on by default.
const fn default_audit_enabled() -> bool {
    true
}

/// Reads an environment variable, treating empty values as unset.
fn non_empty_env(name: &str) -> Option<String> {
    env::var(name).ok().filter(|value| !value.trim().is_empty())
}

/// Resolves the config path from CLI or environment defaults.
fn resolve_path(path: Option<&Path>, overrides: &EnvOverrides) -> Result<PathBuf, ConfigError> {
    let resolved = match (path, &overrides.config_path) {
        (Some(path), _) => path.to_path_buf(),
        (None, Some(env_path)) => env_path.clone(),
        (None, None) => PathBuf::from(DEFAULT_CONFIG_NAME),
    };
    validate_path("config path", &resolved)?;
    Ok(resolved)
}

/// Reads the config file with size and encoding limits.
fn read_config_text(path: &Path) -> Result<String, ConfigError> {
    let bytes = fs::read(path).map_err(|err| ConfigError::Io(err.to_string()))?;
    if bytes.len() > MAX_CONFIG_FILE_SIZE {
        return Err(ConfigError::Invalid("config file exceeds size limit".to_string()));
    }
    String::from_utf8(bytes)
        .map_err(|_| ConfigError::Invalid("config file must be utf-8".to_string()))
}

/// Validates a path against length constraints.
fn validate_path(field: &str, path: &Path) -> Result<(), ConfigError> {
    let text = path.to_string_lossy();
    if text.trim().is_empty() {
        return Err(ConfigError::Invalid(format!("{field} must be non-empty")));
    }
    if text.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid(format!("{field} exceeds max length")));
    }
    Ok(())
}

/// Validates an inclusive numeric range.
fn validate_range(field: &str, value: u64, min: u64, max: u64) -> Result<(), ConfigError> {
    if (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::Invalid(format!("{field} must be between {min} and {max}")))
    }
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
        reason = "Test-only assertions."
    )]

    use super::*;

    fn valid_config() -> GatewayConfig {
        let mut config = GatewayConfig::default();
        config.control_plane.base_url = "https://argocd.example.com/".to_string();
        config.control_plane.token = "secret-token".to_string();
        config
    }

    #[test]
    fn validate_trims_trailing_slash() {
        let mut config = valid_config();
        config.validate().unwrap();
        assert_eq!(config.control_plane.base_url, "https://argocd.example.com");
    }

    #[test]
    fn validate_rejects_non_http_scheme() {
        let mut config = valid_config();
        config.control_plane.base_url = "ftp://argocd.example.com".to_string();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("http or https"));
    }

    #[test]
    fn validate_rejects_token_with_newline() {
        let mut config = valid_config();
        config.control_plane.token = "abc\ndef".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_range_is_inclusive() {
        assert!(validate_range("f", 50, 50, 100).is_ok());
        assert!(validate_range("f", 100, 50, 100).is_ok());
        assert!(validate_range("f", 49, 50, 100).is_err());
        assert!(validate_range("f", 101, 50, 100).is_err());
    }

    #[test]
    fn debug_output_redacts_token() {
        let config = valid_config();
        let rendered = format!("{:?}", config.control_plane);
        assert!(!rendered.contains("secret-token"));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn overrides_replace_file_values() {
        let mut config = valid_config();
        config.apply_overrides(&EnvOverrides {
            config_path: None,
            base_url: Some("http://localhost:9000".to_string()),
            token: Some("env-token".to_string()),
        });
        assert_eq!(config.control_plane.base_url, "http://localhost:9000");
        assert_eq!(config.control_plane.token, "env-token");
    }
}
