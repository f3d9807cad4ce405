// crates/argocd-mcp/src/control_plane.rs
// ============================================================================
// Module: Control Plane Client
// Description: Authenticated HTTP client for the Argo CD REST API.
// Purpose: Issue single-attempt reads and translate non-2xx responses.
// Dependencies: argocd-mcp-config, async-trait, reqwest, serde_json
// ============================================================================

//! ## Overview
//! [`ControlPlaneClient`] wraps the three Argo CD reads the gateway proxies:
//! application listing, application detail, and the application resource
//! tree. Every call is one GET with the configured bearer token; there is no
//! retry or backoff here, so callers see the first failure.
//!
//! Any status outside `200..=299` becomes [`RemoteApiError`] carrying the
//! status, the (size-capped) response body, and the endpoint path.
//!
//! Security posture: the bearer token is marked sensitive on the request
//! headers. Certificate verification follows `control_plane.verify_tls`.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::time::Duration;

use argocd_mcp_config::ControlPlaneConfig;
use async_trait::async_trait;
use reqwest::Client;
use reqwest::Response;
use reqwest::Url;
use reqwest::header::AUTHORIZATION;
use reqwest::header::CONTENT_TYPE;
use reqwest::header::HeaderMap;
use reqwest::header::HeaderValue;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Maximum number of upstream error body bytes retained in [`RemoteApiError`].
pub const MAX_ERROR_BODY_BYTES: usize = 64 * 1024;
/// Path segments of the applications collection.
const APPLICATIONS_PATH: [&str; 3] = ["api", "v1", "applications"];

// ============================================================================
// SECTION: Payloads
// ============================================================================

/// Application list payload (`v1alpha1.ApplicationList`), passed through as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ApplicationList(pub Value);

/// Application detail payload (`v1alpha1.Application`), passed through as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ApplicationDetail(pub Value);

/// Application resource tree payload (`v1alpha1.ApplicationTree`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceTree(pub Value);

// ============================================================================
// SECTION: Control Plane Interface
// ============================================================================

/// Read operations against the continuous-delivery control plane.
#[async_trait]
pub trait ControlPlaneApi: Send + Sync {
    /// Lists applications, optionally filtered by a search string.
    ///
    /// # Errors
    ///
    /// Returns [`ControlPlaneError`] when the request fails.
    async fn list_applications(
        &self,
        search: Option<&str>,
    ) -> Result<ApplicationList, ControlPlaneError>;

    /// Fetches a single application by name.
    ///
    /// # Errors
    ///
    /// Returns [`ControlPlaneError`] when the request fails.
    async fn get_application(&self, name: &str) -> Result<ApplicationDetail, ControlPlaneError>;

    /// Fetches the resource tree of an application.
    ///
    /// # Errors
    ///
    /// Returns [`ControlPlaneError`] when the request fails.
    async fn get_application_resource_tree(
        &self,
        name: &str,
    ) -> Result<ResourceTree, ControlPlaneError>;
}

// ============================================================================
// SECTION: HTTP Client
// ============================================================================

/// reqwest-backed Argo CD API client.
///
/// # Invariants
/// - Holds only static configuration; calls share no mutable state.
pub struct ControlPlaneClient {
    /// Control-plane base URL.
    base_url: Url,
    /// HTTP client with auth headers, timeouts, and TLS policy applied.
    client: Client,
    /// Largest accepted success body.
    max_response_bytes: usize,
}

impl ControlPlaneClient {
    /// Builds a client from validated configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ControlPlaneError::Build`] when the URL, token, or HTTP
    /// client cannot be constructed.
    pub fn new(config: &ControlPlaneConfig) -> Result<Self, ControlPlaneError> {
        let base_url = Url::parse(config.base_url.trim_end_matches('/'))
            .map_err(|err| ControlPlaneError::Build(format!("invalid base url: {err}")))?;
        if base_url.cannot_be_a_base() {
            return Err(ControlPlaneError::Build("base url cannot carry a path".to_string()));
        }
        let max_response_bytes = usize::try_from(config.max_response_bytes)
            .map_err(|_| ControlPlaneError::Build("response size limit exceeds usize".to_string()))?;
        let client = Client::builder()
            .default_headers(default_headers(&config.token)?)
            .connect_timeout(Duration::from_millis(config.connect_timeout_ms))
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .danger_accept_invalid_certs(!config.verify_tls)
            .build()
            .map_err(|err| ControlPlaneError::Build(err.to_string()))?;
        Ok(Self {
            base_url,
            client,
            max_response_bytes,
        })
    }

    /// Returns the configured base URL.
    #[must_use]
    pub const fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Builds an endpoint URL below `/api/v1/applications`.
    fn applications_url(&self, segments: &[&str]) -> Result<Url, ControlPlaneError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| ControlPlaneError::Build("base url cannot carry a path".to_string()))?
            .pop_if_empty()
            .extend(APPLICATIONS_PATH)
            .extend(segments);
        Ok(url)
    }

    /// Issues one GET and decodes a JSON body from a 2xx response.
    ///
    /// Success bodies above `max_response_bytes` are rejected; error bodies
    /// are read only up to [`MAX_ERROR_BODY_BYTES`].
    async fn get_json(&self, url: Url) -> Result<Value, ControlPlaneError> {
        let endpoint = url.path().to_string();
        let transport = |err: reqwest::Error| ControlPlaneError::Transport {
            endpoint: endpoint.clone(),
            message: err.to_string(),
        };
        let mut response = self.client.get(url).send().await.map_err(transport)?;
        let status = response.status();
        if !status.is_success() {
            let body = read_limited(&mut response, MAX_ERROR_BODY_BYTES).await.map_err(transport)?;
            return Err(ControlPlaneError::Remote(RemoteApiError {
                status: status.as_u16(),
                body: String::from_utf8_lossy(&body.bytes).into_owned(),
                endpoint: endpoint.clone(),
            }));
        }
        let too_large = || ControlPlaneError::ResponseTooLarge {
            endpoint: endpoint.clone(),
            limit: self.max_response_bytes,
        };
        let limit = u64::try_from(self.max_response_bytes).unwrap_or(u64::MAX);
        if let Some(expected) = response.content_length()
            && expected > limit
        {
            return Err(too_large());
        }
        let body = read_limited(&mut response, self.max_response_bytes).await.map_err(transport)?;
        if body.truncated {
            return Err(too_large());
        }
        serde_json::from_slice(&body.bytes).map_err(|err| ControlPlaneError::Decode {
            endpoint: endpoint.clone(),
            message: err.to_string(),
        })
    }
}

#[async_trait]
impl ControlPlaneApi for ControlPlaneClient {
    async fn list_applications(
        &self,
        search: Option<&str>,
    ) -> Result<ApplicationList, ControlPlaneError> {
        let mut url = self.applications_url(&[])?;
        if let Some(search) = search.filter(|value| !value.is_empty()) {
            url.query_pairs_mut().append_pair("search", search);
        }
        self.get_json(url).await.map(ApplicationList)
    }

    async fn get_application(&self, name: &str) -> Result<ApplicationDetail, ControlPlaneError> {
        let url = self.applications_url(&[name])?;
        self.get_json(url).await.map(ApplicationDetail)
    }

    async fn get_application_resource_tree(
        &self,
        name: &str,
    ) -> Result<ResourceTree, ControlPlaneError> {
        let url = self.applications_url(&[name, "resource-tree"])?;
        self.get_json(url).await.map(ResourceTree)
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Non-2xx response from the control plane.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("control plane returned HTTP {status} for {endpoint}")]
pub struct RemoteApiError {
    /// HTTP status code.
    pub status: u16,
    /// Response body (lossy UTF-8, capped at [`MAX_ERROR_BODY_BYTES`]).
    pub body: String,
    /// Endpoint path that was requested.
    pub endpoint: String,
}

/// Control-plane client failures.
#[derive(Debug, Error)]
pub enum ControlPlaneError {
    /// Client construction failed.
    #[error("control plane client error: {0}")]
    Build(String),
    /// The request never produced a response.
    #[error("control plane unreachable at {endpoint}: {message}")]
    Transport {
        /// Endpoint path that was requested.
        endpoint: String,
        /// Transport failure description.
        message: String,
    },
    /// The control plane answered with a non-2xx status.
    #[error(transparent)]
    Remote(#[from] RemoteApiError),
    /// A 2xx response body exceeded the configured size limit.
    #[error("control plane response for {endpoint} exceeds {limit} bytes")]
    ResponseTooLarge {
        /// Endpoint path that was requested.
        endpoint: String,
        /// Configured limit in bytes.
        limit: usize,
    },
    /// A 2xx response carried a body that is not JSON.
    #[error("control plane returned invalid json for {endpoint}: {message}")]
    Decode {
        /// Endpoint path that was requested.
        endpoint: String,
        /// Decode failure description.
        message: String,
    },
}

impl ControlPlaneError {
    /// Returns the upstream HTTP status when the control plane answered.
    #[must_use]
    pub const fn upstream_status(&self) -> Option<u16> {
        match self {
            Self::Remote(err) => Some(err.status),
            Self::Build(_)
            | Self::Transport { .. }
            | Self::ResponseTooLarge { .. }
            | Self::Decode { .. } => None,
        }
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Builds the bearer and content-type headers sent on every request.
fn default_headers(token: &str) -> Result<HeaderMap, ControlPlaneError> {
    let mut headers = HeaderMap::new();
    let mut auth = HeaderValue::from_str(&format!("Bearer {token}"))
        .map_err(|_| ControlPlaneError::Build("invalid bearer token".to_string()))?;
    auth.set_sensitive(true);
    headers.insert(AUTHORIZATION, auth);
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    Ok(headers)
}

/// Body bytes read under a cap.
struct LimitedBody {
    /// Bytes kept, at most the cap.
    bytes: Vec<u8>,
    /// True when the stream had more bytes than the cap.
    truncated: bool,
}

/// Reads at most `limit` body bytes, stopping as soon as the cap is passed.
async fn read_limited(response: &mut Response, limit: usize) -> Result<LimitedBody, reqwest::Error> {
    let mut bytes = Vec::new();
    while let Some(chunk) = response.chunk().await? {
        let room = limit.saturating_sub(bytes.len());
        if chunk.len() > room {
            bytes.extend_from_slice(&chunk[.. room]);
            return Ok(LimitedBody {
                bytes,
                truncated: true,
            });
        }
        bytes.extend_from_slice(&chunk);
    }
    Ok(LimitedBody {
        bytes,
        truncated: false,
    })
}

// ============================================================================
// SECTION: Tests
// ============================================================================
