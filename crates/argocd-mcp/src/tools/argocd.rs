// crates/argocd-mcp/src/tools/argocd.rs
// ============================================================================
// Module: Argo CD Tool Set
// Description: Built-in proxy tools and pending administrative tools.
// Purpose: Register the gateway's fixed tool catalog.
// Dependencies: async-trait, serde_json
// ============================================================================

//! ## Overview
//! Three tools proxy reads to the control plane through [`ControlPlaneApi`].
//! Five administrative tools are pending: they validate their arguments and
//! return a fixed `{"status": "success", "message": ...}` acknowledgement
//! without side effects.
//!
//! [`default_tool_specs`] yields the same descriptors without a control-plane
//! client so the catalog document can be exported offline.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use serde_json::json;

use super::BoundArguments;
use super::ParamSpec;
use super::ParamType;
use super::PendingAck;
use super::RegistryError;
use super::ToolDescriptor;
use super::ToolError;
use super::ToolHandler;
use super::ToolRegistry;
use super::ToolSpec;
use crate::control_plane::ControlPlaneApi;

// ============================================================================
// SECTION: Tool Names
// ============================================================================

/// Lists applications.
pub const LIST_APPLICATIONS: &str = "mcp_list_applications";
/// Fetches one application.
pub const GET_APPLICATION: &str = "mcp_get_application";
/// Fetches an application's resource tree.
pub const GET_APPLICATION_RESOURCE_TREE: &str = "mcp_get_application_resource_tree";
/// Registers a cluster.
pub const ADD_CLUSTER: &str = "add_cluster";
/// Configures an SCM webhook.
pub const CONFIGURE_WEBHOOK: &str = "configure_webhook";
/// Deploys a Helm chart.
pub const DEPLOY_HELM_CHART: &str = "deploy_helm_chart";
/// Sets environment variables.
pub const SET_ENVIRONMENT: &str = "set_environment";
/// Assigns an RBAC role.
pub const CONFIGURE_RBAC: &str = "configure_rbac";

/// Shared parameter name for the proxy tools that take an application.
const APPLICATION_NAME: &str = "application_name";

// ============================================================================
// SECTION: Registration
// ============================================================================

/// Builds a registry holding every built-in tool.
///
/// # Errors
///
/// Returns [`RegistryError`] if registration fails.
pub fn default_registry(client: Arc<dyn ControlPlaneApi>) -> Result<ToolRegistry, RegistryError> {
    let mut registry = ToolRegistry::new();
    register_default_tools(&mut registry, client)?;
    Ok(registry)
}

/// Registers every built-in tool, proxies first.
///
/// # Errors
///
/// Returns [`RegistryError`] if a built-in name is already taken.
pub fn register_default_tools(
    registry: &mut ToolRegistry,
    client: Arc<dyn ControlPlaneApi>,
) -> Result<(), RegistryError> {
    for operation in PROXY_OPERATIONS {
        let handler = ProxyTool {
            client: Arc::clone(&client),
            operation,
        };
        registry.register(ToolDescriptor::implemented(operation.spec(), Arc::new(handler)))?;
    }
    for (spec, ack) in pending_tools() {
        registry.register(ToolDescriptor::pending(spec, ack))?;
    }
    Ok(())
}

/// Returns the built-in specs in registration order.
#[must_use]
pub fn default_tool_specs() -> Vec<ToolSpec> {
    PROXY_OPERATIONS
        .into_iter()
        .map(ProxyOperation::spec)
        .chain(pending_tools().into_iter().map(|(spec, _)| spec))
        .collect()
}

// ============================================================================
// SECTION: Proxy Tools
// ============================================================================

/// Proxy tools in registration order.
const PROXY_OPERATIONS: [ProxyOperation; 3] = [
    ProxyOperation::ListApplications,
    ProxyOperation::GetApplication,
    ProxyOperation::GetResourceTree,
];

/// Control-plane read performed by a proxy tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ProxyOperation {
    /// `GET /api/v1/applications`.
    ListApplications,
    /// `GET /api/v1/applications/{name}`.
    GetApplication,
    /// `GET /api/v1/applications/{name}/resource-tree`.
    GetResourceTree,
}

impl ProxyOperation {
    /// Returns the tool spec for this operation.
    fn spec(self) -> ToolSpec {
        match self {
            Self::ListApplications => spec(
                LIST_APPLICATIONS,
                "List Argo CD applications",
                vec![ParamSpec::optional(
                    "search",
                    ParamType::String,
                    "Optional application name filter",
                )],
            ),
            Self::GetApplication => spec(
                GET_APPLICATION,
                "Get details of an Argo CD application",
                vec![application_name_param()],
            ),
            Self::GetResourceTree => spec(
                GET_APPLICATION_RESOURCE_TREE,
                "Get the resource tree of an Argo CD application",
                vec![application_name_param()],
            ),
        }
    }
}

/// Tool handler that forwards one read to the control plane.
struct ProxyTool {
    /// Control-plane client shared by all proxy tools.
    client: Arc<dyn ControlPlaneApi>,
    /// Read to perform.
    operation: ProxyOperation,
}

#[async_trait]
impl ToolHandler for ProxyTool {
    async fn call(&self, args: &BoundArguments) -> Result<Value, ToolError> {
        let value = match self.operation {
            ProxyOperation::ListApplications => {
                let search = args.optional_string("search")?;
                self.client.list_applications(search).await?.0
            }
            ProxyOperation::GetApplication => {
                let name = application_name(args)?;
                self.client.get_application(name).await?.0
            }
            ProxyOperation::GetResourceTree => {
                let name = application_name(args)?;
                self.client.get_application_resource_tree(name).await?.0
            }
        };
        Ok(value)
    }
}

/// Reads a non-empty application name.
fn application_name(args: &BoundArguments) -> Result<&str, ToolError> {
    let name = args.string(APPLICATION_NAME)?;
    if name.is_empty() {
        return Err(ToolError::InvalidParams(format!("{APPLICATION_NAME} must be non-empty")));
    }
    Ok(name)
}

/// The `application_name` parameter shared by two proxy tools.
fn application_name_param() -> ParamSpec {
    ParamSpec::required(APPLICATION_NAME, ParamType::String, "Argo CD application name")
}

// ============================================================================
// SECTION: Pending Tools
// ============================================================================

/// Specs and acknowledgements for the pending administrative tools.
fn pending_tools() -> Vec<(ToolSpec, PendingAck)> {
    vec![
        (
            spec(
                ADD_CLUSTER,
                "Add a new Kubernetes cluster (stage/dev/prod)",
                vec![
                    ParamSpec::required("cluster_name", ParamType::String, "Cluster display name"),
                    ParamSpec::required(
                        "cluster_endpoint",
                        ParamType::String,
                        "Kubernetes API server URL",
                    ),
                    ParamSpec::required(
                        "auth_token",
                        ParamType::String,
                        "Credential used to reach the cluster",
                    ),
                ],
            ),
            add_cluster as PendingAck,
        ),
        (
            spec(
                CONFIGURE_WEBHOOK,
                "Configure GitHub or GitLab webhook for Argo CD auto-sync",
                vec![
                    ParamSpec::required("scm_type", ParamType::String, "github or gitlab"),
                    ParamSpec::required("repo_url", ParamType::String, "Repository URL"),
                    ParamSpec::required("branch", ParamType::String, "Branch that triggers sync"),
                    ParamSpec::required("webhook_url", ParamType::String, "Webhook receiver URL"),
                    ParamSpec::optional("secret", ParamType::String, "Webhook shared secret"),
                ],
            ),
            configure_webhook as PendingAck,
        ),
        (
            spec(
                DEPLOY_HELM_CHART,
                "Deploy Helm chart into a specific cluster",
                vec![
                    ParamSpec::required("repo_url", ParamType::String, "Chart repository URL"),
                    ParamSpec::required("branch", ParamType::String, "Repository branch"),
                    ParamSpec::required("chart_path", ParamType::String, "Chart path in the repo"),
                    ParamSpec::required("cluster_name", ParamType::String, "Target cluster"),
                    ParamSpec::required("namespace", ParamType::String, "Target namespace"),
                ],
            ),
            deploy_helm_chart as PendingAck,
        ),
        (
            spec(
                SET_ENVIRONMENT,
                "Set environment variables/config for a cluster/application",
                vec![
                    ParamSpec::required("environment_name", ParamType::String, "Environment name"),
                    ParamSpec::required(
                        "variables",
                        ParamType::Object,
                        "Variables to apply, keyed by name",
                    ),
                ],
            ),
            set_environment as PendingAck,
        ),
        (
            spec(
                CONFIGURE_RBAC,
                "Configure RBAC permissions for a user or group",
                vec![
                    ParamSpec::required("username", ParamType::String, "User or group"),
                    ParamSpec::required("role", ParamType::String, "Role to assign"),
                    ParamSpec::optional("project", ParamType::String, "Project scope"),
                ],
            ),
            configure_rbac as PendingAck,
        ),
    ]
}

/// Acknowledges a cluster registration.
fn add_cluster(args: &BoundArguments) -> Result<Value, ToolError> {
    let name = args.string("cluster_name")?;
    let endpoint = args.string("cluster_endpoint")?;
    Ok(acknowledge(format!("Cluster {name} added with endpoint {endpoint}")))
}

/// Acknowledges a webhook configuration.
fn configure_webhook(args: &BoundArguments) -> Result<Value, ToolError> {
    let scm_type = args.string("scm_type")?;
    let repo_url = args.string("repo_url")?;
    let branch = args.string("branch")?;
    Ok(acknowledge(format!("Webhook configured for {scm_type} repo {repo_url} (branch: {branch})")))
}

/// Acknowledges a Helm deployment.
fn deploy_helm_chart(args: &BoundArguments) -> Result<Value, ToolError> {
    let repo_url = args.string("repo_url")?;
    let branch = args.string("branch")?;
    let chart_path = args.string("chart_path")?;
    let cluster_name = args.string("cluster_name")?;
    let namespace = args.string("namespace")?;
    Ok(acknowledge(format!(
        "Helm chart {chart_path} from {repo_url}@{branch} deployed to {cluster_name}/{namespace}"
    )))
}

/// Acknowledges an environment update and echoes the variables.
fn set_environment(args: &BoundArguments) -> Result<Value, ToolError> {
    let name = args.string("environment_name")?;
    let variables = args.object("variables")?;
    Ok(json!({
        "status": "success",
        "message": format!("Environment {name} configured"),
        "variables": variables,
    }))
}

/// Acknowledges an RBAC assignment; the project defaults to `global`.
fn configure_rbac(args: &BoundArguments) -> Result<Value, ToolError> {
    let username = args.string("username")?;
    let role = args.string("role")?;
    let project = args.optional_string("project")?.filter(|p| !p.is_empty()).unwrap_or("global");
    Ok(acknowledge(format!("RBAC role {role} assigned to {username} in project {project}")))
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Builds a tool spec.
fn spec(name: &str, description: &str, parameters: Vec<ParamSpec>) -> ToolSpec {
    ToolSpec {
        name: name.to_string(),
        description: description.to_string(),
        parameters,
    }
}

/// Standard pending-tool acknowledgement.
fn acknowledge(message: String) -> Value {
    json!({
        "status": "success",
        "message": message,
    })
}
