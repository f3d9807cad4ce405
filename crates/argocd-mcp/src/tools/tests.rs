// crates/argocd-mcp/src/tools/tests.rs
// ============================================================================
// Module: Tool Registry Unit Tests
// Description: Registration, lookup, argument binding, and built-in tools.
// Purpose: Pin registry invariants and binding error messages.
// Dependencies: argocd-mcp
// ============================================================================

//! ## Overview
//! Unit coverage for [`super::ToolRegistry`] and [`super::bind_arguments`],
//! plus the pending tool acknowledgements.

// ============================================================================
// SECTION: Lint Configuration
// ============================================================================

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::missing_docs_in_private_items,
    reason = "Test-only assertions and fixtures."
)]

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
use super::RegistryError;
use super::ToolDescriptor;
use super::ToolError;
use super::ToolHandler;
use super::ToolRegistry;
use super::ToolSpec;
use super::argocd;
use super::bind_arguments;
use crate::control_plane::ApplicationDetail;
use crate::control_plane::ApplicationList;
use crate::control_plane::ControlPlaneApi;
use crate::control_plane::ControlPlaneError;
use crate::control_plane::ResourceTree;

// ============================================================================
// SECTION: Fixtures
// ============================================================================

/// Control plane that echoes what it was asked for.
struct EchoControlPlane;

#[async_trait]
impl ControlPlaneApi for EchoControlPlane {
    async fn list_applications(
        &self,
        search: Option<&str>,
    ) -> Result<ApplicationList, ControlPlaneError> {
        Ok(ApplicationList(json!({ "items": [], "search": search })))
    }

    async fn get_application(&self, name: &str) -> Result<ApplicationDetail, ControlPlaneError> {
        Ok(ApplicationDetail(json!({ "metadata": { "name": name } })))
    }

    async fn get_application_resource_tree(
        &self,
        name: &str,
    ) -> Result<ResourceTree, ControlPlaneError> {
        Ok(ResourceTree(json!({ "nodes": [], "app": name })))
    }
}

struct ConstantTool;

#[async_trait]
impl ToolHandler for ConstantTool {
    async fn call(&self, _args: &BoundArguments) -> Result<Value, ToolError> {
        Ok(json!("constant"))
    }
}

fn registry() -> ToolRegistry {
    argocd::default_registry(Arc::new(EchoControlPlane)).unwrap()
}

fn spec(name: &str, parameters: Vec<ParamSpec>) -> ToolSpec {
    ToolSpec {
        name: name.to_string(),
        description: String::new(),
        parameters,
    }
}

fn invalid_params_message(result: Result<BoundArguments, ToolError>) -> String {
    match result {
        Err(ToolError::InvalidParams(message)) => message,
        other => panic!("expected invalid params, got {other:?}"),
    }
}

// ============================================================================
// SECTION: Registry
// ============================================================================

#[test]
fn default_registry_lists_tools_in_registration_order() {
    let names: Vec<String> =
        registry().list().iter().map(|tool| tool.name().to_string()).collect();
    assert_eq!(
        names,
        vec![
            "mcp_list_applications",
            "mcp_get_application",
            "mcp_get_application_resource_tree",
            "add_cluster",
            "configure_webhook",
            "deploy_helm_chart",
            "set_environment",
            "configure_rbac",
        ]
    );
}

#[test]
fn default_specs_match_registered_specs() {
    assert_eq!(argocd::default_tool_specs(), registry().specs());
}

#[test]
fn resolve_returns_exact_descriptor() {
    let registry = registry();
    for tool in registry.list() {
        let resolved = registry.resolve(tool.name()).unwrap();
        assert_eq!(resolved.spec(), tool.spec());
    }
    assert!(registry.resolve("no_such_tool").is_none());
    assert!(registry.resolve("MCP_GET_APPLICATION").is_none());
}

#[test]
fn pending_and_implemented_tools_are_distinguished() {
    let registry = registry();
    assert!(!registry.resolve("mcp_get_application").unwrap().is_pending());
    assert!(registry.resolve("add_cluster").unwrap().is_pending());
}

#[test]
fn duplicate_registration_fails() {
    let mut registry = registry();
    let err = registry
        .register(ToolDescriptor::implemented(spec("add_cluster", vec![]), Arc::new(ConstantTool)))
        .unwrap_err();
    assert_eq!(err, RegistryError::DuplicateTool("add_cluster".to_string()));
    assert_eq!(registry.len(), 8);
}

#[test]
fn empty_name_is_rejected() {
    let mut registry = ToolRegistry::new();
    let err = registry
        .register(ToolDescriptor::implemented(spec("  ", vec![]), Arc::new(ConstantTool)))
        .unwrap_err();
    assert_eq!(err, RegistryError::EmptyName);
    assert!(registry.is_empty());
}

#[test]
fn repeated_parameter_is_rejected() {
    let mut registry = ToolRegistry::new();
    let params = vec![
        ParamSpec::required("a", ParamType::String, ""),
        ParamSpec::optional("a", ParamType::Integer, ""),
    ];
    let err = registry
        .register(ToolDescriptor::implemented(spec("t", params), Arc::new(ConstantTool)))
        .unwrap_err();
    assert!(matches!(err, RegistryError::DuplicateParameter { .. }));
}

// ============================================================================
// SECTION: Binding
// ============================================================================

#[test]
fn missing_required_parameter_names_first_field() {
    let spec = spec(
        "deploy",
        vec![
            ParamSpec::required("repo_url", ParamType::String, ""),
            ParamSpec::required("branch", ParamType::String, ""),
        ],
    );
    let message = invalid_params_message(bind_arguments(&spec, Some(&json!({}))));
    assert_eq!(message, "missing required parameter: repo_url");
}

#[test]
fn null_for_required_parameter_counts_as_missing() {
    let spec = spec("t", vec![ParamSpec::required("name", ParamType::String, "")]);
    let message = invalid_params_message(bind_arguments(&spec, Some(&json!({ "name": null }))));
    assert_eq!(message, "missing required parameter: name");
}

#[test]
fn type_mismatch_reports_expected_and_actual() {
    let spec = spec("t", vec![ParamSpec::required("variables", ParamType::Object, "")]);
    let message =
        invalid_params_message(bind_arguments(&spec, Some(&json!({ "variables": [1, 2] }))));
    assert_eq!(message, "parameter variables: expected object, got array");
}

#[test]
fn integer_parameter_rejects_fractions() {
    let spec = spec("t", vec![ParamSpec::required("replicas", ParamType::Integer, "")]);
    assert!(bind_arguments(&spec, Some(&json!({ "replicas": 3 }))).is_ok());
    assert!(bind_arguments(&spec, Some(&json!({ "replicas": 2.5 }))).is_err());
}

#[test]
fn optional_parameters_take_defaults() {
    let mut project = ParamSpec::optional("project", ParamType::String, "");
    project.default = json!("default");
    let spec = spec("t", vec![project, ParamSpec::optional("secret", ParamType::String, "")]);
    let bound = bind_arguments(&spec, None).unwrap();
    assert_eq!(bound.get("project"), Some(&json!("default")));
    assert_eq!(bound.get("secret"), Some(&Value::Null));

    let bound = bind_arguments(&spec, Some(&json!({ "project": null }))).unwrap();
    assert_eq!(bound.get("project"), Some(&json!("default")));
}

#[test]
fn unknown_keys_are_ignored() {
    let spec = spec("t", vec![ParamSpec::required("name", ParamType::String, "")]);
    let bound = bind_arguments(&spec, Some(&json!({ "name": "a", "extra": true }))).unwrap();
    assert_eq!(bound.into_value(), json!({ "name": "a" }));
}

#[test]
fn positional_params_bind_in_schema_order() {
    let spec = spec(
        "t",
        vec![
            ParamSpec::required("username", ParamType::String, ""),
            ParamSpec::required("role", ParamType::String, ""),
            ParamSpec::optional("project", ParamType::String, ""),
        ],
    );
    let bound = bind_arguments(&spec, Some(&json!(["alice", "admin"]))).unwrap();
    assert_eq!(bound.get("username"), Some(&json!("alice")));
    assert_eq!(bound.get("role"), Some(&json!("admin")));
    assert_eq!(bound.get("project"), Some(&Value::Null));

    let message =
        invalid_params_message(bind_arguments(&spec, Some(&json!(["a", "b", "c", "d"]))));
    assert!(message.starts_with("too many positional parameters"));
}

#[test]
fn scalar_params_are_rejected() {
    let spec = spec("t", vec![]);
    let message = invalid_params_message(bind_arguments(&spec, Some(&json!("oops"))));
    assert_eq!(message, "params must be an object or array");
}

// ============================================================================
// SECTION: Built-in Tools
// ============================================================================

async fn call(name: &str, params: Value) -> Result<Value, ToolError> {
    let registry = registry();
    let tool = registry.resolve(name).unwrap();
    let args = tool.bind(Some(&params))?;
    tool.invoke(&args).await
}

#[tokio::test]
async fn proxy_tools_forward_arguments() {
    let result = call("mcp_get_application", json!({ "application_name": "payments" }))
        .await
        .unwrap();
    assert_eq!(result, json!({ "metadata": { "name": "payments" } }));

    let result = call("mcp_list_applications", json!({})).await.unwrap();
    assert_eq!(result["search"], Value::Null);

    let result =
        call("mcp_get_application_resource_tree", json!(["payments"])).await.unwrap();
    assert_eq!(result["app"], "payments");
}

#[tokio::test]
async fn empty_application_name_is_invalid() {
    let err = call("mcp_get_application", json!({ "application_name": "" })).await.unwrap_err();
    assert!(matches!(err, ToolError::InvalidParams(_)));
}

#[tokio::test]
async fn add_cluster_acknowledges_with_endpoint() {
    let result = call(
        "add_cluster",
        json!({
            "cluster_name": "stage",
            "cluster_endpoint": "https://k8s.stage:6443",
            "auth_token": "secret",
        }),
    )
    .await
    .unwrap();
    assert_eq!(
        result,
        json!({
            "status": "success",
            "message": "Cluster stage added with endpoint https://k8s.stage:6443",
        })
    );
}

#[tokio::test]
async fn configure_rbac_defaults_project_to_global() {
    let result =
        call("configure_rbac", json!({ "username": "alice", "role": "admin" })).await.unwrap();
    assert_eq!(result["message"], "RBAC role admin assigned to alice in project global");

    let result = call(
        "configure_rbac",
        json!({ "username": "alice", "role": "admin", "project": "payments" }),
    )
    .await
    .unwrap();
    assert_eq!(result["message"], "RBAC role admin assigned to alice in project payments");
}

#[tokio::test]
async fn webhook_and_helm_messages_keep_their_shape() {
    let result = call(
        "configure_webhook",
        json!({
            "scm_type": "github",
            "repo_url": "https://github.com/acme/app",
            "branch": "main",
            "webhook_url": "https://cd.acme/api/webhook",
        }),
    )
    .await
    .unwrap();
    assert_eq!(
        result["message"],
        "Webhook configured for github repo https://github.com/acme/app (branch: main)"
    );

    let result = call(
        "deploy_helm_chart",
        json!({
            "repo_url": "https://charts.acme",
            "branch": "main",
            "chart_path": "charts/api",
            "cluster_name": "prod",
            "namespace": "payments",
        }),
    )
    .await
    .unwrap();
    assert_eq!(
        result["message"],
        "Helm chart charts/api from https://charts.acme@main deployed to prod/payments"
    );
}

#[tokio::test]
async fn set_environment_echoes_variables_identically() {
    let params = json!({
        "environment_name": "staging",
        "variables": { "REPLICAS": 3, "LOG_LEVEL": "debug" },
    });
    let first = call("set_environment", params.clone()).await.unwrap();
    let second = call("set_environment", params).await.unwrap();
    assert_eq!(
        serde_json::to_vec(&first).unwrap(),
        serde_json::to_vec(&second).unwrap()
    );
    assert_eq!(first["message"], "Environment staging configured");
    assert_eq!(first["variables"]["REPLICAS"], 3);
}

#[tokio::test]
async fn set_environment_requires_variables_object() {
    let err = call("set_environment", json!({ "environment_name": "staging", "variables": "x" }))
        .await
        .unwrap_err();
    assert!(matches!(err, ToolError::InvalidParams(_)));
}
