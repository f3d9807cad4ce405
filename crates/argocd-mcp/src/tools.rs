// crates/argocd-mcp/src/tools.rs
// ============================================================================
// Module: Tool Registry
// Description: Tool descriptors, parameter schemas, argument binding, and the
//              name-indexed registry.
// Purpose: Give the dispatcher one uniform shape for every callable tool.
// Dependencies: async-trait, serde, serde_json, thiserror
// ============================================================================

//! ## Overview
//! A [`ToolDescriptor`] pairs a serializable [`ToolSpec`] (name, description,
//! ordered parameters) with a [`ToolBody`]. Implemented bodies call a
//! [`ToolHandler`]; pending bodies return a fixed acknowledgement. The
//! dispatcher treats both identically.
//!
//! [`ToolRegistry`] is populated once at startup and read-only afterwards, so
//! it is shared behind an `Arc` without locking.
//!
//! Binding rules, applied in parameter order:
//! - the first missing required parameter or type mismatch fails the call;
//! - absent or `null` optional parameters take their declared default;
//! - keys not named by the schema are ignored;
//! - array params bind positionally.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod argocd;

#[cfg(test)]
mod tests;

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Map;
use serde_json::Value;
use thiserror::Error;

use crate::control_plane::ControlPlaneError;

// ============================================================================
// SECTION: Schema Types
// ============================================================================

/// JSON type accepted by a tool parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    /// JSON string.
    String,
    /// JSON number without a fractional part.
    Integer,
    /// Any JSON number.
    Number,
    /// JSON boolean.
    Boolean,
    /// JSON object (string-keyed map).
    Object,
    /// JSON array.
    Array,
    /// Any JSON value.
    Any,
}

impl ParamType {
    /// Returns the schema label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Object => "object",
            Self::Array => "array",
            Self::Any => "any",
        }
    }

    /// Returns true when `value` has this type.
    #[must_use]
    pub fn accepts(self, value: &Value) -> bool {
        match self {
            Self::String => value.is_string(),
            Self::Integer => value.is_i64() || value.is_u64(),
            Self::Number => value.is_number(),
            Self::Boolean => value.is_boolean(),
            Self::Object => value.is_object(),
            Self::Array => value.is_array(),
            Self::Any => true,
        }
    }
}

impl fmt::Display for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One declared tool parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ParamSpec {
    /// Parameter name.
    pub name: String,
    /// Accepted JSON type.
    #[serde(rename = "type")]
    pub param_type: ParamType,
    /// Whether the caller must supply a non-null value.
    pub required: bool,
    /// Value bound when an optional parameter is absent or null.
    #[serde(default)]
    pub default: Value,
    /// Human-readable description.
    #[serde(default)]
    pub description: String,
}

impl ParamSpec {
    /// Required parameter of the given type.
    #[must_use]
    pub fn required(name: &str, param_type: ParamType, description: &str) -> Self {
        Self {
            name: name.to_string(),
            param_type,
            required: true,
            default: Value::Null,
            description: description.to_string(),
        }
    }

    /// Optional parameter defaulting to `null`.
    #[must_use]
    pub fn optional(name: &str, param_type: ParamType, description: &str) -> Self {
        Self {
            required: false,
            ..Self::required(name, param_type, description)
        }
    }
}

/// Serializable tool description, as published by `tools/list` and the
/// catalog file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ToolSpec {
    /// Tool name; doubles as the JSON-RPC method.
    pub name: String,
    /// Human-readable description.
    #[serde(default)]
    pub description: String,
    /// Parameters in declaration order.
    #[serde(default)]
    pub parameters: Vec<ParamSpec>,
}

// ============================================================================
// SECTION: Bodies
// ============================================================================

/// Async behavior of an implemented tool.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    /// Runs the tool with validated arguments.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError`] when the tool cannot produce a result.
    async fn call(&self, args: &BoundArguments) -> Result<Value, ToolError>;
}

/// Synchronous acknowledgement produced by a pending tool.
pub type PendingAck = fn(&BoundArguments) -> Result<Value, ToolError>;

/// Tool behavior.
#[derive(Clone)]
pub enum ToolBody {
    /// Tool backed by a live handler.
    Implemented(Arc<dyn ToolHandler>),
    /// Tool whose behavior is not built yet; returns a fixed acknowledgement.
    Pending(PendingAck),
}

/// A registered tool.
#[derive(Clone)]
pub struct ToolDescriptor {
    /// Name, description, and parameters.
    spec: ToolSpec,
    /// Behavior.
    body: ToolBody,
}

impl ToolDescriptor {
    /// Creates a descriptor backed by a handler.
    #[must_use]
    pub fn implemented(spec: ToolSpec, handler: Arc<dyn ToolHandler>) -> Self {
        Self {
            spec,
            body: ToolBody::Implemented(handler),
        }
    }

    /// Creates a descriptor for a pending tool.
    #[must_use]
    pub fn pending(spec: ToolSpec, ack: PendingAck) -> Self {
        Self {
            spec,
            body: ToolBody::Pending(ack),
        }
    }

    /// Returns the tool name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.spec.name
    }

    /// Returns the serializable spec.
    #[must_use]
    pub const fn spec(&self) -> &ToolSpec {
        &self.spec
    }

    /// Returns true when the tool returns a fixed acknowledgement.
    #[must_use]
    pub const fn is_pending(&self) -> bool {
        matches!(self.body, ToolBody::Pending(_))
    }

    /// Binds raw params against this tool's schema.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::InvalidParams`] on the first binding failure.
    pub fn bind(&self, params: Option<&Value>) -> Result<BoundArguments, ToolError> {
        bind_arguments(&self.spec, params)
    }

    /// Runs the tool body.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError`] from the handler.
    pub async fn invoke(&self, args: &BoundArguments) -> Result<Value, ToolError> {
        match &self.body {
            ToolBody::Implemented(handler) => handler.call(args).await,
            ToolBody::Pending(ack) => ack(args),
        }
    }
}

// ============================================================================
// SECTION: Registry
// ============================================================================

/// Name-indexed tool table in registration order.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    /// Tools in registration order.
    tools: Vec<ToolDescriptor>,
    /// Tool name to position in `tools`.
    index: BTreeMap<String, usize>,
}

impl ToolRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a tool.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError`] for empty or duplicate tool names and for
    /// schemas that repeat a parameter name.
    pub fn register(&mut self, descriptor: ToolDescriptor) -> Result<(), RegistryError> {
        let name = descriptor.name().to_string();
        if name.trim().is_empty() {
            return Err(RegistryError::EmptyName);
        }
        if self.index.contains_key(&name) {
            return Err(RegistryError::DuplicateTool(name));
        }
        let mut seen = BTreeSet::new();
        for param in &descriptor.spec.parameters {
            if !seen.insert(param.name.as_str()) {
                return Err(RegistryError::DuplicateParameter {
                    tool: name,
                    parameter: param.name.clone(),
                });
            }
        }
        self.index.insert(name, self.tools.len());
        self.tools.push(descriptor);
        Ok(())
    }

    /// Looks up a tool by exact name.
    #[must_use]
    pub fn resolve(&self, name: &str) -> Option<&ToolDescriptor> {
        self.index.get(name).and_then(|position| self.tools.get(*position))
    }

    /// Returns every tool in registration order.
    #[must_use]
    pub fn list(&self) -> &[ToolDescriptor] {
        &self.tools
    }

    /// Returns cloned specs in registration order.
    #[must_use]
    pub fn specs(&self) -> Vec<ToolSpec> {
        self.tools.iter().map(|tool| tool.spec.clone()).collect()
    }

    /// Returns the number of registered tools.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Returns true when no tools are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

// ============================================================================
// SECTION: Argument Binding
// ============================================================================

/// Arguments validated against a tool schema, one entry per declared
/// parameter.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BoundArguments {
    /// Parameter name to bound value (`null` for unset optionals).
    values: Map<String, Value>,
}

impl BoundArguments {
    /// Returns the bound value for `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    /// Returns a bound string parameter.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::InvalidParams`] when the value is not a string.
    pub fn string(&self, name: &str) -> Result<&str, ToolError> {
        self.optional_string(name)?
            .ok_or_else(|| ToolError::InvalidParams(format!("missing required parameter: {name}")))
    }

    /// Returns a bound string parameter that may be unset.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::InvalidParams`] when the value is neither a string
    /// nor null.
    pub fn optional_string(&self, name: &str) -> Result<Option<&str>, ToolError> {
        match self.values.get(name) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(value)) => Ok(Some(value)),
            Some(other) => Err(type_mismatch(name, ParamType::String, other)),
        }
    }

    /// Returns a bound object parameter.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::InvalidParams`] when the value is not an object.
    pub fn object(&self, name: &str) -> Result<&Map<String, Value>, ToolError> {
        match self.values.get(name) {
            Some(Value::Object(map)) => Ok(map),
            None | Some(Value::Null) => {
                Err(ToolError::InvalidParams(format!("missing required parameter: {name}")))
            }
            Some(other) => Err(type_mismatch(name, ParamType::Object, other)),
        }
    }

    /// Consumes the bindings into a JSON object.
    #[must_use]
    pub fn into_value(self) -> Value {
        Value::Object(self.values)
    }
}

/// Validates `params` against `spec`.
///
/// # Errors
///
/// Returns [`ToolError::InvalidParams`] describing the first failure.
pub fn bind_arguments(spec: &ToolSpec, params: Option<&Value>) -> Result<BoundArguments, ToolError> {
    let supplied: Vec<(&ParamSpec, Option<&Value>)> = match params {
        None | Some(Value::Null) => spec.parameters.iter().map(|param| (param, None)).collect(),
        Some(Value::Object(map)) => {
            spec.parameters.iter().map(|param| (param, map.get(&param.name))).collect()
        }
        Some(Value::Array(items)) => {
            if items.len() > spec.parameters.len() {
                return Err(ToolError::InvalidParams(format!(
                    "too many positional parameters: expected at most {}, got {}",
                    spec.parameters.len(),
                    items.len()
                )));
            }
            spec.parameters.iter().enumerate().map(|(idx, param)| (param, items.get(idx))).collect()
        }
        Some(_) => {
            return Err(ToolError::InvalidParams("params must be an object or array".to_string()));
        }
    };

    let mut values = Map::new();
    for (param, value) in supplied {
        let bound = match value {
            None | Some(Value::Null) if param.required => {
                return Err(ToolError::InvalidParams(format!(
                    "missing required parameter: {}",
                    param.name
                )));
            }
            None | Some(Value::Null) => param.default.clone(),
            Some(value) if param.param_type.accepts(value) => value.clone(),
            Some(value) => return Err(type_mismatch(&param.name, param.param_type, value)),
        };
        values.insert(param.name.clone(), bound);
    }
    Ok(BoundArguments {
        values,
    })
}

/// Builds the type-mismatch error for a parameter.
fn type_mismatch(name: &str, expected: ParamType, actual: &Value) -> ToolError {
    ToolError::InvalidParams(format!(
        "parameter {name}: expected {expected}, got {}",
        json_type_name(actual)
    ))
}

/// Returns the JSON type name of a value.
const fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Registry construction failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// A tool with this name is already registered.
    #[error("duplicate tool name: {0}")]
    DuplicateTool(String),
    /// Tool names must be non-empty.
    #[error("tool name must be non-empty")]
    EmptyName,
    /// A schema declares the same parameter twice.
    #[error("tool {tool} declares parameter {parameter} more than once")]
    DuplicateParameter {
        /// Tool name.
        tool: String,
        /// Repeated parameter name.
        parameter: String,
    },
}

/// Tool invocation failures.
#[derive(Debug, Error)]
pub enum ToolError {
    /// Arguments did not match the schema.
    #[error("invalid params: {0}")]
    InvalidParams(String),
    /// The control plane call failed.
    #[error(transparent)]
    ControlPlane(#[from] ControlPlaneError),
}
