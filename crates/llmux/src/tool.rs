use std::fmt::Debug;
use std::sync::Arc;

use lazy_static::lazy_static;
use regex::Regex;
use serde_json::Value;

use crate::errors::{LlmError, LlmResult};

lazy_static! {
    static ref TOOL_NAME: Regex = Regex::new(r"^[a-zA-Z0-9_-]{1,64}$").unwrap();
}

/// Synchronous function a tool runs when the model calls it
pub type ToolHandler = Arc<dyn Fn(&Value) -> anyhow::Result<String> + Send + Sync>;

/// A tool that can be used by a model.
#[derive(Clone)]
pub struct Tool {
    /// The name of the tool
    pub name: String,
    /// A description of what the tool does
    pub description: String,
    /// JSON schema of the arguments the tool accepts
    pub parameters: Value,
    handler: ToolHandler,
}

impl Tool {
    /// Create a new tool with the given name, description, parameter schema and handler
    pub fn new<N, D, F>(name: N, description: D, parameters: Value, handler: F) -> Self
    where
        N: Into<String>,
        D: Into<String>,
        F: Fn(&Value) -> anyhow::Result<String> + Send + Sync + 'static,
    {
        Tool {
            name: name.into(),
            description: description.into(),
            parameters,
            handler: Arc::new(handler),
        }
    }

    /// Run the handler against model supplied arguments
    pub fn call(&self, arguments: &Value) -> anyhow::Result<String> {
        (self.handler)(arguments)
    }

    pub fn validate(&self) -> LlmResult<()> {
        if !TOOL_NAME.is_match(&self.name) {
            return Err(LlmError::validation(
                "tool.name",
                format!(
                    "'{}' must match [a-zA-Z0-9_-] and be at most 64 characters",
                    self.name
                ),
            ));
        }
        if !self.parameters.is_object() {
            return Err(LlmError::validation(
                "tool.parameters",
                format!("parameters of '{}' must be a JSON schema object", self.name),
            ));
        }
        Ok(())
    }
}

impl Debug for Tool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tool")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("parameters", &self.parameters)
            .finish_non_exhaustive()
    }
}
