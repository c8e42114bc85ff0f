//! Tool system - the operations the planner can request.
//!
//! Tools are registered in-process in a [`ToolRegistry`] and dispatched by
//! name. Every failure (unknown tool, bad arguments, provider error, timeout)
//! is converted into an `Error ...` string at the registry boundary so the
//! agent loop never aborts because of a tool.

mod dice;
mod stock;
mod web;

pub use dice::{parse_notation, roll, DiceError, DiceRoll, DiceSpec, RollDice};
pub use stock::{normalize_symbol, render_report, GetStockData, MarketData, Quote, YahooFinance};
pub use web::WebSearch;

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::agent::ToolCall;
use crate::config::Config;
use crate::llm::ToolSchema;

/// Failure of a single tool invocation. Rendered into the conversation as text.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Error: unknown tool '{0}'")]
    UnknownTool(String),

    #[error("Error: invalid arguments for {tool}: {reason}")]
    InvalidArguments { tool: String, reason: String },

    #[error("Error: {tool} timed out after {secs} seconds")]
    Timeout { tool: String, secs: u64 },

    #[error("Error {action}: {reason}")]
    Failed { action: String, reason: String },
}

impl ToolError {
    pub fn invalid(tool: &str, reason: impl Into<String>) -> Self {
        Self::InvalidArguments {
            tool: tool.to_string(),
            reason: reason.into(),
        }
    }

    /// Wrap a provider failure; `action` reads like "searching the web".
    pub fn failed(action: &str, err: impl std::fmt::Display) -> Self {
        Self::Failed {
            action: action.to_string(),
            reason: err.to_string(),
        }
    }
}

/// A tool the planner can call.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Name the model uses to request this tool.
    fn name(&self) -> &str;

    /// Description shown to the model.
    fn description(&self) -> &str;

    /// JSON schema of the arguments object.
    fn parameters_schema(&self) -> Value;

    /// Run the tool. `args` is always a JSON object.
    async fn execute(&self, args: &Map<String, Value>) -> Result<String, ToolError>;
}

/// Executes planner-issued tool calls. Never fails: errors come back as text.
#[async_trait]
pub trait ToolExecutor: Send + Sync {
    async fn execute(&self, call: &ToolCall) -> String;
}

/// Name and description of a registered tool.
#[derive(Debug, Clone)]
pub struct ToolInfo {
    pub name: String,
    pub description: String,
}

/// Registry of available tools.
pub struct ToolRegistry {
    tools: BTreeMap<String, Arc<dyn Tool>>,
    timeout: Duration,
}

impl ToolRegistry {
    /// Create a registry holding the web search, dice and stock tools.
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        let mut registry = Self::empty(config.tool_timeout);
        registry.register(Arc::new(WebSearch::new(&config.search)?));
        registry.register(Arc::new(RollDice));
        registry.register(Arc::new(GetStockData::new(Arc::new(YahooFinance::new(
            &config.market_data_base_url,
        )?))));
        Ok(registry)
    }

    /// Create a registry with no tools.
    pub fn empty(timeout: Duration) -> Self {
        Self {
            tools: BTreeMap::new(),
            timeout,
        }
    }

    /// Register a tool, replacing any tool with the same name.
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    /// List registered tools.
    pub fn list_tools(&self) -> Vec<ToolInfo> {
        self.tools
            .values()
            .map(|t| ToolInfo {
                name: t.name().to_string(),
                description: t.description().to_string(),
            })
            .collect()
    }

    /// Tool definitions for the completion request.
    pub fn get_tool_schemas(&self) -> Vec<ToolSchema> {
        self.tools
            .values()
            .map(|t| ToolSchema::function(t.name(), t.description(), t.parameters_schema()))
            .collect()
    }

    /// Run a tool by name under the registry's timeout.
    pub async fn run(&self, name: &str, args: &Value) -> Result<String, ToolError> {
        let tool = self
            .tools
            .get(name)
            .ok_or_else(|| ToolError::UnknownTool(name.to_string()))?;

        let empty = Map::new();
        let args = match args {
            Value::Object(map) => map,
            Value::Null => &empty,
            other => {
                return Err(ToolError::invalid(
                    name,
                    format!("expected a JSON object, got: {}", other),
                ))
            }
        };

        tokio::time::timeout(self.timeout, tool.execute(args))
            .await
            .map_err(|_| ToolError::Timeout {
                tool: name.to_string(),
                secs: self.timeout.as_secs(),
            })?
    }
}

#[async_trait]
impl ToolExecutor for ToolRegistry {
    async fn execute(&self, call: &ToolCall) -> String {
        tracing::info!("Calling tool: {} with args: {}", call.name, call.arguments);

        match self.run(&call.name, &call.arguments).await {
            Ok(output) => output,
            Err(e) => {
                tracing::warn!("Tool {} failed: {}", call.name, e);
                e.to_string()
            }
        }
    }
}

/// Read a required string argument.
pub(crate) fn required_str<'a>(
    tool: &str,
    args: &'a Map<String, Value>,
    key: &str,
) -> Result<&'a str, ToolError> {
    args.get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| ToolError::invalid(tool, format!("missing '{}' argument", key)))
}
