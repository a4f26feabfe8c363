//! Tool trait and registry.
//!
//! Every tool the server exposes implements [`Tool`] and is registered in a
//! [`ToolRegistry`]. The same registry backs both surfaces:
//!
//! ```text
//! ┌──────────────────────────────┐
//! │         ToolRegistry         │
//! │  ┌────────────┐ ┌─────────┐  │
//! │  │ rag_search │ │  hello  │  │
//! │  └────────────┘ └─────────┘  │
//! └──────┬───────────────┬───────┘
//!        ▼               ▼
//!   McpBridge      POST /tools/{name}
//!  (stdio, /mcp)       (REST)
//! ```
//!
//! A tool returns an ordered list of text items. Parameter problems are
//! reported as [`InvalidParams`] so each surface can map them to its own
//! client-error code.

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

use crate::pipeline::StagedPipeline;

/// A callable tool.
///
/// # Example
///
/// ```rust
/// use async_trait::async_trait;
/// use anyhow::Result;
/// use serde_json::{json, Value};
/// use staged_rag::traits::{Tool, ToolContext};
///
/// pub struct PingTool;
///
/// #[async_trait]
/// impl Tool for PingTool {
///     fn name(&self) -> &str { "ping" }
///     fn description(&self) -> &str { "Reply with pong" }
///
///     fn parameters_schema(&self) -> Value {
///         json!({ "type": "object", "properties": {} })
///     }
///
///     async fn execute(&self, _params: Value, _ctx: &ToolContext) -> Result<Vec<String>> {
///         Ok(vec!["pong".to_string()])
///     }
/// }
/// ```
#[async_trait]
pub trait Tool: Send + Sync {
    /// Route name (`POST /tools/{name}`) and MCP tool name.
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// JSON Schema (`type: "object"`) describing the parameters.
    fn parameters_schema(&self) -> Value;

    /// Run the tool. `params` is always a JSON object.
    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<Vec<String>>;
}

/// Error for missing or malformed tool parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidParams(pub String);

impl fmt::Display for InvalidParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for InvalidParams {}

/// True when `err` was raised for bad parameters.
pub fn is_invalid_params(err: &anyhow::Error) -> bool {
    err.downcast_ref::<InvalidParams>().is_some()
}

/// Read a required, non-blank string parameter.
pub fn required_str<'a>(params: &'a Value, key: &str) -> Result<&'a str> {
    match params.get(key).and_then(Value::as_str) {
        Some(value) if !value.trim().is_empty() => Ok(value),
        Some(_) => Err(InvalidParams(format!("{} must not be empty", key)).into()),
        None => Err(InvalidParams(format!("missing string parameter: {}", key)).into()),
    }
}

/// Shared handles available to every tool call.
#[derive(Clone)]
pub struct ToolContext {
    pipeline: Arc<StagedPipeline>,
}

impl ToolContext {
    pub fn new(pipeline: Arc<StagedPipeline>) -> Self {
        Self { pipeline }
    }

    pub fn pipeline(&self) -> &Arc<StagedPipeline> {
        &self.pipeline
    }
}

/// Runs the staged pipeline and returns the WIKI, API and FINAL segments.
pub struct RagSearchTool;

#[async_trait]
impl Tool for RagSearchTool {
    fn name(&self) -> &str {
        "rag_search"
    }

    fn description(&self) -> &str {
        "Answer a question from wiki summaries, then API summaries, then a combined synthesis"
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "query": { "type": "string", "description": "Question to answer" }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<Vec<String>> {
        let query = required_str(&params, "query")?.to_string();
        tracing::info!(tool = "rag_search", query_len = query.len(), "tool call");

        // each call gets its own task so concurrent searches never queue
        let pipeline = ctx.pipeline().clone();
        let answer = tokio::spawn(async move { pipeline.run(&query).await })
            .await
            .map_err(|e| anyhow::anyhow!("rag_search task failed: {}", e))??;

        Ok(answer.segments())
    }
}

pub struct HelloTool;

#[async_trait]
impl Tool for HelloTool {
    fn name(&self) -> &str {
        "hello"
    }

    fn description(&self) -> &str {
        "Greet someone by name"
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "name": { "type": "string", "description": "Name to greet" }
            },
            "required": ["name"]
        })
    }

    async fn execute(&self, params: Value, _ctx: &ToolContext) -> Result<Vec<String>> {
        let name = required_str(&params, "name")?;
        Ok(vec![format!("Hello, {}!", name)])
    }
}

/// Ordered set of tools, looked up by name.
///
/// # Example
///
/// ```rust
/// use staged_rag::traits::ToolRegistry;
///
/// let tools = ToolRegistry::with_builtins();
/// assert!(tools.find("rag_search").is_some());
/// assert!(tools.find("hello").is_some());
/// ```
pub struct ToolRegistry {
    tools: Vec<Box<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self { tools: Vec::new() }
    }

    /// Registry holding `rag_search` and `hello`.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(RagSearchTool));
        registry.register(Box::new(HelloTool));
        registry
    }

    pub fn register(&mut self, tool: Box<dyn Tool>) {
        self.tools.push(tool);
    }

    pub fn tools(&self) -> &[Box<dyn Tool>] {
        &self.tools
    }

    pub fn find(&self, name: &str) -> Option<&dyn Tool> {
        self.tools
            .iter()
            .find(|t| t.name() == name)
            .map(|t| t.as_ref())
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}
