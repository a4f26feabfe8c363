//! MCP JSON-RPC protocol bridge.
//!
//! Adapts the [`ToolRegistry`] to rmcp's [`ServerHandler`] so the same tools
//! are reachable over the stdio transport and the streamable HTTP endpoint
//! mounted at `/mcp`.
//!
//! | Failure | MCP error code |
//! |---------|----------------|
//! | unknown tool | `METHOD_NOT_FOUND` |
//! | missing or empty parameter | `INVALID_PARAMS` |
//! | pipeline or model failure | `INTERNAL_ERROR` |

use std::borrow::Cow;
use std::sync::Arc;

use rmcp::model::*;
use rmcp::{ErrorData as McpError, ServerHandler};

use crate::traits::{is_invalid_params, ToolContext, ToolRegistry};

pub const SERVER_NAME: &str = "rag-mcp-server";

/// Each MCP session receives a clone of this struct; everything is behind
/// `Arc`, so all sessions share one registry and one pipeline.
#[derive(Clone)]
pub struct McpBridge {
    tools: Arc<ToolRegistry>,
    ctx: ToolContext,
}

impl McpBridge {
    pub fn new(tools: Arc<ToolRegistry>, ctx: ToolContext) -> Self {
        Self { tools, ctx }
    }

    fn to_mcp_tool(tool: &dyn crate::traits::Tool) -> Tool {
        let input_schema: Arc<serde_json::Map<String, serde_json::Value>> =
            match tool.parameters_schema() {
                serde_json::Value::Object(map) => Arc::new(map),
                _ => Arc::new(serde_json::Map::new()),
            };

        Tool {
            name: Cow::Owned(tool.name().to_string()),
            title: None,
            description: Some(Cow::Owned(tool.description().to_string())),
            input_schema,
            output_schema: None,
            annotations: Some(ToolAnnotations::new().read_only(true)),
            execution: None,
            icons: None,
            meta: None,
        }
    }
}

/// Map a tool failure onto the MCP error codes.
pub fn tool_failure(tool_name: &str, err: &anyhow::Error) -> McpError {
    let code = if is_invalid_params(err) {
        ErrorCode::INVALID_PARAMS
    } else {
        ErrorCode::INTERNAL_ERROR
    };
    McpError::new(code, format!("{}: {}", tool_name, err), None)
}

impl ServerHandler for McpBridge {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::LATEST,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: SERVER_NAME.to_string(),
                title: Some("Staged RAG".to_string()),
                version: env!("CARGO_PKG_VERSION").to_string(),
                description: None,
                icons: None,
                website_url: None,
            },
            instructions: Some(
                "Use rag_search to answer a question from the wiki and API summaries. \
                 It returns three text items: the wiki answer, the API answer, and a \
                 combined final answer."
                    .to_string(),
            ),
        }
    }

    fn list_tools(
        &self,
        _request: Option<PaginatedRequestParams>,
        _context: rmcp::service::RequestContext<rmcp::RoleServer>,
    ) -> impl std::future::Future<Output = Result<ListToolsResult, McpError>> + Send + '_ {
        let tools: Vec<Tool> = self
            .tools
            .tools()
            .iter()
            .map(|t| Self::to_mcp_tool(t.as_ref()))
            .collect();
        std::future::ready(Ok(ListToolsResult::with_all_items(tools)))
    }

    fn get_tool(&self, name: &str) -> Option<Tool> {
        self.tools.find(name).map(Self::to_mcp_tool)
    }

    async fn call_tool(
        &self,
        request: CallToolRequestParams,
        _context: rmcp::service::RequestContext<rmcp::RoleServer>,
    ) -> Result<CallToolResult, McpError> {
        let tool = self.tools.find(&request.name).ok_or_else(|| {
            McpError::new(
                ErrorCode::METHOD_NOT_FOUND,
                format!("no tool registered with name: {}", request.name),
                None,
            )
        })?;

        let params = request
            .arguments
            .map(serde_json::Value::Object)
            .unwrap_or(serde_json::Value::Object(serde_json::Map::new()));

        match tool.execute(params, &self.ctx).await {
            Ok(items) => Ok(CallToolResult::success(
                items.into_iter().map(Content::text).collect(),
            )),
            Err(e) => {
                tracing::warn!(tool = %request.name, error = %e, "tool call failed");
                Err(tool_failure(&request.name, &e))
            }
        }
    }
}
