//! MCP servers: stdio transport and an axum HTTP server.
//!
//! Both surfaces dispatch through the same [`ToolRegistry`]. The HTTP server
//! additionally exposes a small JSON API alongside the MCP endpoint.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `*`    | `/mcp` | MCP streamable HTTP (JSON-RPC) |
//! | `GET`  | `/tools/list` | List registered tools with schemas |
//! | `POST` | `/tools/{name}` | Call a tool by name |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "hello: name must not be empty" } }
//! ```
//!
//! Error codes: `bad_request` (400), `not_found` (404), `tool_error` (500).
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted.
//!
//! # Client configuration
//!
//! ```json
//! {
//!   "mcpServers": {
//!     "rag": {
//!       "command": "rag",
//!       "args": ["--config", "/path/to/rag.toml", "serve", "stdio"]
//!     }
//!   }
//! }
//! ```

use anyhow::Result;
use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use rmcp::transport::streamable_http_server::{
    session::local::LocalSessionManager, StreamableHttpService,
};
use rmcp::ServiceExt;
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::config::Config;
use crate::mcp::McpBridge;
use crate::pipeline::StagedPipeline;
use crate::traits::{is_invalid_params, ToolContext, ToolRegistry};

/// Shared state for the route handlers.
#[derive(Clone)]
struct AppState {
    tools: Arc<ToolRegistry>,
    ctx: ToolContext,
}

/// Build the HTTP application for `pipeline` with the built-in tools.
pub fn build_router(pipeline: Arc<StagedPipeline>) -> Router {
    let tools = Arc::new(ToolRegistry::with_builtins());
    let ctx = ToolContext::new(pipeline);

    let bridge = McpBridge::new(tools.clone(), ctx.clone());
    let mcp_service = StreamableHttpService::new(
        move || Ok(bridge.clone()),
        LocalSessionManager::default().into(),
        Default::default(),
    );

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/tools/list", get(handle_list_tools))
        .route("/tools/{name}", post(handle_tool_call))
        .route("/health", get(handle_health))
        .nest_service("/mcp", mcp_service)
        .layer(cors)
        .with_state(AppState { tools, ctx })
}

/// Serve MCP and the JSON API on `[server].bind` until the process exits.
pub async fn run_http(config: &Config) -> Result<()> {
    let pipeline = Arc::new(StagedPipeline::from_config(config).await?);
    let app = build_router(pipeline);

    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    tracing::info!(bind = %config.server.bind, "MCP server listening (POST /mcp, /tools/{{name}})");
    axum::serve(listener, app).await?;

    Ok(())
}

/// Serve MCP over stdin/stdout until the client disconnects.
///
/// Nothing else may write to stdout while this runs; logs go to stderr.
pub async fn run_stdio(config: &Config) -> Result<()> {
    let pipeline = Arc::new(StagedPipeline::from_config(config).await?);
    let tools = Arc::new(ToolRegistry::with_builtins());
    let bridge = McpBridge::new(tools, ToolContext::new(pipeline));

    tracing::info!("MCP server running on stdio");
    let service = bridge.serve(rmcp::transport::stdio()).await?;
    service.waiting().await?;

    Ok(())
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

struct AppError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code.to_string(),
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request",
        message: message.into(),
    }
}

fn not_found(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::NOT_FOUND,
        code: "not_found",
        message: message.into(),
    }
}

fn tool_error(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "tool_error",
        message: message.into(),
    }
}

fn classify_tool_error(tool_name: &str, err: anyhow::Error) -> AppError {
    let message = format!("{}: {}", tool_name, err);
    if is_invalid_params(&err) {
        bad_request(message)
    } else {
        tracing::warn!(tool = tool_name, error = %err, "tool call failed");
        tool_error(message)
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ GET /tools/list ============

#[derive(Serialize)]
struct ToolInfo {
    name: String,
    description: String,
    parameters: serde_json::Value,
}

#[derive(Serialize)]
struct ToolListResponse {
    tools: Vec<ToolInfo>,
}

async fn handle_list_tools(State(state): State<AppState>) -> Json<ToolListResponse> {
    let tools = state
        .tools
        .tools()
        .iter()
        .map(|t| ToolInfo {
            name: t.name().to_string(),
            description: t.description().to_string(),
            parameters: t.parameters_schema(),
        })
        .collect();
    Json(ToolListResponse { tools })
}

// ============ POST /tools/{name} ============

/// Returns `{ "result": [text, ...] }`, or `404` for an unknown tool, `400`
/// for bad parameters and `500` when the tool fails.
async fn handle_tool_call(
    State(state): State<AppState>,
    Path(name): Path<String>,
    payload: Result<Json<serde_json::Value>, JsonRejection>,
) -> Result<Json<serde_json::Value>, AppError> {
    let tool = state
        .tools
        .find(&name)
        .ok_or_else(|| not_found(format!("no tool registered with name: {}", name)))?;

    // malformed or missing bodies get the same envelope as other errors
    let Json(params) = payload.map_err(|rejection| bad_request(rejection.body_text()))?;

    if !params.is_object() {
        return Err(bad_request("parameters must be a JSON object"));
    }

    let result = tool
        .execute(params, &state.ctx)
        .await
        .map_err(|e| classify_tool_error(&name, e))?;

    Ok(Json(serde_json::json!({ "result": result })))
}
