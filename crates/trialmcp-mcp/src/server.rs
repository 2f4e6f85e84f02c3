use std::io::{self, BufRead, Write};

use serde_json::{json, Value};
use tracing::{debug, error, info};

use trialmcp_core::TrialError;

use crate::protocol::{JsonRpcMessage, JsonRpcResponse, ToolResult, PARSE_ERROR, RESOURCE_NOT_FOUND};
use crate::resources;
use crate::tools::{Dispatcher, ToolBackend};

const SERVER_VERSION: &str = env!("CARGO_PKG_VERSION");
const PROTOCOL_VERSION: &str = "2024-11-05";

/// MCP front end over a [`Dispatcher`].
#[derive(Debug)]
pub struct McpServer<B> {
    dispatcher: Dispatcher<B>,
    instructions: String,
}

impl<B: ToolBackend> McpServer<B> {
    /// `instructions` replaces the catalog's default server instructions when set.
    pub fn new(dispatcher: Dispatcher<B>, instructions: Option<String>) -> Self {
        let instructions =
            instructions.unwrap_or_else(|| dispatcher.catalog().instructions.to_string());
        Self {
            dispatcher,
            instructions,
        }
    }

    pub fn dispatcher(&self) -> &Dispatcher<B> {
        &self.dispatcher
    }

    /// Serve newline-delimited JSON-RPC until `input` is exhausted.
    pub fn serve<R: BufRead, W: Write>(&self, input: R, output: &mut W) -> anyhow::Result<()> {
        for line in input.lines() {
            let line = match line {
                Ok(l) => l,
                Err(e) => {
                    error!("stdin read error: {e}");
                    break;
                }
            };

            if let Some(response) = self.handle_line(&line) {
                write_response(output, &response)?;
            }
        }
        Ok(())
    }

    /// Handle one raw frame. Returns `None` for blank lines and notifications.
    pub fn handle_line(&self, line: &str) -> Option<JsonRpcResponse> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }

        match serde_json::from_str::<JsonRpcMessage>(line) {
            Ok(msg) => self.handle_message(msg),
            Err(e) => {
                error!("invalid JSON-RPC: {e}");
                Some(JsonRpcResponse::err(
                    Value::Null,
                    PARSE_ERROR,
                    format!("parse error: {e}"),
                ))
            }
        }
    }

    pub fn handle_message(&self, msg: JsonRpcMessage) -> Option<JsonRpcResponse> {
        let method = msg.method.as_deref().unwrap_or("");
        debug!("MCP request: {method}");

        // Notifications have no id, don't respond
        let id = msg.id?;

        Some(match method {
            "initialize" => self.handle_initialize(id),
            "ping" => JsonRpcResponse::ok(id, json!({})),
            "tools/list" => {
                JsonRpcResponse::ok(id, self.dispatcher.catalog().tool_definitions())
            }
            "tools/call" => self.handle_tools_call(id, &msg.params),
            "resources/list" => JsonRpcResponse::ok(
                id,
                resources::resource_definitions(self.dispatcher.catalog()),
            ),
            "resources/read" => self.handle_resources_read(id, &msg.params),
            other => JsonRpcResponse::method_not_found(id, other),
        })
    }

    fn handle_initialize(&self, id: Value) -> JsonRpcResponse {
        JsonRpcResponse::ok(
            id,
            json!({
                "protocolVersion": PROTOCOL_VERSION,
                "capabilities": {
                    "tools": {},
                    "resources": {}
                },
                "serverInfo": {
                    "name": self.dispatcher.catalog().server_name,
                    "version": SERVER_VERSION
                },
                "instructions": self.instructions
            }),
        )
    }

    fn handle_tools_call(&self, id: Value, params: &Option<Value>) -> JsonRpcResponse {
        let params = match params {
            Some(p) => p,
            None => return JsonRpcResponse::invalid_params(id, "missing params"),
        };

        let tool_name = match params.get("name").and_then(|v| v.as_str()) {
            Some(n) => n,
            None => return JsonRpcResponse::invalid_params(id, "missing tool name"),
        };

        let result = match self.dispatcher.execute(tool_name, params.get("arguments")) {
            Ok(result) => result,
            Err(e @ TrialError::UnknownTool(_)) => {
                return JsonRpcResponse::invalid_params(id, e.to_string())
            }
            Err(e) => ToolResult::error(e.to_string()),
        };
        JsonRpcResponse::ok(id, serde_json::to_value(result).unwrap_or(json!(null)))
    }

    fn handle_resources_read(&self, id: Value, params: &Option<Value>) -> JsonRpcResponse {
        let uri = match params
            .as_ref()
            .and_then(|p| p.get("uri"))
            .and_then(|v| v.as_str())
        {
            Some(u) => u,
            None => {
                return JsonRpcResponse::invalid_params(
                    id,
                    "resources/read requires string field 'uri'",
                )
            }
        };

        match resources::read_resource(
            self.dispatcher.catalog(),
            self.dispatcher.insights(),
            uri,
        ) {
            Ok(contents) => JsonRpcResponse::ok(id, contents),
            Err(e) => JsonRpcResponse::err(id, RESOURCE_NOT_FOUND, e.to_string()),
        }
    }
}

fn write_response<W: Write>(output: &mut W, resp: &JsonRpcResponse) -> anyhow::Result<()> {
    let json = serde_json::to_string(resp)?;
    writeln!(output, "{json}")?;
    output.flush()?;
    Ok(())
}

/// Run the MCP server on stdio. Blocks until stdin is closed, then releases the backend.
pub fn run_server<B: ToolBackend>(
    dispatcher: Dispatcher<B>,
    instructions: Option<String>,
) -> anyhow::Result<()> {
    let server = McpServer::new(dispatcher, instructions);
    info!("serving {} on stdio", server.dispatcher.catalog().server_name);

    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let result = server.serve(stdin.lock(), &mut stdout);

    server.dispatcher.shutdown();
    result
}
