//! Stdio MCP server loop.
//!
//! Reads newline-delimited JSON-RPC requests, dispatches them, and writes
//! newline-delimited responses. One dedicated writer task owns the output
//! stream and serializes responses from concurrently running tool calls;
//! the reader loop never blocks on a slow handler.
//!
//! Tool-level failures are reports inside a successful `tools/call`
//! response. JSON-RPC errors are reserved for protocol problems: unparsable
//! lines, unknown methods, malformed params.
//!
//! Shutdown: EOF on the input stream ends the loop normally. A write
//! failure on the output stream is a fatal runtime error; the caller maps
//! it to exit code 2.

use std::sync::Arc;

use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::error::{GatewayError, GatewayResult};
use crate::mcp::protocol::{JsonRpcError, JsonRpcRequest, JsonRpcResponse};
use crate::tools::Dispatcher;

/// MCP protocol revision this server implements.
const PROTOCOL_VERSION: &str = "2024-11-05";

/// Capacity of the response channel between handlers and the writer task.
const WRITER_QUEUE: usize = 32;

/// The stdio MCP server.
pub struct McpServer {
    dispatcher: Arc<Dispatcher>,
}

impl McpServer {
    /// Creates a server over a fully-built dispatcher.
    #[must_use]
    pub fn new(dispatcher: Dispatcher) -> Self {
        Self {
            dispatcher: Arc::new(dispatcher),
        }
    }

    /// Serves on stdin/stdout until EOF.
    ///
    /// # Errors
    ///
    /// Returns an error when the output stream fails mid-session.
    pub async fn serve_stdio(self) -> GatewayResult<()> {
        self.run(tokio::io::stdin(), tokio::io::stdout()).await
    }

    /// Serves on arbitrary streams. Tests drive this with in-memory pipes.
    ///
    /// # Errors
    ///
    /// Returns an error when reading a request line fails (other than EOF)
    /// or the output stream fails mid-session.
    pub async fn run<R, W>(self, reader: R, writer: W) -> GatewayResult<()>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (tx, mut rx) = mpsc::channel::<String>(WRITER_QUEUE);

        let writer_task = tokio::spawn(async move {
            let mut writer = writer;
            while let Some(line) = rx.recv().await {
                if let Err(e) = write_line(&mut writer, &line).await {
                    warn!(error = %e, "output stream failed");
                    return Err(());
                }
            }
            let _ = writer.flush().await;
            Ok(())
        });

        let mut lines = BufReader::new(reader).lines();
        loop {
            let line = lines
                .next_line()
                .await
                .map_err(|e| GatewayError::network(format!("input stream error: {e}")))?;
            let Some(line) = line else {
                info!("input stream closed, shutting down");
                break;
            };
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }

            let request: JsonRpcRequest = match serde_json::from_str(trimmed) {
                Ok(request) => request,
                Err(e) => {
                    debug!(error = %e, "unparsable request line");
                    let response =
                        JsonRpcResponse::new_error(None, JsonRpcError::parse_error());
                    send_response(&tx, &response).await;
                    continue;
                }
            };

            if request.is_notification() {
                debug!(method = request.method(), "notification ignored");
                continue;
            }

            if request.method() == "tools/call" {
                // tools/call can run long; each invocation gets its own
                // task so calls overlap and responses flow as they finish.
                let dispatcher = Arc::clone(&self.dispatcher);
                let tx = tx.clone();
                tokio::spawn(async move {
                    let response = handle_tool_call(&dispatcher, &request).await;
                    send_response(&tx, &response).await;
                });
            } else {
                let response = self.handle_inline(&request);
                send_response(&tx, &response).await;
            }
        }

        // Closing our sender lets the writer drain in-flight responses.
        drop(tx);
        match writer_task.await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(())) => Err(GatewayError::network(
                "output stream closed unexpectedly",
            )),
            Err(e) => Err(GatewayError::network(format!("writer task failed: {e}"))),
        }
    }

    /// Handles the quick, non-spawning methods.
    fn handle_inline(&self, request: &JsonRpcRequest) -> JsonRpcResponse {
        let id = request.id().cloned().unwrap_or(Value::Null);
        match request.method() {
            "initialize" => JsonRpcResponse::success(
                id,
                json!({
                    "protocolVersion": PROTOCOL_VERSION,
                    "capabilities": {
                        "tools": { "listChanged": false },
                        "logging": {},
                    },
                    "serverInfo": {
                        "name": "centra",
                        "version": env!("CARGO_PKG_VERSION"),
                    },
                }),
            ),
            "ping" => JsonRpcResponse::success(id, json!({})),
            "tools/list" => {
                let tools = self.dispatcher.list_tools();
                JsonRpcResponse::success(id, json!({ "tools": tools }))
            }
            other => {
                JsonRpcResponse::new_error(Some(id), JsonRpcError::method_not_found(other))
            }
        }
    }
}

/// Handles one `tools/call` request.
async fn handle_tool_call(dispatcher: &Dispatcher, request: &JsonRpcRequest) -> JsonRpcResponse {
    let id = request.id().cloned().unwrap_or(Value::Null);

    let Some(name) = request.params().get("name").and_then(Value::as_str) else {
        return JsonRpcResponse::new_error(
            Some(id),
            JsonRpcError::invalid_params("missing tool name"),
        );
    };
    let arguments = match request.params().get("arguments") {
        None | Some(Value::Null) => serde_json::Map::new(),
        Some(Value::Object(map)) => map.clone(),
        Some(_) => {
            return JsonRpcResponse::new_error(
                Some(id),
                JsonRpcError::invalid_params("arguments must be an object"),
            );
        }
    };

    let report = dispatcher.call_tool(name, arguments).await;
    JsonRpcResponse::success(
        id,
        json!({
            "content": [{ "type": "text", "text": report.as_str() }],
        }),
    )
}

/// Sends one response line; send failures mean the writer already died and
/// the reader loop will notice at shutdown.
async fn send_response(tx: &mpsc::Sender<String>, response: &JsonRpcResponse) {
    match serde_json::to_string(response) {
        Ok(line) => {
            let _ = tx.send(line).await;
        }
        Err(e) => warn!(error = %e, "failed to serialize response"),
    }
}

async fn write_line<W: AsyncWrite + Unpin>(writer: &mut W, line: &str) -> std::io::Result<()> {
    writer.write_all(line.as_bytes()).await?;
    writer.write_all(b"\n").await?;
    writer.flush().await
}
