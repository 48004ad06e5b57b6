//! Line-delimited JSON-RPC over stdio
//!
//! Requests are answered in order. Live events are forwarded to the same
//! output as `notifications/live` messages.

use std::sync::Arc;

use gridlearn_core::{GridLearnError, Result, error_codes};
use serde::Serialize;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::mcp::{
    InitializeParams, InitializeResult, Notification, Request, RequestId, Response,
    ServerCapabilities, ServerInfo, ToolsCapability,
};
use crate::simulation::Simulation;
use crate::tools::{handle_tool_call, list_tools};

const PROTOCOL_VERSION: &str = "2025-11-25";

/// Run the request channel on the process's stdin/stdout
pub async fn run(simulation: Arc<Simulation>) -> Result<()> {
    info!("gridlearn server starting on stdio");
    serve(simulation, tokio::io::stdin(), tokio::io::stdout()).await
}

/// Serve requests from `reader` until EOF, writing responses and live
/// notifications to `writer`
pub async fn serve<R, W>(simulation: Arc<Simulation>, reader: R, writer: W) -> Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let out = Arc::new(Mutex::new(writer));
    let mut reader = BufReader::new(reader);
    let mut line = String::new();

    let observer = simulation.observers().attach();
    let observer_id = observer.id;
    let mut events = observer.events;
    let out_for_events = out.clone();
    let event_task = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            if let Err(e) = write_message(&out_for_events, &Notification::live(&event)).await {
                error!("Failed to write live notification: {}", e);
                break;
            }
        }
        debug!("Live notification forwarder stopped");
    });

    let result = loop {
        line.clear();
        let bytes_read = match reader.read_line(&mut line).await {
            Ok(n) => n,
            Err(e) => break Err(GridLearnError::IpcError(format!("Failed to read stdin: {}", e))),
        };

        if bytes_read == 0 {
            info!("Client disconnected (EOF)");
            break Ok(());
        }

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        debug!("Received: {}", trimmed);

        let request: Request = match serde_json::from_str(trimmed) {
            Ok(r) => r,
            Err(e) => {
                warn!("Failed to parse request: {}", e);
                continue;
            }
        };

        let Some(id) = request.id.clone() else {
            debug!(method = %request.method, "Notification received");
            continue;
        };

        let response = handle_request(&request, id, &simulation).await;
        if let Err(e) = write_message(&out, &response).await {
            break Err(e);
        }
    };

    simulation.observers().detach(observer_id);
    event_task.abort();
    simulation.pause().await;
    result
}

async fn write_message<W, T>(out: &Mutex<W>, message: &T) -> Result<()>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let json = serde_json::to_string(message)?;
    debug!("Sending: {}", json);

    let mut out = out.lock().await;
    out.write_all(json.as_bytes())
        .await
        .map_err(|e| GridLearnError::IpcError(format!("Failed to write: {}", e)))?;
    out.write_all(b"\n")
        .await
        .map_err(|e| GridLearnError::IpcError(format!("Failed to write newline: {}", e)))?;
    out.flush()
        .await
        .map_err(|e| GridLearnError::IpcError(format!("Failed to flush: {}", e)))
}

/// Dispatch one JSON-RPC request
pub async fn handle_request(request: &Request, id: RequestId, simulation: &Simulation) -> Response {
    match request.method.as_str() {
        "initialize" => handle_initialize(request, id),
        "ping" => Response::success(id, serde_json::json!({})),
        "tools/list" => Response::success(id, serde_json::json!({ "tools": list_tools() })),
        "tools/call" => handle_tools_call(request, id, simulation).await,
        _ => Response::error(
            id,
            error_codes::METHOD_NOT_FOUND,
            format!("Method not found: {}", request.method),
        ),
    }
}

fn handle_initialize(request: &Request, id: RequestId) -> Response {
    let params: InitializeParams = if request.params.is_null() {
        InitializeParams::default()
    } else {
        match serde_json::from_value(request.params.clone()) {
            Ok(p) => p,
            Err(e) => {
                return Response::error(
                    id,
                    error_codes::INVALID_PARAMS,
                    format!("Invalid initialize params: {}", e),
                );
            }
        }
    };
    if let Some(client) = &params.client_info {
        info!(client = %client.name, version = %client.version, "Client connected");
    }

    let result = InitializeResult {
        protocol_version: PROTOCOL_VERSION.to_string(),
        capabilities: ServerCapabilities {
            tools: ToolsCapability {
                list_changed: false,
            },
            logging: serde_json::json!({}),
        },
        server_info: ServerInfo {
            name: env!("CARGO_PKG_NAME").to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        },
    };

    match serde_json::to_value(result) {
        Ok(value) => Response::success(id, value),
        Err(e) => Response::error(id, error_codes::INTERNAL, e.to_string()),
    }
}

async fn handle_tools_call(request: &Request, id: RequestId, simulation: &Simulation) -> Response {
    #[derive(serde::Deserialize)]
    struct ToolCallParams {
        name: String,
        #[serde(default)]
        arguments: serde_json::Value,
    }

    let params: ToolCallParams = match serde_json::from_value(request.params.clone()) {
        Ok(p) => p,
        Err(e) => {
            return Response::error(
                id,
                error_codes::INVALID_PARAMS,
                format!("Invalid tool call params: {}", e),
            );
        }
    };

    handle_tool_call(&params.name, params.arguments, id, simulation).await
}
