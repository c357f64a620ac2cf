//! Tool server - TCP transport, JSON-RPC 2.0, newline-delimited.
//!
//! Every accepted connection is one session, served on its own task.
//!
//! Protocol flow per session:
//! 1. Client sends `initialize` → server responds with capabilities
//! 2. Client sends `notifications/initialized`
//! 3. Client sends `tools/list` → server returns tool descriptors
//! 4. Client sends `tools/call` → server executes tool and returns result
//! 5. Client closes the connection → session ends

use std::sync::Arc;

use anyhow::{Context, Result};
use futures::{SinkExt, StreamExt};
use serde::Serialize;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpListener;
use tokio_util::codec::{Framed, LinesCodec, LinesCodecError};
use tracing::{debug, error, info, warn};

use crate::config::ToolServerConfig;
use crate::protocol::{
    INTERNAL_ERROR, INVALID_PARAMS, INVALID_REQUEST, Implementation, InitializeResult,
    JsonRpcRequest, JsonRpcResponse, MAX_LINE_BYTES, METHOD_NOT_FOUND, PARSE_ERROR,
    PROTOCOL_VERSION, ServerCapabilities, ToolCallParams, ToolCallResult, ToolsCapability,
    ToolsListResult,
};
use crate::tools::ToolRouter;

/// Name announced in `initialize`.
pub const SERVER_NAME: &str = "AssistantCodeReader";

/// Bind the configured address and serve until the process exits.
pub async fn run_tool_server(config: ToolServerConfig) -> Result<()> {
    let listener = TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;

    info!(
        addr = %config.bind_addr,
        root = %config.root.display(),
        "tool server listening"
    );

    serve(listener, ToolRouter::new(config.root)).await
}

/// Accept connections on `listener`, one session task per connection.
pub async fn serve(listener: TcpListener, router: ToolRouter) -> Result<()> {
    let router = Arc::new(router);

    loop {
        let (stream, peer) = match listener.accept().await {
            Ok(conn) => conn,
            Err(e) => {
                // Per-connection failures (e.g. EMFILE) must not stop the listener.
                warn!(error = %e, "failed to accept connection");
                continue;
            }
        };

        debug!(%peer, "session opened");
        let router = Arc::clone(&router);
        tokio::spawn(async move {
            match serve_connection(stream, &router).await {
                Ok(()) => debug!(%peer, "session closed"),
                Err(e) => warn!(%peer, error = %e, "session ended with error"),
            }
        });
    }
}

/// Serve a single session over any byte stream.
///
/// Returns when the peer closes the stream.
pub async fn serve_connection<S>(io: S, router: &ToolRouter) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut framed = Framed::new(io, LinesCodec::new_with_max_length(MAX_LINE_BYTES));

    while let Some(line) = framed.next().await {
        let line = match line {
            Ok(line) => line,
            Err(LinesCodecError::MaxLineLengthExceeded) => {
                // The codec discards the rest of the oversized line on its own.
                warn!(max = MAX_LINE_BYTES, "request line too long");
                let resp = JsonRpcResponse::error(
                    None,
                    PARSE_ERROR,
                    &format!("line exceeds maximum size ({MAX_LINE_BYTES} bytes)"),
                );
                write_response(&mut framed, &resp).await?;
                continue;
            }
            Err(LinesCodecError::Io(e)) => return Err(e).context("failed to read request"),
        };

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        debug!(raw = trimmed, "received request");

        let request: JsonRpcRequest = match serde_json::from_str(trimmed) {
            Ok(r) => r,
            Err(e) => {
                warn!(error = %e, "invalid JSON-RPC request");
                let resp = JsonRpcResponse::error(None, PARSE_ERROR, &format!("parse error: {e}"));
                write_response(&mut framed, &resp).await?;
                continue;
            }
        };

        if request.jsonrpc != "2.0" {
            warn!(
                version = request.jsonrpc,
                "invalid JSON-RPC version (expected \"2.0\")"
            );
            let resp = JsonRpcResponse::error(
                request.id.clone(),
                INVALID_REQUEST,
                &format!(
                    "invalid request: jsonrpc version must be \"2.0\", got \"{}\"",
                    request.jsonrpc
                ),
            );
            write_response(&mut framed, &resp).await?;
            continue;
        }

        let is_notification = request.id.is_none();
        let response = dispatch(router, &request).await;

        // Notifications never receive a response.
        if is_notification {
            debug!(method = request.method, "notification handled (no response)");
            continue;
        }

        if let Some(resp) = response {
            write_response(&mut framed, &resp).await?;
        }
    }

    Ok(())
}

/// Dispatch a JSON-RPC request to the appropriate handler.
pub async fn dispatch(router: &ToolRouter, req: &JsonRpcRequest) -> Option<JsonRpcResponse> {
    match req.method.as_str() {
        "initialize" => Some(handle_initialize(req)),
        "notifications/initialized" => {
            info!("client initialized");
            None
        }
        "tools/list" => Some(handle_tools_list(router, req)),
        "tools/call" => Some(handle_tools_call(router, req).await),
        "ping" => Some(success_response(req.id.clone(), &serde_json::json!({}))),
        _ => {
            warn!(method = req.method, "unknown method");
            Some(JsonRpcResponse::error(
                req.id.clone(),
                METHOD_NOT_FOUND,
                &format!("method not found: {}", req.method),
            ))
        }
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

fn handle_initialize(req: &JsonRpcRequest) -> JsonRpcResponse {
    let result = InitializeResult {
        protocol_version: PROTOCOL_VERSION.to_owned(),
        capabilities: ServerCapabilities {
            tools: ToolsCapability {
                list_changed: false,
            },
        },
        server_info: Implementation {
            name: SERVER_NAME.to_owned(),
            version: env!("CARGO_PKG_VERSION").to_owned(),
        },
    };

    success_response(req.id.clone(), &result)
}

fn handle_tools_list(router: &ToolRouter, req: &JsonRpcRequest) -> JsonRpcResponse {
    let result = ToolsListResult {
        tools: router.list_tools(),
    };
    success_response(req.id.clone(), &result)
}

async fn handle_tools_call(router: &ToolRouter, req: &JsonRpcRequest) -> JsonRpcResponse {
    let params: ToolCallParams = match serde_json::from_value(req.params.clone()) {
        Ok(p) => p,
        Err(e) => {
            return JsonRpcResponse::error(
                req.id.clone(),
                INVALID_PARAMS,
                &format!("invalid tools/call params: {e}"),
            );
        }
    };

    let result = match router.call_tool(&params.name, params.arguments).await {
        Ok(result) => result,
        Err(e) => {
            error!(tool = params.name, error = %e, "tool call failed");
            ToolCallResult::failure(format!("Error: {e:#}"))
        }
    };
    success_response(req.id.clone(), &fit_on_line(&params.name, result))
}

/// Bytes kept free on a line for the JSON-RPC envelope around a result.
const ENVELOPE_HEADROOM: usize = 4 * 1024;

/// Swap a result that cannot fit on one protocol line for an `Error:` text.
fn fit_on_line(tool: &str, result: ToolCallResult) -> ToolCallResult {
    let limit = MAX_LINE_BYTES - ENVELOPE_HEADROOM;
    let size = serde_json::to_string(&result).map_or(0, |encoded| encoded.len());
    if size <= limit {
        return result;
    }

    warn!(tool, size, limit, "tool output too large for one response line");
    ToolCallResult::text(format!(
        "Error: output of '{tool}' is too large to return ({size} bytes encoded, limit {limit} bytes)."
    ))
}

// ---------------------------------------------------------------------------
// Response helpers
// ---------------------------------------------------------------------------

fn success_response(id: Option<serde_json::Value>, result: &impl Serialize) -> JsonRpcResponse {
    match serde_json::to_value(result) {
        Ok(v) => JsonRpcResponse::success(id, v),
        Err(e) => {
            error!(error = %e, "failed to serialize success response");
            JsonRpcResponse::error(
                id,
                INTERNAL_ERROR,
                &format!("internal error: failed to serialize result: {e}"),
            )
        }
    }
}

/// Write a JSON-RPC response as a single line.
async fn write_response<S>(
    framed: &mut Framed<S, LinesCodec>,
    resp: &JsonRpcResponse,
) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let json = serde_json::to_string(resp).context("failed to serialize response")?;
    debug!(response = json, "sending response");
    framed
        .send(json)
        .await
        .context("failed to write response")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn request(id: u64, method: &str, params: serde_json::Value) -> JsonRpcRequest {
        JsonRpcRequest::new(id, method, params)
    }

    #[tokio::test]
    async fn test_initialize_announces_server() {
        let router = ToolRouter::new(".".into());
        let resp = dispatch(&router, &request(1, "initialize", json!({})))
            .await
            .expect("response");
        let result = resp.result.expect("result");
        assert_eq!(result["serverInfo"]["name"], SERVER_NAME);
        assert_eq!(result["protocolVersion"], PROTOCOL_VERSION);
    }

    #[tokio::test]
    async fn test_initialized_notification_has_no_response() {
        let router = ToolRouter::new(".".into());
        let req = JsonRpcRequest::notification("notifications/initialized");
        assert!(dispatch(&router, &req).await.is_none());
    }

    #[tokio::test]
    async fn test_unknown_method() {
        let router = ToolRouter::new(".".into());
        let resp = dispatch(&router, &request(3, "resources/list", json!({})))
            .await
            .expect("response");
        assert_eq!(resp.error.expect("error").code, METHOD_NOT_FOUND);
    }

    #[tokio::test]
    async fn test_bad_call_params() {
        let router = ToolRouter::new(".".into());
        let resp = dispatch(&router, &request(4, "tools/call", json!({"arguments": {}})))
            .await
            .expect("response");
        assert_eq!(resp.error.expect("error").code, INVALID_PARAMS);
    }

    #[tokio::test]
    async fn test_bad_tool_arguments_become_is_error_result() {
        let router = ToolRouter::new(".".into());
        let resp = dispatch(
            &router,
            &request(5, "tools/call", json!({"name": "read_file", "arguments": {}})),
        )
        .await
        .expect("response");
        let result = resp.result.expect("result");
        assert_eq!(result["isError"], true);
        let text = result["content"][0]["text"].as_str().expect("text");
        assert!(text.starts_with("Error: invalid read_file parameters"));
    }

    #[tokio::test]
    async fn test_oversized_output_becomes_error_text() {
        let dir = tempfile::tempdir().expect("tempdir");
        let big = "a".repeat(MAX_LINE_BYTES + 1024 * 1024);
        std::fs::write(dir.path().join("big.txt"), &big).expect("write");
        let router = ToolRouter::new(dir.path().to_path_buf());

        let resp = dispatch(
            &router,
            &request(6, "tools/call", json!({"name": "read_file", "arguments": {"file_path": "big.txt"}})),
        )
        .await
        .expect("response");

        let line = serde_json::to_string(&resp).expect("serialize");
        assert!(line.len() < MAX_LINE_BYTES);
        let result: ToolCallResult = serde_json::from_value(resp.result.expect("result")).expect("result");
        assert!(!result.is_error);
        let text = result.joined_text();
        assert!(text.starts_with("Error: output of 'read_file' is too large"), "got {text}");
    }

    #[test]
    fn test_small_output_passes_through() {
        let result = fit_on_line("read_file", ToolCallResult::text("short"));
        assert_eq!(result.joined_text(), "short");
    }

    #[tokio::test]
    async fn test_session_over_duplex_stream() {
        use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join("hello.txt"), "hi there").expect("write");
        let router = ToolRouter::new(dir.path().to_path_buf());

        let (client, server) = tokio::io::duplex(64 * 1024);
        let session = tokio::spawn(async move { serve_connection(server, &router).await });

        let (read_half, mut write_half) = tokio::io::split(client);
        let mut lines = BufReader::new(read_half).lines();

        write_half
            .write_all(b"not json\n")
            .await
            .expect("write");
        let line = lines.next_line().await.expect("read").expect("line");
        assert!(line.contains("-32700"));

        let call = json!({
            "jsonrpc": "2.0",
            "id": 7,
            "method": "tools/call",
            "params": {"name": "read_file", "arguments": {"file_path": "hello.txt"}}
        });
        write_half
            .write_all(format!("{call}\n").as_bytes())
            .await
            .expect("write");
        let line = lines.next_line().await.expect("read").expect("line");
        let resp: JsonRpcResponse = serde_json::from_str(&line).expect("parse");
        assert_eq!(resp.id, Some(json!(7)));
        assert_eq!(resp.result.expect("result")["content"][0]["text"], "hi there");

        drop(write_half);
        drop(lines);
        session.await.expect("join").expect("session");
    }
}
