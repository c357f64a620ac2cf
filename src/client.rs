//! Tool client - opens a session against the tool service, discovers its
//! tools and forwards calls made by the reasoning loop.
//!
//! A [`ToolSession`] owns the TCP transport. Calling [`ToolSession::close`]
//! shuts it down gracefully; dropping the session releases it as well, so
//! the transport never outlives the request that opened it.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_util::codec::{Framed, LinesCodec, LinesCodecError};
use tracing::{debug, info, warn};

use crate::agent::ToolProvider;
use crate::error::{AssistantError, AssistantResult};
use crate::protocol::{
    INVALID_REQUEST, Implementation, InitializeParams, InitializeResult, JsonRpcRequest,
    JsonRpcResponse, MAX_LINE_BYTES, PARSE_ERROR, PROTOCOL_VERSION, ToolCallParams,
    ToolCallResult, ToolDescriptor, ToolsListResult,
};

/// Deadline for establishing the TCP connection.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Connection settings for the tool service.
#[derive(Debug, Clone)]
pub struct ToolClient {
    endpoint: String,
    connect_timeout: Duration,
}

impl ToolClient {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }

    #[must_use]
    pub const fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Open a session: connect, handshake, discover tools.
    ///
    /// # Errors
    ///
    /// [`AssistantError::ServiceUnavailable`] if the endpoint cannot be
    /// reached; [`AssistantError::Protocol`] if the handshake fails.
    pub async fn connect(&self) -> AssistantResult<ToolSession> {
        info!(endpoint = %self.endpoint, "connecting to tool service");

        let stream = match tokio::time::timeout(
            self.connect_timeout,
            TcpStream::connect(&self.endpoint),
        )
        .await
        {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => return Err(self.unavailable(e.to_string())),
            Err(_) => {
                return Err(self.unavailable(format!(
                    "connect timed out after {}s",
                    self.connect_timeout.as_secs()
                )));
            }
        };

        let mut session = ToolSession {
            endpoint: self.endpoint.clone(),
            framed: Mutex::new(Framed::new(
                stream,
                LinesCodec::new_with_max_length(MAX_LINE_BYTES),
            )),
            next_id: AtomicU64::new(1),
            server_info: None,
            tools: Vec::new(),
        };

        session.initialize().await?;
        session.tools = session.list_tools().await?;

        let names: Vec<&str> = session.tools.iter().map(|t| t.name.as_str()).collect();
        info!(endpoint = %self.endpoint, tools = ?names, "tool session established");
        if session.tools.is_empty() {
            warn!("no tools retrieved from the tool service; agent capabilities will be limited");
        }

        Ok(session)
    }

    fn unavailable(&self, reason: String) -> AssistantError {
        warn!(endpoint = %self.endpoint, reason = %reason, "tool service unreachable");
        AssistantError::ServiceUnavailable {
            endpoint: self.endpoint.clone(),
            reason,
        }
    }
}

/// An open session with the tool service.
pub struct ToolSession {
    endpoint: String,
    framed: Mutex<Framed<TcpStream, LinesCodec>>,
    next_id: AtomicU64,
    server_info: Option<Implementation>,
    tools: Vec<ToolDescriptor>,
}

impl std::fmt::Debug for ToolSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolSession")
            .field("endpoint", &self.endpoint)
            .field("server_info", &self.server_info)
            .field("tools", &self.tools.len())
            .finish_non_exhaustive()
    }
}

impl ToolSession {
    pub fn tools(&self) -> &[ToolDescriptor] {
        &self.tools
    }

    pub const fn server_info(&self) -> Option<&Implementation> {
        self.server_info.as_ref()
    }

    /// Shut the transport down. Errors are logged, not returned.
    pub async fn close(self) {
        let mut stream = self.framed.into_inner().into_inner();
        if let Err(e) = stream.shutdown().await {
            debug!(endpoint = %self.endpoint, error = %e, "tool session shutdown failed");
        } else {
            debug!(endpoint = %self.endpoint, "tool session closed");
        }
    }

    async fn initialize(&mut self) -> AssistantResult<()> {
        let params = InitializeParams {
            protocol_version: PROTOCOL_VERSION.to_owned(),
            capabilities: serde_json::json!({}),
            client_info: Implementation {
                name: env!("CARGO_PKG_NAME").to_owned(),
                version: env!("CARGO_PKG_VERSION").to_owned(),
            },
        };

        let result = self
            .request("initialize", serde_json::to_value(params)?)
            .await?;
        let init: InitializeResult = serde_json::from_value(result)
            .map_err(|e| AssistantError::Protocol(format!("invalid initialize result: {e}")))?;
        debug!(
            server = init.server_info.name,
            protocol = init.protocol_version,
            "tool service initialized"
        );
        self.server_info = Some(init.server_info);

        self.send(&JsonRpcRequest::notification("notifications/initialized"))
            .await
    }

    async fn list_tools(&self) -> AssistantResult<Vec<ToolDescriptor>> {
        let result = self.request("tools/list", serde_json::json!({})).await?;
        let list: ToolsListResult = serde_json::from_value(result)
            .map_err(|e| AssistantError::Protocol(format!("invalid tools/list result: {e}")))?;
        Ok(list.tools)
    }

    /// Request whose JSON-RPC error is itself a protocol fault.
    async fn request(
        &self,
        method: &str,
        params: serde_json::Value,
    ) -> AssistantResult<serde_json::Value> {
        let resp = self.roundtrip(method, params).await?;
        if let Some(err) = resp.error {
            return Err(AssistantError::Protocol(format!(
                "{method} failed ({}): {}",
                err.code, err.message
            )));
        }
        resp.result
            .ok_or_else(|| AssistantError::Protocol(format!("{method} returned no result")))
    }

    async fn roundtrip(
        &self,
        method: &str,
        params: serde_json::Value,
    ) -> AssistantResult<JsonRpcResponse> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let req = JsonRpcRequest::new(id, method, params);
        let line = serde_json::to_string(&req)?;

        // The service would reject it without an id to match on.
        if line.len() > MAX_LINE_BYTES {
            warn!(method, id, bytes = line.len(), "request too large to send");
            return Ok(JsonRpcResponse::error(
                Some(serde_json::Value::from(id)),
                INVALID_REQUEST,
                &format!(
                    "{method} request is too large ({} bytes, limit {MAX_LINE_BYTES} bytes)",
                    line.len()
                ),
            ));
        }

        let mut framed = self.framed.lock().await;
        debug!(method, id, "sending tool request");
        framed
            .send(line)
            .await
            .map_err(|e| AssistantError::Protocol(format!("failed to send {method}: {e}")))?;

        loop {
            let line = match framed.next().await {
                Some(Ok(line)) => line,
                // The codec skips the rest of the line; the session stays usable.
                Some(Err(LinesCodecError::MaxLineLengthExceeded)) => {
                    warn!(method, id, max = MAX_LINE_BYTES, "response line too long");
                    return Ok(JsonRpcResponse::error(
                        Some(serde_json::Value::from(id)),
                        PARSE_ERROR,
                        &format!("{method} response exceeds {MAX_LINE_BYTES} bytes"),
                    ));
                }
                Some(Err(e)) => {
                    return Err(AssistantError::Protocol(format!(
                        "failed to read {method} response: {e}"
                    )));
                }
                None => {
                    return Err(AssistantError::Protocol(format!(
                        "tool service closed the session during {method}"
                    )));
                }
            };

            if line.trim().is_empty() {
                continue;
            }

            let resp: JsonRpcResponse = serde_json::from_str(&line).map_err(|e| {
                AssistantError::Protocol(format!("malformed {method} response: {e}"))
            })?;

            if resp.id == Some(serde_json::Value::from(id)) {
                return Ok(resp);
            }
            // Id-less errors answer a request the service could not parse;
            // only one request is ever in flight.
            if resp.id.is_none() && resp.error.is_some() {
                warn!(method, id, "tool service rejected request without an id");
                return Ok(resp);
            }
            debug!(method, id, other = ?resp.id, "skipping unrelated message");
        }
    }

    async fn send(&self, req: &JsonRpcRequest) -> AssistantResult<()> {
        let line = serde_json::to_string(req)?;
        self.framed
            .lock()
            .await
            .send(line)
            .await
            .map_err(|e| AssistantError::Protocol(format!("failed to send {}: {e}", req.method)))
    }
}

#[async_trait]
impl ToolProvider for ToolSession {
    fn descriptors(&self) -> &[ToolDescriptor] {
        &self.tools
    }

    /// Invoke a tool. Tool-level and JSON-RPC-level failures come back as
    /// `Error:` text; only a broken transport is an `Err`.
    async fn call_tool(&self, name: &str, arguments: serde_json::Value) -> AssistantResult<String> {
        let params = ToolCallParams {
            name: name.to_owned(),
            arguments,
        };
        let resp = self
            .roundtrip("tools/call", serde_json::to_value(params)?)
            .await?;

        if let Some(err) = resp.error {
            warn!(tool = name, code = err.code, message = %err.message, "tool call rejected");
            return Ok(format!("Error: {}", err.message));
        }

        let Some(result) = resp.result else {
            return Ok(format!("Error: tool '{name}' returned no result"));
        };

        match serde_json::from_value::<ToolCallResult>(result) {
            Ok(result) => {
                if result.is_error {
                    debug!(tool = name, "tool reported an error result");
                }
                Ok(result.joined_text())
            }
            Err(e) => Ok(format!("Error: tool '{name}' returned an unreadable result: {e}")),
        }
    }
}
