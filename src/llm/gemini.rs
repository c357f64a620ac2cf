//! Google Gemini `generateContent` client (non-streaming, function calling).
//!
//! Translates between the crate's [`Message`] trace and Gemini's
//! `contents`/`parts` format. Gemini assigns no ids to function calls, so
//! ids are synthesized per turn as `call_<n>`.

use std::time::Instant;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, instrument};

use crate::error::{AssistantError, AssistantResult};
use crate::llm::{ChatModel, Message, Role, ToolCall, create_http_client};
use crate::protocol::ToolDescriptor;

const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";

/// Schema keywords the function-declaration endpoint rejects.
const UNSUPPORTED_SCHEMA_KEYS: &[&str] = &["$schema", "additionalProperties", "default", "title"];

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<GeminiTool>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Content {
    #[serde(default)]
    role: String,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    function_call: Option<FunctionCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    function_response: Option<FunctionResponse>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    thought: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct FunctionCall {
    name: String,
    #[serde(default)]
    args: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct FunctionResponse {
    name: String,
    response: Value,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiTool {
    function_declarations: Vec<FunctionDeclaration>,
}

#[derive(Debug, Serialize)]
struct FunctionDeclaration {
    name: String,
    description: String,
    parameters: Value,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    temperature: f32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    prompt_feedback: Option<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
    #[serde(default)]
    finish_reason: Option<String>,
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Google Gemini API client.
pub struct GeminiClient {
    api_key: String,
    model: String,
    base_url: String,
    temperature: f32,
    http: reqwest::Client,
}

impl GeminiClient {
    /// Client at temperature 0 against the public endpoint.
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self::with_http_client(api_key, model, create_http_client())
    }

    pub fn with_http_client(
        api_key: impl Into<String>,
        model: impl Into<String>,
        http: reqwest::Client,
    ) -> Self {
        Self {
            api_key: api_key.into(),
            model: model.into(),
            base_url: GEMINI_API_BASE.to_owned(),
            temperature: 0.0,
            http,
        }
    }

    /// Point the client at another models endpoint (proxies, tests).
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_owned();
        self
    }

    fn endpoint(&self) -> String {
        format!("{}/{}:generateContent", self.base_url, self.model)
    }
}

impl std::fmt::Debug for GeminiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiClient")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("temperature", &self.temperature)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl ChatModel for GeminiClient {
    fn model_name(&self) -> &str {
        &self.model
    }

    #[instrument(skip_all, fields(model = %self.model, message_count = messages.len()))]
    async fn chat(
        &self,
        messages: &[Message],
        tools: &[ToolDescriptor],
    ) -> AssistantResult<Message> {
        let start = Instant::now();
        let request = GenerateContentRequest {
            contents: convert_messages(messages),
            tools: convert_tools(tools),
            generation_config: GenerationConfig {
                temperature: self.temperature,
            },
        };

        debug!(tool_count = tools.len(), "sending Gemini request");

        let response = self
            .http
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| AssistantError::Llm(format!("Gemini request failed: {e}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| AssistantError::Llm(format!("failed to read Gemini response: {e}")))?;

        if !status.is_success() {
            return Err(AssistantError::Llm(format!(
                "Gemini API returned {status}: {body}"
            )));
        }

        let data: GenerateContentResponse = serde_json::from_str(&body)
            .map_err(|e| AssistantError::Llm(format!("failed to parse Gemini response: {e}")))?;
        let message = into_message(data)?;

        info!(
            duration_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX),
            tool_calls = message.tool_calls.len(),
            content_len = message.content.as_ref().map_or(0, String::len),
            "Gemini chat completed"
        );

        Ok(message)
    }
}

// ---------------------------------------------------------------------------
// Conversion
// ---------------------------------------------------------------------------

/// Convert the trace to Gemini contents. Consecutive tool results are
/// grouped into one `user` turn, answering the preceding model turn.
fn convert_messages(messages: &[Message]) -> Vec<Content> {
    let mut contents: Vec<Content> = Vec::new();

    for msg in messages {
        match msg.role {
            Role::Human => contents.push(Content {
                role: "user".to_owned(),
                parts: vec![text_part(msg.content.clone().unwrap_or_default())],
            }),
            Role::Ai => {
                let mut parts = Vec::new();
                if let Some(text) = msg.content.as_ref().filter(|t| !t.is_empty()) {
                    parts.push(text_part(text.clone()));
                }
                for call in &msg.tool_calls {
                    parts.push(Part {
                        function_call: Some(FunctionCall {
                            name: call.name.clone(),
                            args: call.arguments.clone(),
                        }),
                        ..Part::default()
                    });
                }
                if parts.is_empty() {
                    parts.push(text_part(String::new()));
                }
                contents.push(Content {
                    role: "model".to_owned(),
                    parts,
                });
            }
            Role::Tool => {
                let part = Part {
                    function_response: Some(FunctionResponse {
                        name: msg.name.clone().unwrap_or_else(|| "unknown".to_owned()),
                        response: response_object(msg.content.as_deref().unwrap_or("")),
                    }),
                    ..Part::default()
                };
                match contents.last_mut() {
                    Some(last) if is_function_response_turn(last) => last.parts.push(part),
                    _ => contents.push(Content {
                        role: "user".to_owned(),
                        parts: vec![part],
                    }),
                }
            }
        }
    }

    contents
}

fn is_function_response_turn(content: &Content) -> bool {
    content.role == "user"
        && !content.parts.is_empty()
        && content.parts.iter().all(|p| p.function_response.is_some())
}

fn text_part(text: String) -> Part {
    Part {
        text: Some(text),
        ..Part::default()
    }
}

/// Gemini needs `functionResponse.response` to be a JSON object.
fn response_object(content: &str) -> Value {
    match serde_json::from_str::<Value>(content) {
        Ok(Value::Object(obj)) => Value::Object(obj),
        _ => serde_json::json!({ "result": content }),
    }
}

fn convert_tools(tools: &[ToolDescriptor]) -> Vec<GeminiTool> {
    if tools.is_empty() {
        return Vec::new();
    }

    let function_declarations = tools
        .iter()
        .map(|t| {
            let mut parameters = t.input_schema.clone();
            sanitize_schema(&mut parameters);
            FunctionDeclaration {
                name: t.name.clone(),
                description: t.description.clone(),
                parameters,
            }
        })
        .collect();

    vec![GeminiTool {
        function_declarations,
    }]
}

fn sanitize_schema(schema: &mut Value) {
    match schema {
        Value::Object(map) => {
            for key in UNSUPPORTED_SCHEMA_KEYS {
                map.remove(*key);
            }
            for value in map.values_mut() {
                sanitize_schema(value);
            }
        }
        Value::Array(items) => items.iter_mut().for_each(sanitize_schema),
        _ => {}
    }
}

/// First candidate → AI message (visible text + function calls).
fn into_message(response: GenerateContentResponse) -> AssistantResult<Message> {
    let Some(candidate) = response.candidates.into_iter().next() else {
        let feedback = response
            .prompt_feedback
            .map_or_else(|| "none".to_owned(), |f| f.to_string());
        return Err(AssistantError::Llm(format!(
            "Gemini returned no candidates (prompt feedback: {feedback})"
        )));
    };

    let parts = candidate.content.map(|c| c.parts).unwrap_or_default();
    if parts.is_empty() {
        debug!(finish_reason = ?candidate.finish_reason, "Gemini candidate has no parts");
    }

    let text: Vec<&str> = parts
        .iter()
        .filter(|p| !p.thought)
        .filter_map(|p| p.text.as_deref())
        .collect();
    let content = if text.is_empty() {
        None
    } else {
        Some(text.concat())
    };

    let tool_calls = parts
        .iter()
        .filter_map(|p| p.function_call.as_ref())
        .enumerate()
        .map(|(idx, call)| ToolCall {
            id: format!("call_{idx}"),
            name: call.name.clone(),
            arguments: call.args.clone(),
        })
        .collect();

    Ok(Message::ai_with_tool_calls(content, tool_calls))
}
