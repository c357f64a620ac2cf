//! Reasoning loop: the model alternates between proposing tool calls and
//! answering, with tool results fed back as messages.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, instrument, warn};

use crate::config::DEFAULT_MAX_ITERATIONS;
use crate::error::{AssistantError, AssistantResult};
use crate::llm::{ChatModel, Message, ToolCall};
use crate::protocol::ToolDescriptor;
use crate::trace::ConversationTrace;

/// Source of callable tools for one run.
#[async_trait]
pub trait ToolProvider: Send + Sync {
    fn descriptors(&self) -> &[ToolDescriptor];

    /// Invoke `name`. Tool failures come back as `Error: ...` text; `Err` is
    /// reserved for a broken transport.
    async fn call_tool(&self, name: &str, arguments: serde_json::Value) -> AssistantResult<String>;
}

/// Runs one message through a tool-using agent and returns the full trace.
#[async_trait]
pub trait ReasoningLoop: Send + Sync {
    async fn run(
        &self,
        message: Message,
        tools: &dyn ToolProvider,
    ) -> AssistantResult<ConversationTrace>;
}

/// Tool-calling loop driven by a [`ChatModel`].
pub struct ReactAgent {
    model: Arc<dyn ChatModel>,
    max_iterations: usize,
}

impl std::fmt::Debug for ReactAgent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReactAgent")
            .field("model", &self.model.model_name())
            .field("max_iterations", &self.max_iterations)
            .finish()
    }
}

impl ReactAgent {
    pub fn new(model: Arc<dyn ChatModel>) -> Self {
        Self {
            model,
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }

    #[must_use]
    pub const fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    async fn execute(&self, call: &ToolCall, tools: &dyn ToolProvider) -> AssistantResult<String> {
        let known = tools.descriptors();
        if !known.iter().any(|t| t.name == call.name) {
            let names: Vec<&str> = known.iter().map(|t| t.name.as_str()).collect();
            warn!(tool = %call.name, "model requested an unknown tool");
            return Ok(format!(
                "Error: {} is not a valid tool, try one of [{}].",
                call.name,
                names.join(", ")
            ));
        }

        debug!(tool = %call.name, args = %call.arguments, "calling tool");
        let output = tools.call_tool(&call.name, call.arguments.clone()).await?;
        debug!(tool = %call.name, bytes = output.len(), "tool returned");
        Ok(output)
    }
}

#[async_trait]
impl ReasoningLoop for ReactAgent {
    #[instrument(skip_all, fields(model = %self.model.model_name(), tools = tools.descriptors().len()))]
    async fn run(
        &self,
        message: Message,
        tools: &dyn ToolProvider,
    ) -> AssistantResult<ConversationTrace> {
        let mut trace = ConversationTrace::new(vec![message]);

        for turn in 1..=self.max_iterations {
            debug!(turn, "model turn");
            let reply = self.model.chat(&trace.messages, tools.descriptors()).await?;

            if reply.tool_calls.is_empty() {
                info!(turns = turn, messages = trace.len() + 1, "agent finished");
                trace.push(reply);
                return Ok(trace);
            }

            let calls = reply.tool_calls.clone();
            trace.push(reply);
            for call in &calls {
                let output = self.execute(call, tools).await?;
                trace.push(Message::tool(&call.id, &call.name, output));
            }
        }

        Err(AssistantError::Internal(anyhow::anyhow!(
            "agent stopped after {} turns without a final answer",
            self.max_iterations
        )))
    }
}
