//! Conversation traces and final-answer extraction.

use serde::{Deserialize, Serialize};
use tracing::{error, warn};

use crate::error::{AssistantError, AssistantResult};
use crate::llm::Message;

/// Answer returned when the last message is neither AI-authored nor has text.
pub const FALLBACK_ANSWER: &str = "Error: Could not extract final AI response.";

/// Ordered messages produced by one reasoning-loop run.
///
/// Deserializing goes through the shape checks of
/// `TryFrom<serde_json::Value>`, so a trace read from JSON fails with
/// [`AssistantError::MalformedTrace`] rather than a bare serde error.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "serde_json::Value")]
pub struct ConversationTrace {
    pub messages: Vec<Message>,
}

impl ConversationTrace {
    pub const fn new(messages: Vec<Message>) -> Self {
        Self { messages }
    }

    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }
}

/// Shape checks for traces produced outside this crate, e.g. by a
/// [`ReasoningLoop`](crate::agent::ReasoningLoop) bridging another process.
/// Loops in this crate hand over a typed trace and skip them.
impl TryFrom<serde_json::Value> for ConversationTrace {
    type Error = AssistantError;

    fn try_from(value: serde_json::Value) -> Result<Self, Self::Error> {
        let Some(messages) = value.get("messages") else {
            error!(trace = %value, "agent trace has no 'messages' field");
            return Err(AssistantError::MalformedTrace(
                "trace has no 'messages' field".to_owned(),
            ));
        };
        if !messages.is_array() {
            error!(trace = %value, "agent trace 'messages' is not a list");
            return Err(AssistantError::MalformedTrace(
                "'messages' is not a list".to_owned(),
            ));
        }

        let messages: Vec<Message> = serde_json::from_value(messages.clone()).map_err(|e| {
            error!(trace = %value, error = %e, "agent trace contains unreadable messages");
            AssistantError::MalformedTrace(format!("unreadable message: {e}"))
        })?;
        Ok(Self { messages })
    }
}

/// Pull the final answer out of `trace`.
///
/// A trace needs the injected human message plus at least one produced
/// message. When the last message is not AI-authored its text is still
/// returned (or [`FALLBACK_ANSWER`]), with a warning.
///
/// # Errors
///
/// [`AssistantError::MalformedTrace`] when the trace has fewer than two
/// messages.
pub fn extract_final_answer(trace: &ConversationTrace) -> AssistantResult<String> {
    let last = match trace.messages.as_slice() {
        [_, .., last] => last,
        _ => {
            error!(
                messages = trace.len(),
                trace = ?trace,
                "agent trace too short to hold an answer"
            );
            return Err(AssistantError::MalformedTrace(format!(
                "expected at least 2 messages, got {}",
                trace.len()
            )));
        }
    };

    if last.is_ai() {
        return Ok(last.text().unwrap_or_default().to_owned());
    }

    warn!(
        role = ?last.role,
        "last message in agent trace is not AI-authored; returning its content"
    );
    Ok(last
        .text()
        .map_or_else(|| FALLBACK_ANSWER.to_owned(), str::to_owned))
}
