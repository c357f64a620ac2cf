//! Per-request orchestration: validate, open a tool session, compose the
//! prompt, run the agent, extract the answer.

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, instrument};

use crate::agent::ReasoningLoop;
use crate::client::ToolClient;
use crate::context::WorkingDirectory;
use crate::error::{AssistantError, AssistantResult};
use crate::llm::Message;
use crate::prompt::{AGENT_BASE_PROMPT, compose_prompt};
use crate::trace::extract_final_answer;

const QUERY_PREVIEW_CHARS: usize = 100;

/// Shared state behind the HTTP surface.
pub struct AssistantService {
    tool_client: ToolClient,
    agent: Arc<dyn ReasoningLoop>,
    working_directory: Arc<WorkingDirectory>,
    base_prompt: String,
    request_timeout: Option<Duration>,
}

impl std::fmt::Debug for AssistantService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AssistantService")
            .field("tool_client", &self.tool_client)
            .field("working_directory", &self.working_directory)
            .field("request_timeout", &self.request_timeout)
            .finish_non_exhaustive()
    }
}

impl AssistantService {
    pub fn new(tool_client: ToolClient, agent: Arc<dyn ReasoningLoop>) -> Self {
        Self {
            tool_client,
            agent,
            working_directory: Arc::new(WorkingDirectory::new()),
            base_prompt: AGENT_BASE_PROMPT.to_owned(),
            request_timeout: None,
        }
    }

    #[must_use]
    pub fn with_working_directory(mut self, cell: Arc<WorkingDirectory>) -> Self {
        self.working_directory = cell;
        self
    }

    #[must_use]
    pub fn with_base_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.base_prompt = prompt.into();
        self
    }

    #[must_use]
    pub const fn with_request_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn tool_endpoint(&self) -> &str {
        self.tool_client.endpoint()
    }

    pub fn working_directory(&self) -> Option<String> {
        self.working_directory.get()
    }

    /// Store the working-directory hint. Returns the trimmed path stored.
    ///
    /// # Errors
    ///
    /// [`AssistantError::InvalidInput`] for a blank path; nothing is stored.
    pub fn set_working_directory(&self, path: &str) -> AssistantResult<String> {
        let path = path.trim();
        if path.is_empty() {
            return Err(AssistantError::invalid_input("Path cannot be empty."));
        }
        self.working_directory.set(path);
        info!(path, "working directory set");
        Ok(path.to_owned())
    }

    /// Answer `query` with the tool-using agent.
    ///
    /// # Errors
    ///
    /// `InvalidInput` for a blank query (checked before any session is
    /// opened), `ServiceUnavailable` when the tool service cannot be reached,
    /// `Timeout` when a configured deadline expires, and whatever the agent
    /// or the trace extraction report otherwise.
    #[instrument(skip_all)]
    pub async fn generate(&self, query: &str) -> AssistantResult<String> {
        if query.trim().is_empty() {
            return Err(AssistantError::invalid_input("Query cannot be empty."));
        }

        let preview: String = query.chars().take(QUERY_PREVIEW_CHARS).collect();
        info!(query = %preview, "received query");

        let answer = match self.request_timeout {
            Some(limit) => tokio::time::timeout(limit, self.answer(query))
                .await
                .map_err(|_| AssistantError::Timeout(limit))?,
            None => self.answer(query).await,
        }?;

        info!(chars = answer.len(), "answer ready");
        Ok(answer)
    }

    async fn answer(&self, query: &str) -> AssistantResult<String> {
        let session = self.tool_client.connect().await?;

        let working_directory = self.working_directory.get();
        let prompt = compose_prompt(query, &self.base_prompt, working_directory.as_deref());

        let outcome = self.agent.run(Message::human(prompt), &session).await;
        session.close().await;

        extract_final_answer(&outcome?)
    }
}
