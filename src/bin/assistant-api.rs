//! assistant-api -- HTTP front end for the code assistant.
//!
//! Usage: GOOGLE_API_KEY=... assistant-api

use std::sync::Arc;

use code_assistant::agent::ReactAgent;
use code_assistant::api;
use code_assistant::client::ToolClient;
use code_assistant::config::Config;
use code_assistant::handler::AssistantService;
use code_assistant::llm::GeminiClient;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = Config::from_env()?;
    let api_key = config.require_api_key()?;

    let model = GeminiClient::new(api_key, &config.model);
    let agent = ReactAgent::new(Arc::new(model)).with_max_iterations(config.max_iterations);

    let service = AssistantService::new(ToolClient::new(&config.tool_service_addr), Arc::new(agent))
        .with_request_timeout(config.request_timeout);

    api::serve(&config, Arc::new(service)).await
}
