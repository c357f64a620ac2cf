//! assistant-tools -- read-only filesystem tool service.
//!
//! Usage: TOOL_SERVICE_ADDR=127.0.0.1:8001 assistant-tools

use code_assistant::config::ToolServerConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    code_assistant::run_tool_server(ToolServerConfig::from_env()).await
}
