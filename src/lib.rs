//! `code-assistant` - natural-language questions about a local codebase,
//! answered by a tool-using language model.
//!
//! Two processes cooperate:
//!
//! - `assistant-tools` serves read-only filesystem tools over newline-delimited
//!   JSON-RPC 2.0 on TCP.
//! - `assistant-api` accepts HTTP queries, opens a session with the tool
//!   service per query, and lets the model call those tools until it answers.
//!
//! # Tools
//!
//! - `read_file` - full text of a regular file
//! - `list_directory` - entry names one level deep, hidden entries skipped
//! - `get_file_info` - `stat` report (metadata fallback when absent)
//! - `get_tree_folders` - `tree` rendering (walkdir fallback when absent)
//!
//! # Architecture
//!
//! ```text
//! HTTP → api → AssistantService ─→ ToolClient ──TCP──→ server → ToolRouter → tools
//!                 │      ↑              ↓ ToolSession
//!                 │      └── trace ← ReactAgent ←→ ChatModel (Gemini)
//!                 └→ compose_prompt(WorkingDirectory)
//! ```

pub mod agent;
pub mod api;
pub mod client;
pub mod config;
pub mod context;
pub mod error;
pub mod handler;
pub mod llm;
pub mod prompt;
pub mod protocol;
pub mod server;
pub mod tools;
pub mod trace;

pub use agent::{ReactAgent, ReasoningLoop, ToolProvider};
pub use client::{ToolClient, ToolSession};
pub use error::{AssistantError, AssistantResult};
pub use handler::AssistantService;
pub use server::run_tool_server;
pub use trace::{ConversationTrace, extract_final_answer};
