//! `read_file` - full text content of a regular file.

use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::protocol::{ToolCallResult, ToolDescriptor};

pub const NAME: &str = "read_file";

#[derive(Debug, Deserialize)]
pub struct ReadFileParams {
    /// Absolute or relative file path.
    pub file_path: String,
}

pub fn tool_definition() -> ToolDescriptor {
    ToolDescriptor {
        name: NAME.to_owned(),
        description: "Read the full text content of a file. Returns the content or an error message."
            .to_owned(),
        input_schema: serde_json::json!({
            "type": "object",
            "properties": {
                "file_path": {
                    "type": "string",
                    "description": "Absolute or relative file path"
                }
            },
            "required": ["file_path"]
        }),
    }
}

pub async fn execute(root: &Path, arguments: serde_json::Value) -> Result<ToolCallResult> {
    let params: ReadFileParams =
        serde_json::from_value(arguments).context("invalid read_file parameters")?;
    Ok(ToolCallResult::text(read_file(root, &params.file_path).await))
}

/// Read `raw` as UTF-8 text. Never fails: problems become `Error:` strings.
pub async fn read_file(root: &Path, raw: &str) -> String {
    let path = match super::resolve_path(root, raw) {
        Ok(p) => p,
        Err(e) => return format!("Error: {e}"),
    };

    if !super::is_regular_file(&path).await {
        return super::not_a_file(raw);
    }

    let bytes = match tokio::fs::read(&path).await {
        Ok(bytes) => bytes,
        Err(e) => return format!("Error reading file: {e}"),
    };

    match String::from_utf8(bytes) {
        Ok(text) => text,
        Err(e) => format!(
            "Error reading file: '{raw}' is not valid UTF-8 text ({} bytes)",
            e.as_bytes().len()
        ),
    }
}
