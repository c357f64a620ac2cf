//! `list_directory` - entry names one level deep, as `{"items": [...]}`.

use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::protocol::{ToolCallResult, ToolDescriptor};

pub const NAME: &str = "list_directory";

#[derive(Debug, Deserialize)]
pub struct ListDirectoryParams {
    /// The directory path to explore.
    pub directory: String,
}

pub fn tool_definition() -> ToolDescriptor {
    ToolDescriptor {
        name: NAME.to_owned(),
        description: "List the entries of a directory (one level deep). \
            Returns a JSON structure {\"items\": [...]} or an error message."
            .to_owned(),
        input_schema: serde_json::json!({
            "type": "object",
            "properties": {
                "directory": {
                    "type": "string",
                    "description": "The directory path to explore"
                }
            },
            "required": ["directory"]
        }),
    }
}

pub async fn execute(root: &Path, arguments: serde_json::Value) -> Result<ToolCallResult> {
    let params: ListDirectoryParams =
        serde_json::from_value(arguments).context("invalid list_directory parameters")?;

    Ok(match list_directory(root, &params.directory).await {
        Ok(items) => ToolCallResult::structured(serde_json::json!({ "items": items })),
        Err(message) => ToolCallResult::text(message),
    })
}

/// Visible entry names in read order. Dot-entries are hidden, like `ls -1`.
///
/// The `Err` side is the `Error:` text handed back to the model.
pub async fn list_directory(root: &Path, raw: &str) -> Result<Vec<String>, String> {
    let path = super::resolve_path(root, raw).map_err(|e| format!("Error: {e}"))?;

    if !super::is_directory(&path).await {
        return Err(super::not_a_directory(raw));
    }

    let mut entries = tokio::fs::read_dir(&path)
        .await
        .map_err(|e| format!("Error listing directory: {e}"))?;

    let mut items = Vec::new();
    loop {
        match entries.next_entry().await {
            Ok(Some(entry)) => {
                let name = entry.file_name().to_string_lossy().into_owned();
                if name.trim().is_empty() || name.starts_with('.') {
                    continue;
                }
                items.push(name);
            }
            Ok(None) => break,
            Err(e) => return Err(format!("Error listing directory: {e}")),
        }
    }

    Ok(items)
}
