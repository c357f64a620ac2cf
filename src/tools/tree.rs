//! `get_tree_folders` - pre-formatted hierarchical rendering of a directory.
//!
//! Shells out to `tree` when installed. Otherwise renders the same
//! box-drawing layout with `walkdir`: hidden entries skipped, siblings sorted
//! by name, symlinks not followed, and a `N directories, M files` footer.

use std::fmt::Write as _;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;
use tokio::process::Command;
use walkdir::WalkDir;

use crate::protocol::{ToolCallResult, ToolDescriptor};

pub const NAME: &str = "get_tree_folders";

/// Maximum depth for the fallback walker.
const MAX_WALK_DEPTH: usize = 50;

#[derive(Debug, Deserialize)]
pub struct TreeParams {
    /// The directory path to explore.
    pub directory: String,
}

pub fn tool_definition() -> ToolDescriptor {
    ToolDescriptor {
        name: NAME.to_owned(),
        description: "Return the directory tree structure as produced by the `tree` command. \
            Returns the rendered text or an error message."
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

pub async fn execute(
    root: &Path,
    tree: Option<&Path>,
    arguments: serde_json::Value,
) -> Result<ToolCallResult> {
    let params: TreeParams =
        serde_json::from_value(arguments).context("invalid get_tree_folders parameters")?;
    Ok(ToolCallResult::text(tree_folders(root, tree, &params.directory).await))
}

pub async fn tree_folders(root: &Path, tree: Option<&Path>, raw: &str) -> String {
    let path = match super::resolve_path(root, raw) {
        Ok(p) => p,
        Err(e) => return format!("Error: {e}"),
    };

    if !super::is_directory(&path).await {
        return super::not_a_directory(raw);
    }

    match tree {
        Some(tree) => run_tree(tree, &path).await,
        None => {
            let label = raw.to_owned();
            tokio::task::spawn_blocking(move || render_tree(&path, &label))
                .await
                .unwrap_or_else(|e| format!("Error generating directory tree: {e}"))
        }
    }
}

async fn run_tree(tree: &Path, path: &Path) -> String {
    let output = match Command::new(tree).arg(path).output().await {
        Ok(output) => output,
        Err(e) => return format!("Error generating directory tree: {e}"),
    };

    if output.status.success() {
        String::from_utf8_lossy(&output.stdout).into_owned()
    } else {
        format!(
            "Error generating directory tree: {}",
            String::from_utf8_lossy(&output.stderr).trim()
        )
    }
}

struct Node {
    depth: usize,
    name: String,
    is_dir: bool,
}

/// Render `path` in `tree`'s layout, headed by `label`.
pub fn render_tree(path: &Path, label: &str) -> String {
    let nodes = match collect_nodes(path) {
        Ok(nodes) => nodes,
        Err(e) => return format!("Error generating directory tree: {e}"),
    };

    // A node is the last of its siblings if no later node shares its depth
    // before the walk climbs back above it. Scan backwards to find out.
    let mut is_last = vec![false; nodes.len()];
    let mut later_sibling: Vec<bool> = Vec::new();
    for (i, node) in nodes.iter().enumerate().rev() {
        if later_sibling.len() <= node.depth {
            later_sibling.resize(node.depth + 1, false);
        }
        is_last[i] = !later_sibling[node.depth];
        later_sibling[node.depth] = true;
        later_sibling.truncate(node.depth + 1);
    }

    let mut out = String::new();
    let _ = writeln!(out, "{label}");

    // ancestor_last[d] says whether the open ancestor at depth d was last.
    let mut ancestor_last: Vec<bool> = Vec::new();
    let (mut dirs, mut files) = (0usize, 0usize);
    for (node, last) in nodes.iter().zip(&is_last) {
        ancestor_last.truncate(node.depth - 1);
        for &closed in &ancestor_last {
            out.push_str(if closed { "    " } else { "│   " });
        }
        out.push_str(if *last { "└── " } else { "├── " });
        out.push_str(&node.name);
        out.push('\n');
        ancestor_last.push(*last);

        if node.is_dir {
            dirs += 1;
        } else {
            files += 1;
        }
    }

    let _ = write!(
        out,
        "\n{dirs} {}, {files} {}\n",
        if dirs == 1 { "directory" } else { "directories" },
        if files == 1 { "file" } else { "files" },
    );
    out
}

fn collect_nodes(path: &Path) -> Result<Vec<Node>> {
    let walker = WalkDir::new(path)
        .min_depth(1)
        .max_depth(MAX_WALK_DEPTH)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| {
            entry.depth() == 0 || !entry.file_name().to_string_lossy().starts_with('.')
        });

    let mut nodes = Vec::new();
    for entry in walker {
        let entry = entry.with_context(|| format!("failed to walk {}", path.display()))?;
        nodes.push(Node {
            depth: entry.depth(),
            name: entry.file_name().to_string_lossy().into_owned(),
            is_dir: entry.file_type().is_dir(),
        });
    }
    Ok(nodes)
}
