//! Tool router - registers and dispatches tool calls.
//!
//! Four read-only inspection tools live here. Each takes JSON arguments and
//! returns a [`ToolCallResult`]. Filesystem problems never escape as `Err`:
//! they come back as text starting with `Error:` so the calling model can
//! read them. Only malformed arguments produce an `Err`, which the server
//! turns into an `isError` result.

pub mod file_info;
pub mod list_directory;
pub mod read_file;
pub mod tree;

use std::path::{Path, PathBuf};

use anyhow::{Result, bail};
use tracing::debug;

use crate::protocol::{ToolCallResult, ToolDescriptor};

/// Resolve a caller-supplied path against the service root.
///
/// Absolute paths are taken as-is; relative ones are joined onto `root`.
/// No containment check is made: the service inspects whatever the host
/// process can read.
pub fn resolve_path(root: &Path, raw: &str) -> Result<PathBuf> {
    // NUL bytes truncate paths in C-based APIs.
    if raw.contains('\0') {
        bail!("path contains null byte");
    }

    let path = Path::new(raw);
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(root.join(path))
    }
}

/// `true` if `path` resolves (following symlinks) to a regular file.
pub async fn is_regular_file(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .is_ok_and(|meta| meta.is_file())
}

/// `true` if `path` resolves (following symlinks) to a directory.
pub async fn is_directory(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .is_ok_and(|meta| meta.is_dir())
}

pub(crate) fn not_a_file(raw: &str) -> String {
    format!("Error: '{raw}' is not a valid file.")
}

pub(crate) fn not_a_directory(raw: &str) -> String {
    format!("Error: '{raw}' is not a valid directory.")
}

/// Host binaries the tools prefer over their built-in renderings.
#[derive(Debug, Clone, Default)]
pub struct HostBinaries {
    pub stat: Option<PathBuf>,
    pub tree: Option<PathBuf>,
}

impl HostBinaries {
    /// Search `PATH` once. Blocking; call at startup.
    pub fn locate() -> Self {
        let binaries = Self {
            stat: which::which("stat").ok(),
            tree: which::which("tree").ok(),
        };
        debug!(stat = ?binaries.stat, tree = ?binaries.tree, "located host binaries");
        binaries
    }
}

/// Tool router that dispatches tool calls to implementations.
#[derive(Debug, Clone)]
pub struct ToolRouter {
    /// Base for relative paths.
    root: PathBuf,
    binaries: HostBinaries,
}

impl ToolRouter {
    /// Router over `root`, with host binaries located on `PATH`.
    pub fn new(root: PathBuf) -> Self {
        Self::with_binaries(root, HostBinaries::locate())
    }

    pub const fn with_binaries(root: PathBuf, binaries: HostBinaries) -> Self {
        Self { root, binaries }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// List all available tools with their JSON Schema definitions.
    pub fn list_tools(&self) -> Vec<ToolDescriptor> {
        vec![
            read_file::tool_definition(),
            list_directory::tool_definition(),
            file_info::tool_definition(),
            tree::tool_definition(),
        ]
    }

    /// Call a tool by name with the given JSON arguments.
    ///
    /// # Errors
    ///
    /// Returns an error only if the arguments do not match the tool's schema.
    pub async fn call_tool(
        &self,
        name: &str,
        arguments: serde_json::Value,
    ) -> Result<ToolCallResult> {
        debug!(tool = name, "dispatching tool call");

        match name {
            read_file::NAME => read_file::execute(&self.root, arguments).await,
            list_directory::NAME => list_directory::execute(&self.root, arguments).await,
            file_info::NAME => {
                file_info::execute(&self.root, self.binaries.stat.as_deref(), arguments).await
            }
            tree::NAME => tree::execute(&self.root, self.binaries.tree.as_deref(), arguments).await,
            _ => Ok(ToolCallResult::failure(format!("Unknown tool: {name}"))),
        }
    }
}
