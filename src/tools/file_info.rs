//! `get_file_info` - platform metadata report for a regular file.
//!
//! Prefers the host's `stat` binary so the model sees the familiar format.
//! Without one, a similar report is rendered from `std::fs::Metadata`.

use std::fmt::Write as _;
use std::path::Path;
use std::time::SystemTime;

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use serde::Deserialize;
use tokio::process::Command;

use crate::protocol::{ToolCallResult, ToolDescriptor};

pub const NAME: &str = "get_file_info";

#[derive(Debug, Deserialize)]
pub struct FileInfoParams {
    /// The file path to inspect.
    pub file_path: String,
}

pub fn tool_definition() -> ToolDescriptor {
    ToolDescriptor {
        name: NAME.to_owned(),
        description: "Retrieve file metadata (size, timestamps, permissions) as reported by `stat`. \
            Returns the report text or an error message."
            .to_owned(),
        input_schema: serde_json::json!({
            "type": "object",
            "properties": {
                "file_path": {
                    "type": "string",
                    "description": "The file path to inspect"
                }
            },
            "required": ["file_path"]
        }),
    }
}

pub async fn execute(
    root: &Path,
    stat: Option<&Path>,
    arguments: serde_json::Value,
) -> Result<ToolCallResult> {
    let params: FileInfoParams =
        serde_json::from_value(arguments).context("invalid get_file_info parameters")?;
    Ok(ToolCallResult::text(file_info(root, stat, &params.file_path).await))
}

/// Report on `raw` with the `stat` binary at `stat`, or from metadata when
/// there is none.
pub async fn file_info(root: &Path, stat: Option<&Path>, raw: &str) -> String {
    let path = match super::resolve_path(root, raw) {
        Ok(p) => p,
        Err(e) => return format!("Error: {e}"),
    };

    if !super::is_regular_file(&path).await {
        return super::not_a_file(raw);
    }

    match stat {
        Some(stat) => run_stat(stat, &path).await,
        None => match tokio::fs::metadata(&path).await {
            Ok(meta) => render_metadata(&path, &meta),
            Err(e) => format!("Error retrieving file info: {e}"),
        },
    }
}

async fn run_stat(stat: &Path, path: &Path) -> String {
    let output = match Command::new(stat).arg(path).output().await {
        Ok(output) => output,
        Err(e) => return format!("Error retrieving file info: {e}"),
    };

    if output.status.success() {
        String::from_utf8_lossy(&output.stdout).into_owned()
    } else {
        format!(
            "Error retrieving file info: {}",
            String::from_utf8_lossy(&output.stderr).trim()
        )
    }
}

fn render_metadata(path: &Path, meta: &std::fs::Metadata) -> String {
    let mut report = String::new();
    let _ = writeln!(report, "  File: {}", path.display());
    let _ = writeln!(report, "  Size: {}\tType: regular file", meta.len());
    let _ = writeln!(report, "Access: {}", permissions(meta));
    let _ = writeln!(report, "Access: {}", timestamp(meta.accessed()));
    let _ = writeln!(report, "Modify: {}", timestamp(meta.modified()));
    let _ = writeln!(report, " Birth: {}", timestamp(meta.created()));
    report
}

#[cfg(unix)]
fn permissions(meta: &std::fs::Metadata) -> String {
    use std::os::unix::fs::PermissionsExt as _;

    let mode = meta.permissions().mode() & 0o7777;
    let mut symbolic = String::from("-");
    for shift in [6, 3, 0] {
        let bits = (mode >> shift) & 0o7;
        symbolic.push(if bits & 0o4 == 0 { '-' } else { 'r' });
        symbolic.push(if bits & 0o2 == 0 { '-' } else { 'w' });
        symbolic.push(if bits & 0o1 == 0 { '-' } else { 'x' });
    }
    format!("({mode:04o}/{symbolic})")
}

#[cfg(not(unix))]
fn permissions(meta: &std::fs::Metadata) -> String {
    if meta.permissions().readonly() {
        "(read-only)".to_owned()
    } else {
        "(read-write)".to_owned()
    }
}

fn timestamp(time: std::io::Result<SystemTime>) -> String {
    time.map_or_else(
        |_| "-".to_owned(),
        |t| {
            DateTime::<Local>::from(t)
                .format("%Y-%m-%d %H:%M:%S%.9f %z")
                .to_string()
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::tools::HostBinaries;

    #[tokio::test]
    async fn test_reports_on_regular_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join("f.txt"), "12345").expect("write");
        let binaries = HostBinaries::locate();

        let report = file_info(dir.path(), binaries.stat.as_deref(), "f.txt").await;
        assert!(!report.starts_with("Error"), "unexpected: {report}");
        assert!(report.contains("f.txt"));
        assert!(report.contains('5'));
    }

    #[tokio::test]
    async fn test_metadata_report_without_stat_binary() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join("f.txt"), "12345").expect("write");

        let report = file_info(dir.path(), None, "f.txt").await;
        assert!(report.contains("Size: 5"), "unexpected: {report}");
    }

    #[tokio::test]
    async fn test_directory_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let report = file_info(dir.path(), None, ".").await;
        assert_eq!(report, "Error: '.' is not a valid file.");
    }

    #[test]
    fn test_fallback_render_has_size_and_times() {
        let dir = tempfile::tempdir().expect("tempdir");
        let file = dir.path().join("g.txt");
        std::fs::write(&file, "abc").expect("write");
        let meta = std::fs::metadata(&file).expect("metadata");

        let report = render_metadata(&file, &meta);
        assert!(report.contains("Size: 3"));
        assert!(report.contains("Modify: "));
        assert!(report.contains("g.txt"));
    }

    #[cfg(unix)]
    #[test]
    fn test_symbolic_permissions() {
        use std::os::unix::fs::PermissionsExt as _;

        let dir = tempfile::tempdir().expect("tempdir");
        let file = dir.path().join("p.sh");
        std::fs::write(&file, "").expect("write");
        std::fs::set_permissions(&file, std::fs::Permissions::from_mode(0o754)).expect("chmod");
        let meta = std::fs::metadata(&file).expect("metadata");

        assert_eq!(permissions(&meta), "(0754/-rwxr-xr--)");
    }
}
