//! Prompt composition: context preamble + base instructions + user question.

use std::path::Path;

use tracing::warn;

/// Fixed instructions sent ahead of every user question.
pub const AGENT_BASE_PROMPT: &str = "\
You are a coding assistant that answers questions about a local codebase.

You can inspect the filesystem with these tools:
- read_file: read the full content of a file
- list_directory: list the entries of a directory
- get_file_info: show size, timestamps and permissions of a file
- get_tree_folders: show the directory tree of a folder

Guidelines:
1. Use the tools to look at the actual files instead of guessing.
2. Resolve relative paths against the working directory when one is given.
3. If a tool returns a message starting with \"Error\", read it, adjust the path or \
approach, and try again when that makes sense.
4. Answer concisely and quote the relevant code or file names.";

/// Separator placed between the instructions and the question.
const QUESTION_SEPARATOR: &str = "\n\nUser Question:\n";

/// Build the text sent to the agent for one query.
///
/// Without `working_directory` there is no preamble at all. With one, the
/// preamble names the path, and notes when the path is not a directory on
/// this host (logged as a warning, never an error).
pub fn compose_prompt(query: &str, base_prompt: &str, working_directory: Option<&str>) -> String {
    let preamble = working_directory.map_or_else(String::new, context_preamble);
    format!("{preamble}{base_prompt}{QUESTION_SEPARATOR}{query}")
}

fn context_preamble(path: &str) -> String {
    if Path::new(path).is_dir() {
        format!(
            "Context: The current working directory is set to '{path}'. \
             Please consider this path when referring to project files.\n\n"
        )
    } else {
        warn!(
            working_directory = path,
            "working directory set in context does not exist on this host"
        );
        format!(
            "Context: The current working directory is set to '{path}' \
             (Note: This path may not be valid on the server). \
             Please consider this path when referring to project files.\n\n"
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_directory_no_preamble() {
        let prompt = compose_prompt("what is this?", "BASE", None);
        assert_eq!(prompt, "BASE\n\nUser Question:\nwhat is this?");
    }

    #[test]
    fn test_existing_directory_preamble() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().to_str().expect("utf-8 path");

        let prompt = compose_prompt("q", "BASE", Some(path));
        assert!(prompt.starts_with(&format!(
            "Context: The current working directory is set to '{path}'. "
        )));
        assert!(!prompt.contains("may not be valid"));
        assert!(prompt.ends_with("\n\nBASE\n\nUser Question:\nq"));
    }

    #[test]
    fn test_missing_directory_annotated() {
        let prompt = compose_prompt("q", "BASE", Some("/definitely/not/here/4242"));
        assert!(prompt.contains("'/definitely/not/here/4242'"));
        assert!(prompt.contains("(Note: This path may not be valid on the server)"));
        assert!(prompt.ends_with("BASE\n\nUser Question:\nq"));
    }

    #[test]
    fn test_deterministic() {
        let a = compose_prompt("same", AGENT_BASE_PROMPT, Some("/tmp"));
        let b = compose_prompt("same", AGENT_BASE_PROMPT, Some("/tmp"));
        assert_eq!(a, b);
    }

    #[test]
    fn test_query_passed_through_raw() {
        let query = "  spaced\nmultiline {braces} ";
        let prompt = compose_prompt(query, "BASE", None);
        assert!(prompt.ends_with(query));
    }
}
