//! Read-only, rig-compatible tools the model may call while writing a message.
//!
//! Each tool implements `rig::tool::Tool` with a typed `Args` struct and is
//! sandboxed to the repository root. The [`registry::ToolRegistry`] resolves
//! model requests by name and flattens failures into text for the transcript.

pub mod fs_tools;
pub mod git_tools;
pub mod observer;
pub mod registry;

use std::path::{Component, Path, PathBuf};

/// Maximum characters any tool returns before truncation.
pub const MAX_OUTPUT_CHARS: usize = 10_000;

/// Errors that can occur during tool execution.
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("path `{0}` contains a parent-directory segment")]
    Traversal(String),

    #[error("path `{0}` escapes the repository root")]
    Sandbox(String),

    #[error(
        "file `{path}` is {size} bytes, above the {limit}-byte limit; rely on the diff instead"
    )]
    FileTooLarge { path: String, size: u64, limit: u64 },

    #[error("`{0}` is not a directory")]
    NotADirectory(String),

    #[error("unknown tool `{0}`")]
    UnknownTool(String),

    #[error("invalid arguments for `{tool}`: {message}")]
    InvalidArguments { tool: String, message: String },

    #[error(
        "tool-call budget of {limit} exhausted for this session; answer with what you already have"
    )]
    BudgetExceeded { limit: usize },

    #[error("background task failed: {0}")]
    Join(String),
}

/// Validate that `relative_path` stays within the sandbox root.
///
/// Any `..` segment is rejected outright; the remaining path is canonicalized
/// (it must exist) and must resolve under the canonical root.
pub fn sandbox_check(root: &Path, relative_path: &str) -> Result<PathBuf, ToolError> {
    if Path::new(relative_path)
        .components()
        .any(|c| matches!(c, Component::ParentDir))
    {
        return Err(ToolError::Traversal(relative_path.to_string()));
    }

    let canon_root = root.canonicalize()?;
    let resolved = root.join(relative_path).canonicalize()?;

    if !resolved.starts_with(&canon_root) {
        return Err(ToolError::Sandbox(relative_path.to_string()));
    }
    Ok(resolved)
}

/// Run blocking filesystem or subprocess work off the async executor.
pub(crate) async fn run_blocking<T, F>(f: F) -> Result<T, ToolError>
where
    F: FnOnce() -> Result<T, ToolError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| ToolError::Join(e.to_string()))?
}

/// Cut `content` to `limit` characters, appending a marker with the remainder.
pub fn truncate_output(content: String, limit: usize) -> String {
    let total = content.chars().count();
    if total <= limit {
        return content;
    }
    let mut kept: String = content.chars().take(limit).collect();
    kept.push_str(&format!(
        "\n\n[... truncated: {} more characters]",
        total - limit
    ));
    kept
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sandbox_rejects_parent_segment_even_if_inside() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("src")).unwrap();
        let err = sandbox_check(dir.path(), "src/../src").unwrap_err();
        assert!(matches!(err, ToolError::Traversal(_)));
    }

    #[test]
    fn test_sandbox_rejects_absolute_path_outside_root() {
        let dir = tempfile::tempdir().unwrap();
        let outside = tempfile::tempdir().unwrap();
        let target = outside.path().join("secret.txt");
        std::fs::write(&target, "x").unwrap();
        let err = sandbox_check(dir.path(), target.to_str().unwrap()).unwrap_err();
        assert!(matches!(err, ToolError::Sandbox(_)));
    }

    #[test]
    fn test_sandbox_accepts_root_itself() {
        let dir = tempfile::tempdir().unwrap();
        let resolved = sandbox_check(dir.path(), "").unwrap();
        assert_eq!(resolved, dir.path().canonicalize().unwrap());
    }

    #[tokio::test]
    async fn test_run_blocking_leaves_executor_thread() {
        let executor = std::thread::current().id();
        let worker = run_blocking(|| Ok(std::thread::current().id())).await.unwrap();
        assert_ne!(worker, executor);
    }

    #[tokio::test]
    async fn test_run_blocking_maps_panic_to_join_error() {
        let err = run_blocking::<(), _>(|| panic!("worker blew up")).await.unwrap_err();
        assert!(matches!(err, ToolError::Join(_)));
    }

    #[test]
    fn test_truncate_output_marks_remainder() {
        let out = truncate_output("abcdef".into(), 4);
        assert!(out.starts_with("abcd"));
        assert!(out.ends_with("[... truncated: 2 more characters]"));
    }

    #[test]
    fn test_truncate_output_counts_chars_not_bytes() {
        let text = "é".repeat(5);
        assert_eq!(truncate_output(text.clone(), 5), text);
    }
}
