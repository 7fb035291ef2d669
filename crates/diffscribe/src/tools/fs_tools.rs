//! File system tools: read a file and list a directory inside the repository.

use std::path::{Path, PathBuf};

use rig::completion::ToolDefinition;
use rig::tool::Tool;
use serde::Deserialize;

use super::{run_blocking, sandbox_check, truncate_output, ToolError, MAX_OUTPUT_CHARS};

/// Files larger than this are refused instead of read.
pub const MAX_FILE_BYTES: u64 = 50_000;

// ---------------------------------------------------------------------------
// ReadFileTool
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct ReadFileArgs {
    /// Path relative to the repository root.
    pub path: String,
}

/// Read a file from the repository. Path must stay within the sandbox.
///
/// Files above [`MAX_FILE_BYTES`] are refused; content above
/// [`MAX_OUTPUT_CHARS`] is truncated with a marker.
pub struct ReadFileTool {
    pub repo_root: PathBuf,
}

impl ReadFileTool {
    pub fn new(repo_root: &Path) -> Self {
        Self {
            repo_root: repo_root.to_path_buf(),
        }
    }
}

impl Tool for ReadFileTool {
    const NAME: &'static str = "read_file";
    type Error = ToolError;
    type Args = ReadFileArgs;
    type Output = String;

    async fn definition(&self, _prompt: String) -> ToolDefinition {
        ToolDefinition {
            name: Self::NAME.into(),
            description: "Read a file from the repository to understand code touched by the diff. \
                          Only use this when the diff alone is not enough. Files over 50KB are refused."
                .into(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": {
                    "path": {
                        "type": "string",
                        "description": "Path relative to the repository root"
                    }
                },
                "required": ["path"]
            }),
        }
    }

    async fn call(&self, args: Self::Args) -> Result<Self::Output, Self::Error> {
        let root = self.repo_root.clone();
        run_blocking(move || read_file(&root, args.path)).await
    }
}

fn read_file(root: &Path, path: String) -> Result<String, ToolError> {
    let full_path = sandbox_check(root, &path)?;

    let size = std::fs::metadata(&full_path)?.len();
    if size > MAX_FILE_BYTES {
        return Err(ToolError::FileTooLarge {
            path,
            size,
            limit: MAX_FILE_BYTES,
        });
    }

    let bytes = std::fs::read(&full_path)?;
    let content = String::from_utf8_lossy(&bytes).into_owned();
    Ok(truncate_output(content, MAX_OUTPUT_CHARS))
}

// ---------------------------------------------------------------------------
// ListDirectoryTool
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct ListDirectoryArgs {
    /// Directory relative to the repository root; omitted or empty = root.
    #[serde(default)]
    pub path: Option<String>,
}

/// List the entries of a directory, each tagged `file`, `dir`, or `?`.
pub struct ListDirectoryTool {
    pub repo_root: PathBuf,
}

impl ListDirectoryTool {
    pub fn new(repo_root: &Path) -> Self {
        Self {
            repo_root: repo_root.to_path_buf(),
        }
    }
}

impl Tool for ListDirectoryTool {
    const NAME: &'static str = "list_directory";
    type Error = ToolError;
    type Args = ListDirectoryArgs;
    type Output = String;

    async fn definition(&self, _prompt: String) -> ToolDefinition {
        ToolDefinition {
            name: Self::NAME.into(),
            description: "List files and directories at a path in the repository.".into(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": {
                    "path": {
                        "type": "string",
                        "description": "Directory relative to the repository root (omit for the root)"
                    }
                }
            }),
        }
    }

    async fn call(&self, args: Self::Args) -> Result<Self::Output, Self::Error> {
        let root = self.repo_root.clone();
        let requested = args.path.unwrap_or_default();
        run_blocking(move || list_directory(&root, requested)).await
    }
}

fn list_directory(root: &Path, requested: String) -> Result<String, ToolError> {
    let dir = sandbox_check(root, &requested)?;
    if !dir.is_dir() {
        return Err(ToolError::NotADirectory(requested));
    }

    let mut entries = Vec::new();
    for entry in std::fs::read_dir(&dir)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().to_string();
        // An entry whose metadata cannot be read is still listed.
        let kind = match entry.metadata() {
            Ok(meta) if meta.is_dir() => "dir",
            Ok(_) => "file",
            Err(e) => {
                tracing::debug!(name = %name, error = %e, "list_directory: stat failed");
                "?"
            }
        };
        entries.push(format!("{kind}\t{name}"));
    }
    entries.sort();

    if entries.is_empty() {
        return Ok("(empty directory)".to_string());
    }
    Ok(truncate_output(entries.join("\n"), MAX_OUTPUT_CHARS))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_file_args_deserialize() {
        let json = r#"{"path": "src/main.rs"}"#;
        let args: ReadFileArgs = serde_json::from_str(json).unwrap();
        assert_eq!(args.path, "src/main.rs");
    }

    #[test]
    fn test_read_file_args_missing_path_fails() {
        assert!(serde_json::from_str::<ReadFileArgs>("{}").is_err());
    }

    #[test]
    fn test_list_directory_args_path_optional() {
        let args: ListDirectoryArgs = serde_json::from_str("{}").unwrap();
        assert!(args.path.is_none());
    }
}
