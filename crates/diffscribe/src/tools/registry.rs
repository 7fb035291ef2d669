//! Name-keyed tool registry and dispatch.
//!
//! Model requests arrive as raw JSON. Arguments are validated against the
//! tool's typed `Args` before anything runs; every failure becomes a
//! [`ToolOutcome::Failure`] so the loop can hand it back to the model.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use rig::completion::ToolDefinition;
use rig::tool::Tool;

use super::fs_tools::{ListDirectoryTool, ReadFileTool};
use super::git_tools::{FileDiffTool, GitStatusTool, RecentCommitsTool};
use super::ToolError;
use crate::git::RepoQueries;
use crate::transcript::ToolCallRequest;

/// Object-safe view over a `rig` tool whose output is text.
#[async_trait]
pub trait RegisteredTool: Send + Sync {
    fn name(&self) -> &'static str;

    async fn definition(&self) -> ToolDefinition;

    /// Validate `raw` against the tool's argument type, then run it.
    async fn invoke(&self, raw: serde_json::Value) -> Result<String, ToolError>;
}

#[async_trait]
impl<T> RegisteredTool for T
where
    T: Tool<Error = ToolError, Output = String> + Send + Sync + 'static,
{
    fn name(&self) -> &'static str {
        T::NAME
    }

    async fn definition(&self) -> ToolDefinition {
        Tool::definition(self, String::new()).await
    }

    async fn invoke(&self, raw: serde_json::Value) -> Result<String, ToolError> {
        let args: T::Args =
            serde_json::from_value(raw).map_err(|e| ToolError::InvalidArguments {
                tool: T::NAME.to_string(),
                message: e.to_string(),
            })?;
        self.call(args).await
    }
}

/// Result of one dispatched tool call.
#[derive(Debug)]
pub enum ToolOutcome {
    Success(String),
    Failure(ToolError),
}

impl ToolOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    /// Text placed in the transcript as the tool result.
    pub fn into_transcript_text(self) -> String {
        match self {
            Self::Success(text) => text,
            Self::Failure(err) => format!("Error: {err}"),
        }
    }
}

impl From<Result<String, ToolError>> for ToolOutcome {
    fn from(result: Result<String, ToolError>) -> Self {
        match result {
            Ok(text) => Self::Success(text),
            Err(err) => Self::Failure(err),
        }
    }
}

/// The set of tools exposed to the model for one session.
pub struct ToolRegistry {
    tools: Vec<Box<dyn RegisteredTool>>,
}

impl ToolRegistry {
    pub fn new(tools: Vec<Box<dyn RegisteredTool>>) -> Self {
        Self { tools }
    }

    /// The five read-only repository tools.
    pub fn standard(repo_root: &Path, repo: Arc<dyn RepoQueries>) -> Self {
        Self::new(vec![
            Box::new(ReadFileTool::new(repo_root)),
            Box::new(ListDirectoryTool::new(repo_root)),
            Box::new(GitStatusTool::new(Arc::clone(&repo))),
            Box::new(FileDiffTool::new(Arc::clone(&repo))),
            Box::new(RecentCommitsTool::new(repo)),
        ])
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.tools.iter().map(|t| t.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub async fn definitions(&self) -> Vec<ToolDefinition> {
        let mut defs = Vec::with_capacity(self.tools.len());
        for tool in &self.tools {
            defs.push(tool.definition().await);
        }
        defs
    }

    /// Run the named tool. Never panics or propagates; failures are returned
    /// as [`ToolOutcome::Failure`].
    pub async fn dispatch(&self, request: &ToolCallRequest) -> ToolOutcome {
        let Some(tool) = self.tools.iter().find(|t| t.name() == request.name) else {
            tracing::warn!(tool = %request.name, "Model requested unknown tool");
            return ToolOutcome::Failure(ToolError::UnknownTool(request.name.clone()));
        };

        let outcome = ToolOutcome::from(tool.invoke(request.arguments.clone()).await);
        if let ToolOutcome::Failure(ref err) = outcome {
            tracing::warn!(tool = %request.name, call_id = %request.id, error = %err, "Tool failed");
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::git::MockRepoQueries;

    fn registry(root: &Path) -> ToolRegistry {
        ToolRegistry::standard(root, Arc::new(MockRepoQueries::new()))
    }

    #[tokio::test]
    async fn test_standard_registry_exposes_five_tools() {
        let dir = tempfile::tempdir().unwrap();
        let reg = registry(dir.path());
        assert_eq!(
            reg.names(),
            vec!["read_file", "list_directory", "git_status", "file_diff", "recent_commits"]
        );
        let defs = reg.definitions().await;
        assert_eq!(defs.len(), 5);
        assert!(defs.iter().all(|d| d.parameters["type"] == "object"));
    }

    #[tokio::test]
    async fn test_dispatch_unknown_tool() {
        let dir = tempfile::tempdir().unwrap();
        let req = ToolCallRequest::new("c1", "run_shell", serde_json::json!({}));
        let outcome = registry(dir.path()).dispatch(&req).await;
        assert!(matches!(outcome, ToolOutcome::Failure(ToolError::UnknownTool(_))));
    }

    #[tokio::test]
    async fn test_dispatch_invalid_arguments_never_runs_tool() {
        let dir = tempfile::tempdir().unwrap();
        let req = ToolCallRequest::new("c1", "read_file", serde_json::json!({ "file": 3 }));
        let outcome = registry(dir.path()).dispatch(&req).await;
        let text = outcome.into_transcript_text();
        assert!(text.starts_with("Error: invalid arguments for `read_file`"));
    }

    #[test]
    fn test_outcome_text_for_success_is_verbatim() {
        let outcome = ToolOutcome::from(Ok::<_, ToolError>("body".to_string()));
        assert!(outcome.is_success());
        assert_eq!(outcome.into_transcript_text(), "body");
    }
}
