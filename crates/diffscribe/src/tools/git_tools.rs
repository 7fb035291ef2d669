//! Git-backed tools: commit history, working-tree status, per-file staged diff.
//!
//! All three query a shared [`RepoQueries`] on a blocking task so git
//! subprocesses never stall the runtime.

use std::path::Path;
use std::sync::Arc;

use rig::completion::ToolDefinition;
use rig::tool::Tool;
use serde::Deserialize;

use super::{run_blocking, truncate_output, ToolError, MAX_OUTPUT_CHARS};
use crate::git::RepoQueries;

/// Hard ceiling on commits returned by [`RecentCommitsTool`].
pub const MAX_COMMITS: u32 = 5;

async fn query_blocking<F>(repo: &Arc<dyn RepoQueries>, f: F) -> Result<String, ToolError>
where
    F: FnOnce(&dyn RepoQueries) -> String + Send + 'static,
{
    let repo = Arc::clone(repo);
    run_blocking(move || Ok(f(repo.as_ref()))).await
}

// ---------------------------------------------------------------------------
// RecentCommitsTool
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct RecentCommitsArgs {
    /// Requested number of commits; clamped to `1..=MAX_COMMITS`.
    #[serde(default)]
    pub count: Option<u32>,
    /// Return `<hash> <subject>` pairs instead of bare subjects.
    #[serde(default)]
    pub include_hashes: bool,
}

/// Recent commit subjects, for matching the repository's message conventions.
pub struct RecentCommitsTool {
    repo: Arc<dyn RepoQueries>,
}

impl RecentCommitsTool {
    pub fn new(repo: Arc<dyn RepoQueries>) -> Self {
        Self { repo }
    }
}

impl Tool for RecentCommitsTool {
    const NAME: &'static str = "recent_commits";
    type Error = ToolError;
    type Args = RecentCommitsArgs;
    type Output = String;

    async fn definition(&self, _prompt: String) -> ToolDefinition {
        ToolDefinition {
            name: Self::NAME.into(),
            description: "Show subjects of the most recent commits (at most 5) to match the \
                          repository's existing message style."
                .into(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": {
                    "count": {
                        "type": "integer",
                        "description": "Number of commits to show (1-5)"
                    },
                    "include_hashes": {
                        "type": "boolean",
                        "description": "Prefix each subject with its short hash"
                    }
                }
            }),
        }
    }

    async fn call(&self, args: Self::Args) -> Result<Self::Output, Self::Error> {
        let count = args.count.unwrap_or(MAX_COMMITS).clamp(1, MAX_COMMITS);
        let include_hashes = args.include_hashes;

        let output = query_blocking(&self.repo, move |repo| {
            if include_hashes {
                repo.recent_commits_with_hashes(count)
            } else {
                repo.recent_subjects(count)
            }
        })
        .await?;

        // Enforce the ceiling even if the collaborator returns more.
        let lines: Vec<&str> = output
            .lines()
            .filter(|l| !l.trim().is_empty())
            .take(count as usize)
            .collect();
        if lines.is_empty() {
            return Ok("No commits found.".to_string());
        }
        Ok(lines.join("\n"))
    }
}

// ---------------------------------------------------------------------------
// GitStatusTool
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
pub struct GitStatusArgs {}

/// Staged, unstaged, and untracked file listings.
pub struct GitStatusTool {
    repo: Arc<dyn RepoQueries>,
}

impl GitStatusTool {
    pub fn new(repo: Arc<dyn RepoQueries>) -> Self {
        Self { repo }
    }
}

fn section(title: &str, body: &str) -> String {
    let body = body.trim();
    if body.is_empty() {
        format!("## {title}\n(none)")
    } else {
        format!("## {title}\n{body}")
    }
}

impl Tool for GitStatusTool {
    const NAME: &'static str = "git_status";
    type Error = ToolError;
    type Args = GitStatusArgs;
    type Output = String;

    async fn definition(&self, _prompt: String) -> ToolDefinition {
        ToolDefinition {
            name: Self::NAME.into(),
            description: "List staged, unstaged, and untracked files.".into(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": {}
            }),
        }
    }

    async fn call(&self, _args: Self::Args) -> Result<Self::Output, Self::Error> {
        let output = query_blocking(&self.repo, |repo| {
            [
                section("Staged", &repo.staged_files()),
                section("Unstaged", &repo.unstaged_files()),
                section("Untracked", &repo.untracked_files()),
            ]
            .join("\n\n")
        })
        .await?;
        Ok(truncate_output(output, MAX_OUTPUT_CHARS))
    }
}

// ---------------------------------------------------------------------------
// FileDiffTool
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct FileDiffArgs {
    /// Path relative to the repository root.
    pub path: String,
}

/// Full staged diff for one file.
pub struct FileDiffTool {
    repo: Arc<dyn RepoQueries>,
}

impl FileDiffTool {
    pub fn new(repo: Arc<dyn RepoQueries>) -> Self {
        Self { repo }
    }
}

impl Tool for FileDiffTool {
    const NAME: &'static str = "file_diff";
    type Error = ToolError;
    type Args = FileDiffArgs;
    type Output = String;

    async fn definition(&self, _prompt: String) -> ToolDefinition {
        ToolDefinition {
            name: Self::NAME.into(),
            description: "Show the full staged diff of a single file, with default context. \
                          Useful when the compacted diff lacks context."
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
        if Path::new(&args.path)
            .components()
            .any(|c| matches!(c, std::path::Component::ParentDir))
        {
            return Err(ToolError::Traversal(args.path));
        }

        let path = args.path.clone();
        let diff = query_blocking(&self.repo, move |repo| repo.staged_file_diff(&path)).await?;
        if diff.trim().is_empty() {
            return Ok(format!("No staged changes for `{}`.", args.path));
        }
        Ok(truncate_output(diff, MAX_OUTPUT_CHARS))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::git::MockRepoQueries;

    #[tokio::test]
    async fn test_recent_commits_clamps_requested_count() {
        let mut repo = MockRepoQueries::new();
        repo.expect_recent_subjects()
            .withf(|n| *n == MAX_COMMITS)
            .times(1)
            .returning(|n| (0..n).map(|i| format!("subject {i}\n")).collect());

        let tool = RecentCommitsTool::new(Arc::new(repo));
        let out = tool
            .call(RecentCommitsArgs {
                count: Some(100),
                include_hashes: false,
            })
            .await
            .unwrap();
        assert_eq!(out.lines().count(), 5);
    }

    #[tokio::test]
    async fn test_recent_commits_zero_becomes_one() {
        let mut repo = MockRepoQueries::new();
        repo.expect_recent_subjects()
            .withf(|n| *n == 1)
            .returning(|_| "only\n".to_string());
        let tool = RecentCommitsTool::new(Arc::new(repo));
        let out = tool
            .call(RecentCommitsArgs {
                count: Some(0),
                include_hashes: false,
            })
            .await
            .unwrap();
        assert_eq!(out, "only");
    }

    #[tokio::test]
    async fn test_recent_commits_with_hashes_variant() {
        let mut repo = MockRepoQueries::new();
        repo.expect_recent_commits_with_hashes()
            .returning(|_| "abc1234 feat: x\ndef5678 fix: y\n".to_string());
        let tool = RecentCommitsTool::new(Arc::new(repo));
        let out = tool
            .call(RecentCommitsArgs {
                count: Some(2),
                include_hashes: true,
            })
            .await
            .unwrap();
        assert!(out.starts_with("abc1234 feat: x"));
    }

    #[tokio::test]
    async fn test_git_status_marks_empty_sections() {
        let mut repo = MockRepoQueries::new();
        repo.expect_staged_files().returning(|| "src/lib.rs\n".into());
        repo.expect_unstaged_files().returning(String::new);
        repo.expect_untracked_files().returning(|| "notes.txt\n".into());
        let tool = GitStatusTool::new(Arc::new(repo));
        let out = tool.call(GitStatusArgs {}).await.unwrap();
        assert!(out.contains("## Staged\nsrc/lib.rs"));
        assert!(out.contains("## Unstaged\n(none)"));
        assert!(out.contains("## Untracked\nnotes.txt"));
    }

    #[tokio::test]
    async fn test_file_diff_rejects_traversal() {
        let tool = FileDiffTool::new(Arc::new(MockRepoQueries::new()));
        let err = tool
            .call(FileDiffArgs {
                path: "../outside.rs".into(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::Traversal(_)));
    }
}
