//! Git bridge: read-only repository introspection plus commit/push.
//!
//! Wraps the `git` binary via `std::process::Command`. Every query degrades
//! to an empty string when git is missing, the directory is not a
//! repository, or there is simply nothing to report.

use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{bail, Context, Result};
use tracing::debug;

/// Repository queries consumed by the compactor and the git-backed tools.
///
/// Implementations must never fail: an unavailable answer is `""`.
#[cfg_attr(test, mockall::automock)]
pub trait RepoQueries: Send + Sync {
    /// `git diff --cached --name-status`
    fn name_status(&self) -> String;
    /// `git diff --cached --stat`
    fn stat_summary(&self) -> String;
    /// Staged unified diff rendered with `context` lines around each hunk.
    fn staged_diff(&self, context: u32) -> String;
    /// Paths with staged changes, one per line.
    fn staged_files(&self) -> String;
    /// Paths with unstaged changes, one per line.
    fn unstaged_files(&self) -> String;
    /// Untracked, non-ignored paths, one per line.
    fn untracked_files(&self) -> String;
    /// Subjects of the most recent `count` commits, newest first.
    fn recent_subjects(&self, count: u32) -> String;
    /// `<short-hash> <subject>` pairs for the most recent `count` commits.
    fn recent_commits_with_hashes(&self, count: u32) -> String;
    /// Staged diff restricted to a single path.
    fn staged_file_diff(&self, path: &str) -> String;
}

/// `RepoQueries` backed by the git CLI.
#[derive(Debug, Clone)]
pub struct GitCli {
    repo_root: PathBuf,
}

impl GitCli {
    /// Open the repository containing `dir`, resolving its top-level directory.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        let output = Command::new("git")
            .args(["rev-parse", "--show-toplevel"])
            .current_dir(dir)
            .output()
            .context("Failed to run git rev-parse")?;
        if !output.status.success() {
            bail!("Not a git repository: {}", dir.display());
        }
        let root = String::from_utf8_lossy(&output.stdout).trim().to_string();
        Ok(Self {
            repo_root: PathBuf::from(root),
        })
    }

    /// Top-level directory of the repository (the tool sandbox root).
    pub fn repo_root(&self) -> &Path {
        &self.repo_root
    }

    /// Record the staged changes as a commit with `message`.
    pub fn commit(&self, message: &str) -> Result<()> {
        let output = Command::new("git")
            .args(["commit", "-m", message])
            .current_dir(&self.repo_root)
            .output()
            .context("Failed to run git commit")?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!("git commit failed: {stderr}");
        }
        Ok(())
    }

    /// Push the current branch to its upstream.
    pub fn push(&self) -> Result<()> {
        let output = Command::new("git")
            .arg("push")
            .current_dir(&self.repo_root)
            .output()
            .context("Failed to run git push")?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!("git push failed: {stderr}");
        }
        Ok(())
    }

    fn query(&self, args: &[&str]) -> String {
        match Command::new("git")
            .args(args)
            .current_dir(&self.repo_root)
            .output()
        {
            Ok(out) if out.status.success() => String::from_utf8_lossy(&out.stdout).into_owned(),
            Ok(out) => {
                debug!(
                    args = ?args,
                    code = out.status.code().unwrap_or(-1),
                    stderr = %String::from_utf8_lossy(&out.stderr).trim(),
                    "git query failed, treating as empty"
                );
                String::new()
            }
            Err(e) => {
                debug!(args = ?args, error = %e, "git unavailable, treating as empty");
                String::new()
            }
        }
    }
}

impl RepoQueries for GitCli {
    fn name_status(&self) -> String {
        self.query(&["diff", "--cached", "--name-status"])
    }

    fn stat_summary(&self) -> String {
        self.query(&["diff", "--cached", "--stat"])
    }

    fn staged_diff(&self, context: u32) -> String {
        let unified = format!("--unified={context}");
        self.query(&["diff", "--cached", &unified])
    }

    fn staged_files(&self) -> String {
        self.query(&["diff", "--cached", "--name-only"])
    }

    fn unstaged_files(&self) -> String {
        self.query(&["diff", "--name-only"])
    }

    fn untracked_files(&self) -> String {
        self.query(&["ls-files", "--others", "--exclude-standard"])
    }

    fn recent_subjects(&self, count: u32) -> String {
        let n = format!("-n{count}");
        self.query(&["log", &n, "--pretty=format:%s"])
    }

    fn recent_commits_with_hashes(&self, count: u32) -> String {
        let n = format!("-n{count}");
        self.query(&["log", &n, "--pretty=format:%h %s"])
    }

    fn staged_file_diff(&self, path: &str) -> String {
        self.query(&["diff", "--cached", "--", path])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_non_repo_fails() {
        let dir = tempfile::tempdir().unwrap();
        // Either git is missing or the temp dir is not a repository.
        assert!(GitCli::open(dir.path()).is_err());
    }

    #[test]
    fn test_query_outside_repo_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let git = GitCli {
            repo_root: dir.path().to_path_buf(),
        };
        assert_eq!(git.name_status(), "");
        assert_eq!(git.recent_subjects(3), "");
        assert_eq!(git.staged_file_diff("src/lib.rs"), "");
    }
}
