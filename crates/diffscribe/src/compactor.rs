//! Diff compaction: turns raw staged-change queries into a bounded payload.
//!
//! The 1-line-context diff is used while its estimated size stays within
//! [`WIDE_TOKEN_LIMIT`]; larger changesets fall back to the 0-line-context
//! rendering with an explicit annotation. Lines are never cut.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::git::RepoQueries;

/// Estimated-token ceiling for emitting the 1-line-context diff.
pub const WIDE_TOKEN_LIMIT: usize = 2000;

/// Characters per token used by [`estimate_tokens`].
const CHARS_PER_TOKEN: usize = 4;

static INSERTIONS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d+) insertions?\(\+\)").expect("INSERTIONS_RE regex should compile")
});
static DELETIONS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d+) deletions?\(-\)").expect("DELETIONS_RE regex should compile")
});
static FILES_CHANGED_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d+) files? changed").expect("FILES_CHANGED_RE regex should compile")
});

/// Amount of hunk context carried in [`DiffBundle::diff_text`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContextLevel {
    /// One line of context around each hunk.
    Wide,
    /// No context lines.
    Narrow,
}

impl ContextLevel {
    /// Number of unified-diff context lines this level corresponds to.
    pub fn context_lines(self) -> u32 {
        match self {
            Self::Wide => 1,
            Self::Narrow => 0,
        }
    }
}

impl fmt::Display for ContextLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Wide => write!(f, "wide"),
            Self::Narrow => write!(f, "narrow"),
        }
    }
}

/// Change status from `git diff --name-status`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileStatus {
    Added,
    Modified,
    Deleted,
    Renamed,
    Copied,
    TypeChanged,
    Unmerged,
    Unknown,
}

impl FileStatus {
    fn from_code(code: &str) -> Self {
        match code.chars().next() {
            Some('A') => Self::Added,
            Some('M') => Self::Modified,
            Some('D') => Self::Deleted,
            Some('R') => Self::Renamed,
            Some('C') => Self::Copied,
            Some('T') => Self::TypeChanged,
            Some('U') => Self::Unmerged,
            _ => Self::Unknown,
        }
    }

    /// Single-letter code as git prints it.
    pub fn code(self) -> char {
        match self {
            Self::Added => 'A',
            Self::Modified => 'M',
            Self::Deleted => 'D',
            Self::Renamed => 'R',
            Self::Copied => 'C',
            Self::TypeChanged => 'T',
            Self::Unmerged => 'U',
            Self::Unknown => '?',
        }
    }
}

/// One staged path and its status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileChange {
    pub path: String,
    pub status: FileStatus,
}

/// Totals from the `--stat` summary line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffStats {
    pub files_changed: usize,
    pub insertions: usize,
    pub deletions: usize,
}

/// Raw collaborator output fed to [`compact`]. Failed queries are `""`.
#[derive(Debug, Clone, Default)]
pub struct RawDiff {
    pub name_status: String,
    pub stat: String,
    /// Staged diff with 1 line of context.
    pub diff_wide: String,
    /// Staged diff with 0 lines of context.
    pub diff_narrow: String,
}

impl RawDiff {
    /// Run every query the compactor needs against `repo`.
    pub fn collect(repo: &dyn RepoQueries) -> Self {
        Self {
            name_status: repo.name_status(),
            stat: repo.stat_summary(),
            diff_wide: repo.staged_diff(ContextLevel::Wide.context_lines()),
            diff_narrow: repo.staged_diff(ContextLevel::Narrow.context_lines()),
        }
    }
}

/// The compacted view of the staged changes handed to a generation session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffBundle {
    pub file_list: Vec<FileChange>,
    pub stats: DiffStats,
    /// Pre-reduced diff; never the full-context rendering.
    pub diff_text: String,
    pub context_level: ContextLevel,
    /// Raw `--stat` output, carried into the payload verbatim.
    stat_text: String,
}

impl DiffBundle {
    /// The "nothing staged" bundle.
    pub fn empty() -> Self {
        Self {
            file_list: Vec::new(),
            stats: DiffStats::default(),
            diff_text: String::new(),
            context_level: ContextLevel::Wide,
            stat_text: String::new(),
        }
    }

    /// `true` when there is nothing to summarize.
    pub fn is_empty(&self) -> bool {
        self.file_list.is_empty()
    }

    /// Structured text block sent to the model.
    pub fn payload(&self) -> String {
        let mut out = String::new();

        out.push_str("## Files changed\n");
        for change in &self.file_list {
            out.push_str(&format!("{}\t{}\n", change.status.code(), change.path));
        }

        out.push_str("\n## Summary\n");
        if self.stat_text.trim().is_empty() {
            out.push_str(&format!(
                "{} file(s) changed, {} insertion(s), {} deletion(s)\n",
                self.stats.files_changed, self.stats.insertions, self.stats.deletions
            ));
        } else {
            out.push_str(self.stat_text.trim_end());
            out.push('\n');
        }

        if self.context_level == ContextLevel::Narrow {
            out.push_str(&format!(
                "\nNote: large changeset ({} files). The diff below is rendered \
                 without surrounding context lines.\n",
                self.file_list.len()
            ));
        }

        out.push_str("\n## Diff\n");
        out.push_str(self.diff_text.trim_end());
        out.push('\n');
        out
    }
}

/// Token estimate used for the context decision: characters / 4.
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count() / CHARS_PER_TOKEN
}

/// Build a [`DiffBundle`] from raw query output.
pub fn compact(raw: RawDiff) -> DiffBundle {
    let file_list = parse_name_status(&raw.name_status);
    if file_list.is_empty() {
        debug!("no staged files, returning empty bundle");
        return DiffBundle::empty();
    }

    let mut stats = parse_stat_summary(&raw.stat);
    if stats.files_changed == 0 {
        stats.files_changed = file_list.len();
    }

    let estimate = estimate_tokens(&raw.diff_wide);
    let (context_level, diff_text) = if estimate <= WIDE_TOKEN_LIMIT {
        (ContextLevel::Wide, raw.diff_wide)
    } else {
        (ContextLevel::Narrow, raw.diff_narrow)
    };

    debug!(
        files = file_list.len(),
        estimate,
        context_level = %context_level,
        "diff compacted"
    );

    DiffBundle {
        file_list,
        stats,
        diff_text,
        context_level,
        stat_text: raw.stat,
    }
}

/// Query `repo` and compact the result.
pub fn collect(repo: &dyn RepoQueries) -> DiffBundle {
    compact(RawDiff::collect(repo))
}

/// Parse `git diff --name-status` output. Renames and copies keep the new path.
pub fn parse_name_status(output: &str) -> Vec<FileChange> {
    output
        .lines()
        .filter_map(|line| {
            let mut fields = line.split('\t');
            let code = fields.next()?.trim();
            if code.is_empty() {
                return None;
            }
            let path = fields.last()?.trim();
            if path.is_empty() {
                return None;
            }
            Some(FileChange {
                path: path.to_string(),
                status: FileStatus::from_code(code),
            })
        })
        .collect()
}

/// Parse the trailing summary line of `git diff --stat`.
pub fn parse_stat_summary(output: &str) -> DiffStats {
    let Some(summary) = output.lines().rev().find(|l| l.contains("changed")) else {
        return DiffStats::default();
    };
    let capture = |re: &Regex| -> usize {
        re.captures(summary)
            .and_then(|c| c.get(1))
            .and_then(|m| m.as_str().parse().ok())
            .unwrap_or(0)
    };
    DiffStats {
        files_changed: capture(&FILES_CHANGED_RE),
        insertions: capture(&INSERTIONS_RE),
        deletions: capture(&DELETIONS_RE),
    }
}
