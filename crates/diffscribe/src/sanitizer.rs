//! Cleanup of raw model output into a bare commit message.
//!
//! Models tend to wrap the message in chatter ("Here's a commit message:"),
//! code fences, or a paragraph of reasoning. [`sanitize`] strips those and
//! is idempotent.

use std::sync::LazyLock;

use regex::Regex;

use crate::config::Preferences;

static PREAMBLE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^\s*(?:here is|here's|based on|looking at|this is|the commit message is|commit message)\b[^:\n]*:\s*",
    )
    .expect("preamble regex should compile")
});

// An info string only counts when the fence line ends there; otherwise just
// the bare backticks go, so "```feat: x```" keeps its type.
static FENCE_OPEN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^```(?:[\w.+-]+[ \t]*\n|[ \t]*\n?)").expect("fence regex should compile")
});

static FENCE_CLOSE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n?```\s*$").expect("fence regex should compile"));

/// Conventional-commit type prefixes recognised when hunting for the subject.
pub const CONVENTIONAL_PREFIXES: &[&str] = &[
    "feat:", "fix:", "chore:", "docs:", "style:", "refactor:", "test:", "perf:", "ci:", "build:",
    "revert:",
];

fn sanitize_once(content: &str, prefs: &Preferences) -> String {
    let text = content.trim();
    let text = PREAMBLE_RE.replace(text, "");
    let text = FENCE_OPEN_RE.replace(&text, "");
    let text = FENCE_CLOSE_RE.replace(&text, "").into_owned();

    let text = if prefs.use_conventional_commits {
        drop_lines_before_subject(&text)
    } else {
        text
    };
    text.trim().to_string()
}

fn drop_lines_before_subject(text: &str) -> String {
    let lines: Vec<&str> = text.lines().collect();
    if lines.len() <= 3 {
        return text.to_string();
    }
    let subject = lines.iter().position(|line| {
        let lower = line.trim().to_lowercase();
        CONVENTIONAL_PREFIXES.iter().any(|p| lower.starts_with(p))
    });
    match subject {
        Some(idx) if idx > 0 => lines[idx..].join("\n"),
        _ => text.to_string(),
    }
}

/// Strip preambles, code fences, and (with conventional commits on) any
/// lines ahead of the first conventional subject.
pub fn sanitize(content: &str, prefs: &Preferences) -> String {
    let mut current = sanitize_once(content, prefs);
    loop {
        let next = sanitize_once(&current, prefs);
        if next == current {
            return current;
        }
        current = next;
    }
}
