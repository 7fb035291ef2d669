//! System and user prompts for commit message generation.
//!
//! Prompt versioning: bump `PROMPT_VERSION` whenever prompt wording changes,
//! so logged sessions can be tied back to the prompt that produced them.

use crate::config::{MessageStyle, Preferences};

/// Prompt version. Bump on any prompt content change.
pub const PROMPT_VERSION: &str = "1.2.0";

const ROLE: &str = "\
You are an expert software engineer writing git commit messages. You are given \
a compacted view of the staged changes: the list of changed files, a short \
statistics summary, and the diff itself.";

const CONVENTIONAL_DIRECTIVE: &str = "\
Use the Conventional Commits format: `<type>: <description>`, where type is one of \
feat, fix, chore, docs, style, refactor, test, perf, ci, build, revert. Use the \
imperative mood and lower case after the colon.";

const FREEFORM_DIRECTIVE: &str = "\
Write the subject in the imperative mood (\"Add\", \"Fix\", \"Remove\"), capitalized, \
without a trailing period.";

const CONCISE_DIRECTIVE: &str = "\
Write a single subject line under 72 characters. No body.";

const DESCRIPTIVE_DIRECTIVE: &str = "\
Write a subject line under 72 characters, then a blank line, then a short body \
wrapped at 72 characters explaining what changed and why.";

const TOOL_DIRECTIVE: &str = "\
## Tools
You may call read-only tools (read_file, list_directory, git_status, file_diff, \
recent_commits) when the diff alone is not enough. Use them sparingly:
- Prefer answering from the diff. Most changes need no tool calls at all.
- Read at most 2 files.
- Never repeat a call with the same arguments.
- Call recent_commits at most once, only to match the repository's style.";

const OUTPUT_DIRECTIVE: &str = "\
## Output
Reply with the commit message only. No preamble, no explanation, no code fences, \
no quotes.";

/// Build the system prompt for the given preferences.
pub fn system_prompt(prefs: &Preferences) -> String {
    let format_directive = if prefs.use_conventional_commits {
        CONVENTIONAL_DIRECTIVE
    } else {
        FREEFORM_DIRECTIVE
    };
    let style_directive = match prefs.style {
        MessageStyle::Concise => CONCISE_DIRECTIVE,
        MessageStyle::Descriptive => DESCRIPTIVE_DIRECTIVE,
    };

    let mut prompt = format!("{ROLE}\n\n## Format\n{format_directive}\n{style_directive}\n");
    if let Some(guideline) = prefs
        .custom_guideline
        .as_deref()
        .map(str::trim)
        .filter(|g| !g.is_empty())
    {
        prompt.push_str(&format!("\n## Project guideline\n{guideline}\n"));
    }
    prompt.push_str(&format!("\n{TOOL_DIRECTIVE}\n\n{OUTPUT_DIRECTIVE}"));
    prompt
}

/// Build the user message carrying the diff payload and optional feedback.
pub fn user_message(payload: &str, feedback: Option<&str>) -> String {
    let mut msg = format!("Generate a commit message for the following staged changes.\n\n{payload}");
    if let Some(feedback) = feedback.map(str::trim).filter(|f| !f.is_empty()) {
        msg.push_str(&format!(
            "\n\n## Feedback on the previous attempt\n{feedback}\n\nAdjust the new message accordingly."
        ));
    }
    msg
}
