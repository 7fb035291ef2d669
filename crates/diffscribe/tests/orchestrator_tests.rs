//! Orchestration loop against a scripted model.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use diffscribe::git::RepoQueries;
use diffscribe::model::{ModelError, ModelPort};
use diffscribe::orchestrator::{OrchestrationError, Orchestrator};
use diffscribe::state_machine::LoopState;
use diffscribe::tools::observer::ChannelObserver;
use diffscribe::tools::registry::ToolRegistry;
use diffscribe::transcript::{Message, Role, ToolCallRequest, Transcript};
use rig::completion::ToolDefinition;

/// Replays canned replies in order and records what it was shown.
struct ScriptedModel {
    replies: Mutex<VecDeque<Result<Message, ModelError>>>,
    seen: Mutex<Vec<Transcript>>,
}

impl ScriptedModel {
    fn new(replies: Vec<Result<Message, ModelError>>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into()),
            seen: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> usize {
        self.seen.lock().unwrap().len()
    }
}

#[async_trait]
impl ModelPort for ScriptedModel {
    fn model_id(&self) -> &str {
        "scripted"
    }

    async fn invoke(
        &self,
        transcript: &Transcript,
        _tools: &[ToolDefinition],
    ) -> Result<Message, ModelError> {
        self.seen.lock().unwrap().push(transcript.clone());
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Err(ModelError::EmptyResponse))
    }
}

fn seeded() -> Transcript {
    Transcript::seeded("system", "user")
}

fn list_call(id: &str) -> ToolCallRequest {
    ToolCallRequest::new(id, "list_directory", serde_json::json!({}))
}

/// Git collaborator with nothing to report.
struct NoGit;

impl RepoQueries for NoGit {
    fn name_status(&self) -> String {
        String::new()
    }
    fn stat_summary(&self) -> String {
        String::new()
    }
    fn staged_diff(&self, _context: u32) -> String {
        String::new()
    }
    fn staged_files(&self) -> String {
        String::new()
    }
    fn unstaged_files(&self) -> String {
        String::new()
    }
    fn untracked_files(&self) -> String {
        String::new()
    }
    fn recent_subjects(&self, _count: u32) -> String {
        String::new()
    }
    fn recent_commits_with_hashes(&self, _count: u32) -> String {
        String::new()
    }
    fn staged_file_diff(&self, _path: &str) -> String {
        String::new()
    }
}

fn registry(dir: &tempfile::TempDir) -> ToolRegistry {
    ToolRegistry::standard(dir.path(), Arc::new(NoGit))
}

#[tokio::test]
async fn test_no_tool_calls_goes_straight_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let model = ScriptedModel::new(vec![Ok(Message::assistant("feat: add thing"))]);
    let orch = Orchestrator::new(model.clone(), registry(&dir));

    let out = orch.run(seeded()).await.unwrap();

    assert_eq!(out.final_message.content, "feat: add thing");
    assert_eq!(out.turns, 1);
    assert_eq!(out.tool_calls, 0);
    assert_eq!(out.transitions.len(), 1);
    assert_eq!(out.transitions[0].from, LoopState::Agent);
    assert_eq!(out.transitions[0].to, LoopState::End);
    assert_eq!(out.transcript.len(), 3);
    assert_eq!(model.calls(), 1);
}

#[tokio::test]
async fn test_n_tool_calls_take_one_tools_turn_in_order() {
    let _ = tracing_subscriber::fmt().with_env_filter("info").with_test_writer().try_init();
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("a.txt"), "A").unwrap();
    std::fs::write(dir.path().join("b.txt"), "B").unwrap();

    let calls = vec![
        ToolCallRequest::new("c1", "read_file", serde_json::json!({ "path": "a.txt" })),
        ToolCallRequest::new("c2", "read_file", serde_json::json!({ "path": "b.txt" })),
        ToolCallRequest::new("c3", "read_file", serde_json::json!({ "path": "missing.txt" })),
    ];
    let model = ScriptedModel::new(vec![
        Ok(Message::assistant_with_tools("", calls)),
        Ok(Message::assistant("fix: read both files")),
    ]);
    let orch = Orchestrator::new(model.clone(), registry(&dir));

    let out = orch.run(seeded()).await.unwrap();

    let states: Vec<LoopState> = out.transitions.iter().map(|t| t.to).collect();
    assert_eq!(states, vec![LoopState::Tools, LoopState::Agent, LoopState::End]);

    let results: Vec<&Message> = out
        .transcript
        .iter()
        .filter(|m| m.role == Role::ToolResult)
        .collect();
    assert_eq!(results.len(), 3);
    assert_eq!(results[0].tool_call_id.as_deref(), Some("c1"));
    assert_eq!(results[0].content, "A");
    assert_eq!(results[1].content, "B");
    // A failing tool does not abort the run.
    assert!(results[2].content.starts_with("Error:"));

    assert_eq!(out.turns, 2);
    assert_eq!(out.tool_calls, 3);
    assert_eq!(out.final_message.content, "fix: read both files");

    // The second model call saw all three results.
    let seen = model.seen.lock().unwrap();
    assert_eq!(seen[1].len(), 6);
}

#[tokio::test]
async fn test_budget_refuses_extra_calls() {
    let _ = tracing_subscriber::fmt().with_env_filter("info").with_test_writer().try_init();
    let dir = tempfile::tempdir().unwrap();
    let model = ScriptedModel::new(vec![
        Ok(Message::assistant_with_tools(
            "",
            vec![list_call("c1"), list_call("c2"), list_call("c3")],
        )),
        Ok(Message::assistant("chore: tidy")),
    ]);
    let orch = Orchestrator::new(model, registry(&dir)).with_max_tool_calls(Some(2));

    let out = orch.run(seeded()).await.unwrap();

    let results: Vec<&Message> = out
        .transcript
        .iter()
        .filter(|m| m.role == Role::ToolResult)
        .collect();
    assert_eq!(results.len(), 3);
    assert!(!results[1].content.starts_with("Error:"));
    assert!(results[2].content.contains("tool-call budget of 2 exhausted"));
    assert_eq!(out.tool_calls, 2);
    assert_eq!(out.tool_events.len(), 3);
}

#[tokio::test]
async fn test_model_error_aborts_unmodified() {
    let dir = tempfile::tempdir().unwrap();
    let model = ScriptedModel::new(vec![
        Ok(Message::assistant_with_tools("", vec![list_call("c1")])),
        Err(ModelError::RateLimited),
    ]);
    let orch = Orchestrator::new(model.clone(), registry(&dir));

    let err = orch.run(seeded()).await.unwrap_err();
    assert!(matches!(err, OrchestrationError::Model(ModelError::RateLimited)));
    assert_eq!(err.to_string(), "rate limited by provider");
    assert_eq!(model.calls(), 2);
}

#[tokio::test]
async fn test_observer_sees_each_call() {
    let dir = tempfile::tempdir().unwrap();
    let model = ScriptedModel::new(vec![
        Ok(Message::assistant_with_tools("", vec![list_call("c1")])),
        Ok(Message::assistant_with_tools("", vec![list_call("c2")])),
        Ok(Message::assistant("docs: done")),
    ]);
    let (observer, mut rx) = ChannelObserver::new();
    let orch = Orchestrator::new(model, registry(&dir)).with_observer(Arc::new(observer));

    let out = orch.run(seeded()).await.unwrap();
    assert_eq!(out.turns, 3);

    let first = rx.try_recv().unwrap();
    let second = rx.try_recv().unwrap();
    assert_eq!((first.call_id.as_str(), second.call_id.as_str()), ("c1", "c2"));
    assert_eq!(first.tool, "list_directory");
    assert!(rx.try_recv().is_err());
}
