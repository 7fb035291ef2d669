//! Tool-use loop driving the model to a final answer.
//!
//! ```text
//!   Agent ──(tool calls)──▶ Tools
//!     ▲                       │
//!     └───────────────────────┘
//!   Agent ──(no tool calls)──▶ End
//! ```
//!
//! Tool calls in one assistant turn are dispatched sequentially, in the
//! order the model listed them. Tool failures become error results in the
//! transcript; only a model failure aborts the run.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crate::model::{ModelError, ModelPort};
use crate::provider::{ChatEndpoint, OpenAiChatModel};
use crate::state_machine::{IllegalTransition, LoopState, StateMachine, TransitionRecord};
use crate::tools::observer::{ToolEvent, ToolObserver, TracingObserver};
use crate::tools::registry::{ToolOutcome, ToolRegistry};
use crate::tools::ToolError;
use crate::transcript::{Message, Transcript};

/// Default per-session tool-call budget.
pub const DEFAULT_MAX_TOOL_CALLS: usize = 8;

#[derive(Debug, Error)]
pub enum OrchestrationError {
    #[error(transparent)]
    Model(#[from] ModelError),

    #[error(transparent)]
    IllegalTransition(#[from] IllegalTransition),
}

/// Everything needed to build an [`Orchestrator`] against a remote model.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub model: String,
    pub base_url: String,
    pub api_key: Option<String>,
    pub temperature: f32,
    pub request_timeout_secs: u64,
    /// `None` disables the budget.
    pub max_tool_calls: Option<usize>,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".into(),
            base_url: "https://api.openai.com/v1".into(),
            api_key: None,
            temperature: 0.2,
            request_timeout_secs: 120,
            max_tool_calls: Some(DEFAULT_MAX_TOOL_CALLS),
        }
    }
}

/// Result of one run to `End`.
#[derive(Debug)]
pub struct RunOutcome {
    /// The terminal assistant message, unsanitized.
    pub final_message: Message,
    pub transcript: Transcript,
    pub transitions: Vec<TransitionRecord>,
    /// Model invocations made.
    pub turns: u32,
    /// Tool calls that were actually executed (budget refusals excluded).
    pub tool_calls: usize,
    pub tool_events: Vec<ToolEvent>,
}

pub struct Orchestrator {
    model: Arc<dyn ModelPort>,
    registry: ToolRegistry,
    observer: Arc<dyn ToolObserver>,
    max_tool_calls: Option<usize>,
}

impl Orchestrator {
    pub fn new(model: Arc<dyn ModelPort>, registry: ToolRegistry) -> Self {
        Self {
            model,
            registry,
            observer: Arc::new(TracingObserver),
            max_tool_calls: Some(DEFAULT_MAX_TOOL_CALLS),
        }
    }

    /// Build an orchestrator backed by an OpenAI-compatible endpoint.
    pub fn from_config(
        config: &OrchestratorConfig,
        registry: ToolRegistry,
    ) -> Result<Self, ModelError> {
        let model = OpenAiChatModel::new(ChatEndpoint {
            base_url: config.base_url.clone(),
            model: config.model.clone(),
            api_key: config.api_key.clone(),
            temperature: config.temperature,
            request_timeout: Duration::from_secs(config.request_timeout_secs),
        })?;
        Ok(Self::new(Arc::new(model), registry).with_max_tool_calls(config.max_tool_calls))
    }

    pub fn with_observer(mut self, observer: Arc<dyn ToolObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn with_max_tool_calls(mut self, limit: Option<usize>) -> Self {
        self.max_tool_calls = limit;
        self
    }

    pub fn model_id(&self) -> &str {
        self.model.model_id()
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Drive `transcript` (seeded with system + user) until the model answers
    /// without tool calls.
    pub async fn run(&self, mut transcript: Transcript) -> Result<RunOutcome, OrchestrationError> {
        let definitions = self.registry.definitions().await;
        let mut sm = StateMachine::new();
        let mut executed = 0usize;
        let mut events = Vec::new();
        let mut turns = 0u32;

        loop {
            match sm.current() {
                LoopState::Agent => {
                    turns += 1;
                    let reply = self.model.invoke(&transcript, &definitions).await?;
                    let wants_tools = reply.requests_tools();
                    let calls = reply.tool_calls.len();
                    transcript.push(reply);

                    if wants_tools {
                        let reason = format!("{calls} tool call(s)");
                        sm.advance(LoopState::Tools, Some(reason.as_str()))?;
                    } else {
                        sm.advance(LoopState::End, Some("final answer"))?;
                    }
                }
                LoopState::Tools => {
                    let requests = transcript
                        .last()
                        .map(|m| m.tool_calls.clone())
                        .unwrap_or_default();

                    for request in &requests {
                        let event = ToolEvent::from_request(request);
                        self.observer.on_tool_call(&event);

                        let outcome = match self.max_tool_calls {
                            Some(limit) if executed >= limit => {
                                tracing::warn!(
                                    tool = %request.name,
                                    limit,
                                    "Tool-call budget exhausted"
                                );
                                ToolOutcome::Failure(ToolError::BudgetExceeded { limit })
                            }
                            _ => {
                                executed += 1;
                                self.registry.dispatch(request).await
                            }
                        };

                        self.observer.on_tool_result(&event, outcome.is_success());
                        events.push(event);
                        transcript.push(Message::tool_result(
                            request.id.clone(),
                            outcome.into_transcript_text(),
                        ));
                    }

                    sm.advance(LoopState::Agent, Some("tool results appended"))?;
                }
                LoopState::End => break,
            }
        }

        tracing::debug!(summary = %sm.summary(), "Orchestration finished");

        // End is only reachable right after an assistant message was pushed.
        let final_message = transcript
            .last_assistant()
            .cloned()
            .unwrap_or_else(|| Message::assistant(""));

        Ok(RunOutcome {
            final_message,
            transcript,
            transitions: sm.into_transitions(),
            turns,
            tool_calls: executed,
            tool_events: events,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_budget() {
        let cfg = OrchestratorConfig::default();
        assert_eq!(cfg.max_tool_calls, Some(DEFAULT_MAX_TOOL_CALLS));
    }

    #[test]
    fn test_from_config_carries_model_and_budget() {
        let cfg = OrchestratorConfig {
            model: "local-coder".into(),
            base_url: "http://127.0.0.1:9/v1".into(),
            max_tool_calls: None,
            ..OrchestratorConfig::default()
        };
        let orch = Orchestrator::from_config(&cfg, ToolRegistry::new(Vec::new())).unwrap();
        assert_eq!(orch.model_id(), "local-coder");
        assert!(orch.max_tool_calls.is_none());
        assert!(orch.registry().is_empty());
    }
}
