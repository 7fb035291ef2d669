//! One commit-message generation: prompts in, clean message out.
//!
//! A session never reuses a previous transcript. Regeneration with feedback
//! is a fresh session over the same bundle and preferences.

use std::sync::Arc;

use thiserror::Error;

use crate::compactor::DiffBundle;
use crate::config::Preferences;
use crate::model::ModelError;
use crate::orchestrator::{OrchestrationError, Orchestrator, RunOutcome};
use crate::prompts::{self, PROMPT_VERSION};
use crate::sanitizer::sanitize;
use crate::state_machine::IllegalTransition;
use crate::transcript::Transcript;

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("nothing to summarize: no staged changes")]
    NothingToSummarize,

    /// Model failures pass through untouched.
    #[error(transparent)]
    Model(ModelError),

    #[error("orchestration failed: {0}")]
    Orchestration(IllegalTransition),
}

impl From<OrchestrationError> for GenerationError {
    fn from(err: OrchestrationError) -> Self {
        match err {
            OrchestrationError::Model(e) => Self::Model(e),
            OrchestrationError::IllegalTransition(e) => Self::Orchestration(e),
        }
    }
}

/// Inputs for one generation.
#[derive(Debug, Clone)]
pub struct GenerationSession {
    pub diff: Arc<DiffBundle>,
    pub preferences: Preferences,
    pub feedback: Option<String>,
}

impl GenerationSession {
    pub fn new(diff: Arc<DiffBundle>, preferences: Preferences) -> Self {
        Self {
            diff,
            preferences,
            feedback: None,
        }
    }

    /// Same diff and preferences, new feedback.
    pub fn with_feedback(&self, feedback: impl Into<String>) -> Self {
        Self {
            diff: Arc::clone(&self.diff),
            preferences: self.preferences.clone(),
            feedback: Some(feedback.into()),
        }
    }

    fn transcript(&self) -> Transcript {
        Transcript::seeded(
            prompts::system_prompt(&self.preferences),
            prompts::user_message(&self.diff.payload(), self.feedback.as_deref()),
        )
    }
}

#[derive(Debug)]
pub struct SessionOutcome {
    /// Sanitized commit message.
    pub message: String,
    /// Unsanitized final model reply.
    pub raw: String,
    pub run: RunOutcome,
}

pub struct SessionController<'a> {
    orchestrator: &'a Orchestrator,
}

impl<'a> SessionController<'a> {
    pub fn new(orchestrator: &'a Orchestrator) -> Self {
        Self { orchestrator }
    }

    /// Generate a clean commit message for `diff`.
    pub async fn generate(
        &self,
        diff: &DiffBundle,
        preferences: &Preferences,
        feedback: Option<&str>,
    ) -> Result<String, GenerationError> {
        let session = GenerationSession {
            diff: Arc::new(diff.clone()),
            preferences: preferences.clone(),
            feedback: feedback.map(String::from),
        };
        Ok(self.run(&session).await?.message)
    }

    /// Run `session` and keep the full report.
    pub async fn run(&self, session: &GenerationSession) -> Result<SessionOutcome, GenerationError> {
        if session.diff.is_empty() {
            return Err(GenerationError::NothingToSummarize);
        }

        tracing::info!(
            prompt_version = PROMPT_VERSION,
            model = %self.orchestrator.model_id(),
            files = session.diff.file_list.len(),
            context_level = %session.diff.context_level,
            feedback = session.feedback.is_some(),
            "Generating commit message"
        );

        let run = self.orchestrator.run(session.transcript()).await?;
        let raw = run.final_message.content.clone();
        let message = sanitize(&raw, &session.preferences);

        tracing::info!(
            turns = run.turns,
            tool_calls = run.tool_calls,
            chars = message.len(),
            "Commit message ready"
        );

        Ok(SessionOutcome { message, raw, run })
    }
}
