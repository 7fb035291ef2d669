//! Model-invocation port.
//!
//! The orchestrator talks to the model only through [`ModelPort`]: one call
//! takes the full transcript plus tool definitions and yields exactly one
//! assistant [`Message`]. Failures are fatal to the session and are never
//! retried here.

use async_trait::async_trait;
use rig::completion::ToolDefinition;
use thiserror::Error;

use crate::transcript::{Message, Transcript};

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("authentication rejected by provider (HTTP {status})")]
    Authentication { status: u16 },

    #[error("rate limited by provider")]
    RateLimited,

    #[error("provider returned HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("could not decode provider response: {0}")]
    Decode(String),

    #[error("provider response contained no choices")]
    EmptyResponse,
}

impl From<reqwest::Error> for ModelError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            Self::Decode(e.to_string())
        } else {
            Self::Transport(e.to_string())
        }
    }
}

impl ModelError {
    /// Map a non-success HTTP status and its body to an error.
    pub fn from_status(status: u16, body: String) -> Self {
        match status {
            401 | 403 => Self::Authentication { status },
            429 => Self::RateLimited,
            _ => Self::Http { status, body },
        }
    }
}

#[async_trait]
pub trait ModelPort: Send + Sync {
    /// Identifier logged with each session.
    fn model_id(&self) -> &str;

    async fn invoke(
        &self,
        transcript: &Transcript,
        tools: &[ToolDefinition],
    ) -> Result<Message, ModelError>;
}
