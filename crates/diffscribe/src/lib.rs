//! diffscribe: commit messages for staged git changes, written by a model
//! that can look around the repository through a small set of read-only tools.
//!
//! Pipeline:
//! 1. [`compactor`] reduces the staged diff to a bounded [`compactor::DiffBundle`].
//! 2. [`session::SessionController`] seeds a transcript from [`prompts`].
//! 3. [`orchestrator::Orchestrator`] runs the Agent/Tools loop against a
//!    [`model::ModelPort`] until the model answers without tool calls.
//! 4. [`sanitizer::sanitize`] strips chatter and fences from the answer.

pub mod compactor;
pub mod config;
pub mod git;
pub mod model;
pub mod orchestrator;
pub mod prompts;
pub mod provider;
pub mod sanitizer;
pub mod session;
pub mod state_machine;
pub mod tools;
pub mod transcript;

pub use compactor::DiffBundle;
pub use config::{AppConfig, MessageStyle, Preferences};
pub use model::{ModelError, ModelPort};
pub use orchestrator::{Orchestrator, OrchestratorConfig};
pub use session::{GenerationError, SessionController};
