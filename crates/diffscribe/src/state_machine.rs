//! Turn state machine for the tool-use loop.
//!
//! The loop alternates between asking the model (`Agent`) and running the
//! tools it requested (`Tools`) until the model answers without tools
//! (`End`). `advance()` rejects any edge outside that graph and records
//! every accepted one.

use std::fmt;
use std::time::Instant;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoopState {
    /// Waiting on the model for the next assistant message.
    Agent,
    /// Dispatching the tool calls of the latest assistant message.
    Tools,
    /// The latest assistant message is the answer. Terminal.
    End,
}

impl LoopState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::End)
    }
}

impl fmt::Display for LoopState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Agent => write!(f, "Agent"),
            Self::Tools => write!(f, "Tools"),
            Self::End => write!(f, "End"),
        }
    }
}

/// ```text
/// Agent → Tools | End
/// Tools → Agent
/// ```
fn is_legal_transition(from: LoopState, to: LoopState) -> bool {
    use LoopState::*;

    matches!((from, to), (Agent, Tools) | (Agent, End) | (Tools, Agent))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransitionRecord {
    pub from: LoopState,
    pub to: LoopState,
    /// Model turn the transition happened in (1-based).
    pub turn: u32,
    /// Milliseconds since the state machine was created.
    pub elapsed_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Error returned when an illegal transition is attempted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IllegalTransition {
    pub from: LoopState,
    pub to: LoopState,
}

impl fmt::Display for IllegalTransition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Illegal state transition: {} → {}", self.from, self.to)
    }
}

impl std::error::Error for IllegalTransition {}

pub struct StateMachine {
    current: LoopState,
    turn: u32,
    created_at: Instant,
    transitions: Vec<TransitionRecord>,
}

impl StateMachine {
    /// Start at `Agent`, turn 1.
    pub fn new() -> Self {
        Self {
            current: LoopState::Agent,
            turn: 1,
            created_at: Instant::now(),
            transitions: Vec::new(),
        }
    }

    pub fn current(&self) -> LoopState {
        self.current
    }

    /// Number of model turns entered so far.
    pub fn turn(&self) -> u32 {
        self.turn
    }

    /// Move to `to`, or fail without changing state if the edge is illegal.
    ///
    /// Re-entering `Agent` starts a new turn.
    pub fn advance(&mut self, to: LoopState, reason: Option<&str>) -> Result<(), IllegalTransition> {
        if !is_legal_transition(self.current, to) {
            return Err(IllegalTransition {
                from: self.current,
                to,
            });
        }

        let record = TransitionRecord {
            from: self.current,
            to,
            turn: self.turn,
            elapsed_ms: self.created_at.elapsed().as_millis() as u64,
            reason: reason.map(String::from),
        };

        tracing::debug!(from = %self.current, to = %to, turn = self.turn, "State transition");

        self.transitions.push(record);
        self.current = to;
        if to == LoopState::Agent {
            self.turn += 1;
        }
        Ok(())
    }

    pub fn is_terminal(&self) -> bool {
        self.current.is_terminal()
    }

    pub fn transitions(&self) -> &[TransitionRecord] {
        &self.transitions
    }

    /// Consume the machine, keeping only its log.
    pub fn into_transitions(self) -> Vec<TransitionRecord> {
        self.transitions
    }

    /// One-line history, e.g. `Agent → End (3ms, 1 transitions)`.
    pub fn summary(&self) -> String {
        let mut out = format!(
            "{} → {} ({}ms, {} transitions)",
            LoopState::Agent,
            self.current,
            self.created_at.elapsed().as_millis(),
            self.transitions.len(),
        );
        if !self.transitions.is_empty() {
            let states: Vec<String> = self.transitions.iter().map(|t| t.to.to_string()).collect();
            out.push_str(&format!(" [{}]", states.join(" → ")));
        }
        out
    }
}

impl Default for StateMachine {
    fn default() -> Self {
        Self::new()
    }
}
