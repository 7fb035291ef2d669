//! Tool-call notifications for callers that want to surface progress.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::mpsc;

use crate::transcript::ToolCallRequest;

const ARGS_PREVIEW_CHARS: usize = 120;

/// One tool invocation as seen by observers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolEvent {
    pub tool: String,
    pub call_id: String,
    /// Compact JSON of the arguments, cut to a short preview.
    pub args_summary: String,
    pub timestamp: DateTime<Utc>,
}

impl ToolEvent {
    pub fn from_request(request: &ToolCallRequest) -> Self {
        Self {
            tool: request.name.clone(),
            call_id: request.id.clone(),
            args_summary: summarize_args(&request.arguments),
            timestamp: Utc::now(),
        }
    }
}

fn summarize_args(args: &serde_json::Value) -> String {
    let compact = args.to_string();
    if compact.chars().count() <= ARGS_PREVIEW_CHARS {
        return compact;
    }
    let mut preview: String = compact.chars().take(ARGS_PREVIEW_CHARS).collect();
    preview.push_str("...");
    preview
}

/// Receives a notification before each tool dispatch.
///
/// Called synchronously from the orchestration loop; implementations must
/// not block.
pub trait ToolObserver: Send + Sync {
    fn on_tool_call(&self, event: &ToolEvent);

    /// Called after the tool finished. `ok` is false when it failed.
    fn on_tool_result(&self, _event: &ToolEvent, _ok: bool) {}
}

/// Logs each tool call at `info`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl ToolObserver for TracingObserver {
    fn on_tool_call(&self, event: &ToolEvent) {
        tracing::info!(
            tool = %event.tool,
            call_id = %event.call_id,
            args = %event.args_summary,
            "Tool call"
        );
    }

    fn on_tool_result(&self, event: &ToolEvent, ok: bool) {
        tracing::debug!(tool = %event.tool, call_id = %event.call_id, ok, "Tool finished");
    }
}

/// Forwards events over an unbounded channel. A closed receiver is ignored.
#[derive(Debug, Clone)]
pub struct ChannelObserver {
    tx: mpsc::UnboundedSender<ToolEvent>,
}

impl ChannelObserver {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ToolEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl ToolObserver for ChannelObserver {
    fn on_tool_call(&self, event: &ToolEvent) {
        let _ = self.tx.send(event.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_summary_is_compact_and_bounded() {
        let long = "x".repeat(500);
        let req = ToolCallRequest::new("c1", "read_file", serde_json::json!({ "path": long }));
        let event = ToolEvent::from_request(&req);
        assert!(event.args_summary.starts_with("{\"path\":\"xxx"));
        assert_eq!(event.args_summary.chars().count(), ARGS_PREVIEW_CHARS + 3);
    }

    #[test]
    fn test_channel_observer_forwards_events() {
        let (observer, mut rx) = ChannelObserver::new();
        let req = ToolCallRequest::new("c9", "git_status", serde_json::json!({}));
        observer.on_tool_call(&ToolEvent::from_request(&req));
        let got = rx.try_recv().unwrap();
        assert_eq!(got.tool, "git_status");
        assert_eq!(got.call_id, "c9");
        assert_eq!(got.args_summary, "{}");
    }

    #[test]
    fn test_channel_observer_survives_dropped_receiver() {
        let (observer, rx) = ChannelObserver::new();
        drop(rx);
        let req = ToolCallRequest::new("c1", "git_status", serde_json::json!({}));
        observer.on_tool_call(&ToolEvent::from_request(&req));
    }
}
