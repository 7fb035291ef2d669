//! OpenAI-compatible `/chat/completions` client behind [`ModelPort`].
//!
//! Works against any server speaking the OpenAI chat schema with function
//! tools (OpenAI, llama.cpp, vLLM, LiteLLM proxies, ...).

use std::time::Duration;

use async_trait::async_trait;
use rig::completion::ToolDefinition;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::model::{ModelError, ModelPort};
use crate::transcript::{Message, Role, ToolCallRequest, Transcript};

/// Connection settings for [`OpenAiChatModel`].
#[derive(Debug, Clone)]
pub struct ChatEndpoint {
    /// Base URL including the version prefix, e.g. `https://api.openai.com/v1`.
    pub base_url: String,
    pub model: String,
    pub api_key: Option<String>,
    pub temperature: f32,
    pub request_timeout: Duration,
}

pub struct OpenAiChatModel {
    endpoint: ChatEndpoint,
    client: reqwest::Client,
}

impl OpenAiChatModel {
    pub fn new(endpoint: ChatEndpoint) -> Result<Self, ModelError> {
        let client = reqwest::Client::builder()
            .timeout(endpoint.request_timeout)
            .build()
            .map_err(|e| ModelError::Transport(e.to_string()))?;
        Ok(Self { endpoint, client })
    }

    fn url(&self) -> String {
        format!("{}/chat/completions", self.endpoint.base_url.trim_end_matches('/'))
    }

    fn request_body(&self, transcript: &Transcript, tools: &[ToolDefinition]) -> Value {
        let mut body = json!({
            "model": self.endpoint.model,
            "messages": transcript.iter().map(wire_message).collect::<Vec<_>>(),
            "temperature": self.endpoint.temperature,
            "stream": false,
        });
        if !tools.is_empty() {
            body["tools"] = Value::Array(tools.iter().map(wire_tool).collect());
        }
        body
    }
}

fn wire_message(msg: &Message) -> Value {
    match msg.role {
        Role::System => json!({ "role": "system", "content": msg.content }),
        Role::User => json!({ "role": "user", "content": msg.content }),
        Role::Assistant if msg.tool_calls.is_empty() => {
            json!({ "role": "assistant", "content": msg.content })
        }
        Role::Assistant => {
            let calls: Vec<Value> = msg
                .tool_calls
                .iter()
                .map(|c| {
                    json!({
                        "id": c.id,
                        "type": "function",
                        "function": { "name": c.name, "arguments": c.arguments.to_string() }
                    })
                })
                .collect();
            json!({ "role": "assistant", "content": msg.content, "tool_calls": calls })
        }
        Role::ToolResult => json!({
            "role": "tool",
            "tool_call_id": msg.tool_call_id.as_deref().unwrap_or_default(),
            "content": msg.content,
        }),
    }
}

fn wire_tool(def: &ToolDefinition) -> Value {
    json!({
        "type": "function",
        "function": {
            "name": def.name,
            "description": def.description,
            "parameters": def.parameters,
        }
    })
}

// ---------------------------------------------------------------------------
// Response schema
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Vec<ResponseToolCall>,
}

#[derive(Debug, Deserialize)]
struct ResponseToolCall {
    #[serde(default)]
    id: String,
    function: ResponseFunction,
}

#[derive(Debug, Deserialize)]
struct ResponseFunction {
    name: String,
    #[serde(default)]
    arguments: String,
}

/// Arguments arrive as a JSON-encoded string. Unparseable text is kept as a
/// string value so argument validation reports it to the model.
fn parse_arguments(raw: &str) -> Value {
    if raw.trim().is_empty() {
        return json!({});
    }
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

fn into_message(response: ChatResponse) -> Result<Message, ModelError> {
    let choice = response
        .choices
        .into_iter()
        .next()
        .ok_or(ModelError::EmptyResponse)?;
    let content = choice.message.content.unwrap_or_default();

    if choice.message.tool_calls.is_empty() {
        return Ok(Message::assistant(content));
    }

    let calls = choice
        .message
        .tool_calls
        .into_iter()
        .enumerate()
        .map(|(i, c)| {
            let id = if c.id.is_empty() { format!("call_{i}") } else { c.id };
            ToolCallRequest::new(id, c.function.name, parse_arguments(&c.function.arguments))
        })
        .collect();
    Ok(Message::assistant_with_tools(content, calls))
}

#[async_trait]
impl ModelPort for OpenAiChatModel {
    fn model_id(&self) -> &str {
        &self.endpoint.model
    }

    async fn invoke(
        &self,
        transcript: &Transcript,
        tools: &[ToolDefinition],
    ) -> Result<Message, ModelError> {
        let body = self.request_body(transcript, tools);
        tracing::debug!(
            model = %self.endpoint.model,
            messages = transcript.len(),
            tools = tools.len(),
            "Invoking model"
        );

        let mut request = self.client.post(self.url()).json(&body);
        if let Some(key) = self.endpoint.api_key.as_deref().filter(|k| !k.is_empty()) {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(ModelError::from_status(status.as_u16(), text));
        }

        let parsed: ChatResponse =
            serde_json::from_str(&text).map_err(|e| ModelError::Decode(e.to_string()))?;
        into_message(parsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn endpoint() -> ChatEndpoint {
        ChatEndpoint {
            base_url: "http://localhost:8080/v1/".into(),
            model: "test-model".into(),
            api_key: None,
            temperature: 0.2,
            request_timeout: Duration::from_secs(5),
        }
    }

    #[test]
    fn test_url_strips_trailing_slash() {
        let m = OpenAiChatModel::new(endpoint()).unwrap();
        assert_eq!(m.url(), "http://localhost:8080/v1/chat/completions");
    }

    #[test]
    fn test_request_body_maps_roles_and_tools() {
        let m = OpenAiChatModel::new(endpoint()).unwrap();
        let mut t = Transcript::seeded("sys", "usr");
        t.push(Message::assistant_with_tools(
            "",
            vec![ToolCallRequest::new("c1", "read_file", json!({"path": "a.rs"}))],
        ));
        t.push(Message::tool_result("c1", "fn main() {}"));
        let defs = vec![ToolDefinition {
            name: "read_file".into(),
            description: "read".into(),
            parameters: json!({"type": "object"}),
        }];

        let body = m.request_body(&t, &defs);
        let msgs = body["messages"].as_array().unwrap();
        assert_eq!(msgs[0]["role"], "system");
        assert_eq!(msgs[2]["tool_calls"][0]["function"]["arguments"], "{\"path\":\"a.rs\"}");
        assert_eq!(msgs[3]["role"], "tool");
        assert_eq!(msgs[3]["tool_call_id"], "c1");
        assert_eq!(body["tools"][0]["function"]["name"], "read_file");
    }

    #[test]
    fn test_request_body_omits_empty_tools() {
        let m = OpenAiChatModel::new(endpoint()).unwrap();
        let body = m.request_body(&Transcript::seeded("s", "u"), &[]);
        assert!(body.get("tools").is_none());
    }

    #[test]
    fn test_parse_response_with_tool_calls() {
        let raw = r#"{"choices":[{"message":{"content":null,"tool_calls":[
            {"id":"call_a","type":"function","function":{"name":"git_status","arguments":""}},
            {"id":"call_b","type":"function","function":{"name":"read_file","arguments":"{\"path\":\"x\"}"}}
        ]}}]}"#;
        let msg = into_message(serde_json::from_str(raw).unwrap()).unwrap();
        assert!(msg.requests_tools());
        assert_eq!(msg.tool_calls[0].arguments, json!({}));
        assert_eq!(msg.tool_calls[1].arguments, json!({"path": "x"}));
        assert_eq!(msg.tool_calls[1].id, "call_b");
    }

    #[test]
    fn test_parse_response_keeps_bad_arguments_as_string() {
        assert_eq!(parse_arguments("{oops"), Value::String("{oops".into()));
    }

    #[test]
    fn test_parse_response_without_choices() {
        let err = into_message(serde_json::from_str(r#"{"choices":[]}"#).unwrap()).unwrap_err();
        assert!(matches!(err, ModelError::EmptyResponse));
    }
}
