//! Google Gemini adapter.
//!
//! Targets the `streamGenerateContent` API with SSE framing. Auth is an
//! API key passed as a query parameter (`key={api_key}`).
//!
//! The session's tagged history maps onto Gemini's multi-turn convention:
//! text and tool results ride in `user`-role contents (tool results as
//! `functionResponse` parts), model text and tool calls in `model`-role
//! contents (`functionCall` parts).

use serde_json::Value;

use vg_domain::error::{Error, Result};
use vg_domain::history::{ConversationHistory, Part, Role, Turn};
use vg_domain::stream::{BoxStream, StreamEvent};
use vg_domain::tool::ToolDefinition;

use crate::sse;
use crate::traits::LlmClient;

/// An [`LlmClient`] for the Google Gemini API, bound to one store's system
/// prompt and the static tool schema set at construction.
pub struct GeminiClient {
    base_url: String,
    api_key: String,
    model: String,
    system_prompt: String,
    tools: Vec<ToolDefinition>,
    client: reqwest::Client,
}

impl GeminiClient {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
        system_prompt: impl Into<String>,
        tools: Vec<ToolDefinition>,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(120))
            .build()
            .map_err(|e| Error::Http(e.to_string()))?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: model.into(),
            system_prompt: system_prompt.into(),
            tools,
            client,
        })
    }

    fn stream_url(&self) -> String {
        format!(
            "{}/v1beta/models/{}:streamGenerateContent?alt=sse&key={}",
            self.base_url, self.model, self.api_key
        )
    }

    fn build_body(&self, history: &ConversationHistory) -> Value {
        let contents: Vec<Value> = history.turns().iter().map(turn_to_gemini).collect();

        let mut body = serde_json::json!({
            "contents": contents,
            "systemInstruction": {
                "parts": [{"text": self.system_prompt}]
            },
        });

        if !self.tools.is_empty() {
            let function_declarations: Vec<Value> =
                self.tools.iter().map(tool_to_gemini).collect();
            body["tools"] = serde_json::json!([{
                "functionDeclarations": function_declarations,
            }]);
        }

        body
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// History serialization
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn turn_to_gemini(turn: &Turn) -> Value {
    let role = match turn.role {
        Role::User => "user",
        Role::Model => "model",
    };
    let parts: Vec<Value> = turn
        .parts
        .iter()
        .map(|part| match part {
            Part::Text { text } => serde_json::json!({"text": text}),
            Part::ToolCall { name, args } => serde_json::json!({
                "functionCall": {
                    "name": name,
                    "args": args,
                }
            }),
            Part::ToolResult { name, payload } => serde_json::json!({
                "functionResponse": {
                    "name": name,
                    "response": payload,
                }
            }),
        })
        .collect();

    serde_json::json!({
        "role": role,
        "parts": parts,
    })
}

fn tool_to_gemini(tool: &ToolDefinition) -> Value {
    serde_json::json!({
        "name": tool.name,
        "description": tool.description,
        "parameters": tool.parameters,
    })
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Streaming response parsing
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Parse a single Gemini streaming SSE data payload into stream events.
fn parse_gemini_sse_data(data: &str) -> Vec<Result<StreamEvent>> {
    let mut events = Vec::new();

    let v: Value = match serde_json::from_str(data) {
        Ok(v) => v,
        Err(e) => {
            events.push(Err(Error::Json(e)));
            return events;
        }
    };

    let candidate = match v
        .get("candidates")
        .and_then(|c| c.as_array())
        .and_then(|a| a.first())
    {
        Some(c) => c,
        None => return events,
    };

    if let Some(parts) = candidate
        .get("content")
        .and_then(|c| c.get("parts"))
        .and_then(|p| p.as_array())
    {
        for part in parts {
            if let Some(text) = part.get("text").and_then(|v| v.as_str()) {
                if !text.is_empty() {
                    events.push(Ok(StreamEvent::Token {
                        text: text.to_string(),
                    }));
                }
            }
            if let Some(fc) = part.get("functionCall") {
                let name = fc
                    .get("name")
                    .and_then(|v| v.as_str())
                    .unwrap_or("")
                    .to_string();
                let args = fc
                    .get("args")
                    .cloned()
                    .unwrap_or(Value::Object(Default::default()));
                events.push(Ok(StreamEvent::ToolCall { name, args }));
            }
        }
    }

    if let Some(fr) = candidate.get("finishReason").and_then(|v| v.as_str()) {
        let finish_reason = match fr {
            "STOP" => "stop".to_string(),
            "MAX_TOKENS" => "length".to_string(),
            other => other.to_lowercase(),
        };
        events.push(Ok(StreamEvent::Done {
            finish_reason: Some(finish_reason),
        }));
    }

    events
}

/// Redact the API key from a URL for safe logging.
fn redact_url_key(url: &str) -> String {
    if let Some(idx) = url.find("key=") {
        let prefix = &url[..idx + 4];
        let rest = &url[idx + 4..];
        let end = rest.find('&').unwrap_or(rest.len());
        format!("{prefix}[REDACTED]{}", &rest[end..])
    } else {
        url.to_string()
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Trait implementation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[async_trait::async_trait]
impl LlmClient for GeminiClient {
    async fn stream_generate(
        &self,
        history: &ConversationHistory,
    ) -> Result<BoxStream<'static, Result<StreamEvent>>> {
        let url = self.stream_url();
        let body = self.build_body(history);

        tracing::debug!(
            model = %self.model,
            url = %redact_url_key(&url),
            turns = history.len(),
            "gemini stream request"
        );

        let resp = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::Http(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let err_text = resp.text().await.unwrap_or_default();
            return Err(Error::Provider {
                provider: "gemini".into(),
                message: format!("HTTP {} - {}", status.as_u16(), err_text),
            });
        }

        Ok(sse::sse_response_stream(resp, parse_gemini_sse_data))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn client_with_tools(tools: Vec<ToolDefinition>) -> GeminiClient {
        GeminiClient::new(
            "https://generativelanguage.googleapis.com",
            "test-key",
            "gemini-2.0-flash",
            "You are the voice of Gogi Grill.",
            tools,
        )
        .unwrap()
    }

    #[test]
    fn body_maps_roles_and_parts() {
        let client = client_with_tools(vec![]);
        let mut history = ConversationHistory::new();
        history.push(Turn::user_text("show me the menu"));
        history.push(Turn::model_tool_call("get_menu", json!({})));
        history.push(Turn::user_tool_result("get_menu", json!({"menu": "bulgogi"})));
        history.push(Turn::model_text("we have bulgogi"));

        let body = client.build_body(&history);
        let contents = body["contents"].as_array().unwrap();
        assert_eq!(contents.len(), 4);
        assert_eq!(contents[0]["role"], "user");
        assert_eq!(contents[1]["role"], "model");
        assert_eq!(contents[1]["parts"][0]["functionCall"]["name"], "get_menu");
        assert_eq!(contents[2]["role"], "user");
        assert_eq!(
            contents[2]["parts"][0]["functionResponse"]["response"]["menu"],
            "bulgogi"
        );
        assert_eq!(contents[3]["parts"][0]["text"], "we have bulgogi");
        assert_eq!(
            body["systemInstruction"]["parts"][0]["text"],
            "You are the voice of Gogi Grill."
        );
        assert!(body.get("tools").is_none());
    }

    #[test]
    fn body_declares_tools() {
        let client = client_with_tools(vec![ToolDefinition {
            name: "get_menu".into(),
            description: "Return the menu".into(),
            parameters: json!({"type": "object", "properties": {}}),
        }]);
        let body = client.build_body(&ConversationHistory::new());
        assert_eq!(
            body["tools"][0]["functionDeclarations"][0]["name"],
            "get_menu"
        );
    }

    #[test]
    fn parse_text_chunk() {
        let data = r#"{"candidates":[{"content":{"parts":[{"text":"We're open "}]}}]}"#;
        let events = parse_gemini_sse_data(data);
        assert_eq!(events.len(), 1);
        assert!(matches!(
            &events[0],
            Ok(StreamEvent::Token { text }) if text == "We're open "
        ));
    }

    #[test]
    fn parse_function_call_and_finish() {
        let data = r#"{"candidates":[{"content":{"parts":[{"functionCall":{"name":"get_menu","args":{}}}]},"finishReason":"STOP"}]}"#;
        let events = parse_gemini_sse_data(data);
        assert_eq!(events.len(), 2);
        assert!(matches!(
            &events[0],
            Ok(StreamEvent::ToolCall { name, .. }) if name == "get_menu"
        ));
        assert!(matches!(
            &events[1],
            Ok(StreamEvent::Done { finish_reason: Some(r) }) if r == "stop"
        ));
    }

    #[test]
    fn parse_invalid_json_yields_error() {
        let events = parse_gemini_sse_data("not json");
        assert_eq!(events.len(), 1);
        assert!(events[0].is_err());
    }

    #[test]
    fn redacts_api_key() {
        let url = "https://host/v1beta/models/m:streamGenerateContent?alt=sse&key=secret123";
        assert!(!redact_url_key(url).contains("secret123"));
    }
}
