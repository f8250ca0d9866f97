use serde::Serialize;
use serde_json::Value;
use std::pin::Pin;

/// A boxed async stream, used for LLM streaming responses.
pub type BoxStream<'a, T> = Pin<Box<dyn futures_core::Stream<Item = T> + Send + 'a>>;

/// Events emitted during LLM streaming (provider-agnostic).
///
/// A drained stream's aggregate — the concatenated `Token` text plus at
/// most one `ToolCall` — is the terminal response the session commits.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    /// A text token chunk.
    Token { text: String },

    /// The model is invoking a tool. Gemini delivers function calls whole,
    /// so no start/delta assembly is needed.
    ToolCall { name: String, args: Value },

    /// Stream is finished.
    Done { finish_reason: Option<String> },
}
