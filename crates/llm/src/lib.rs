//! LLM client adapter: history-in, stream-out.
//!
//! The adapter is deliberately stateless per call — the session owns the
//! authoritative conversation history and passes the whole of it on every
//! request. Nothing here retains conversation state between calls, which is
//! what makes the session's checkpoint/rollback recovery a purely local
//! operation.

pub mod gemini;
mod sse;
pub mod traits;

pub use gemini::GeminiClient;
pub use traits::LlmClient;
