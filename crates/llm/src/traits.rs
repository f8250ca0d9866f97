use vg_domain::error::Result;
use vg_domain::history::ConversationHistory;
use vg_domain::stream::{BoxStream, StreamEvent};

/// Trait the session engine generates through.
///
/// Implementations are bound to a system prompt and a tool schema set at
/// construction; each call is independent and carries the full history.
/// The adapter never retries — retry policy belongs to the caller (and the
/// voice transport simply re-requests).
#[async_trait::async_trait]
pub trait LlmClient: Send + Sync {
    /// Issue one streaming generation request over the given history.
    async fn stream_generate(
        &self,
        history: &ConversationHistory,
    ) -> Result<BoxStream<'static, Result<StreamEvent>>>;
}
