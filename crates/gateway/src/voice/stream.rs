//! Cancellable stream initiation.
//!
//! Races one streaming LLM request against two abort sources — the turn's
//! cancel token and a fixed wall-clock timeout — so the caller's wait on
//! the initial response resolves within one scheduling quantum of
//! cancellation, whether or not the provider honors any cancellation of
//! its own. An abandoned provider request may well complete in the
//! background; its output is discarded because history is never committed
//! for an interrupted turn.

use std::time::Duration;

use vg_domain::error::{Error, Result};
use vg_domain::history::ConversationHistory;
use vg_domain::stream::{BoxStream, StreamEvent};
use vg_llm::LlmClient;

use super::cancel::CancelToken;

/// Open a streaming generation, bounded by `token` and `timeout`.
///
/// Fails with [`Error::Cancelled`] if the token is tripped before or
/// during the initial wait, or [`Error::Timeout`] if the provider does not
/// deliver its first response within the bound. Both are interruption-class
/// errors to the caller. Listener deregistration and timer cleanup are
/// implicit in `select!` drop semantics.
pub(super) async fn open_stream(
    llm: &dyn LlmClient,
    history: &ConversationHistory,
    token: &CancelToken,
    timeout: Duration,
) -> Result<BoxStream<'static, Result<StreamEvent>>> {
    if token.is_cancelled() {
        return Err(Error::Cancelled);
    }

    tokio::select! {
        biased;
        _ = token.cancelled() => Err(Error::Cancelled),
        _ = tokio::time::sleep(timeout) => {
            Err(Error::Timeout(format!(
                "no initial LLM response within {}s",
                timeout.as_secs()
            )))
        }
        res = llm.stream_generate(history) => res,
    }
}
