//! Turn execution — the two-phase function-calling flow.
//!
//! A turn task: stale check, arm the generation flag, checkpoint the
//! history, stream phase 1, optionally dispatch one tool and stream
//! phase 2, commit, emit the final frame. Cancellation or error at any
//! point rolls the history back to the checkpoint.
//!
//! The generation flag is released by a scope guard, never by ad-hoc
//! cleanup on individual branches: every exit path — early return on an
//! empty transcript, cancellation short-circuit, stream error, transport
//! write failure — traverses the guard's drop. This is what keeps the
//! serializer advancing.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures_util::StreamExt;

use vg_domain::error::{Error, Result};
use vg_domain::history::{ConversationHistory, Turn};
use vg_domain::stream::StreamEvent;
use vg_domain::tool::ToolInvocation;

use super::cancel::CancelToken;
use super::frame::{OutboundFrame, TranscriptEntry, GREETING_RESPONSE_ID};
use super::session::SessionShared;
use super::stream::open_stream;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Generation guard
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Scope guard for the session's generation flag: armed before the first
/// suspension point, released on drop along every control-flow exit.
struct GenerationGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> GenerationGuard<'a> {
    fn arm(flag: &'a AtomicBool) -> Self {
        flag.store(true, Ordering::Release);
        Self { flag }
    }
}

impl Drop for GenerationGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Turn task
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Run one spoken-reply turn for a `response_required` frame.
pub(super) async fn run_turn(
    shared: Arc<SessionShared>,
    response_id: u64,
    transcript: Vec<TranscriptEntry>,
    token: CancelToken,
) {
    // A newer frame replaced the token while this task was queued.
    if !shared.is_current(&token) {
        tracing::debug!(response_id, "turn superseded before start");
        return;
    }

    // Armed before any suspension point; dropped on every exit.
    let _guard = GenerationGuard::arm(&shared.is_generating);

    let utterance = last_user_utterance(&transcript);
    if utterance.is_empty() {
        shared
            .send_frame(OutboundFrame::final_frame(
                response_id,
                shared.config.nudge_text.clone(),
            ))
            .await;
        return;
    }

    let checkpoint = {
        let mut history = shared.history.lock();
        let checkpoint = history.len();
        history.push(Turn::user_text(utterance));
        checkpoint
    };

    match drive_turn(&shared, response_id, &token).await {
        Ok(()) => {}
        Err(e) if e.is_interruption() => {
            // Superseded or timed out: roll back silently. The transport
            // will re-request.
            shared.history.lock().truncate(checkpoint);
            tracing::debug!(
                call_id = %shared.call_id,
                response_id,
                error = %e,
                "turn interrupted; history rolled back"
            );
        }
        Err(e) => {
            shared.history.lock().truncate(checkpoint);
            tracing::warn!(
                call_id = %shared.call_id,
                response_id,
                error = %e,
                "turn failed; history rolled back"
            );
            if !token.is_cancelled() {
                shared
                    .send_frame(OutboundFrame::final_frame(
                        response_id,
                        shared.config.apology_text.clone(),
                    ))
                    .await;
            }
        }
    }
}

/// Phases 1 and 2, committing history as each step lands.
async fn drive_turn(
    shared: &Arc<SessionShared>,
    response_id: u64,
    token: &CancelToken,
) -> Result<()> {
    // Phase 1: stream over the committed history plus the new user turn.
    let snapshot = shared.history.lock().clone();
    let phase1 = stream_reply(shared, response_id, token, &snapshot).await?;

    let Some(call) = phase1.tool_call else {
        shared.history.lock().push(Turn::model_text(phase1.text));
        shared
            .send_frame(OutboundFrame::final_frame(response_id, ""))
            .await;
        return Ok(());
    };

    shared
        .history
        .lock()
        .push(Turn::model_tool_call(call.name.clone(), call.args.clone()));

    // The dispatcher never raises; failures arrive as voiceable payloads.
    let payload = shared.dispatcher.dispatch(&call.name, &call.args).await;
    if token.is_cancelled() {
        return Err(Error::Cancelled);
    }
    shared
        .history
        .lock()
        .push(Turn::user_tool_result(call.name, payload));

    // Phase 2: stream over the history extended with the tool exchange.
    let snapshot = shared.history.lock().clone();
    let phase2 = stream_reply(shared, response_id, token, &snapshot).await?;
    shared.history.lock().push(Turn::model_text(phase2.text));
    shared
        .send_frame(OutboundFrame::final_frame(response_id, ""))
        .await;
    Ok(())
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Greeting task
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Stream the opening utterance (`response_id = 0`).
///
/// The hidden greeting prompt is ephemeral persona seeding: it runs over a
/// scratch history and commits nothing to the session.
pub(super) async fn run_greeting(shared: Arc<SessionShared>, token: CancelToken) {
    if !shared.is_current(&token) {
        tracing::debug!(call_id = %shared.call_id, "greeting superseded before start");
        return;
    }

    let _guard = GenerationGuard::arm(&shared.is_generating);

    let mut scratch = ConversationHistory::new();
    scratch.push(Turn::user_text(shared.config.greeting_prompt.clone()));

    match stream_reply(&shared, GREETING_RESPONSE_ID, &token, &scratch).await {
        Ok(_) => {
            shared
                .send_frame(OutboundFrame::final_frame(GREETING_RESPONSE_ID, ""))
                .await;
        }
        Err(e) if e.is_interruption() => {
            tracing::debug!(call_id = %shared.call_id, error = %e, "greeting interrupted");
        }
        Err(e) => {
            tracing::warn!(call_id = %shared.call_id, error = %e, "greeting failed");
            if !token.is_cancelled() {
                shared
                    .send_frame(OutboundFrame::final_frame(
                        GREETING_RESPONSE_ID,
                        shared.config.apology_text.clone(),
                    ))
                    .await;
            }
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Streaming core
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Aggregate of one drained stream: the concatenated text and at most one
/// tool call. Any tool call after the first is ignored — the flow is
/// strictly two-phase.
struct PhaseOutcome {
    text: String,
    tool_call: Option<ToolInvocation>,
}

/// Open a cancellable stream over `history` and drain it, emitting a
/// partial frame per text chunk while the token stays live.
async fn stream_reply(
    shared: &Arc<SessionShared>,
    response_id: u64,
    token: &CancelToken,
    history: &ConversationHistory,
) -> Result<PhaseOutcome> {
    let mut stream = open_stream(
        shared.llm.as_ref(),
        history,
        token,
        shared.config.stream_timeout,
    )
    .await?;

    let mut text = String::new();
    let mut tool_call: Option<ToolInvocation> = None;

    loop {
        // Racing the chunk await against the token bounds barge-in latency
        // by one chunk even when the provider stalls mid-stream.
        let event = tokio::select! {
            biased;
            _ = token.cancelled() => return Err(Error::Cancelled),
            next = stream.next() => match next {
                Some(event) => event?,
                None => break,
            },
        };

        match event {
            StreamEvent::Token { text: chunk } => {
                if !chunk.is_empty() {
                    shared
                        .send_frame(OutboundFrame::chunk(response_id, chunk.clone()))
                        .await;
                    text.push_str(&chunk);
                }
            }
            StreamEvent::ToolCall { name, args } => {
                if tool_call.is_none() {
                    tool_call = Some(ToolInvocation { name, args });
                } else {
                    tracing::warn!(response_id, "extra tool call in stream ignored");
                }
            }
            StreamEvent::Done { .. } => break,
        }
    }

    // Re-check after the drain: a barge-in between the last chunk and here
    // must still roll back.
    if token.is_cancelled() {
        return Err(Error::Cancelled);
    }

    Ok(PhaseOutcome { text, tool_call })
}

/// The last `user` entry of the pushed transcript, trimmed.
fn last_user_utterance(transcript: &[TranscriptEntry]) -> String {
    transcript
        .iter()
        .rev()
        .find(|entry| entry.role == "user")
        .map(|entry| entry.content.trim().to_string())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn last_user_utterance_picks_latest() {
        let transcript = vec![
            TranscriptEntry {
                role: "user".into(),
                content: "old".into(),
            },
            TranscriptEntry {
                role: "agent".into(),
                content: "reply".into(),
            },
            TranscriptEntry {
                role: "user".into(),
                content: "  newest  ".into(),
            },
        ];
        assert_eq!(last_user_utterance(&transcript), "newest");
    }

    #[test]
    fn last_user_utterance_empty_when_no_user_entry() {
        let transcript = vec![TranscriptEntry {
            role: "agent".into(),
            content: "hello".into(),
        }];
        assert_eq!(last_user_utterance(&transcript), "");
        assert_eq!(last_user_utterance(&[]), "");
    }

    #[test]
    fn generation_guard_releases_on_drop() {
        let flag = AtomicBool::new(false);
        {
            let _guard = GenerationGuard::arm(&flag);
            assert!(flag.load(Ordering::Acquire));
        }
        assert!(!flag.load(Ordering::Acquire));
    }

    #[test]
    fn generation_guard_releases_on_panic() {
        let flag = std::sync::Arc::new(AtomicBool::new(false));
        let flag2 = flag.clone();
        let result = std::panic::catch_unwind(move || {
            let _guard = GenerationGuard::arm(&flag2);
            panic!("boom");
        });
        assert!(result.is_err());
        assert!(!flag.load(Ordering::Acquire));
    }
}
