//! Per-connection session state.
//!
//! The session owns the conversation history, the live cancel token, the
//! generation flag, and the turn serializer. Inbound frames are classified
//! here; all generation work happens in turn tasks (see `turn.rs`) run
//! strictly one at a time by the queue.
//!
//! Concurrency discipline: `history` is only touched inside turn tasks
//! (serialized by the queue); `current_token` is replaced by the frame
//! classifier and read by tasks for their stale check; `is_generating` is
//! written only by the running task's scope guard and read by the
//! classifier.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::mpsc;

use vg_domain::history::ConversationHistory;
use vg_llm::LlmClient;
use vg_tools::ToolDispatcher;

use super::cancel::CancelToken;
use super::frame::{InboundFrame, OutboundFrame, TranscriptEntry, TURNTAKING_USER_TURN};
use super::queue::TurnQueue;
use super::turn;

/// Fixed texts and bounds a session generates under.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Hidden single-turn prompt that seeds the greeting.
    pub greeting_prompt: String,
    /// Spoken when a reply is requested on an empty transcript.
    pub nudge_text: String,
    /// Spoken after an unexpected provider failure.
    pub apology_text: String,
    /// Wall-clock bound on streaming initiation.
    pub stream_timeout: Duration,
}

/// Everything a session needs at open time.
pub struct SessionParams {
    pub tenant_id: String,
    pub call_id: String,
    pub llm: Arc<dyn LlmClient>,
    pub dispatcher: Arc<ToolDispatcher>,
    pub outbound: mpsc::Sender<OutboundFrame>,
    pub config: SessionConfig,
}

/// State shared between the classifier and the turn tasks.
pub(super) struct SessionShared {
    pub tenant_id: String,
    pub call_id: String,
    pub llm: Arc<dyn LlmClient>,
    pub dispatcher: Arc<ToolDispatcher>,
    pub config: SessionConfig,
    pub history: Mutex<ConversationHistory>,
    pub current_token: Mutex<Option<CancelToken>>,
    pub is_generating: AtomicBool,
    outbound: mpsc::Sender<OutboundFrame>,
}

impl SessionShared {
    /// Emit one outbound frame. Writes to a closed transport silently
    /// no-op — the close handler owns cleanup.
    pub(super) async fn send_frame(&self, frame: OutboundFrame) {
        if self.outbound.send(frame).await.is_err() {
            tracing::debug!(call_id = %self.call_id, "transport gone; frame dropped");
        }
    }

    /// Whether `token` is still the session's live token.
    pub(super) fn is_current(&self, token: &CancelToken) -> bool {
        self.current_token
            .lock()
            .as_ref()
            .is_some_and(|t| t.same_token(token))
    }
}

/// One voice connection: created on connect, destroyed on disconnect.
pub struct Session {
    shared: Arc<SessionShared>,
    queue: TurnQueue,
}

impl Session {
    /// Create the session and enqueue the greeting turn.
    pub fn open(params: SessionParams) -> Self {
        let shared = Arc::new(SessionShared {
            tenant_id: params.tenant_id,
            call_id: params.call_id.clone(),
            llm: params.llm,
            dispatcher: params.dispatcher,
            config: params.config,
            history: Mutex::new(ConversationHistory::new()),
            current_token: Mutex::new(None),
            is_generating: AtomicBool::new(false),
            outbound: params.outbound,
        });
        let queue = TurnQueue::new(params.call_id);
        let session = Self { shared, queue };

        let token = session.replace_token();
        let shared = session.shared.clone();
        session
            .queue
            .enqueue(async move { turn::run_greeting(shared, token).await });

        session
    }

    /// Classify and act on one inbound frame (transport order).
    pub fn handle_frame(&self, frame: InboundFrame) {
        match frame {
            InboundFrame::UpdateOnly { turntaking } => {
                // Routine transcript pushes are a no-op; only the explicit
                // turntaking signal during generation is a barge-in.
                if self.shared.is_generating.load(Ordering::Acquire)
                    && turntaking.as_deref() == Some(TURNTAKING_USER_TURN)
                {
                    if let Some(token) = self.shared.current_token.lock().as_ref() {
                        tracing::debug!(
                            call_id = %self.shared.call_id,
                            "barge-in; cancelling current turn"
                        );
                        token.cancel();
                    }
                }
            }
            InboundFrame::ResponseRequired {
                response_id,
                transcript,
            } => self.start_turn(response_id, transcript),
            InboundFrame::Other => {}
        }
    }

    /// A `response_required` is a start trigger, not a cancel trigger:
    /// the live token is replaced (an in-flight task learns of this at its
    /// next stale check) and a new turn task is enqueued behind it.
    fn start_turn(&self, response_id: u64, transcript: Vec<TranscriptEntry>) {
        let token = self.replace_token();
        let shared = self.shared.clone();
        self.queue.enqueue(async move {
            turn::run_turn(shared, response_id, transcript, token).await;
        });
    }

    /// On transport close: trip the live token and let the queue drain.
    pub fn close(&self) {
        if let Some(token) = self.shared.current_token.lock().as_ref() {
            token.cancel();
        }
    }

    fn replace_token(&self) -> CancelToken {
        let token = CancelToken::new();
        *self.shared.current_token.lock() = Some(token.clone());
        token
    }

    /// True while a turn task is between its start and its release point.
    pub fn is_generating(&self) -> bool {
        self.shared.is_generating.load(Ordering::Acquire)
    }

    /// Snapshot of the committed conversation history.
    pub fn history_snapshot(&self) -> ConversationHistory {
        self.shared.history.lock().clone()
    }
}
