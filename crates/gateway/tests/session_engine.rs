//! End-to-end session-engine scenarios: a session driven with inbound
//! frames against a scripted LLM, asserting on the outbound frame
//! sequence, the committed history, and the generation flag.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::{mpsc, Notify};

use vg_domain::error::{Error, Result};
use vg_domain::history::{ConversationHistory, Part, Role};
use vg_domain::stream::{BoxStream, StreamEvent};
use vg_llm::LlmClient;
use vg_store::OrderStore;
use vg_tools::ToolDispatcher;

use vg_gateway::voice::frame::{InboundFrame, OutboundFrame, TranscriptEntry};
use vg_gateway::voice::session::{Session, SessionConfig, SessionParams};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Scripted LLM
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

enum Script {
    /// Yield these events in order.
    Chunks(Vec<StreamEvent>),
    /// Yield `first`, park on the gate, then yield `rest`.
    Gated {
        first: Vec<StreamEvent>,
        gate: Arc<Notify>,
        rest: Vec<StreamEvent>,
    },
    /// Never deliver an initial response.
    Hang,
    /// Fail the call outright.
    Fail,
}

struct ScriptedLlm {
    scripts: Mutex<VecDeque<Script>>,
    /// History length observed per call.
    calls: Mutex<Vec<usize>>,
}

impl ScriptedLlm {
    fn new(scripts: Vec<Script>) -> Arc<Self> {
        Arc::new(Self {
            scripts: Mutex::new(scripts.into()),
            calls: Mutex::new(Vec::new()),
        })
    }

    fn observed_history_lens(&self) -> Vec<usize> {
        self.calls.lock().clone()
    }
}

#[async_trait::async_trait]
impl LlmClient for ScriptedLlm {
    async fn stream_generate(
        &self,
        history: &ConversationHistory,
    ) -> Result<BoxStream<'static, Result<StreamEvent>>> {
        self.calls.lock().push(history.len());
        let script = self.scripts.lock().pop_front().expect("script underrun");
        match script {
            Script::Chunks(events) => Ok(Box::pin(futures_util::stream::iter(
                events.into_iter().map(Ok),
            ))),
            Script::Gated { first, gate, rest } => Ok(Box::pin(async_stream::stream! {
                for event in first {
                    yield Ok(event);
                }
                gate.notified().await;
                for event in rest {
                    yield Ok(event);
                }
            })),
            Script::Hang => futures_util::future::pending().await,
            Script::Fail => Err(Error::Provider {
                provider: "scripted".into(),
                message: "HTTP 500".into(),
            }),
        }
    }
}

fn token(text: &str) -> StreamEvent {
    StreamEvent::Token { text: text.into() }
}

fn done() -> StreamEvent {
    StreamEvent::Done {
        finish_reason: Some("stop".into()),
    }
}

fn tool_call(name: &str, args: serde_json::Value) -> StreamEvent {
    StreamEvent::ToolCall {
        name: name.into(),
        args,
    }
}

fn greeting_script() -> Script {
    Script::Chunks(vec![token("Hi, thanks for calling!"), done()])
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Harness
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

const APOLOGY: &str = "I'm sorry, could you please say that again?";
const NUDGE: &str = "I'm listening.";

struct Harness {
    session: Session,
    rx: mpsc::Receiver<OutboundFrame>,
    llm: Arc<ScriptedLlm>,
    _dir: tempfile::TempDir,
}

impl Harness {
    /// Open a session without draining greeting frames.
    fn open_raw(scripts: Vec<Script>, stream_timeout: Duration, break_order_store: bool) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let orders = Arc::new(OrderStore::new(dir.path()).unwrap());
        if break_order_store {
            std::fs::create_dir(dir.path().join("orders.jsonl")).unwrap();
        }

        let llm = ScriptedLlm::new(scripts);
        let dispatcher = Arc::new(ToolDispatcher::new(
            orders,
            "t1",
            "call-1",
            "Bulgogi $18\nGalbi $24",
        ));

        let (tx, rx) = mpsc::channel(64);
        let session = Session::open(SessionParams {
            tenant_id: "t1".into(),
            call_id: "call-1".into(),
            llm: llm.clone(),
            dispatcher,
            outbound: tx,
            config: SessionConfig {
                greeting_prompt: "Greet the caller.".into(),
                nudge_text: NUDGE.into(),
                apology_text: APOLOGY.into(),
                stream_timeout,
            },
        });

        Self {
            session,
            rx,
            llm,
            _dir: dir,
        }
    }

    /// Open with a scripted greeting prepended and drain its frames.
    async fn open(scripts: Vec<Script>) -> Self {
        let mut all = vec![greeting_script()];
        all.extend(scripts);
        let mut harness = Self::open_raw(all, Duration::from_secs(5), false);
        harness.collect_turn(0).await;
        harness
    }

    fn response_required(&self, response_id: u64, utterance: &str) {
        let mut transcript = vec![TranscriptEntry {
            role: "agent".into(),
            content: "Hi, thanks for calling!".into(),
        }];
        if !utterance.is_empty() {
            transcript.push(TranscriptEntry {
                role: "user".into(),
                content: utterance.into(),
            });
        }
        self.session.handle_frame(InboundFrame::ResponseRequired {
            response_id,
            transcript,
        });
    }

    fn barge_in(&self) {
        self.session.handle_frame(InboundFrame::UpdateOnly {
            turntaking: Some("user_turn".into()),
        });
    }

    async fn recv(&mut self) -> OutboundFrame {
        tokio::time::timeout(Duration::from_secs(2), self.rx.recv())
            .await
            .expect("timed out waiting for a frame")
            .expect("outbound channel closed")
    }

    /// Collect frames for one turn through its final frame, asserting they
    /// all carry `response_id` and that the final frame is last.
    async fn collect_turn(&mut self, response_id: u64) -> Vec<OutboundFrame> {
        let mut frames = Vec::new();
        loop {
            let frame = self.recv().await;
            assert_eq!(frame.response_id, response_id, "unexpected frame {frame:?}");
            let complete = frame.content_complete;
            frames.push(frame);
            if complete {
                return frames;
            }
        }
    }

    /// Assert no frame arrives within `window`.
    async fn expect_silence(&mut self, window: Duration) {
        if let Ok(frame) = tokio::time::timeout(window, self.rx.recv()).await {
            panic!("expected silence, got {frame:?}");
        }
    }

    /// Freeze-freedom: the generation flag returns to false in bounded time.
    async fn wait_idle(&self) {
        for _ in 0..200 {
            if !self.session.is_generating() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("session stayed generating");
    }

    fn history(&self) -> ConversationHistory {
        self.session.history_snapshot()
    }
}

fn text_of(history: &ConversationHistory, index: usize) -> String {
    match &history.turns()[index].parts[0] {
        Part::Text { text } => text.clone(),
        other => panic!("expected text part, got {other:?}"),
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Scenarios
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[tokio::test]
async fn simple_question_and_answer() {
    let mut h = Harness::open(vec![Script::Chunks(vec![
        token("We're open "),
        token("11am to 10pm."),
        done(),
    ])])
    .await;

    h.response_required(1, "What are your hours?");
    let frames = h.collect_turn(1).await;

    assert_eq!(frames.len(), 3);
    assert_eq!(frames[0].content, "We're open ");
    assert!(!frames[0].content_complete);
    assert_eq!(frames[1].content, "11am to 10pm.");
    assert!(!frames[1].content_complete);
    assert_eq!(frames[2].content, "");
    assert!(frames[2].content_complete);

    h.wait_idle().await;
    let history = h.history();
    assert!(history.is_well_formed());
    assert_eq!(history.len(), 2);
    assert_eq!(history.turns()[0].role, Role::User);
    assert_eq!(text_of(&history, 0), "What are your hours?");
    assert_eq!(text_of(&history, 1), "We're open 11am to 10pm.");
}

#[tokio::test]
async fn tool_call_then_reply() {
    let mut h = Harness::open(vec![
        Script::Chunks(vec![tool_call("get_menu", serde_json::json!({})), done()]),
        Script::Chunks(vec![
            token("We have "),
            token("bulgogi, galbi, and more."),
            done(),
        ]),
    ])
    .await;

    h.response_required(2, "Show me the menu.");
    let frames = h.collect_turn(2).await;

    assert_eq!(frames.len(), 3);
    assert_eq!(frames[0].content, "We have ");
    assert_eq!(frames[1].content, "bulgogi, galbi, and more.");
    assert!(frames[2].content_complete);

    h.wait_idle().await;
    let history = h.history();
    assert!(history.is_well_formed());
    assert_eq!(history.len(), 4);
    assert_eq!(history.turns()[1].tool_call_name(), Some("get_menu"));
    match &history.turns()[2].parts[0] {
        Part::ToolResult { name, payload } => {
            assert_eq!(name, "get_menu");
            assert_eq!(payload["menu"], "Bulgogi $18\nGalbi $24");
        }
        other => panic!("expected tool result, got {other:?}"),
    }
    assert_eq!(text_of(&history, 3), "We have bulgogi, galbi, and more.");

    // Greeting saw the 1-turn scratch history; phase 1 saw user turn only;
    // phase 2 saw user + tool call + tool result.
    assert_eq!(h.llm.observed_history_lens(), vec![1, 1, 3]);
}

#[tokio::test]
async fn barge_in_cancels_and_rolls_back() {
    let gate = Arc::new(Notify::new());
    let mut h = Harness::open(vec![
        Script::Gated {
            first: vec![token("Let me tell you ")],
            gate: gate.clone(),
            rest: vec![token("all about it."), done()],
        },
        Script::Chunks(vec![token("Sure."), done()]),
    ])
    .await;

    h.response_required(3, "Tell me everything.");
    let first = h.recv().await;
    assert_eq!(first.response_id, 3);
    assert_eq!(first.content, "Let me tell you ");

    // The user starts talking while we stream.
    h.barge_in();
    gate.notify_one();

    // No further frames for id 3 — no final frame, nothing after the abort.
    h.expect_silence(Duration::from_millis(150)).await;
    h.wait_idle().await;
    assert_eq!(h.history().len(), 0, "history must roll back to checkpoint");

    // The next request runs cleanly on the rolled-back history.
    h.response_required(4, "Actually, just the hours?");
    let frames = h.collect_turn(4).await;
    assert_eq!(frames[0].content, "Sure.");
    assert!(frames[1].content_complete);

    h.wait_idle().await;
    let history = h.history();
    assert!(history.is_well_formed());
    assert_eq!(history.len(), 2);
    assert_eq!(text_of(&history, 0), "Actually, just the hours?");
}

#[tokio::test]
async fn routine_update_only_is_not_barge_in() {
    let gate = Arc::new(Notify::new());
    let mut h = Harness::open(vec![Script::Gated {
        first: vec![token("The specials are ")],
        gate: gate.clone(),
        rest: vec![token("bulgogi and galbi."), done()],
    }])
    .await;

    h.response_required(5, "Any specials?");
    let first = h.recv().await;
    assert_eq!(first.content, "The specials are ");

    // Transcript pushes without the turntaking signal must not cancel.
    h.session
        .handle_frame(InboundFrame::UpdateOnly { turntaking: None });
    h.session.handle_frame(InboundFrame::UpdateOnly {
        turntaking: Some("agent_turn".into()),
    });

    gate.notify_one();
    let second = h.recv().await;
    assert_eq!(second.content, "bulgogi and galbi.");
    let last = h.recv().await;
    assert!(last.content_complete);

    h.wait_idle().await;
    assert_eq!(h.history().len(), 2);
}

#[tokio::test]
async fn provider_timeout_is_silent_and_recoverable() {
    let mut h = Harness::open_raw(
        vec![
            greeting_script(),
            Script::Hang,
            Script::Chunks(vec![token("Back with you."), done()]),
        ],
        Duration::from_millis(100),
        false,
    );
    h.collect_turn(0).await;

    h.response_required(6, "Hello?");
    // No apology frame — a timeout is indistinguishable from a barge-in.
    h.expect_silence(Duration::from_millis(400)).await;
    h.wait_idle().await;
    assert_eq!(h.history().len(), 0);

    h.response_required(7, "Hello again?");
    let frames = h.collect_turn(7).await;
    assert_eq!(frames[0].content, "Back with you.");
    assert!(frames[1].content_complete);
    assert_eq!(h.history().len(), 2);
}

#[tokio::test]
async fn provider_error_voices_one_apology() {
    let mut h = Harness::open(vec![Script::Fail]).await;

    h.response_required(8, "What are your hours?");
    let frames = h.collect_turn(8).await;

    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0].content, APOLOGY);
    assert!(frames[0].content_complete);

    h.wait_idle().await;
    assert_eq!(h.history().len(), 0, "failed turn must roll back");
}

#[tokio::test]
async fn tool_insert_failure_is_voiced_and_committed() {
    let scripts = vec![
        greeting_script(),
        Script::Chunks(vec![
            tool_call(
                "place_order",
                serde_json::json!({
                    "customer_name": "Kim",
                    "customer_phone": "+15551234567",
                    "items": [{"name": "bulgogi", "quantity": 2}]
                }),
            ),
            done(),
        ]),
        Script::Chunks(vec![
            token("I'm sorry, we couldn't place your order right now."),
            done(),
        ]),
    ];
    let mut h = Harness::open_raw(scripts, Duration::from_secs(5), true);
    h.collect_turn(0).await;

    h.response_required(9, "Yes, place the order.");
    let frames = h.collect_turn(9).await;
    assert!(frames.last().unwrap().content_complete);

    h.wait_idle().await;
    let history = h.history();
    assert!(history.is_well_formed());
    assert_eq!(history.len(), 4, "tool exchange must be fully committed");
    match &history.turns()[2].parts[0] {
        Part::ToolResult { payload, .. } => {
            assert_eq!(payload["success"], false);
            assert_eq!(
                payload["error"],
                "We were unable to place your order right now."
            );
        }
        other => panic!("expected tool result, got {other:?}"),
    }
}

#[tokio::test]
async fn greeting_superseded_by_early_response_required() {
    // The response_required lands before the queued greeting ever runs, so
    // the greeting's token is stale and it emits nothing.
    let h = Harness::open_raw(
        vec![Script::Chunks(vec![token("Open 11 to 10."), done()])],
        Duration::from_secs(5),
        false,
    );
    h.response_required(1, "What are your hours?");

    let mut h = h;
    let frames = h.collect_turn(1).await;
    assert!(frames.iter().all(|f| f.response_id == 1));

    h.wait_idle().await;
    assert_eq!(h.history().len(), 2);
    // Only the id=1 turn ever reached the model.
    assert_eq!(h.llm.observed_history_lens(), vec![1]);
}

#[tokio::test]
async fn empty_transcript_gets_a_nudge() {
    let mut h = Harness::open(vec![]).await;

    h.response_required(9, "");
    let frames = h.collect_turn(9).await;

    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0].content, NUDGE);
    assert!(frames[0].content_complete);

    h.wait_idle().await;
    assert_eq!(h.history().len(), 0, "a nudge must not mutate history");
}

#[tokio::test]
async fn new_request_does_not_cancel_running_turn() {
    // A response_required while a turn streams is a start trigger, not a
    // cancel trigger: the running turn completes, then the new one runs.
    let gate = Arc::new(Notify::new());
    let mut h = Harness::open(vec![
        Script::Gated {
            first: vec![token("First answer, part one ")],
            gate: gate.clone(),
            rest: vec![token("and part two."), done()],
        },
        Script::Chunks(vec![token("Second answer."), done()]),
    ])
    .await;

    h.response_required(10, "First question?");
    let first = h.recv().await;
    assert_eq!(first.response_id, 10);

    h.response_required(11, "Second question?");
    gate.notify_one();

    // Turn 10 finishes cleanly…
    let mut frames = vec![first];
    frames.extend(h.collect_turn(10).await);
    assert!(frames.last().unwrap().content_complete);

    // …then turn 11 runs on the committed history.
    let frames = h.collect_turn(11).await;
    assert_eq!(frames[0].content, "Second answer.");

    h.wait_idle().await;
    let history = h.history();
    assert!(history.is_well_formed());
    assert_eq!(history.len(), 4);
    assert_eq!(text_of(&history, 1), "First answer, part one and part two.");
    assert_eq!(text_of(&history, 3), "Second answer.");
}

#[tokio::test]
async fn close_tears_down_mid_stream() {
    let gate = Arc::new(Notify::new());
    let mut h = Harness::open(vec![Script::Gated {
        first: vec![token("Droning on ")],
        gate: gate.clone(),
        rest: vec![token("forever."), done()],
    }])
    .await;

    h.response_required(12, "Talk to me.");
    let first = h.recv().await;
    assert_eq!(first.response_id, 12);

    h.session.close();
    h.expect_silence(Duration::from_millis(150)).await;
    h.wait_idle().await;
    assert_eq!(h.history().len(), 0);
}
