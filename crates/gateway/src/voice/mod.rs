//! Voice session endpoint.
//!
//! Flow:
//! 1. Transport connects to `/<prefix>/<call_id>?tenant_id=<id>`
//! 2. The tenant is resolved and the system prompt composed from its
//!    profile snapshot; an LLM adapter is bound to it
//! 3. The session enqueues its greeting and then classifies inbound
//!    frames until the socket closes
//!
//! Missing or inactive tenants close with a policy-violation code before
//! any turn runs; non-JSON frames close with an unsupported-data code.

pub mod cancel;
pub mod frame;
pub mod queue;
pub mod session;
mod stream;
mod turn;

use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::{mpsc, oneshot};

use vg_llm::{GeminiClient, LlmClient};
use vg_tools::ToolDispatcher;

use crate::state::AppState;
use self::frame::{InboundFrame, OutboundFrame, CLOSE_POLICY_VIOLATION, CLOSE_UNSUPPORTED_DATA};
use self::session::{Session, SessionConfig, SessionParams};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Query params
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Deserialize)]
pub struct VoiceQuery {
    pub tenant_id: Option<String>,
    /// Query-string call id; the path segment is the fallback.
    pub call_id: Option<String>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Handler
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// GET /<prefix>/:call_id — upgrade to WebSocket.
pub async fn voice_ws(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Path(path_call_id): Path<String>,
    Query(query): Query<VoiceQuery>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state, path_call_id, query))
}

async fn handle_socket(
    mut socket: WebSocket,
    state: AppState,
    path_call_id: String,
    query: VoiceQuery,
) {
    let call_id = query
        .call_id
        .filter(|c| !c.is_empty())
        .unwrap_or(path_call_id);

    // Tenant gate: reject before any turn runs.
    let Some(tenant_id) = query.tenant_id.filter(|t| !t.is_empty()) else {
        close_with(&mut socket, CLOSE_POLICY_VIOLATION, "tenant_id is required").await;
        return;
    };
    let profile = match state.tenants.resolve(&tenant_id) {
        Some(p) if p.is_active() => p,
        Some(_) => {
            close_with(&mut socket, CLOSE_POLICY_VIOLATION, "tenant is inactive").await;
            return;
        }
        None => {
            close_with(&mut socket, CLOSE_POLICY_VIOLATION, "unknown tenant").await;
            return;
        }
    };

    // LLM adapter bound to this store's composed prompt + the static tools.
    let api_key = std::env::var(&state.config.llm.api_key_env).unwrap_or_default();
    let llm: Arc<dyn LlmClient> = match GeminiClient::new(
        &state.config.llm.base_url,
        api_key,
        &state.config.llm.model,
        profile.system_prompt(),
        vg_tools::definitions(),
    ) {
        Ok(client) => Arc::new(client),
        Err(e) => {
            tracing::error!(error = %e, "LLM adapter construction failed");
            close_with(&mut socket, CLOSE_POLICY_VIOLATION, "session setup failed").await;
            return;
        }
    };

    let dispatcher = Arc::new(ToolDispatcher::new(
        state.orders.clone(),
        tenant_id.clone(),
        call_id.clone(),
        profile.menu_cache.clone(),
    ));

    // Writer task: forwards session frames to the socket; a close signal
    // short-circuits it with a coded close frame.
    let (frame_tx, mut frame_rx) = mpsc::channel::<OutboundFrame>(state.config.voice.outbound_buffer);
    let (close_tx, close_rx) = oneshot::channel::<(u16, &'static str)>();
    let (mut ws_sink, mut ws_stream) = socket.split();

    let writer = tokio::spawn(async move {
        let mut close_rx = close_rx;
        loop {
            tokio::select! {
                maybe = frame_rx.recv() => match maybe {
                    Some(frame) => {
                        let json = match serde_json::to_string(&frame) {
                            Ok(json) => json,
                            Err(e) => {
                                tracing::error!(error = %e, "outbound frame serialization failed");
                                continue;
                            }
                        };
                        if ws_sink.send(Message::Text(json)).await.is_err() {
                            break;
                        }
                    }
                    None => break,
                },
                signal = &mut close_rx => {
                    if let Ok((code, reason)) = signal {
                        let _ = ws_sink
                            .send(Message::Close(Some(CloseFrame {
                                code,
                                reason: reason.into(),
                            })))
                            .await;
                    }
                    break;
                }
            }
        }
    });

    let session = Session::open(SessionParams {
        tenant_id: tenant_id.clone(),
        call_id: call_id.clone(),
        llm,
        dispatcher,
        outbound: frame_tx,
        config: SessionConfig {
            greeting_prompt: state.config.voice.greeting_prompt.clone(),
            nudge_text: state.config.voice.nudge_text.clone(),
            apology_text: state.config.voice.apology_text.clone(),
            stream_timeout: Duration::from_secs(state.config.llm.stream_timeout_secs),
        },
    });

    tracing::info!(tenant_id = %tenant_id, call_id = %call_id, "voice session connected");

    // Reader loop: inbound frames in transport order.
    let mut close_tx = Some(close_tx);
    while let Some(Ok(msg)) = ws_stream.next().await {
        match msg {
            Message::Text(text) => match serde_json::from_str::<InboundFrame>(&text) {
                Ok(frame) => session.handle_frame(frame),
                Err(e) => {
                    tracing::warn!(call_id = %call_id, error = %e, "non-JSON frame; closing");
                    if let Some(tx) = close_tx.take() {
                        let _ = tx.send((CLOSE_UNSUPPORTED_DATA, "frames must be JSON"));
                    }
                    break;
                }
            },
            Message::Close(_) => break,
            Message::Ping(_) | Message::Pong(_) => {
                // axum answers WS-level pings automatically.
            }
            _ => {}
        }
    }

    // Trip the live token, let queued tasks drain, then let the writer
    // finish once the last frame sender drops.
    session.close();
    drop(session);
    let _ = writer.await;

    tracing::info!(tenant_id = %tenant_id, call_id = %call_id, "voice session closed");
}

async fn close_with(socket: &mut WebSocket, code: u16, reason: &'static str) {
    let _ = socket
        .send(Message::Close(Some(CloseFrame {
            code,
            reason: reason.into(),
        })))
        .await;
}
