//! Per-session turn serializer.
//!
//! A FIFO of deferred generation tasks consumed by a single worker, so no
//! two LLM invocations ever overlap on the same conversation history. The
//! worker only moves to the next task after the previous one returns —
//! its release point — which, combined with per-turn cancel tokens, gives
//! barge-in responsiveness without overlap hazards.

use std::future::Future;
use std::pin::Pin;

use futures_util::FutureExt;
use tokio::sync::mpsc;

type TurnTask = Pin<Box<dyn Future<Output = ()> + Send>>;

/// FIFO queue of turn tasks for one session. Dropping the queue lets the
/// worker drain what was already enqueued and exit.
pub struct TurnQueue {
    tx: mpsc::UnboundedSender<TurnTask>,
}

impl TurnQueue {
    pub fn new(session_label: impl Into<String>) -> Self {
        let label = session_label.into();
        let (tx, mut rx) = mpsc::unbounded_channel::<TurnTask>();

        tokio::spawn(async move {
            while let Some(task) = rx.recv().await {
                // The queue is a safety net, not a propagation path: a
                // panicking task must not take the session down with it.
                if std::panic::AssertUnwindSafe(task)
                    .catch_unwind()
                    .await
                    .is_err()
                {
                    tracing::error!(session = %label, "turn task panicked");
                }
            }
            tracing::debug!(session = %label, "turn queue drained");
        });

        Self { tx }
    }

    /// Append a task. Tasks run in submission order; stale tasks are
    /// expected to return immediately on their own.
    pub fn enqueue<F>(&self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        if self.tx.send(Box::pin(task)).is_err() {
            tracing::debug!("turn queue closed; task dropped");
        }
    }
}
