//! Per-turn cancellation tokens.
//!
//! Each generation turn owns a `CancelToken`. Calling `cancel()` is
//! terminal — once tripped, a token never untrips — and wakes every task
//! waiting in [`CancelToken::cancelled`] in the same scheduling quantum,
//! which is what lets the stream primitive unblock its initial await
//! without any help from the LLM provider.

use std::pin::pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::Notify;

struct Inner {
    cancelled: AtomicBool,
    notify: Notify,
}

/// A cancellation token checked cooperatively by the turn loop and awaited
/// by the stream primitive.
#[derive(Clone)]
pub struct CancelToken {
    inner: Arc<Inner>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                cancelled: AtomicBool::new(false),
                notify: Notify::new(),
            }),
        }
    }

    /// Signal cancellation. Idempotent; waiters are woken exactly once.
    pub fn cancel(&self) {
        if !self.inner.cancelled.swap(true, Ordering::AcqRel) {
            self.inner.notify.notify_waiters();
        }
    }

    /// Check if cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::Acquire)
    }

    /// Completes when `cancel()` is invoked; immediately if it already was.
    pub async fn cancelled(&self) {
        // Register interest before checking the flag so a cancel() landing
        // between the check and the await is not lost.
        let mut notified = pin!(self.inner.notify.notified());
        notified.as_mut().enable();
        if self.is_cancelled() {
            return;
        }
        notified.await;
    }

    /// Identity comparison: the session's stale check asks whether a task's
    /// token is still *the* live token, not whether an equal one is.
    pub fn same_token(&self, other: &CancelToken) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}
