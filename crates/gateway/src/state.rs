use std::sync::Arc;

use vg_domain::config::Config;
use vg_store::{OrderStore, TenantRegistry};

use crate::api::webhooks::DedupeStore;
use crate::jobs::JobQueue;

/// Shared application state passed to all handlers.
///
/// Process-wide singletons only; per-call state lives in the session.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,

    // ── Persistence ───────────────────────────────────────────────────
    pub tenants: Arc<TenantRegistry>,
    pub orders: Arc<OrderStore>,

    // ── Background work ───────────────────────────────────────────────
    pub jobs: Arc<JobQueue>,
    /// Idempotency store for webhook deduplication.
    pub dedupe: Arc<DedupeStore>,

    // ── Outbound HTTP (OAuth exchange) ────────────────────────────────
    pub http: reqwest::Client,

    // ── Secrets (read once at startup) ────────────────────────────────
    /// Voice transport webhook signing secret. `None` = dev mode.
    pub voice_webhook_secret: Option<String>,
    /// POS webhook signing secret. `None` = dev mode.
    pub pos_webhook_secret: Option<String>,
}
