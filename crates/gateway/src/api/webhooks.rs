//! Fire-and-forget webhook receivers.
//!
//! Both providers sign request bodies with HMAC-SHA256 delivered in an
//! `X-Signature-256: sha256=<hex>` header; verification is constant-time
//! and skipped only when no secret is configured (dev mode). Handlers
//! respond synchronously and enqueue a durable job for the real work.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use crate::jobs::JobKind;
use crate::state::AppState;

type HmacSha256 = Hmac<Sha256>;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Dedupe store
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Remembers webhook event ids for a TTL so redelivered events are
/// acknowledged without re-enqueueing work.
pub struct DedupeStore {
    seen: parking_lot::Mutex<HashMap<String, Instant>>,
    ttl: Duration,
}

impl DedupeStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            seen: parking_lot::Mutex::new(HashMap::new()),
            ttl,
        }
    }

    /// Returns `true` if this event id was already seen (duplicate).
    pub fn check_and_insert(&self, event_id: &str) -> bool {
        let mut map = self.seen.lock();
        let now = Instant::now();

        // Lazy cleanup when the map grows large.
        if map.len() > 10_000 {
            map.retain(|_, ts| now.duration_since(*ts) < self.ttl);
        }

        if let Some(ts) = map.get(event_id) {
            if now.duration_since(*ts) < self.ttl {
                return true;
            }
        }

        map.insert(event_id.to_string(), now);
        false
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Signature verification
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn api_error(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(serde_json::json!({ "error": message.into() })),
    )
        .into_response()
}

/// Verify `X-Signature-256: sha256=<hex>` against the raw body. `None`
/// secret skips verification.
fn verify_signature(secret: Option<&str>, headers: &HeaderMap, body: &[u8]) -> bool {
    let Some(secret) = secret else {
        return true;
    };

    let sig_header = headers
        .get("x-signature-256")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    let sig_hex = sig_header.strip_prefix("sha256=").unwrap_or(sig_header);

    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key length");
    mac.update(body);
    let computed = hex::encode(mac.finalize().into_bytes());

    computed.as_bytes().ct_eq(sig_hex.as_bytes()).unwrap_u8() == 1
}

/// Event id for dedupe: the provider's id when present, else a digest of
/// the body (deterministic across redeliveries).
fn event_identity(explicit: Option<&str>, body: &[u8]) -> String {
    match explicit.filter(|id| !id.is_empty()) {
        Some(id) => id.to_string(),
        None => hex::encode(Sha256::digest(body)),
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Voice transport webhook
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Deserialize)]
struct VoiceEvent {
    #[serde(default)]
    event_id: Option<String>,
    #[serde(default)]
    event: String,
    #[serde(default)]
    tenant_id: String,
    #[serde(default)]
    call_id: String,
}

/// `POST /v1/webhooks/voice` — post-call events from the voice transport.
pub async fn voice_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse {
    if !verify_signature(state.voice_webhook_secret.as_deref(), &headers, &body) {
        return api_error(StatusCode::UNAUTHORIZED, "invalid webhook signature");
    }

    let event: VoiceEvent = match serde_json::from_slice(&body) {
        Ok(e) => e,
        Err(e) => return api_error(StatusCode::BAD_REQUEST, format!("invalid payload: {e}")),
    };

    let event_id = event_identity(event.event_id.as_deref(), &body);
    if state.dedupe.check_and_insert(&event_id) {
        return (
            StatusCode::OK,
            Json(serde_json::json!({ "status": "duplicate" })),
        )
            .into_response();
    }

    let job_id = state.jobs.enqueue(JobKind::PostCallSync {
        tenant_id: event.tenant_id,
        call_id: event.call_id,
        event: event.event,
    });

    (
        StatusCode::OK,
        Json(serde_json::json!({ "status": "queued", "job_id": job_id })),
    )
        .into_response()
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// POS webhook
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Deserialize)]
struct PosEvent {
    #[serde(default)]
    event_id: Option<String>,
    #[serde(default)]
    tenant_id: String,
    /// Catalog items when the event carries an inline catalog update.
    #[serde(default)]
    items: Vec<super::catalog::CatalogItem>,
}

/// `POST /v1/webhooks/pos` — catalog-changed events from the POS provider.
pub async fn pos_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse {
    if !verify_signature(state.pos_webhook_secret.as_deref(), &headers, &body) {
        return api_error(StatusCode::UNAUTHORIZED, "invalid webhook signature");
    }

    let event: PosEvent = match serde_json::from_slice(&body) {
        Ok(e) => e,
        Err(e) => return api_error(StatusCode::BAD_REQUEST, format!("invalid payload: {e}")),
    };

    let event_id = event_identity(event.event_id.as_deref(), &body);
    if state.dedupe.check_and_insert(&event_id) {
        return (
            StatusCode::OK,
            Json(serde_json::json!({ "status": "duplicate" })),
        )
            .into_response();
    }

    if event.items.is_empty() {
        return api_error(StatusCode::BAD_REQUEST, "no catalog items in payload");
    }

    let menu_text = super::catalog::render_menu_text(&event.items);
    match state.tenants.update_menu_cache(&event.tenant_id, &menu_text) {
        Ok(()) => {
            tracing::info!(
                tenant_id = %event.tenant_id,
                items = event.items.len(),
                "menu cache updated from POS webhook"
            );
            (
                StatusCode::OK,
                Json(serde_json::json!({ "status": "synced", "items": event.items.len() })),
            )
                .into_response()
        }
        Err(e) => api_error(StatusCode::NOT_FOUND, e.to_string()),
    }
}
