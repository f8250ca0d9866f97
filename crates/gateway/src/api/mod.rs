pub mod admin;
pub mod catalog;
pub mod oauth;
pub mod webhooks;

use axum::routing::{get, post};
use axum::Router;

use vg_domain::config::Config;

use crate::state::AppState;

/// Build the full router: the voice WebSocket endpoint plus the thin REST
/// surface (health, webhooks, catalog sync, OAuth bootstrap).
pub fn router(config: &Config) -> Router<AppState> {
    let ws_route = format!("{}/:call_id", config.voice.ws_path_prefix);

    Router::new()
        // Voice transport session
        .route(&ws_route, get(crate::voice::voice_ws))
        // Health probe
        .route("/v1/health", get(admin::health))
        // Fire-and-forget webhooks
        .route("/v1/webhooks/voice", post(webhooks::voice_webhook))
        .route("/v1/webhooks/pos", post(webhooks::pos_webhook))
        // Catalog sync (scheduled fetcher or manual trigger posts here)
        .route("/v1/catalog/sync/:tenant_id", post(catalog::sync_catalog))
        // OAuth bootstrap
        .route("/v1/oauth/callback", get(oauth::callback))
}
