//! OAuth bootstrap for the POS provider.
//!
//! One-shot authorization-code exchange: the provider redirects the
//! merchant here with `code` and `state` (our tenant id); the handler
//! exchanges the code at the configured token endpoint and attaches the
//! returned merchant id to the tenant record. Token refresh is out of
//! scope — downstream submissions re-authenticate per job.

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use serde::Deserialize;

use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    pub code: Option<String>,
    /// Carries the tenant id through the authorization round trip.
    pub state: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    #[serde(default)]
    merchant_id: Option<String>,
}

/// `GET /v1/oauth/callback`
pub async fn callback(
    State(state): State<AppState>,
    Query(query): Query<CallbackQuery>,
) -> impl IntoResponse {
    let Some(code) = query.code.filter(|c| !c.is_empty()) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({ "error": "missing authorization code" })),
        );
    };
    let Some(tenant_id) = query.state.filter(|s| !s.is_empty()) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({ "error": "missing state (tenant id)" })),
        );
    };

    let token_url = &state.config.pos.oauth_token_url;
    if token_url.is_empty() {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(serde_json::json!({ "error": "POS OAuth is not configured" })),
        );
    }

    let client_id = std::env::var(&state.config.pos.client_id_env).unwrap_or_default();
    let client_secret = std::env::var(&state.config.pos.client_secret_env).unwrap_or_default();

    let exchange = state
        .http
        .post(token_url)
        .json(&serde_json::json!({
            "grant_type": "authorization_code",
            "code": code,
            "client_id": client_id,
            "client_secret": client_secret,
        }))
        .send()
        .await;

    let resp = match exchange {
        Ok(resp) if resp.status().is_success() => resp,
        Ok(resp) => {
            tracing::warn!(status = %resp.status(), "OAuth exchange rejected");
            return (
                StatusCode::BAD_GATEWAY,
                Json(serde_json::json!({ "error": "code exchange rejected" })),
            );
        }
        Err(e) => {
            tracing::warn!(error = %e, "OAuth exchange failed");
            return (
                StatusCode::BAD_GATEWAY,
                Json(serde_json::json!({ "error": "code exchange failed" })),
            );
        }
    };

    let token: TokenResponse = match resp.json().await {
        Ok(t) => t,
        Err(e) => {
            tracing::warn!(error = %e, "OAuth token response unreadable");
            return (
                StatusCode::BAD_GATEWAY,
                Json(serde_json::json!({ "error": "token response unreadable" })),
            );
        }
    };

    let merchant_id = token.merchant_id.unwrap_or_default();
    if let Err(e) = state.tenants.set_pos_merchant(&tenant_id, &merchant_id) {
        return (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({ "error": e.to_string() })),
        );
    }

    tracing::info!(tenant_id = %tenant_id, "POS account connected");
    (
        StatusCode::OK,
        Json(serde_json::json!({ "status": "connected", "tenant_id": tenant_id })),
    )
}
