//! Catalog synchronization.
//!
//! The scheduled fetcher (or an operator) posts the POS catalog here; the
//! handler renders it into the plain menu text block that the session
//! engine reads at connect time and `get_menu` serves without I/O.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use serde::Deserialize;

use crate::state::AppState;

#[derive(Debug, Clone, Deserialize)]
pub struct CatalogItem {
    pub name: String,
    #[serde(default)]
    pub price: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SyncRequest {
    #[serde(default)]
    pub items: Vec<CatalogItem>,
}

/// Render catalog items into a spoken-friendly menu block, grouped by
/// category in first-seen order.
pub fn render_menu_text(items: &[CatalogItem]) -> String {
    let mut categories: Vec<&str> = Vec::new();
    for item in items {
        let cat = item.category.as_deref().unwrap_or("Menu");
        if !categories.contains(&cat) {
            categories.push(cat);
        }
    }

    let mut out = String::new();
    for cat in categories {
        if !out.is_empty() {
            out.push('\n');
        }
        out.push_str(cat);
        out.push(':');
        out.push('\n');
        for item in items
            .iter()
            .filter(|i| i.category.as_deref().unwrap_or("Menu") == cat)
        {
            out.push_str("- ");
            out.push_str(&item.name);
            if let Some(price) = item.price.as_deref().filter(|p| !p.is_empty()) {
                out.push(' ');
                out.push_str(price);
            }
            if let Some(desc) = item.description.as_deref().filter(|d| !d.is_empty()) {
                out.push_str(" (");
                out.push_str(desc);
                out.push(')');
            }
            out.push('\n');
        }
    }
    out.trim_end().to_string()
}

/// `POST /v1/catalog/sync/:tenant_id`
pub async fn sync_catalog(
    State(state): State<AppState>,
    Path(tenant_id): Path<String>,
    Json(req): Json<SyncRequest>,
) -> impl IntoResponse {
    if req.items.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({ "error": "no catalog items supplied" })),
        );
    }

    let menu_text = render_menu_text(&req.items);
    match state.tenants.update_menu_cache(&tenant_id, &menu_text) {
        Ok(()) => {
            tracing::info!(tenant_id = %tenant_id, items = req.items.len(), "catalog synced");
            (
                StatusCode::OK,
                Json(serde_json::json!({ "status": "synced", "items": req.items.len() })),
            )
        }
        Err(e) => (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({ "error": e.to_string() })),
        ),
    }
}
