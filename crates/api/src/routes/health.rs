use axum::{extract::State, routing::get, Json, Router};
use serde_json::{json, Value};
use snapshot_publisher_core::storage::PublisherStore;

use crate::error::ApiResult;
use crate::state::AppState;

/// Health check routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_check))
        .route("/v1/ping", get(ping))
}

/// Full health check: round-trips the store.
async fn health_check(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let store = state.publisher().store();
    let sites = store.list_site_codes().await?;

    Ok(Json(json!({
        "status": "ok",
        "store": store.backend_name(),
        "sites": sites.len(),
        "subscribers": state.event_bus().subscriber_count(),
        "settleIntervalSecs": state.config().settle_interval_secs,
    })))
}

/// Lightweight ping, no store access.
async fn ping() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
