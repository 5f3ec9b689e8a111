pub mod golden_images;
pub mod hot_spares;
pub mod instances;
pub mod webhook;

use axum::routing::get;
use axum::{Extension, Json, Router};
use serde_json::json;

use crate::AppState;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .nest("/api/vms", golden_images::router().merge(instances::router()).merge(hot_spares::router()))
        .nest("/webhook", webhook::router())
        .layer(Extension(state))
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}
