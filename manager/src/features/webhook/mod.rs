pub mod routes;
pub mod service;

use axum::routing::{get, post};
use axum::Router;

pub fn router() -> Router {
    Router::new()
        .route("/ready/:vm_type", post(routes::ready))
        .route("/status/:vm_type", get(routes::status))
}
