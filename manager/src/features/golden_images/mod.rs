pub mod repo;
pub mod routes;
pub mod service;

use axum::routing::post;
use axum::Router;

pub fn router() -> Router {
    Router::new()
        .route("/golden-images", post(routes::create))
        .route("/golden-images/:gid/ready", post(routes::ready))
}
