pub mod routes;
pub mod service;

use axum::routing::post;
use axum::Router;

pub fn router() -> Router {
    Router::new().route("/hot-spares/ensure", post(routes::ensure))
}
