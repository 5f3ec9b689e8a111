pub mod assignment;
pub mod repo;
pub mod routes;
pub mod service;

use axum::routing::{delete, post};
use axum::Router;

pub fn router() -> Router {
    Router::new()
        .route("/instances", post(routes::create).get(routes::list))
        .route("/instances/:iid/release", post(routes::release))
        .route("/instances/:iid", delete(routes::delete))
        .route("/assign", post(routes::assign))
}
