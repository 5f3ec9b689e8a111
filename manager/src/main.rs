pub mod config;
pub mod core;
mod docs;
mod features;
mod infra;

use std::sync::Arc;

use sqlx::PgPool;
use tokio::sync::Mutex;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use utoipa::OpenApi as _;

use config::Config;
use infra::container::ContainerDriver;

#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub config: Config,
    pub container_driver: ContainerDriver,
    /// Serialises `hot_spares::service::ensure` so concurrent triggers
    /// collapse into sequential executions (spec §4.H, §5).
    pub replenish_lock: Arc<Mutex<()>>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new("warn,vapiorc_manager=info")
            .add_directive("sqlx=warn".parse().unwrap())
    });
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = Config::from_env()?;
    std::fs::create_dir_all(config.golden_images_dir())?;
    std::fs::create_dir_all(config.instances_dir())?;

    let db = PgPool::connect(&config.database_url).await?;
    sqlx::migrate!("./migrations").run(&db).await?;

    let container_driver = ContainerDriver::new(&config.container_engine, &config.docker_network);

    let state = AppState {
        db,
        config: config.clone(),
        container_driver,
        replenish_lock: Arc::new(Mutex::new(())),
    };

    // One background trigger of `ensure` at startup (spec §5): gets a cold
    // pool moving without waiting for the first `assign` or webhook.
    features::hot_spares::service::trigger(state.clone(), config.vm_type.clone());

    let openapi = docs::ApiDoc::openapi();
    if let Err(err) = docs::write_openapi_yaml(&openapi).await {
        warn!(error = ?err, "failed to write OpenAPI specification to disk");
    }

    let app = features::router(state.clone()).merge(docs::router(openapi)).layer(
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
            .max_age(std::time::Duration::from_secs(3600)),
    );

    info!(bind = %config.bind, "vapiorc manager listening");
    let listener = tokio::net::TcpListener::bind(&config.bind).await?;
    axum::serve(listener, app.into_make_service()).await?;
    Ok(())
}
