use axum::Router;
use utoipa::openapi::OpenApi as OpenApiDoc;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::features::golden_images::routes::create,
        crate::features::golden_images::routes::ready,
        crate::features::instances::routes::create,
        crate::features::instances::routes::list,
        crate::features::instances::routes::assign,
        crate::features::instances::routes::release,
        crate::features::instances::routes::delete,
        crate::features::hot_spares::routes::ensure,
        crate::features::webhook::routes::ready,
        crate::features::webhook::routes::status,
    ),
    components(
        schemas(
            vapiorc_types::VmTypeParam,
            vapiorc_types::CreateGoldenImageResp,
            vapiorc_types::GoldenImageReadyResp,
            vapiorc_types::CreateInstanceResp,
            vapiorc_types::AssignParams,
            vapiorc_types::AssignmentInfo,
            vapiorc_types::OkResponse,
            vapiorc_types::VmSummary,
            vapiorc_types::ListInstancesResp,
            vapiorc_types::EntityKind,
            vapiorc_types::WebhookResp,
            vapiorc_types::StatusCheckResp,
        )
    ),
    tags(
        (name = "Golden Images", description = "Golden-image builder APIs."),
        (name = "Instances", description = "Instance pool and assignment APIs."),
        (name = "Hot Spares", description = "Hot-spare replenishment control."),
        (name = "Webhook", description = "In-guest readiness reporter callbacks."),
    )
)]
pub struct ApiDoc;

pub fn router(openapi: OpenApiDoc) -> Router {
    Router::new().merge(SwaggerUi::new("/swagger-ui").url("/swagger-ui/openapi.json", openapi))
}

pub async fn write_openapi_yaml(openapi: &OpenApiDoc) -> anyhow::Result<()> {
    let yaml = serde_yaml::to_string(openapi)?;
    tokio::fs::create_dir_all("openapi").await?;
    tokio::fs::write("openapi/vapiorc-manager.yaml", yaml).await?;
    Ok(())
}
