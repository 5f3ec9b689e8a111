use axum::extract::{Path, Query};
use axum::{Extension, Json};
use uuid::Uuid;
use vapiorc_types::{CreateGoldenImageResp, GoldenImageReadyResp, GoldenImageStatus, VmTypeParam};

use crate::core::error::Result;
use crate::AppState;

#[utoipa::path(
    post,
    path = "/api/vms/golden-images",
    params(VmTypeParam),
    responses(
        (status = 200, description = "Golden image creation started", body = CreateGoldenImageResp),
        (status = 500, description = "Provisioning failed"),
    ),
    tag = "Golden Images"
)]
pub async fn create(
    Extension(st): Extension<AppState>,
    Query(VmTypeParam { vm_type }): Query<VmTypeParam>,
) -> Result<Json<CreateGoldenImageResp>> {
    let vm_type = vm_type.unwrap_or_else(|| st.config.vm_type.clone());
    let golden_id =
        super::service::create(&st.db, &st.config, &st.container_driver, &vm_type).await?;
    Ok(Json(CreateGoldenImageResp {
        golden_id,
        status: GoldenImageStatus::Creating.as_str().to_string(),
        message: format!("golden image {golden_id} creation started"),
    }))
}

#[utoipa::path(
    post,
    path = "/api/vms/golden-images/{gid}/ready",
    responses(
        (status = 200, description = "Golden image finalised", body = GoldenImageReadyResp),
        (status = 404, description = "Golden image not found"),
        (status = 500, description = "Finalisation failed"),
    ),
    tag = "Golden Images"
)]
pub async fn ready(
    Extension(st): Extension<AppState>,
    Path(gid): Path<Uuid>,
) -> Result<Json<GoldenImageReadyResp>> {
    super::service::finalise(&st.db, &st.config, &st.container_driver, gid).await?;
    Ok(Json(GoldenImageReadyResp {
        status: GoldenImageStatus::Ready.as_str().to_string(),
        message: format!("golden image {gid} ready"),
    }))
}
