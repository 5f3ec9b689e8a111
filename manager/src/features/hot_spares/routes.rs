use axum::{Extension, Json};
use vapiorc_types::{OkResponse, VmTypeParam};

use crate::core::error::Result;
use crate::AppState;

#[utoipa::path(
    post,
    path = "/api/vms/hot-spares/ensure",
    params(VmTypeParam),
    responses(
        (status = 200, description = "Replenishment tick completed", body = OkResponse),
        (status = 500, description = "Replenishment failed"),
    ),
    tag = "Hot Spares"
)]
pub async fn ensure(
    Extension(st): Extension<AppState>,
    axum::extract::Query(VmTypeParam { vm_type }): axum::extract::Query<VmTypeParam>,
) -> Result<Json<OkResponse>> {
    let vm_type = vm_type.unwrap_or_else(|| st.config.vm_type.clone());
    super::service::ensure(&st, &vm_type).await?;
    Ok(Json(OkResponse::new(format!(
        "hot-spare replenishment tick completed for {vm_type}"
    ))))
}
