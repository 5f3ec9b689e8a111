use axum::extract::{Path, Query};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use uuid::Uuid;
use vapiorc_types::{
    AssignParams, AssignmentInfo, CreateInstanceResp, ListInstancesResp, OkResponse, VmSummary,
    VmInstanceStatus, VmTypeParam,
};

use crate::core::error::Result;
use crate::AppState;

use super::{assignment, repo, service};

#[utoipa::path(
    post,
    path = "/api/vms/instances",
    params(VmTypeParam),
    responses(
        (status = 200, description = "Instance creation started", body = CreateInstanceResp),
        (status = 500, description = "Provisioning failed"),
    ),
    tag = "Instances"
)]
pub async fn create(
    Extension(st): Extension<AppState>,
    Query(VmTypeParam { vm_type }): Query<VmTypeParam>,
) -> Result<Json<CreateInstanceResp>> {
    let vm_type = vm_type.unwrap_or_else(|| st.config.vm_type.clone());
    let instance_id = service::create_instance(
        &st.db,
        &st.config,
        &st.container_driver,
        &vm_type,
        false,
    )
    .await?;
    Ok(Json(CreateInstanceResp {
        instance_id,
        status: VmInstanceStatus::Starting.as_str().to_string(),
    }))
}

#[utoipa::path(
    get,
    path = "/api/vms/instances",
    responses((status = 200, description = "Instances listed", body = ListInstancesResp)),
    tag = "Instances"
)]
pub async fn list(Extension(st): Extension<AppState>) -> Result<Json<ListInstancesResp>> {
    let rows = repo::list(&st.db).await.map_err(anyhow::Error::from)?;
    let items: Vec<VmSummary> = rows.into_iter().map(row_into_summary).collect();
    Ok(Json(ListInstancesResp { items }))
}

fn row_into_summary(row: repo::VmInstanceRow) -> VmSummary {
    vapiorc_types::VmInstance {
        id: row.id,
        container_id: row.container_id,
        vm_type: row.vm_type,
        status: row.status,
        port: row.port,
        is_hot_spare: row.is_hot_spare,
        assigned_to: row.assigned_to,
        created_at: row.created_at,
        updated_at: row.updated_at,
    }
    .into()
}

/// `assign` has no failure variant distinct from the ones `VapiorcError`
/// already carries, but spec §6 calls for 503 specifically when neither an
/// existing spare nor a fresh instance could be produced; map those cases
/// here rather than widening the shared error type for one endpoint.
#[utoipa::path(
    post,
    path = "/api/vms/assign",
    params(AssignParams),
    responses(
        (status = 200, description = "Instance assigned", body = AssignmentInfo),
        (status = 503, description = "No instance could be produced"),
    ),
    tag = "Instances"
)]
pub async fn assign(
    Extension(st): Extension<AppState>,
    Query(AssignParams { assigned_to }): Query<AssignParams>,
) -> Response {
    match assignment::assign(&st, &assigned_to).await {
        Ok(info) => Json(info).into_response(),
        Err(err) => (StatusCode::SERVICE_UNAVAILABLE, err.to_string()).into_response(),
    }
}

#[utoipa::path(
    post,
    path = "/api/vms/instances/{iid}/release",
    responses((status = 200, description = "Instance released", body = OkResponse)),
    tag = "Instances"
)]
pub async fn release(
    Extension(st): Extension<AppState>,
    Path(iid): Path<Uuid>,
) -> Json<OkResponse> {
    assignment::destroy(&st, iid).await;
    Json(OkResponse::new(format!("instance {iid} released")))
}

#[utoipa::path(
    delete,
    path = "/api/vms/instances/{iid}",
    responses((status = 200, description = "Instance destroyed", body = OkResponse)),
    tag = "Instances"
)]
pub async fn delete(
    Extension(st): Extension<AppState>,
    Path(iid): Path<Uuid>,
) -> Json<OkResponse> {
    assignment::destroy(&st, iid).await;
    Json(OkResponse::new(format!("instance {iid} destroyed")))
}
