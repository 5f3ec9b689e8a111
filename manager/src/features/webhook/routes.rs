use axum::extract::Path;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use vapiorc_types::{StatusCheckResp, WebhookResp};

use crate::core::error::VapiorcError;
use crate::AppState;

const MAC_HEADER: &str = "MAC-Address";

fn mac_from_headers(headers: &HeaderMap) -> Result<String, VapiorcError> {
    headers
        .get(MAC_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
        .ok_or_else(|| VapiorcError::BadRequest("MAC-Address header is required".to_string()))
}

#[utoipa::path(
    post,
    path = "/webhook/ready/{vm_type}",
    responses(
        (status = 200, description = "Readiness processed", body = WebhookResp),
        (status = 400, description = "Missing MAC-Address header"),
        (status = 404, description = "No container registered for that MAC"),
        (status = 500, description = "Dispatch failed"),
    ),
    tag = "Webhook"
)]
pub async fn ready(
    Extension(st): Extension<AppState>,
    Path(vm_type): Path<String>,
    headers: HeaderMap,
) -> Response {
    let mac = match mac_from_headers(&headers) {
        Ok(mac) => mac,
        Err(err) => return err.into_response(),
    };

    match super::service::ready(&st, &vm_type, &mac).await {
        Ok(outcome) => Json(WebhookResp {
            status: outcome.status.to_string(),
            kind: Some(outcome.kind),
            message: outcome.message,
        })
        .into_response(),
        Err(err) => err.into_response(),
    }
}

#[utoipa::path(
    get,
    path = "/webhook/status/{vm_type}",
    responses(
        (status = 200, description = "Registration probe", body = StatusCheckResp),
        (status = 400, description = "Missing MAC-Address header"),
        (status = 404, description = "Not registered"),
    ),
    tag = "Webhook"
)]
pub async fn status(
    Extension(st): Extension<AppState>,
    Path(_vm_type): Path<String>,
    headers: HeaderMap,
) -> Response {
    let mac = match mac_from_headers(&headers) {
        Ok(mac) => mac,
        Err(err) => return err.into_response(),
    };

    match super::service::resolve(&st, &mac) {
        Ok((kind, id)) => {
            let id = match id.parse() {
                Ok(id) => id,
                Err(_) => {
                    return (StatusCode::INTERNAL_SERVER_ERROR, "malformed entity id").into_response()
                }
            };
            Json(StatusCheckResp {
                registered: true,
                kind,
                id,
            })
            .into_response()
        }
        Err(err) => err.into_response(),
    }
}
