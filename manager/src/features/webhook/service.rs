use tracing::{info, warn};
use vapiorc_types::EntityKind;

use crate::core::error::{Result, VapiorcError};
use crate::features::{golden_images, hot_spares, instances};
use crate::infra::mac_registry;
use crate::AppState;

pub struct WebhookOutcome {
    pub status: &'static str,
    pub kind: EntityKind,
    pub message: String,
}

/// Resolve `mac` and dispatch to the owning entity's readiness transition.
/// Spec §4.J.
pub async fn ready(state: &AppState, vm_type: &str, mac: &str) -> Result<WebhookOutcome> {
    let (kind, id) = resolve(state, mac)?;

    match kind {
        EntityKind::GoldenImage => {
            let golden_id = id
                .parse()
                .map_err(|_| VapiorcError::Internal(anyhow::anyhow!("malformed golden id {id}")))?;
            golden_images::service::finalise(
                &state.db,
                &state.config,
                &state.container_driver,
                golden_id,
            )
            .await?;
            hot_spares::service::trigger(state.clone(), vm_type.to_string());
            info!(%golden_id, "golden image finalised via readiness webhook");
            Ok(WebhookOutcome {
                status: "processed",
                kind,
                message: format!("golden image {golden_id} marked as ready and hot spares initiated"),
            })
        }
        EntityKind::VmInstance => {
            let instance_id = id
                .parse()
                .map_err(|_| VapiorcError::Internal(anyhow::anyhow!("malformed instance id {id}")))?;
            let advanced = instances::repo::mark_ready_if_starting(&state.db, instance_id)
                .await
                .map_err(anyhow::Error::from)?;
            if advanced {
                info!(%instance_id, "instance marked ready via readiness webhook");
                Ok(WebhookOutcome {
                    status: "processed",
                    kind,
                    message: format!("instance {instance_id} marked as ready"),
                })
            } else {
                warn!(%instance_id, "instance not in starting state; ignoring replayed webhook");
                Ok(WebhookOutcome {
                    status: "ignored",
                    kind,
                    message: "instance not in expected state".to_string(),
                })
            }
        }
    }
}

pub fn resolve(state: &AppState, mac: &str) -> Result<(EntityKind, String)> {
    mac_registry::resolve(
        &state.config.golden_images_dir(),
        &state.config.instances_dir(),
        mac,
    )
    .ok_or_else(|| VapiorcError::EntityNotFound(format!("no container registered for MAC {mac}")))
}
