use std::time::Duration;

use tracing::{error, info, warn};
use vapiorc_types::GoldenImageStatus;

use crate::core::error::Result;
use crate::features::{golden_images, instances};
use crate::AppState;

/// Keep `vm_type`'s hot-spare pool at the configured target. Serialised
/// through `state.replenish_lock` so concurrent triggers collapse into
/// sequential executions (spec §4.H) rather than double-provisioning.
pub async fn ensure(state: &AppState, vm_type: &str) -> Result<()> {
    if state.config.hot_spare_count == 0 {
        return Ok(());
    }

    let _guard = state.replenish_lock.lock().await;
    ensure_locked(state, vm_type).await
}

async fn ensure_locked(state: &AppState, vm_type: &str) -> Result<()> {
    let template_dir = state.config.template_dir(vm_type);
    let template_ready = template_dir.exists()
        && std::fs::read_dir(&template_dir)
            .map(|mut d| d.next().is_some())
            .unwrap_or(false);

    if !template_ready {
        if let Some(ready_golden) =
            golden_images::repo::find_by_status(&state.db, vm_type, GoldenImageStatus::Ready)
                .await
                .map_err(anyhow::Error::from)?
        {
            if let Err(err) = golden_images::service::finalise(
                &state.db,
                &state.config,
                &state.container_driver,
                ready_golden.id,
            )
            .await
            {
                error!(%vm_type, error = ?err, "finalise failed while rebuilding a missing template");
                return Ok(());
            }

            let now_ready = template_dir.exists()
                && std::fs::read_dir(&template_dir)
                    .map(|mut d| d.next().is_some())
                    .unwrap_or(false);
            if !now_ready {
                error!(%vm_type, "template still missing after finalise; not creating spares this tick");
            }
            return Ok(());
        }

        if golden_images::repo::find_by_status(&state.db, vm_type, GoldenImageStatus::Creating)
            .await
            .map_err(anyhow::Error::from)?
            .is_some()
        {
            info!(%vm_type, "golden image still building; waiting for its readiness webhook");
            return Ok(());
        }

        golden_images::service::create(
            &state.db,
            &state.config,
            &state.container_driver,
            vm_type,
        )
        .await?;
        return Ok(());
    }

    let current = instances::repo::count_ready_unassigned_hot_spares(&state.db, vm_type)
        .await
        .map_err(anyhow::Error::from)?;
    let needed = state.config.hot_spare_count as i64 - current;

    for i in 0..needed {
        match instances::service::create_instance(
            &state.db,
            &state.config,
            &state.container_driver,
            vm_type,
            true,
        )
        .await
        {
            Ok(iid) => {
                metrics::counter!("vapiorc_hot_spares_created", 1);
                info!(%iid, %vm_type, "hot spare created");
            }
            Err(err) => {
                warn!(%vm_type, error = ?err, "hot spare creation failed; leaving remaining deficit for next tick");
                break;
            }
        }
        if i + 1 < needed {
            tokio::time::sleep(Duration::from_secs(2)).await;
        }
    }
    Ok(())
}

/// Fire-and-forget trigger used after assign/release so the caller isn't
/// blocked waiting for replenishment (spec §4.I / P7).
pub fn trigger(state: AppState, vm_type: String) {
    tokio::spawn(async move {
        if let Err(err) = ensure(&state, &vm_type).await {
            error!(%vm_type, error = ?err, "background hot-spare replenishment failed");
        }
    });
}
