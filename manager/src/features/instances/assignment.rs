use tracing::info;
use uuid::Uuid;
use vapiorc_types::AssignmentInfo;

use crate::core::error::{Result, VapiorcError};
use crate::features::hot_spares;
use crate::AppState;

use super::{repo, service};

/// Claim a ready spare, or create+claim a fresh instance if none is
/// available. Spec §4.I.assign.
pub async fn assign(state: &AppState, assigned_to: &str) -> Result<AssignmentInfo> {
    let vm_type = state.config.vm_type.clone();

    let row = match repo::claim_hot_spare(&state.db, &vm_type, assigned_to)
        .await
        .map_err(anyhow::Error::from)?
    {
        Some(row) => row,
        None => {
            let iid = service::create_instance(
                &state.db,
                &state.config,
                &state.container_driver,
                &vm_type,
                false,
            )
            .await?;
            repo::assign_directly(&state.db, iid, assigned_to)
                .await
                .map_err(anyhow::Error::from)?;
            repo::get(&state.db, iid).await.map_err(anyhow::Error::from)?
        }
    };

    info!(instance_id = %row.id, %assigned_to, "instance assigned");
    hot_spares::service::trigger(state.clone(), vm_type);

    let port = row.port.ok_or_else(|| {
        VapiorcError::Internal(anyhow::anyhow!("assigned instance {} has no port", row.id))
    })?;

    Ok(AssignmentInfo {
        instance_id: row.id,
        container_id: row.container_id,
        port,
        console_url: format!("http://{}:{}", state.config.host_ip, port),
        rdp_port: port + 1000,
    })
}

/// Release and destroy are the same action: every release wipes the
/// workspace for security (spec §4.I / §9 "release = destroy").
pub async fn destroy(state: &AppState, instance_id: Uuid) {
    service::cleanup(&state.db, &state.config, &state.container_driver, instance_id).await;

    let vm_type = repo::get(&state.db, instance_id)
        .await
        .ok()
        .map(|row| row.vm_type)
        .unwrap_or_else(|| state.config.vm_type.clone());

    let _ = repo::delete_row(&state.db, instance_id).await;
    info!(%instance_id, "instance destroyed");
    hot_spares::service::trigger(state.clone(), vm_type);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::infra::container::ContainerDriver;
    use sqlx::PgPool;
    use std::sync::Arc;
    use tokio::sync::Mutex;

    fn test_state(storage: &std::path::Path) -> AppState {
        AppState {
            db: PgPool::connect_lazy("postgres://localhost/test").unwrap(),
            config: Config {
                database_url: String::new(),
                storage_path: storage.to_path_buf(),
                port_range_start: 9200,
                port_range_end: 9201,
                hot_spare_count: 0,
                vm_type: "11".into(),
                host_ip: "127.0.0.1".into(),
                docker_network: "net".into(),
                container_engine: "docker".into(),
                bind: "127.0.0.1:0".into(),
            },
            container_driver: ContainerDriver::new("docker", "net"),
            replenish_lock: Arc::new(Mutex::new(())),
        }
    }

    #[tokio::test]
    async fn assign_returns_503_equivalent_error_without_template_or_spare() {
        super::repo::reset_store();
        let tmp = tempfile::tempdir().unwrap();
        let state = test_state(tmp.path());

        let err = assign(&state, "alice").await.unwrap_err();
        assert!(matches!(err, VapiorcError::TemplateMissing(_)));
    }
}
