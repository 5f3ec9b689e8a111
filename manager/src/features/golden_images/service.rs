use std::time::Duration;

use sqlx::PgPool;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::core::error::{Result, VapiorcError};
use crate::infra::{
    container::{ContainerDriver, LaunchSpec},
    workspace,
};

use vapiorc_types::GoldenImageStatus;

use super::repo;

const MAC_POLL_INTERVAL: Duration = Duration::from_secs(1);
const MAC_POLL_ATTEMPTS: u32 = 60;
const MAC_READ_CMD: [&str; 2] = ["cat", "/sys/class/net/eth0/address"];

/// Boot an installer container for `vm_type`, track its guest MAC, and
/// return the new golden image's id. Mirrors spec §4.F.create.
pub async fn create(db: &PgPool, cfg: &Config, driver: &ContainerDriver, vm_type: &str) -> Result<Uuid> {
    let golden_id = Uuid::new_v4();
    repo::insert(db, golden_id, vm_type)
        .await
        .map_err(|e| VapiorcError::Internal(e.into()))?;

    match provision(db, cfg, driver, golden_id, vm_type).await {
        Ok(()) => Ok(golden_id),
        Err(err) => {
            warn!(%golden_id, error = ?err, "golden image provisioning failed");
            if let Err(mark_err) = repo::set_status(db, golden_id, GoldenImageStatus::Failed).await {
                warn!(%golden_id, error = ?mark_err, "failed to mark golden image failed");
            }
            Err(err)
        }
    }
}

async fn provision(
    db: &PgPool,
    cfg: &Config,
    driver: &ContainerDriver,
    golden_id: Uuid,
    vm_type: &str,
) -> Result<()> {
    let golden_id_str = golden_id.to_string();
    let golden_dir = workspace::golden_dir(&cfg.golden_images_dir(), &golden_id_str);
    workspace::create_dir(&golden_dir).map_err(VapiorcError::Internal)?;

    let port = crate::infra::ports::PortRange::new(cfg.port_range_start, cfg.port_range_end)
        .allocate()
        .ok_or(VapiorcError::NoAvailablePort)?;

    let name = ContainerDriver::golden_container_name(&golden_id_str);
    let container_id = driver
        .run(&LaunchSpec {
            name: &name,
            image: "dockurr/windows",
            host_dir: &golden_dir,
            guest_dir: "/storage",
            vm_type,
            port,
            // the installer is driven over its console only; no caller has
            // an RDP address to hand out for a golden image yet.
            publish_rdp: false,
        })
        .await
        .map_err(|e| VapiorcError::LaunchError(e.to_string()))?;

    info!(%golden_id, %container_id, port, "golden image container started");

    match poll_and_write_mac(driver, &name, &container_id, &golden_dir).await {
        Ok(()) => {}
        Err(err) => warn!(%golden_id, error = ?err, "guest MAC never appeared within the poll window"),
    }

    Ok(())
}

async fn poll_and_write_mac(
    driver: &ContainerDriver,
    container_name: &str,
    container_id: &str,
    dir: &std::path::Path,
) -> anyhow::Result<()> {
    for _ in 0..MAC_POLL_ATTEMPTS {
        match driver
            .exec(container_name, &MAC_READ_CMD, Duration::from_secs(1))
            .await
        {
            Ok(mac) if !mac.is_empty() => {
                workspace::write_mac(dir, container_id, &mac)?;
                return Ok(());
            }
            _ => tokio::time::sleep(MAC_POLL_INTERVAL).await,
        }
    }
    anyhow::bail!("exceeded {MAC_POLL_ATTEMPTS} MAC poll attempts")
}

/// Materialise the template from a completed installer workspace and mark
/// the record ready. Spec §4.F.finalise — order is load-bearing.
pub async fn finalise(db: &PgPool, cfg: &Config, driver: &ContainerDriver, golden_id: Uuid) -> Result<()> {
    let row = repo::get(db, golden_id)
        .await
        .map_err(|_| VapiorcError::EntityNotFound(golden_id.to_string()))?;

    let golden_id_str = golden_id.to_string();
    let golden_dir = workspace::golden_dir(&cfg.golden_images_dir(), &golden_id_str);
    if !golden_dir.exists() {
        return Err(VapiorcError::EntityNotFound(golden_id_str));
    }

    let template_dir = cfg.template_dir(&row.vm_type);
    workspace::promote_to_template(&golden_dir, &template_dir).map_err(VapiorcError::Internal)?;
    workspace::strip_macs(&template_dir).map_err(VapiorcError::Internal)?;

    let name = ContainerDriver::golden_container_name(&golden_id_str);
    if let Err(err) = driver.stop(&name).await {
        warn!(%golden_id, error = ?err, "best-effort stop of installer container failed");
    }
    if let Err(err) = driver.remove(&name).await {
        warn!(%golden_id, error = ?err, "best-effort removal of installer container failed");
    }
    if let Err(err) = workspace::destroy_dir(&golden_dir) {
        warn!(%golden_id, error = ?err, "failed to reclaim installer workspace");
    }

    repo::set_status(db, golden_id, GoldenImageStatus::Ready)
        .await
        .map_err(|e| VapiorcError::Internal(e.into()))?;
    info!(%golden_id, "golden image ready");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn finalise_fails_for_unknown_id() {
        repo::reset_store();
        let db = PgPool::connect_lazy("postgres://localhost/test").unwrap();
        let cfg = test_config();
        let driver = ContainerDriver::new("docker", "net");

        let err = finalise(&db, &cfg, &driver, Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, VapiorcError::EntityNotFound(_)));
    }

    fn test_config() -> Config {
        Config {
            database_url: String::new(),
            storage_path: tempfile::tempdir().unwrap().into_path(),
            port_range_start: 9000,
            port_range_end: 9001,
            hot_spare_count: 1,
            vm_type: "11".into(),
            host_ip: "127.0.0.1".into(),
            docker_network: "net".into(),
            container_engine: "docker".into(),
            bind: "127.0.0.1:0".into(),
        }
    }
}
