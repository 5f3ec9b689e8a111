use std::time::Duration;

use sqlx::PgPool;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::core::error::{Result, VapiorcError};
use crate::infra::{
    container::{ContainerDriver, LaunchSpec},
    ports::PortRange,
    workspace,
};

use vapiorc_types::VmInstanceStatus;

use super::repo;

const MAC_POLL_INTERVAL: Duration = Duration::from_secs(1);
const MAC_POLL_ATTEMPTS: u32 = 60;
const MAC_READ_CMD: [&str; 2] = ["cat", "/sys/class/net/eth0/address"];

/// Clone the template into a fresh workspace, launch its container, and
/// start tracking its guest MAC. Spec §4.G.create_instance.
pub async fn create_instance(
    db: &PgPool,
    cfg: &Config,
    driver: &ContainerDriver,
    vm_type: &str,
    is_hot_spare: bool,
) -> Result<Uuid> {
    let instance_id = Uuid::new_v4();
    repo::insert(db, instance_id, vm_type, is_hot_spare)
        .await
        .map_err(|e| VapiorcError::Internal(e.into()))?;

    match provision(db, cfg, driver, instance_id, vm_type).await {
        Ok(()) => Ok(instance_id),
        Err(err) => {
            warn!(%instance_id, error = ?err, "instance provisioning failed");
            if let Err(mark_err) = repo::set_status(db, instance_id, VmInstanceStatus::Failed).await {
                warn!(%instance_id, error = ?mark_err, "failed to mark instance failed");
            }
            cleanup(db, cfg, driver, instance_id).await;
            Err(err)
        }
    }
}

async fn provision(
    db: &PgPool,
    cfg: &Config,
    driver: &ContainerDriver,
    instance_id: Uuid,
    vm_type: &str,
) -> Result<()> {
    let instance_id_str = instance_id.to_string();
    let instance_dir = workspace::instance_dir(&cfg.instances_dir(), &instance_id_str);
    workspace::create_dir(&instance_dir).map_err(VapiorcError::Internal)?;

    let template_dir = cfg.template_dir(vm_type);
    if !template_dir.exists() {
        return Err(VapiorcError::TemplateMissing(vm_type.to_string()));
    }
    workspace::deep_copy(&template_dir, &instance_dir).map_err(VapiorcError::Internal)?;

    let port = PortRange::new(cfg.port_range_start, cfg.port_range_end)
        .allocate()
        .ok_or(VapiorcError::NoAvailablePort)?;

    let name = ContainerDriver::instance_container_name(&instance_id_str);
    let container_id = driver
        .run(&LaunchSpec {
            name: &name,
            image: "dockurr/windows",
            host_dir: &instance_dir,
            guest_dir: "/storage",
            vm_type,
            port,
            // instances publish both ports per spec §4.G step 6.
            publish_rdp: true,
        })
        .await
        .map_err(|e| VapiorcError::LaunchError(e.to_string()))?;

    repo::set_container(db, instance_id, &container_id, port as i32)
        .await
        .map_err(|e| VapiorcError::Internal(e.into()))?;

    info!(%instance_id, %container_id, port, "instance container started");

    match poll_and_write_mac(driver, &name, &container_id, &instance_dir).await {
        Ok(()) => {}
        Err(err) => warn!(%instance_id, error = ?err, "guest MAC never appeared within the poll window"),
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

/// Best-effort teardown: stop/remove the container and delete the
/// workspace. Errors are logged, never propagated — an operator reclaiming
/// a VM must never be blocked by a stale container (spec §7).
pub async fn cleanup(db: &PgPool, cfg: &Config, driver: &ContainerDriver, instance_id: Uuid) {
    let instance_id_str = instance_id.to_string();
    let name = ContainerDriver::instance_container_name(&instance_id_str);

    if let Err(err) = driver.stop(&name).await {
        warn!(%instance_id, error = ?err, "best-effort stop failed");
    }
    if let Err(err) = driver.remove(&name).await {
        warn!(%instance_id, error = ?err, "best-effort remove failed");
    }

    let instance_dir = workspace::instance_dir(&cfg.instances_dir(), &instance_id_str);
    if let Err(err) = workspace::destroy_dir(&instance_dir) {
        warn!(%instance_id, error = ?err, "failed to remove instance workspace");
    }

    let _ = db;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn create_instance_fails_without_template() {
        repo::reset_store();
        let db = PgPool::connect_lazy("postgres://localhost/test").unwrap();
        let storage = tempfile::tempdir().unwrap();
        let cfg = Config {
            database_url: String::new(),
            storage_path: storage.path().to_path_buf(),
            port_range_start: 9100,
            port_range_end: 9101,
            hot_spare_count: 1,
            vm_type: "11".into(),
            host_ip: "127.0.0.1".into(),
            docker_network: "net".into(),
            container_engine: "docker".into(),
            bind: "127.0.0.1:0".into(),
        };
        let driver = ContainerDriver::new("docker", "net");

        let err = create_instance(&db, &cfg, &driver, "11", true)
            .await
            .unwrap_err();
        assert!(matches!(err, VapiorcError::TemplateMissing(_)));

        let row = repo::get(&db, {
            // the instance row must still exist, now marked failed
            let rows = repo::list(&db).await.unwrap();
            rows[0].id
        })
        .await
        .unwrap();
        assert_eq!(row.status, VmInstanceStatus::Failed.as_str());
    }
}
