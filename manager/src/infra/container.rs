//! Container Driver (spec §4.B).
//!
//! Wraps the configured container engine binary (`docker` by default) via
//! subprocess, the way `auser-mvm`'s `infra/shell.rs` wraps host tooling,
//! generalized to `tokio::process::Command` so launch/stop/exec calls don't
//! block the manager's async runtime.

use anyhow::{anyhow, Context, Result};
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;

/// Everything `run` needs to launch a `dockurr/windows` guest. A struct
/// rather than a long positional argument list, the way the teacher's
/// Docker client takes a `CreateContainerReq` (`features/containers/docker.rs`).
pub struct LaunchSpec<'a> {
    pub name: &'a str,
    pub image: &'a str,
    pub host_dir: &'a std::path::Path,
    pub guest_dir: &'a str,
    pub vm_type: &'a str,
    pub port: u16,
    pub publish_rdp: bool,
}

#[derive(Debug, Clone)]
pub struct ContainerDriver {
    engine: String,
    network: String,
}

impl ContainerDriver {
    pub fn new(engine: impl Into<String>, network: impl Into<String>) -> Self {
        Self {
            engine: engine.into(),
            network: network.into(),
        }
    }

    pub fn golden_container_name(golden_id: &str) -> String {
        format!("vapiorc_golden_{golden_id}")
    }

    pub fn instance_container_name(instance_id: &str) -> String {
        format!("vapiorc_vm_{instance_id}")
    }

    /// Launch a detached `dockurr/windows` guest per `spec`. Publishes the
    /// console port (host `port` -> container `8006`) and, when
    /// `publish_rdp` is set, the RDP port (host `port + 1000` -> container
    /// `3389`); binds the KVM and TUN devices and the `NET_ADMIN`
    /// capability the guest needs to boot (spec §4.F step 4 / §4.G step 6);
    /// fixes the container's stop timeout at 120s so a Windows guest can
    /// shut down gracefully on `stop` (spec §5). Returns the engine-assigned
    /// container id.
    pub async fn run(&self, spec: &LaunchSpec<'_>) -> Result<String> {
        let console_binding = format!("{}:8006", spec.port);
        let rdp_binding = format!("{}:3389", spec.port + 1000);
        let mount = format!("{}:{}", spec.host_dir.display(), spec.guest_dir);
        let version_env = format!("VERSION={}", spec.vm_type);

        let mut args: Vec<&str> = vec![
            "run",
            "-d",
            "--name",
            spec.name,
            "--network",
            self.network.as_str(),
            "-p",
            console_binding.as_str(),
        ];
        if spec.publish_rdp {
            args.push("-p");
            args.push(rdp_binding.as_str());
        }
        args.extend([
            "-e",
            version_env.as_str(),
            "-e",
            "DISK_FMT=qcow2",
            "-v",
            mount.as_str(),
            "--device=/dev/kvm",
            "--device=/dev/net/tun",
            "--cap-add",
            "NET_ADMIN",
            "--stop-timeout",
            "120",
            spec.image,
        ]);

        let output = Command::new(&self.engine)
            .args(&args)
            .output()
            .await
            .with_context(|| format!("spawning `{} run` for {}", self.engine, spec.name))?;

        if !output.status.success() {
            return Err(anyhow!(
                "{} run failed for {}: {}",
                self.engine,
                spec.name,
                String::from_utf8_lossy(&output.stderr)
            ));
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    /// `docker stop` with no explicit `--time` falls back to the
    /// container's configured stop timeout, set to 120s by `run` above.
    pub async fn stop(&self, name: &str) -> Result<()> {
        self.simple("stop", name).await
    }

    pub async fn remove(&self, name: &str) -> Result<()> {
        self.simple("rm", name).await
    }

    async fn simple(&self, subcommand: &str, name: &str) -> Result<()> {
        let output = Command::new(&self.engine)
            .args([subcommand, name])
            .output()
            .await
            .with_context(|| format!("spawning `{} {subcommand}` for {name}", self.engine))?;

        if !output.status.success() {
            return Err(anyhow!(
                "{} {subcommand} failed for {name}: {}",
                self.engine,
                String::from_utf8_lossy(&output.stderr)
            ));
        }
        Ok(())
    }

    /// Run a command inside `name` and return trimmed stdout, bounded by
    /// `deadline`. Used to poll the guest for its assigned MAC address
    /// during golden-image finalisation and instance readiness.
    pub async fn exec(&self, name: &str, cmd: &[&str], deadline: Duration) -> Result<String> {
        let engine = self.engine.clone();
        let name = name.to_string();
        let cmd: Vec<String> = cmd.iter().map(|s| s.to_string()).collect();

        let fut = async move {
            let output = Command::new(&engine)
                .arg("exec")
                .arg(&name)
                .args(&cmd)
                .output()
                .await
                .with_context(|| format!("spawning `{engine} exec` for {name}"))?;

            if !output.status.success() {
                return Err(anyhow!(
                    "{engine} exec failed for {name}: {}",
                    String::from_utf8_lossy(&output.stderr)
                ));
            }
            Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
        };

        timeout(deadline, fut)
            .await
            .map_err(|_| anyhow!("exec in {name} timed out after {deadline:?}"))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn container_names_follow_convention() {
        assert_eq!(
            ContainerDriver::golden_container_name("abc123"),
            "vapiorc_golden_abc123"
        );
        assert_eq!(
            ContainerDriver::instance_container_name("xyz789"),
            "vapiorc_vm_xyz789"
        );
    }
}
