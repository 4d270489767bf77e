//! Runtime engine that orchestrates container lifecycle.
//!
//! [`Engine::run`] performs, in order: workspace creation, process spawn,
//! record write, cgroup limits, network attachment, command release and,
//! for interactive containers, wait and cleanup. Nothing is rolled back
//! when a step fails.

use std::sync::Arc;

use nix::errno::Errno;
use nix::sys::signal::{Signal, kill};
use nix::unistd::Pid;

use basin_common::config::BasinConfig;
use basin_common::error::{BasinError, Result};
use basin_common::types::{CgroupLimits, ContainerId, ContainerRecord, ContainerStatus, RunParam};
use basin_core::cgroup::CgroupManager;
use basin_core::namespace::NamespaceConfig;
use basin_image::store::ImageStore;
use basin_network::command::{CommandRunner, SystemRunner};
use basin_network::driver::Network;
use basin_network::ipam::Ipam;
use basin_network::registry::NetworkRegistry;

use crate::logs;
use crate::process::{self, SpawnConfig};
use crate::state::RecordStore;
use crate::workspace::{Mounter, SystemMounter, WorkspaceManager};

/// Removes the cgroup hierarchy when dropped.
///
/// Bound to the scope of [`Engine::run`], so a detached container loses
/// its hierarchy as soon as `run` returns.
struct CgroupGuard(CgroupManager);

impl CgroupGuard {
    fn configure(&self, pid: u32, limits: &CgroupLimits) -> Result<()> {
        self.0.set(limits)?;
        self.0.apply(pid, limits)
    }
}

impl Drop for CgroupGuard {
    fn drop(&mut self) {
        if let Err(e) = self.0.destroy() {
            tracing::warn!(cgroup = %self.0.name(), error = %e, "removing cgroup failed");
        }
    }
}

/// Ignores SIGINT in the host so Ctrl+C only reaches the workload and the
/// host still cleans up after it.
fn absorb_interrupts() {
    if let Err(e) = ctrlc::set_handler(|| tracing::debug!("interrupt left to the container")) {
        tracing::warn!(error = %e, "could not install interrupt handler");
    }
}

fn to_pid(pid: u32) -> Result<Pid> {
    i32::try_from(pid)
        .map(Pid::from_raw)
        .map_err(|_| BasinError::config(format!("pid {pid} out of range")))
}

fn is_alive(pid: u32) -> bool {
    to_pid(pid).is_ok_and(|pid| matches!(kill(pid, None::<Signal>), Ok(()) | Err(Errno::EPERM)))
}

/// The runtime engine that coordinates all container operations.
#[derive(Debug)]
pub struct Engine {
    config: BasinConfig,
    records: RecordStore,
    workspaces: WorkspaceManager,
    networks: NetworkRegistry,
}

impl Engine {
    /// Creates an engine over the real kernel and host tools.
    ///
    /// # Errors
    ///
    /// Returns an error if the network descriptors cannot be loaded.
    pub fn new(config: BasinConfig) -> Result<Self> {
        Self::with_backends(config, Arc::new(SystemMounter), Arc::new(SystemRunner))
    }

    /// Creates an engine with explicit mount and command backends.
    ///
    /// # Errors
    ///
    /// Returns an error if the network descriptors cannot be loaded.
    pub fn with_backends(
        config: BasinConfig,
        mounter: Arc<dyn Mounter>,
        runner: Arc<dyn CommandRunner>,
    ) -> Result<Self> {
        let networks = NetworkRegistry::load(&config.network_dir, Ipam::new(&config.ipam_file), runner)?;
        Ok(Self {
            records: RecordStore::new(&config.run_root),
            workspaces: WorkspaceManager::new(
                &config.workspace_root,
                ImageStore::new(&config.image_dir),
                mounter,
            ),
            networks,
            config,
        })
    }

    /// The configuration in use.
    #[must_use]
    pub const fn config(&self) -> &BasinConfig {
        &self.config
    }

    /// Starts a container.
    ///
    /// The workload is released only after its cgroup limits and network
    /// attachment are in place. With `tty` set the call waits for the
    /// container to exit, then deletes its record and workspace.
    ///
    /// # Errors
    ///
    /// Returns an error for an empty command or a name already in use, and
    /// the first failing step otherwise. A container that was already
    /// spawned aborts on its own once the command pipe closes empty.
    pub fn run(&self, param: &RunParam) -> Result<ContainerRecord> {
        if param.command.is_empty() {
            return Err(BasinError::config("missing container command"));
        }
        let id = ContainerId::generate();
        let name = param
            .name
            .clone()
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| id.to_string());
        if self.records.exists(&name) {
            return Err(BasinError::InvalidState {
                message: format!("container name {name} is already in use"),
            });
        }
        let volume = param.volume.clone().unwrap_or_default();

        let layers = self.workspaces.create(&name, &param.image, &volume)?;
        let log_file = if param.tty {
            None
        } else {
            let _dir = self.records.ensure_dir(&name)?;
            Some(logs::create_log_file(&self.config.log_path(&name))?)
        };

        let spawned = process::spawn(&SpawnConfig {
            root_dir: &layers.merged,
            envs: &param.envs,
            log_file: log_file.as_ref(),
            namespaces: NamespaceConfig::default(),
        })?;
        let pid = spawned.pid_u32();

        let mut record = ContainerRecord::running(pid, id, &name, &param.command);
        record.volume.clone_from(&volume);
        record.port_mapping.clone_from(&param.port_mapping);
        self.records.save(&record)?;

        let cgroup = CgroupGuard(CgroupManager::new(&self.config.cgroup_name));
        cgroup.configure(pid, &param.limits)?;

        if let Some(network) = &param.network {
            let endpoint = self.networks.connect(network, &record)?;
            tracing::debug!(endpoint = %endpoint.id, ip = %endpoint.ip, "endpoint ready");
        }

        spawned.channel.send(&param.command)?;
        tracing::info!(name = %name, id = %record.id, pid, image = %param.image, "container started");

        if param.tty {
            absorb_interrupts();
            let code = process::wait(spawned.pid)?;
            tracing::info!(name = %name, code, "container exited");
            if let Err(e) = self.records.delete(&name) {
                tracing::error!(name = %name, error = %e, "deleting container record failed");
            }
            if let Err(e) = self.workspaces.destroy(&name, &volume) {
                tracing::error!(name = %name, error = %e, "destroying workspace failed");
            }
        }
        Ok(record)
    }

    /// Lists all containers. Records claiming `running` whose process is
    /// gone are rewritten as `exited`.
    ///
    /// # Errors
    ///
    /// Returns an error if the record directory cannot be listed.
    pub fn list(&self) -> Result<Vec<ContainerRecord>> {
        let mut records = self.records.list()?;
        for record in &mut records {
            let gone = record.status == ContainerStatus::Running
                && record.pid.is_none_or(|pid| !is_alive(pid));
            if gone {
                record.mark_exited();
                if let Err(e) = self.records.save(record) {
                    tracing::warn!(name = %record.name, error = %e, "updating container record failed");
                } else {
                    tracing::info!(name = %record.name, "container exited");
                }
            }
        }
        Ok(records)
    }

    /// Returns the log of a detached container.
    ///
    /// # Errors
    ///
    /// Returns [`BasinError::NotFound`] for an unknown container, or an
    /// error if the log cannot be read.
    pub fn logs(&self, name: &str) -> Result<String> {
        let _record = self.records.load(name)?;
        logs::read_logs(&self.config.log_path(name))
    }

    /// Stops a container with SIGTERM and records it as `stopped`.
    ///
    /// An `exited` container is marked `stopped` without a signal; a
    /// `stopped` one is left alone.
    ///
    /// # Errors
    ///
    /// Returns an error for an unknown container, a failing signal or a
    /// failing record write.
    pub fn stop(&self, name: &str) -> Result<ContainerRecord> {
        let mut record = self.records.load(name)?;
        match (record.status, record.pid) {
            (ContainerStatus::Stopped, _) => {
                tracing::info!(name, "container already stopped");
                return Ok(record);
            }
            (ContainerStatus::Running, Some(pid)) => match kill(to_pid(pid)?, Signal::SIGTERM) {
                Ok(()) | Err(Errno::ESRCH) => {}
                Err(e) => return Err(BasinError::syscall(format!("kill {pid}"), e)),
            },
            _ => {}
        }
        record.mark_stopped();
        self.records.save(&record)?;
        tracing::info!(name, "container stopped");
        Ok(record)
    }

    /// Removes a stopped container's record, then its workspace. Workspace
    /// teardown errors are logged and do not fail the call.
    ///
    /// # Errors
    ///
    /// Returns an error for an unknown container, a container that is not
    /// `stopped`, or a record that cannot be deleted.
    pub fn remove(&self, name: &str) -> Result<()> {
        let record = self.records.load(name)?;
        if record.status != ContainerStatus::Stopped {
            return Err(BasinError::InvalidState {
                message: format!("container {name} is {}; stop it before removing", record.status),
            });
        }
        self.records.delete(name)?;
        if let Err(e) = self.workspaces.destroy(name, &record.volume) {
            tracing::error!(name, error = %e, "workspace teardown incomplete");
        }
        tracing::info!(name, "container removed");
        Ok(())
    }

    /// Creates a network.
    ///
    /// # Errors
    ///
    /// See [`NetworkRegistry::create_network`].
    pub fn create_network(&mut self, driver: &str, subnet: &str, name: &str) -> Result<Network> {
        self.networks.create_network(driver, subnet, name).cloned()
    }

    /// Deletes a network.
    ///
    /// # Errors
    ///
    /// See [`NetworkRegistry::delete_network`].
    pub fn delete_network(&mut self, name: &str) -> Result<()> {
        self.networks.delete_network(name)
    }

    /// All networks, ordered by name.
    #[must_use]
    pub fn networks(&self) -> Vec<Network> {
        self.networks.list().cloned().collect()
    }
}
