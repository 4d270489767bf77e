//! Cgroup v1 resource management.
//!
//! Limits are applied per controller against one named hierarchy that
//! lives under each controller's mount point. Controllers are processed in
//! the fixed order cpuset, memory, cpu. A failure on one controller stops
//! the operation; controllers already configured are left as they are.

pub mod cpu;
pub mod cpuset;
pub mod memory;
pub mod mountinfo;
pub mod subsystem;

use std::path::PathBuf;

use basin_common::error::{BasinError, Result};
use basin_common::types::CgroupLimits;

pub use self::mountinfo::{MountpointResolver, ProcMountinfo, StaticMountpoints};
pub use self::subsystem::Subsystem;

/// Controllers managed by [`CgroupManager`], in application order.
#[must_use]
pub fn supported_subsystems() -> Vec<Box<dyn Subsystem>> {
    vec![
        Box::new(cpuset::CpusetSubsystem),
        Box::new(memory::MemorySubsystem),
        Box::new(cpu::CpuSubsystem),
    ]
}

/// Handle to one named cgroup hierarchy across all supported controllers.
pub struct CgroupManager {
    name: String,
    resolver: Box<dyn MountpointResolver>,
    subsystems: Vec<Box<dyn Subsystem>>,
}

impl std::fmt::Debug for CgroupManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CgroupManager")
            .field("name", &self.name)
            .field("resolver", &self.resolver)
            .finish_non_exhaustive()
    }
}

impl CgroupManager {
    /// Creates a manager for `name`, discovering controller mount points
    /// from the running mount table.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_resolver(name, Box::new(ProcMountinfo::default()))
    }

    /// Creates a manager that resolves controller mount points through
    /// `resolver`.
    #[must_use]
    pub fn with_resolver(name: impl Into<String>, resolver: Box<dyn MountpointResolver>) -> Self {
        Self {
            name: name.into(),
            resolver,
            subsystems: supported_subsystems(),
        }
    }

    /// Returns the hierarchy name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Writes every limit present in `limits` to its controller, creating
    /// the hierarchy directory where needed.
    ///
    /// # Errors
    ///
    /// Returns the first controller failure.
    pub fn set(&self, limits: &CgroupLimits) -> Result<()> {
        for subsystem in &self.subsystems {
            if !subsystem.is_limited(limits) {
                continue;
            }
            let dir = self.cgroup_dir(subsystem.name(), true)?;
            subsystem.set(&dir, limits).inspect_err(|e| {
                tracing::error!(subsystem = subsystem.name(), error = %e, "set cgroup limit failed");
            })?;
        }
        tracing::info!(cgroup = %self.name, ?limits, "cgroup limits set");
        Ok(())
    }

    /// Adds `pid` to every controller that has a limit in `limits`.
    ///
    /// # Errors
    ///
    /// Returns the first controller failure.
    pub fn apply(&self, pid: u32, limits: &CgroupLimits) -> Result<()> {
        for subsystem in &self.subsystems {
            if !subsystem.is_limited(limits) {
                continue;
            }
            let dir = self.cgroup_dir(subsystem.name(), false)?;
            subsystem::add_task(&dir, pid).inspect_err(|e| {
                tracing::error!(subsystem = subsystem.name(), pid, error = %e, "apply cgroup failed");
            })?;
        }
        tracing::info!(cgroup = %self.name, pid, "process added to cgroup");
        Ok(())
    }

    /// Removes the hierarchy directory under every controller.
    ///
    /// Controllers that are not mounted on this host are skipped.
    ///
    /// # Errors
    ///
    /// Returns the first directory that cannot be removed.
    pub fn destroy(&self) -> Result<()> {
        for subsystem in &self.subsystems {
            let Some(mountpoint) = self.resolver.mountpoint(subsystem.name()) else {
                tracing::debug!(subsystem = subsystem.name(), "controller not mounted, skipping");
                continue;
            };
            subsystem::remove_cgroup_dir(&mountpoint.join(&self.name))?;
        }
        tracing::info!(cgroup = %self.name, "cgroup destroyed");
        Ok(())
    }

    /// Resolves `<mountpoint of subsystem>/<name>`, creating the directory
    /// when `auto_create` is set and it does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the controller is not mounted or the directory
    /// cannot be created.
    pub fn cgroup_dir(&self, subsystem: &str, auto_create: bool) -> Result<PathBuf> {
        let mountpoint =
            self.resolver
                .mountpoint(subsystem)
                .ok_or_else(|| BasinError::NotFound {
                    kind: "cgroup mount point",
                    id: subsystem.to_string(),
                })?;
        let dir = mountpoint.join(&self.name);
        if auto_create && !dir.exists() {
            subsystem::create_cgroup_dir(&dir)?;
        }
        Ok(dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager(root: &std::path::Path) -> CgroupManager {
        for controller in ["cpuset", "memory", "cpu"] {
            std::fs::create_dir_all(root.join(controller)).unwrap();
        }
        CgroupManager::with_resolver("basin-cgroup", Box::new(StaticMountpoints::new(root)))
    }

    fn read(path: PathBuf) -> String {
        std::fs::read_to_string(path).unwrap()
    }

    #[test]
    fn subsystems_are_ordered_cpuset_memory_cpu() {
        let names: Vec<_> = supported_subsystems().iter().map(|s| s.name()).collect();
        assert_eq!(names, ["cpuset", "memory", "cpu"]);
    }

    #[test]
    fn cpu_quota_fifty_percent_uses_fixed_period() {
        let root = tempfile::tempdir().unwrap();
        let manager = manager(root.path());
        let limits = CgroupLimits {
            cpu_quota_percent: 50,
            ..CgroupLimits::default()
        };

        manager.set(&limits).unwrap();
        manager.apply(4242, &limits).unwrap();

        let dir = root.path().join("cpu/basin-cgroup");
        assert_eq!(read(dir.join("cpu.cfs_period_us")), "100000");
        assert_eq!(read(dir.join("cpu.cfs_quota_us")), "50000");
        assert_eq!(read(dir.join("tasks")), "4242");
    }

    #[test]
    fn only_present_limits_are_written() {
        let root = tempfile::tempdir().unwrap();
        let manager = manager(root.path());
        let limits = CgroupLimits {
            memory_limit: "100m".into(),
            ..CgroupLimits::default()
        };

        manager.set(&limits).unwrap();
        manager.apply(7, &limits).unwrap();

        assert_eq!(
            read(root.path().join("memory/basin-cgroup/memory.limit_in_bytes")),
            "100m"
        );
        assert_eq!(read(root.path().join("memory/basin-cgroup/tasks")), "7");
        assert!(!root.path().join("cpu/basin-cgroup").exists());
        assert!(!root.path().join("cpuset/basin-cgroup").exists());
    }

    #[test]
    fn empty_limits_touch_nothing() {
        let root = tempfile::tempdir().unwrap();
        let manager = manager(root.path());

        manager.set(&CgroupLimits::default()).unwrap();
        manager.apply(1, &CgroupLimits::default()).unwrap();

        for controller in ["cpuset", "memory", "cpu"] {
            assert!(!root.path().join(controller).join("basin-cgroup").exists());
        }
    }

    #[test]
    fn destroy_removes_every_controller_dir() {
        let root = tempfile::tempdir().unwrap();
        let manager = manager(root.path());
        let limits = CgroupLimits {
            cpu_quota_percent: 20,
            cpuset: "0".into(),
            memory_limit: "64m".into(),
            cpu_share: "512".into(),
        };
        manager.set(&limits).unwrap();

        manager.destroy().unwrap();

        for controller in ["cpuset", "memory", "cpu"] {
            assert!(!root.path().join(controller).join("basin-cgroup").exists());
        }
    }

    #[test]
    fn destroy_without_hierarchy_is_ok() {
        let root = tempfile::tempdir().unwrap();
        manager(root.path()).destroy().unwrap();
    }

    #[test]
    fn failing_controller_aborts_without_rollback() {
        let root = tempfile::tempdir().unwrap();
        let manager = manager(root.path());
        // A plain file where memory's hierarchy directory should be makes
        // the second controller fail after cpuset is configured.
        std::fs::write(root.path().join("memory/basin-cgroup"), "").unwrap();
        let limits = CgroupLimits {
            cpuset: "0-1".into(),
            memory_limit: "64m".into(),
            ..CgroupLimits::default()
        };

        assert!(manager.set(&limits).is_err());
        assert_eq!(
            read(root.path().join("cpuset/basin-cgroup/cpuset.cpus")),
            "0-1"
        );
    }

    #[test]
    fn missing_mountpoint_is_not_found() {
        let manager = CgroupManager::with_resolver(
            "basin-cgroup",
            Box::new(ProcMountinfo::at("/nonexistent/mountinfo")),
        );
        let limits = CgroupLimits {
            memory_limit: "1m".into(),
            ..CgroupLimits::default()
        };
        let err = manager.set(&limits).unwrap_err();
        assert!(matches!(err, BasinError::NotFound { .. }));
    }
}
