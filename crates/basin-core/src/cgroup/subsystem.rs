//! Controller abstraction and the control-file helpers shared by every
//! controller.

use std::os::unix::fs::DirBuilderExt;
use std::path::Path;

use basin_common::constants::PERM_0755;
use basin_common::error::{BasinError, Result};
use basin_common::types::CgroupLimits;

/// Task-membership file of a cgroup v1 directory.
pub const TASKS_FILE: &str = "tasks";

/// One cgroup v1 controller.
pub trait Subsystem: Send + Sync {
    /// Controller name as it appears in the mount options.
    fn name(&self) -> &'static str;

    /// Returns `true` if `limits` sets anything this controller enforces.
    fn is_limited(&self, limits: &CgroupLimits) -> bool;

    /// Writes this controller's limits into `cgroup_dir`.
    ///
    /// # Errors
    ///
    /// Returns an error if a control file cannot be written.
    fn set(&self, cgroup_dir: &Path, limits: &CgroupLimits) -> Result<()>;
}

/// Writes `value` to the control file `file` inside `cgroup_dir`.
///
/// # Errors
///
/// Returns an error carrying the control file path if the write fails.
pub fn write_control(cgroup_dir: &Path, file: &str, value: &str) -> Result<()> {
    let path = cgroup_dir.join(file);
    std::fs::write(&path, value).map_err(|e| BasinError::io(&path, e))?;
    tracing::debug!(path = %path.display(), value, "cgroup control file written");
    Ok(())
}

/// Adds `pid` to the cgroup at `cgroup_dir`.
///
/// # Errors
///
/// Returns an error if writing the tasks file fails.
pub fn add_task(cgroup_dir: &Path, pid: u32) -> Result<()> {
    write_control(cgroup_dir, TASKS_FILE, &pid.to_string())
}

/// Creates a cgroup directory with mode 0755.
///
/// # Errors
///
/// Returns an error if the directory cannot be created.
pub fn create_cgroup_dir(dir: &Path) -> Result<()> {
    std::fs::DirBuilder::new()
        .mode(PERM_0755)
        .create(dir)
        .map_err(|e| BasinError::io(dir, e))?;
    tracing::debug!(path = %dir.display(), "cgroup directory created");
    Ok(())
}

/// Removes a cgroup directory and everything below it.
///
/// A kernel cgroup directory only accepts `rmdir(2)`; a plain directory
/// tree falls back to recursive removal. A missing directory is not an
/// error.
///
/// # Errors
///
/// Returns an error if the directory exists and cannot be removed.
pub fn remove_cgroup_dir(dir: &Path) -> Result<()> {
    match std::fs::remove_dir(dir) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(_) => std::fs::remove_dir_all(dir).map_err(|e| BasinError::io(dir, e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_task_writes_pid() {
        let dir = tempfile::tempdir().expect("tempdir");
        add_task(dir.path(), 99).expect("add task");
        let tasks = std::fs::read_to_string(dir.path().join(TASKS_FILE)).expect("read");
        assert_eq!(tasks, "99");
    }

    #[test]
    fn write_control_into_missing_dir_reports_path() {
        let dir = tempfile::tempdir().expect("tempdir");
        let missing = dir.path().join("absent");
        let err = write_control(&missing, "cpu.shares", "512").unwrap_err();
        assert!(err.to_string().contains("absent/cpu.shares"));
    }

    #[test]
    fn remove_missing_dir_is_ok() {
        let dir = tempfile::tempdir().expect("tempdir");
        remove_cgroup_dir(&dir.path().join("absent")).expect("remove");
    }

    #[test]
    fn remove_populated_dir() {
        let dir = tempfile::tempdir().expect("tempdir");
        let cg = dir.path().join("basin-cgroup");
        create_cgroup_dir(&cg).expect("create");
        add_task(&cg, 1).expect("add");
        remove_cgroup_dir(&cg).expect("remove");
        assert!(!cg.exists());
    }
}
