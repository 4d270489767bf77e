//! CPU pinning via the cgroup v1 `cpuset` controller.

use std::path::Path;

use basin_common::error::{BasinError, Result};
use basin_common::types::CgroupLimits;

use super::subsystem::{Subsystem, write_control};

/// The `cpuset` controller.
#[derive(Debug, Clone, Copy, Default)]
pub struct CpusetSubsystem;

impl Subsystem for CpusetSubsystem {
    fn name(&self) -> &'static str {
        "cpuset"
    }

    fn is_limited(&self, limits: &CgroupLimits) -> bool {
        !limits.cpuset.is_empty()
    }

    fn set(&self, cgroup_dir: &Path, limits: &CgroupLimits) -> Result<()> {
        write_control(cgroup_dir, "cpuset.cpus", &limits.cpuset)?;
        inherit_mems(cgroup_dir)
    }
}

/// A fresh cpuset cgroup has an empty `cpuset.mems` and refuses tasks
/// until it is filled; copy the parent's value in that case.
fn inherit_mems(cgroup_dir: &Path) -> Result<()> {
    let own = cgroup_dir.join("cpuset.mems");
    let Ok(current) = std::fs::read_to_string(&own) else {
        return Ok(());
    };
    if !current.trim().is_empty() {
        return Ok(());
    }
    let Some(parent) = cgroup_dir.parent() else {
        return Ok(());
    };
    let parent_file = parent.join("cpuset.mems");
    let mems = std::fs::read_to_string(&parent_file).map_err(|e| BasinError::io(&parent_file, e))?;
    write_control(cgroup_dir, "cpuset.mems", mems.trim())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_cpus() {
        let dir = tempfile::tempdir().expect("tempdir");
        let limits = CgroupLimits {
            cpuset: "0-1".into(),
            ..CgroupLimits::default()
        };
        CpusetSubsystem.set(dir.path(), &limits).expect("set");
        let cpus = std::fs::read_to_string(dir.path().join("cpuset.cpus")).expect("read");
        assert_eq!(cpus, "0-1");
    }

    #[test]
    fn empty_mems_inherit_from_parent() {
        let parent = tempfile::tempdir().expect("tempdir");
        std::fs::write(parent.path().join("cpuset.mems"), "0\n").expect("write parent");
        let child = parent.path().join("basin-cgroup");
        std::fs::create_dir(&child).expect("mkdir");
        std::fs::write(child.join("cpuset.mems"), "\n").expect("write child");

        let limits = CgroupLimits {
            cpuset: "1".into(),
            ..CgroupLimits::default()
        };
        CpusetSubsystem.set(&child, &limits).expect("set");

        let mems = std::fs::read_to_string(child.join("cpuset.mems")).expect("read");
        assert_eq!(mems, "0");
    }
}
