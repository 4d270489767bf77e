//! Memory limiting via the cgroup v1 `memory` controller.

use std::path::Path;

use basin_common::error::Result;
use basin_common::types::CgroupLimits;

use super::subsystem::{Subsystem, write_control};

/// The `memory` controller.
#[derive(Debug, Clone, Copy, Default)]
pub struct MemorySubsystem;

impl Subsystem for MemorySubsystem {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn is_limited(&self, limits: &CgroupLimits) -> bool {
        !limits.memory_limit.is_empty()
    }

    /// Writes the raw limit string; the kernel accepts suffixes such as
    /// `100m` or `1g`.
    fn set(&self, cgroup_dir: &Path, limits: &CgroupLimits) -> Result<()> {
        write_control(cgroup_dir, "memory.limit_in_bytes", &limits.memory_limit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_raw_limit() {
        let dir = tempfile::tempdir().expect("tempdir");
        let limits = CgroupLimits {
            memory_limit: "256m".into(),
            ..CgroupLimits::default()
        };
        MemorySubsystem.set(dir.path(), &limits).expect("set");
        let value =
            std::fs::read_to_string(dir.path().join("memory.limit_in_bytes")).expect("read");
        assert_eq!(value, "256m");
    }
}
