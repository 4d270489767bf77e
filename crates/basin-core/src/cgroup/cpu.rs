//! CPU bandwidth and share control via the cgroup v1 `cpu` controller.
//!
//! Manages `cpu.shares`, `cpu.cfs_period_us` and `cpu.cfs_quota_us`.

use std::path::Path;

use basin_common::constants::{CPU_PERCENT_MAX, CPU_PERIOD_US};
use basin_common::error::{BasinError, Result};
use basin_common::types::CgroupLimits;

use super::subsystem::{Subsystem, write_control};

/// The `cpu` controller.
#[derive(Debug, Clone, Copy, Default)]
pub struct CpuSubsystem;

impl Subsystem for CpuSubsystem {
    fn name(&self) -> &'static str {
        "cpu"
    }

    fn is_limited(&self, limits: &CgroupLimits) -> bool {
        limits.cpu_quota_percent != 0 || !limits.cpu_share.is_empty()
    }

    fn set(&self, cgroup_dir: &Path, limits: &CgroupLimits) -> Result<()> {
        if !limits.cpu_share.is_empty() {
            write_control(cgroup_dir, "cpu.shares", &limits.cpu_share)?;
        }
        if limits.cpu_quota_percent != 0 {
            let quota_us = quota_from_percent(limits.cpu_quota_percent)?;
            set_cfs_quota(cgroup_dir, quota_us, CPU_PERIOD_US)?;
        }
        Ok(())
    }
}

/// Converts a percentage of one CPU into a quota over [`CPU_PERIOD_US`].
///
/// # Errors
///
/// Returns an error if `percent` is outside 1-100.
pub fn quota_from_percent(percent: u32) -> Result<u64> {
    if percent == 0 || percent > CPU_PERCENT_MAX {
        return Err(BasinError::config(format!(
            "cpu quota must be between 1 and {CPU_PERCENT_MAX} percent, got {percent}"
        )));
    }
    Ok(CPU_PERIOD_US / u64::from(CPU_PERCENT_MAX) * u64::from(percent))
}

/// Writes the CFS period and quota, period first.
///
/// # Errors
///
/// Returns an error if either control file cannot be written.
pub fn set_cfs_quota(cgroup_dir: &Path, quota_us: u64, period_us: u64) -> Result<()> {
    write_control(cgroup_dir, "cpu.cfs_period_us", &period_us.to_string())?;
    write_control(cgroup_dir, "cpu.cfs_quota_us", &quota_us.to_string())?;
    tracing::debug!(quota_us, period_us, "CPU quota set");
    Ok(())
}
