//! `OverlayFS` management for layered container filesystems.
//!
//! Stacks read-only lower layers under a single writable upper layer,
//! giving every container a copy-on-write view of its image.

use std::path::{Path, PathBuf};

use nix::mount::{MntFlags, MsFlags, mount, umount2};

use basin_common::error::{BasinError, Result};

/// Configuration for an `OverlayFS` mount.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverlayConfig {
    /// Read-only lower layers (top to bottom).
    pub lower_dirs: Vec<PathBuf>,
    /// Writable upper layer directory.
    pub upper_dir: PathBuf,
    /// Work directory required by `OverlayFS`.
    pub work_dir: PathBuf,
    /// Final merged mount point.
    pub merged_dir: PathBuf,
}

impl OverlayConfig {
    /// Renders the `lowerdir=...,upperdir=...,workdir=...` mount data.
    #[must_use]
    pub fn mount_options(&self) -> String {
        let lowers = self
            .lower_dirs
            .iter()
            .map(|p| p.display().to_string())
            .collect::<Vec<_>>()
            .join(":");
        format!(
            "lowerdir={},upperdir={},workdir={}",
            lowers,
            self.upper_dir.display(),
            self.work_dir.display()
        )
    }
}

/// Mounts an `OverlayFS` at the configured merged directory.
///
/// All directories must already exist.
///
/// # Errors
///
/// Returns an error if the mount syscall fails.
pub fn mount_overlay(config: &OverlayConfig) -> Result<()> {
    let opts = config.mount_options();
    mount(
        Some("overlay"),
        &config.merged_dir,
        Some("overlay"),
        MsFlags::empty(),
        Some(opts.as_str()),
    )
    .map_err(|e| {
        BasinError::syscall(
            format!("overlay mount on {}", config.merged_dir.display()),
            e,
        )
    })?;

    tracing::info!(merged = %config.merged_dir.display(), "overlayfs mounted");
    Ok(())
}

/// Unmounts an `OverlayFS` at the given path.
///
/// Uses `MNT_DETACH` to lazily detach the filesystem.
///
/// # Errors
///
/// Returns an error if the unmount syscall fails.
pub fn unmount_overlay(merged_dir: &Path) -> Result<()> {
    umount2(merged_dir, MntFlags::MNT_DETACH)
        .map_err(|e| BasinError::syscall(format!("umount {}", merged_dir.display()), e))?;
    tracing::info!(path = %merged_dir.display(), "overlayfs unmounted");
    Ok(())
}
