//! Mount utilities for container filesystem setup.
//!
//! Handles the early mounts of the init process (`/proc`, `/dev`), bind
//! mounts for volumes, and unmounting.

use std::path::Path;

use nix::mount::{MntFlags, MsFlags, mount, umount2};

use basin_common::error::{BasinError, Result};

/// Mounts a fresh `proc` filesystem at `/proc` with `noexec,nosuid,nodev`.
///
/// # Errors
///
/// Returns an error if the `mount(2)` syscall fails.
pub fn mount_proc() -> Result<()> {
    let flags = MsFlags::MS_NOEXEC | MsFlags::MS_NOSUID | MsFlags::MS_NODEV;
    mount(Some("proc"), "/proc", Some("proc"), flags, None::<&str>)
        .map_err(|e| BasinError::syscall("mount proc on /proc", e))?;
    tracing::debug!("proc mounted");
    Ok(())
}

/// Mounts a `tmpfs` at `/dev` with mode 755.
///
/// # Errors
///
/// Returns an error if the `mount(2)` syscall fails.
pub fn mount_dev_tmpfs() -> Result<()> {
    let flags = MsFlags::MS_NOSUID | MsFlags::MS_STRICTATIME;
    mount(Some("tmpfs"), "/dev", Some("tmpfs"), flags, Some("mode=755"))
        .map_err(|e| BasinError::syscall("mount tmpfs on /dev", e))?;
    tracing::debug!("tmpfs mounted on /dev");
    Ok(())
}

/// Creates a bind mount of `source` on `target`.
///
/// # Errors
///
/// Returns an error if the `mount(2)` syscall fails.
pub fn bind_mount(source: &Path, target: &Path) -> Result<()> {
    mount(
        Some(source),
        target,
        None::<&str>,
        MsFlags::MS_BIND,
        None::<&str>,
    )
    .map_err(|e| {
        BasinError::syscall(
            format!("bind mount {} to {}", source.display(), target.display()),
            e,
        )
    })?;
    tracing::debug!(
        source = %source.display(),
        target = %target.display(),
        "bind mount created"
    );
    Ok(())
}

/// Unmounts `target`, lazily detaching it when `detach` is set.
///
/// # Errors
///
/// Returns an error if the `umount2(2)` syscall fails.
pub fn unmount(target: &Path, detach: bool) -> Result<()> {
    let flags = if detach {
        MntFlags::MNT_DETACH
    } else {
        MntFlags::empty()
    };
    umount2(target, flags)
        .map_err(|e| BasinError::syscall(format!("umount {}", target.display()), e))?;
    tracing::debug!(target = %target.display(), detach, "unmounted");
    Ok(())
}
