//! Filesystem management for container isolation.
//!
//! Provides `OverlayFS` mounts, `pivot_root` for switching the root
//! filesystem, and the smaller mount helpers used by the init process and
//! volume handling.

pub mod mount;
pub mod overlayfs;
pub mod pivot_root;
