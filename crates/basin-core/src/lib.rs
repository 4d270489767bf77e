//! # basin-core
//!
//! Low-level Linux isolation primitives for the basin runtime.
//!
//! This crate provides safe abstractions over:
//! - **Namespaces**: clone flags for new UTS, PID, mount, network and IPC
//!   namespaces, and a scoped switch into another process's network
//!   namespace.
//! - **Cgroups v1**: cpuset, memory and cpu limits under one named hierarchy.
//! - **Filesystem**: `OverlayFS` mounts, bind mounts and `pivot_root`.
//!
//! All system calls go through `nix` and surface failures as
//! [`basin_common::error::BasinError`] values carrying the operation and path.

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod cgroup;
pub mod filesystem;
pub mod namespace;
