//! Container lifecycle management for the basin runtime.
//!
//! - [`workspace`]: overlay root filesystems built from image archives.
//! - [`process`] and [`init`]: the two halves of the namespaced spawn.
//! - [`state`] and [`logs`]: per-container records and log files.
//! - [`engine`]: the orchestrator behind every CLI command.

#![allow(unsafe_code)]
#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod engine;
pub mod init;
pub mod logs;
pub mod process;
pub mod state;
pub mod workspace;
