//! The container side of the spawn: `basin init`.
//!
//! Runs as PID 1 of the new namespaces with the container's `merged`
//! directory as working directory. It switches root, mounts `/proc` and
//! `/dev`, waits for the command on fd 3 and replaces itself with it.

use std::fs::File;
use std::io::Read;
use std::os::fd::FromRawFd;
use std::os::unix::process::CommandExt;
use std::path::Path;
use std::process::Command;

use basin_common::constants::COMMAND_PIPE_FD;
use basin_common::error::{BasinError, Result};
use basin_core::filesystem::{mount, pivot_root};

/// Splits a received command line on single spaces. Empty pieces are
/// dropped, so arguments containing spaces cannot be expressed.
#[must_use]
pub fn parse_command(line: &str) -> Vec<String> {
    line.split(' ')
        .filter(|part| !part.is_empty())
        .map(ToString::to_string)
        .collect()
}

/// Reads from `reader` until EOF and parses the command.
///
/// # Errors
///
/// Returns an error if the read fails or the command is empty.
pub fn read_command(mut reader: impl Read) -> Result<Vec<String>> {
    let mut line = String::new();
    let _ = reader
        .read_to_string(&mut line)
        .map_err(|e| BasinError::syscall("read command pipe", e))?;
    let command = parse_command(&line);
    if command.is_empty() {
        return Err(BasinError::InvalidState {
            message: "no command received from the host".into(),
        });
    }
    Ok(command)
}

/// Builds the exec of `program` for `command`. argv\[0\] stays
/// `command[0]` as typed, so multi-call binaries see the name they were
/// invoked by.
fn workload_command(program: &Path, command: &[String]) -> Command {
    let mut workload = Command::new(program);
    let _ = workload.arg0(&command[0]).args(&command[1..]);
    workload
}

/// Sets up the container root and execs the user command. Only returns on
/// failure.
///
/// # Errors
///
/// Returns the first failing step: root switch, mounts, command read,
/// executable lookup or exec.
pub fn run_container_init() -> Result<()> {
    let root = std::env::current_dir().map_err(|e| BasinError::syscall("getcwd", e))?;
    pivot_root::pivot_root(&root)?;
    mount::mount_proc()?;
    mount::mount_dev_tmpfs()?;

    // SAFETY: fd 3 is the read end of the command pipe, placed there by the
    // host before exec and owned by nothing else in this process.
    let pipe = unsafe { File::from_raw_fd(COMMAND_PIPE_FD) };
    let command = read_command(pipe)?;
    tracing::info!(command = ?command, "starting workload");

    let program = which::which(&command[0]).map_err(|_| BasinError::NotFound {
        kind: "executable",
        id: command[0].clone(),
    })?;
    let err = workload_command(&program, &command).exec();
    Err(BasinError::syscall(format!("exec {}", program.display()), err))
}
