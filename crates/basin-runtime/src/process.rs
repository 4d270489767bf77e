//! Two-phase spawn of the container process.
//!
//! Phase one clones a child into fresh UTS, PID, mount, network and IPC
//! namespaces. The child re-executes this binary as `basin init` inside
//! the container's `merged` directory, with the read end of a pipe on fd 3.
//! Phase two is the host writing the user command into the pipe and
//! closing it, which it does only after limits and networking are in
//! place: until then the child is blocked reading fd 3 and nothing of the
//! workload has run.

use std::ffi::CString;
use std::fs::File;
use std::io::Write;
use std::os::fd::{AsFd, AsRawFd, FromRawFd, OwnedFd, RawFd};
use std::os::unix::ffi::OsStrExt;
use std::path::Path;

use nix::errno::Errno;
use nix::fcntl::{FcntlArg, OFlag, fcntl};
use nix::sched::clone;
use nix::sys::wait::{WaitStatus, waitpid};
use nix::unistd::{Pid, pipe2};

use basin_common::constants::{BIN_NAME, COMMAND_PIPE_FD, INIT_SUBCOMMAND};
use basin_common::error::{BasinError, Result};
use basin_core::namespace::NamespaceConfig;

const CHILD_STACK_SIZE: usize = 1024 * 1024;
const EXEC_FAILED: isize = 127;

/// What the child is started with.
#[derive(Debug)]
pub struct SpawnConfig<'a> {
    /// Working directory of the child, the container's future root.
    pub root_dir: &'a Path,
    /// Extra `KEY=VALUE` variables on top of the host environment.
    pub envs: &'a [String],
    /// Destination of stdout and stderr for detached containers; `None`
    /// keeps the host's terminal.
    pub log_file: Option<&'a File>,
    /// Namespaces to create.
    pub namespaces: NamespaceConfig,
}

/// Write end of the command pipe.
///
/// Dropping it without [`CommandChannel::send`] closes the pipe empty,
/// which makes the child abort.
#[derive(Debug)]
pub struct CommandChannel {
    writer: File,
}

impl CommandChannel {
    /// Writes the command as one space-joined line and closes the pipe.
    ///
    /// # Errors
    ///
    /// Returns an error if the pipe cannot be written.
    pub fn send(self, command: &[String]) -> Result<()> {
        let mut writer = self.writer;
        let line = command.join(" ");
        writer
            .write_all(line.as_bytes())
            .map_err(|e| BasinError::syscall("write command pipe", e))?;
        tracing::debug!(command = %line, "command released");
        Ok(())
    }
}

/// A started, still blocked container process.
#[derive(Debug)]
pub struct SpawnedProcess {
    /// Host PID of the child.
    pub pid: Pid,
    /// Channel that releases the workload.
    pub channel: CommandChannel,
}

impl SpawnedProcess {
    /// The PID as stored in container records.
    #[must_use]
    pub fn pid_u32(&self) -> u32 {
        self.pid.as_raw().unsigned_abs()
    }
}

/// Lowest descriptor number the child's inherited fds are moved to, so
/// that installing them on 0-3 never overwrites one still to be installed.
const CHILD_FD_FLOOR: RawFd = COMMAND_PIPE_FD + 1;

/// Descriptors the child installs on stdin, stdout/stderr and
/// [`COMMAND_PIPE_FD`]. All of them sit at or above [`CHILD_FD_FLOOR`] and
/// are close-on-exec; only the installed copies survive `execve`.
#[derive(Debug)]
struct ChildFds {
    command: OwnedFd,
    stdio: Option<OwnedFd>,
    null: Option<OwnedFd>,
}

fn lift_fd(fd: impl AsFd, what: &str) -> Result<OwnedFd> {
    let raw = fcntl(fd, FcntlArg::F_DUPFD_CLOEXEC(CHILD_FD_FLOOR))
        .map_err(|e| BasinError::syscall(format!("duplicate {what} descriptor"), e))?;
    // SAFETY: fcntl just returned this descriptor and nothing else owns it.
    Ok(unsafe { OwnedFd::from_raw_fd(raw) })
}

impl ChildFds {
    fn new(command: impl AsFd, stdio: Option<&File>, null: Option<&File>) -> Result<Self> {
        Ok(Self {
            command: lift_fd(command, "command pipe")?,
            stdio: stdio.map(|f| lift_fd(f, "log file")).transpose()?,
            null: null.map(|f| lift_fd(f, "/dev/null")).transpose()?,
        })
    }

    /// Installs the descriptors in the calling process. Only raw system
    /// calls, so it is safe between `clone`/`fork` and `execve`.
    fn install(&self) -> bool {
        // SAFETY: dup2 on descriptors owned by self. Every source is above
        // every target, so no target replaces a source.
        unsafe {
            if let Some(fd) = &self.null {
                if libc::dup2(fd.as_raw_fd(), libc::STDIN_FILENO) < 0 {
                    return false;
                }
            }
            if let Some(fd) = &self.stdio {
                if libc::dup2(fd.as_raw_fd(), libc::STDOUT_FILENO) < 0
                    || libc::dup2(fd.as_raw_fd(), libc::STDERR_FILENO) < 0
                {
                    return false;
                }
            }
            libc::dup2(self.command.as_raw_fd(), COMMAND_PIPE_FD) >= 0
        }
    }
}

/// Everything the child needs, allocated before `clone(2)` so the child
/// only makes raw system calls.
struct ChildSetup {
    exe: CString,
    dir: CString,
    argv: Vec<CString>,
    envp: Vec<CString>,
    fds: ChildFds,
}

fn cstring(bytes: &[u8], what: &str) -> Result<CString> {
    CString::new(bytes).map_err(|_| BasinError::config(format!("{what} contains a NUL byte")))
}

fn environment(extra: &[String]) -> Result<Vec<CString>> {
    let mut envp = Vec::new();
    for (key, value) in std::env::vars_os() {
        let mut pair = key.as_bytes().to_vec();
        pair.push(b'=');
        pair.extend_from_slice(value.as_bytes());
        envp.push(cstring(&pair, "environment variable")?);
    }
    for var in extra {
        envp.push(cstring(var.as_bytes(), "environment variable")?);
    }
    Ok(envp)
}

fn null_terminated(strings: &[CString]) -> Vec<*const libc::c_char> {
    strings
        .iter()
        .map(|s| s.as_ptr())
        .chain(std::iter::once(std::ptr::null()))
        .collect()
}

/// Runs in the cloned child. Only async-signal-safe calls from here on.
fn child_main(setup: &ChildSetup, argv: &[*const libc::c_char], envp: &[*const libc::c_char]) -> isize {
    if !setup.fds.install() {
        return EXEC_FAILED;
    }
    // SAFETY: every pointer refers to memory prepared before clone(2) and
    // copied into this process.
    unsafe {
        if libc::chdir(setup.dir.as_ptr()) < 0 {
            return EXEC_FAILED;
        }
        let _ = libc::execve(setup.exe.as_ptr(), argv.as_ptr(), envp.as_ptr());
    }
    EXEC_FAILED
}

/// Clones the container process and leaves it waiting for its command.
///
/// # Errors
///
/// Returns an error if the binary path, the pipe or `clone(2)` fails.
pub fn spawn(config: &SpawnConfig<'_>) -> Result<SpawnedProcess> {
    let exe = std::env::current_exe().map_err(|e| BasinError::syscall("resolve current executable", e))?;
    let (read_end, write_end): (OwnedFd, OwnedFd) =
        pipe2(OFlag::O_CLOEXEC).map_err(|e| BasinError::syscall("pipe2", e))?;
    let dev_null = match config.log_file {
        Some(_) => Some(File::open("/dev/null").map_err(|e| BasinError::io("/dev/null", e))?),
        None => None,
    };

    let setup = ChildSetup {
        exe: cstring(exe.as_os_str().as_bytes(), "executable path")?,
        dir: cstring(config.root_dir.as_os_str().as_bytes(), "container root")?,
        argv: vec![
            cstring(BIN_NAME.as_bytes(), "argv")?,
            cstring(INIT_SUBCOMMAND.as_bytes(), "argv")?,
        ],
        envp: environment(config.envs)?,
        fds: ChildFds::new(&read_end, config.log_file, dev_null.as_ref())?,
    };
    let argv = null_terminated(&setup.argv);
    let envp = null_terminated(&setup.envp);

    let mut stack = vec![0u8; CHILD_STACK_SIZE];
    let flags = config.namespaces.clone_flags();
    // SAFETY: without CLONE_VM the child runs on a copy of this address
    // space and only makes raw system calls before execve.
    let pid = unsafe {
        clone(
            Box::new(|| child_main(&setup, &argv, &envp)),
            &mut stack,
            flags,
            Some(libc::SIGCHLD),
        )
    }
    .map_err(|e| BasinError::syscall(format!("clone {flags:?}"), e))?;

    drop(setup);
    drop(read_end);
    tracing::info!(pid = pid.as_raw(), root = %config.root_dir.display(), "container process cloned");

    Ok(SpawnedProcess {
        pid,
        channel: CommandChannel {
            writer: File::from(write_end),
        },
    })
}

/// Waits for `pid` to terminate and returns its exit code (128 + signal
/// number for a signalled process).
///
/// # Errors
///
/// Returns an error if `waitpid(2)` fails.
pub fn wait(pid: Pid) -> Result<i32> {
    loop {
        match waitpid(pid, None) {
            Ok(WaitStatus::Exited(_, code)) => return Ok(code),
            Ok(WaitStatus::Signaled(_, signal, _)) => return Ok(128 + signal as i32),
            Ok(_) | Err(Errno::EINTR) => {}
            Err(e) => return Err(BasinError::syscall(format!("waitpid {pid}"), e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Read;

    use super::*;

    #[test]
    fn extra_variables_follow_the_host_environment() {
        let envp = environment(&["BASIN_TEST=1".to_string()]).expect("env");
        assert_eq!(envp.last().map(|c| c.to_bytes()), Some(&b"BASIN_TEST=1"[..]));
    }

    #[test]
    fn nul_bytes_are_rejected() {
        assert!(environment(&["BAD\0VAR=1".to_string()]).is_err());
    }

    #[test]
    fn pointer_arrays_are_null_terminated() {
        let strings = vec![CString::new("basin").expect("cstring")];
        let ptrs = null_terminated(&strings);
        assert_eq!(ptrs.len(), 2);
        assert!(ptrs[1].is_null());
    }

    #[test]
    fn command_is_sent_space_joined_and_closed() {
        let (read_end, write_end) = pipe2(OFlag::O_CLOEXEC).expect("pipe");
        let channel = CommandChannel {
            writer: File::from(write_end),
        };
        channel
            .send(&["sh".to_string(), "-c".to_string(), "true".to_string()])
            .expect("send");

        let mut received = String::new();
        let _ = File::from(read_end)
            .read_to_string(&mut received)
            .expect("read until EOF");
        assert_eq!(received, "sh -c true");
    }

    #[test]
    fn dropped_channel_closes_empty() {
        let (read_end, write_end) = pipe2(OFlag::O_CLOEXEC).expect("pipe");
        drop(CommandChannel {
            writer: File::from(write_end),
        });
        let mut received = String::new();
        let _ = File::from(read_end).read_to_string(&mut received).expect("read");
        assert!(received.is_empty());
    }

    #[test]
    fn child_fds_send_output_to_log_and_command_to_fd3() {
        use std::os::unix::process::CommandExt;

        let dir = tempfile::tempdir().expect("tempdir");
        let log_path = dir.path().join("container.log");
        let log = File::create(&log_path).expect("log");
        let (read_end, write_end) = pipe2(OFlag::O_CLOEXEC).expect("pipe");
        let fds = ChildFds::new(&read_end, Some(&log), None).expect("fds");
        assert!(fds.command.as_raw_fd() >= CHILD_FD_FLOOR);
        assert!(fds.stdio.as_ref().is_some_and(|fd| fd.as_raw_fd() >= CHILD_FD_FLOOR));

        let mut command = std::process::Command::new("sh");
        let _ = command.args(["-c", "echo out; echo err >&2; cat <&3"]);
        // SAFETY: install only calls dup2.
        unsafe {
            let _ = command.pre_exec(move || {
                if fds.install() {
                    Ok(())
                } else {
                    Err(std::io::Error::last_os_error())
                }
            });
        }
        let mut child = command.spawn().expect("spawn");
        drop(read_end);
        CommandChannel {
            writer: File::from(write_end),
        }
        .send(&["sleep".to_string(), "30".to_string()])
        .expect("send");

        assert!(child.wait().expect("wait").success());
        assert_eq!(
            std::fs::read_to_string(&log_path).expect("read"),
            "out\nerr\nsleep 30"
        );
    }

    #[test]
    fn wait_reports_exit_code() {
        let child = std::process::Command::new("sh")
            .args(["-c", "exit 3"])
            .spawn()
            .expect("spawn");
        let pid = Pid::from_raw(i32::try_from(child.id()).expect("pid"));
        assert_eq!(wait(pid).expect("wait"), 3);
    }
}
