//! Scoped entry into another process's network namespace.
//!
//! `setns(2)` only affects the calling thread, and child processes spawned
//! from that thread inherit its namespace. [`NetnsGuard`] switches the
//! current thread, cannot leave it (`!Send`), refuses to nest, and switches
//! back when dropped, whichever way the scope is left.

use std::cell::Cell;
use std::fs::File;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use nix::sched::{CloneFlags, setns};

use basin_common::error::{BasinError, Result};

const THREAD_NETNS: &str = "/proc/thread-self/ns/net";

thread_local! {
    static ACTIVE: Cell<bool> = const { Cell::new(false) };
}

/// Path of the network namespace handle of `pid`.
#[must_use]
pub fn netns_path(pid: u32) -> PathBuf {
    PathBuf::from(format!("/proc/{pid}/ns/net"))
}

/// Returns `true` while a [`NetnsGuard`] is alive on the current thread.
#[must_use]
pub fn is_active() -> bool {
    ACTIVE.with(Cell::get)
}

/// The current thread's stay in a foreign network namespace.
#[derive(Debug)]
pub struct NetnsGuard {
    original: File,
    target: PathBuf,
    _pinned: PhantomData<*const ()>,
}

impl NetnsGuard {
    /// Moves the current thread into the network namespace of `pid`.
    ///
    /// # Errors
    ///
    /// Returns an error if a switch is already active on this thread, or if
    /// either namespace handle cannot be opened or entered.
    pub fn enter(pid: u32) -> Result<Self> {
        Self::enter_path(&netns_path(pid))
    }

    /// Moves the current thread into the network namespace at `path`.
    ///
    /// # Errors
    ///
    /// See [`NetnsGuard::enter`].
    pub fn enter_path(path: &Path) -> Result<Self> {
        if is_active() {
            return Err(BasinError::InvalidState {
                message: "a network namespace switch is already active on this thread".into(),
            });
        }
        let target = File::open(path).map_err(|e| BasinError::io(path, e))?;
        let original = File::open(THREAD_NETNS).map_err(|e| BasinError::io(THREAD_NETNS, e))?;

        setns(&target, CloneFlags::CLONE_NEWNET)
            .map_err(|e| BasinError::syscall(format!("setns {}", path.display()), e))?;
        ACTIVE.with(|active| active.set(true));
        tracing::debug!(netns = %path.display(), "entered network namespace");

        Ok(Self {
            original,
            target: path.to_path_buf(),
            _pinned: PhantomData,
        })
    }
}

impl Drop for NetnsGuard {
    fn drop(&mut self) {
        if let Err(e) = setns(&self.original, CloneFlags::CLONE_NEWNET) {
            tracing::error!(netns = %self.target.display(), error = %e, "restoring network namespace failed");
        } else {
            tracing::debug!(netns = %self.target.display(), "left network namespace");
        }
        ACTIVE.with(|active| active.set(false));
    }
}

/// Runs `f` inside the network namespace of `pid` on the current thread and
/// switches back afterwards, whether `f` succeeded or not.
///
/// # Errors
///
/// Returns the error of entering the namespace or the error of `f`.
pub fn with_netns<T>(pid: u32, f: impl FnOnce() -> Result<T>) -> Result<T> {
    let _guard = NetnsGuard::enter(pid)?;
    f()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn netns_path_uses_proc() {
        assert_eq!(netns_path(1234), PathBuf::from("/proc/1234/ns/net"));
    }

    #[test]
    fn inactive_by_default() {
        assert!(!is_active());
    }

    #[test]
    fn missing_namespace_handle_fails_without_switching() {
        let err = NetnsGuard::enter_path(Path::new("/nonexistent/ns/net")).unwrap_err();
        assert!(matches!(err, BasinError::Io { .. }));
        assert!(!is_active());
    }

    #[test]
    #[ignore = "requires CAP_SYS_ADMIN"]
    fn nested_switch_is_refused_and_state_restored() {
        let pid = std::process::id();
        let result = with_netns(pid, || {
            assert!(is_active());
            with_netns(pid, || Ok(()))
        });
        assert!(matches!(result, Err(BasinError::InvalidState { .. })));
        assert!(!is_active());
    }
}
