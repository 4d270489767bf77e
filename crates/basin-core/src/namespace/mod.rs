//! Linux namespace management for container isolation.
//!
//! The sandboxed process is created with `clone(2)` and the flags produced
//! by [`NamespaceConfig::clone_flags`]; [`network`] provides the scoped
//! switch the host uses to configure a container's network stack.

pub mod network;

use nix::sched::CloneFlags;

/// Which namespaces a new container process gets.
#[allow(clippy::struct_excessive_bools)]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamespaceConfig {
    /// Isolate hostname and domain name.
    pub uts: bool,
    /// Isolate the PID tree; the container's init becomes PID 1.
    pub pid: bool,
    /// Isolate the mount table.
    pub mount: bool,
    /// Isolate the network stack.
    pub network: bool,
    /// Isolate System V IPC and POSIX message queues.
    pub ipc: bool,
}

impl Default for NamespaceConfig {
    fn default() -> Self {
        Self {
            uts: true,
            pid: true,
            mount: true,
            network: true,
            ipc: true,
        }
    }
}

impl NamespaceConfig {
    /// Returns the `clone(2)` flags creating the configured namespaces.
    #[must_use]
    pub fn clone_flags(&self) -> CloneFlags {
        let mut flags = CloneFlags::empty();
        flags.set(CloneFlags::CLONE_NEWUTS, self.uts);
        flags.set(CloneFlags::CLONE_NEWPID, self.pid);
        flags.set(CloneFlags::CLONE_NEWNS, self.mount);
        flags.set(CloneFlags::CLONE_NEWNET, self.network);
        flags.set(CloneFlags::CLONE_NEWIPC, self.ipc);
        flags
    }
}
