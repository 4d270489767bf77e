//! Unified error type for the basin workspace.
//!
//! Every crate returns [`BasinError`]; variants carry the path, operation or
//! program that failed so a single log line is enough to diagnose it.

use std::path::PathBuf;

use thiserror::Error;

/// Top-level error type shared across the workspace.
#[derive(Debug, Error)]
pub enum BasinError {
    /// A filesystem operation failed.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// Path where the I/O error occurred.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// A mount, namespace or process syscall failed.
    #[error("{operation} failed: {source}")]
    Syscall {
        /// Description of the operation, including its target.
        operation: String,
        /// Underlying OS error.
        source: std::io::Error,
    },

    /// An external program (`ip`, `iptables`) failed.
    #[error("{program} failed: {message}")]
    Command {
        /// Program and arguments that were run.
        program: String,
        /// Captured stderr or spawn error.
        message: String,
    },

    /// A configuration or parameter value is invalid.
    #[error("invalid configuration: {message}")]
    Config {
        /// Description of the invalid value.
        message: String,
    },

    /// A required resource was not found.
    #[error("{kind} not found: {id}")]
    NotFound {
        /// Type of the missing resource.
        kind: &'static str,
        /// Identifier of the missing resource.
        id: String,
    },

    /// The operation is not allowed in the resource's current state.
    #[error("{message}")]
    InvalidState {
        /// Description of the refused operation.
        message: String,
    },

    /// Every address of a subnet is already allocated.
    #[error("no free address left in subnet {subnet}")]
    AddressExhausted {
        /// Subnet in CIDR notation.
        subnet: String,
    },

    /// Serialization or deserialization failed.
    #[error("serialization error: {source}")]
    Serialization {
        /// Underlying serialization error.
        #[from]
        source: serde_json::Error,
    },
}

impl BasinError {
    /// Builds an [`BasinError::Io`] for `path`.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Builds a [`BasinError::Syscall`] from anything convertible into an
    /// OS error, such as `nix::errno::Errno`.
    pub fn syscall(operation: impl Into<String>, source: impl Into<std::io::Error>) -> Self {
        Self::Syscall {
            operation: operation.into(),
            source: source.into(),
        }
    }

    /// Builds a [`BasinError::Config`].
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }
}

/// Convenience alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, BasinError>;
