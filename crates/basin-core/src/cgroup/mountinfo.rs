//! Discovery of cgroup controller mount points.

use std::path::{Path, PathBuf};

use basin_common::constants::{MOUNTINFO_MOUNT_POINT_INDEX, MOUNTINFO_PATH};

/// Maps a controller name to the directory it is mounted on.
pub trait MountpointResolver: Send + Sync + std::fmt::Debug {
    /// Returns the mount point of `subsystem`, or `None` if it is not
    /// mounted.
    fn mountpoint(&self, subsystem: &str) -> Option<PathBuf>;
}

/// Resolves mount points by scanning a `mountinfo` table, by default the
/// calling process's `/proc/self/mountinfo`.
#[derive(Debug, Clone)]
pub struct ProcMountinfo {
    path: PathBuf,
}

impl ProcMountinfo {
    /// Scans the mount table at `path` instead of the running one.
    #[must_use]
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl Default for ProcMountinfo {
    fn default() -> Self {
        Self::at(MOUNTINFO_PATH)
    }
}

impl MountpointResolver for ProcMountinfo {
    fn mountpoint(&self, subsystem: &str) -> Option<PathBuf> {
        match std::fs::read_to_string(&self.path) {
            Ok(content) => find_mountpoint(&content, subsystem),
            Err(e) => {
                tracing::error!(path = %self.path.display(), error = %e, "read mountinfo failed");
                None
            }
        }
    }
}

/// Resolves every controller to `<root>/<controller>`.
#[derive(Debug, Clone)]
pub struct StaticMountpoints {
    root: PathBuf,
}

impl StaticMountpoints {
    /// Creates a resolver rooted at `root`.
    #[must_use]
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }
}

impl MountpointResolver for StaticMountpoints {
    fn mountpoint(&self, subsystem: &str) -> Option<PathBuf> {
        Some(self.root.join(subsystem))
    }
}

/// Finds the first line whose super options (the last field) list
/// `subsystem` and returns its mount point field.
#[must_use]
pub fn find_mountpoint(mountinfo: &str, subsystem: &str) -> Option<PathBuf> {
    mountinfo.lines().find_map(|line| {
        let fields: Vec<&str> = line.split(' ').collect();
        let options = fields.last()?;
        options
            .split(',')
            .any(|option| option == subsystem)
            .then(|| fields.get(MOUNTINFO_MOUNT_POINT_INDEX).map(PathBuf::from))
            .flatten()
    })
}
