//! Per-container root filesystems.
//!
//! Every container name owns `<workspace_root>/<name>/` with four layers:
//! `lower` (the unpacked image), `upper` (writes), `work` (overlay
//! bookkeeping) and `merged` (the union, which becomes the container's
//! root). An optional `hostPath:containerPath` volume is bind-mounted into
//! `merged`.

use std::os::unix::fs::DirBuilderExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use basin_common::constants::{PERM_0755, PERM_0777};
use basin_common::error::{BasinError, Result};
use basin_core::filesystem::{mount, overlayfs};
use basin_core::filesystem::overlayfs::OverlayConfig;
use basin_image::layer;
use basin_image::store::ImageStore;

/// The mount operations a workspace needs.
pub trait Mounter: Send + Sync + std::fmt::Debug {
    /// Mounts the overlay described by `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if the mount fails.
    fn mount_overlay(&self, config: &OverlayConfig) -> Result<()>;

    /// Bind-mounts `source` onto `target`.
    ///
    /// # Errors
    ///
    /// Returns an error if the mount fails.
    fn bind(&self, source: &Path, target: &Path) -> Result<()>;

    /// Unmounts `target`.
    ///
    /// # Errors
    ///
    /// Returns an error if the unmount fails.
    fn unmount(&self, target: &Path) -> Result<()>;

    /// Detaches the overlay union mounted at `merged`.
    ///
    /// # Errors
    ///
    /// Returns an error if the unmount fails.
    fn unmount_overlay(&self, merged: &Path) -> Result<()>;
}

/// Mounts through the kernel.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemMounter;

impl Mounter for SystemMounter {
    fn mount_overlay(&self, config: &OverlayConfig) -> Result<()> {
        overlayfs::mount_overlay(config)
    }

    fn bind(&self, source: &Path, target: &Path) -> Result<()> {
        mount::bind_mount(source, target)
    }

    fn unmount(&self, target: &Path) -> Result<()> {
        mount::unmount(target, true)
    }

    fn unmount_overlay(&self, merged: &Path) -> Result<()> {
        overlayfs::unmount_overlay(merged)
    }
}

/// A `hostPath:containerPath` volume.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumeSpec {
    /// Directory on the host.
    pub host: PathBuf,
    /// Directory inside the container, absolute.
    pub container: PathBuf,
}

impl VolumeSpec {
    /// Parses a volume spec. Returns `None` for an empty spec.
    ///
    /// # Errors
    ///
    /// Returns [`BasinError::Config`] unless the spec is exactly two
    /// non-empty paths separated by `:`.
    pub fn parse(spec: &str) -> Result<Option<Self>> {
        if spec.is_empty() {
            return Ok(None);
        }
        let parts: Vec<&str> = spec.split(':').collect();
        match parts.as_slice() {
            [host, container] if !host.is_empty() && !container.is_empty() => Ok(Some(Self {
                host: PathBuf::from(host),
                container: PathBuf::from(container),
            })),
            _ => Err(BasinError::config(format!("invalid volume '{spec}'"))),
        }
    }

    /// Where the container path lands below `merged`.
    #[must_use]
    pub fn target_in(&self, merged: &Path) -> PathBuf {
        merged.join(self.container.strip_prefix("/").unwrap_or(&self.container))
    }
}

/// Paths of one container's layers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkspaceLayers {
    /// `<workspace_root>/<name>`.
    pub root: PathBuf,
    /// Unpacked image, read-only in the union.
    pub lower: PathBuf,
    /// Writable layer.
    pub upper: PathBuf,
    /// Overlay work directory.
    pub work: PathBuf,
    /// Union mount point and container root.
    pub merged: PathBuf,
}

impl WorkspaceLayers {
    /// Layout for `name` under `workspace_root`.
    #[must_use]
    pub fn new(workspace_root: &Path, name: &str) -> Self {
        let root = workspace_root.join(name);
        Self {
            lower: root.join("lower"),
            upper: root.join("upper"),
            work: root.join("work"),
            merged: root.join("merged"),
            root,
        }
    }

    /// Overlay configuration joining the layers.
    #[must_use]
    pub fn overlay(&self) -> OverlayConfig {
        OverlayConfig {
            lower_dirs: vec![self.lower.clone()],
            upper_dir: self.upper.clone(),
            work_dir: self.work.clone(),
            merged_dir: self.merged.clone(),
        }
    }
}

fn create_dir(path: &Path, mode: u32) -> Result<()> {
    std::fs::DirBuilder::new()
        .recursive(true)
        .mode(mode)
        .create(path)
        .map_err(|e| BasinError::io(path, e))
}

fn remove_dir(path: &Path) -> Result<()> {
    match std::fs::remove_dir_all(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(BasinError::io(path, e)),
    }
}

/// Builds and tears down container workspaces.
#[derive(Debug, Clone)]
pub struct WorkspaceManager {
    root: PathBuf,
    images: ImageStore,
    mounter: Arc<dyn Mounter>,
}

impl WorkspaceManager {
    /// Creates a manager placing workspaces under `root` and reading images
    /// from `images`.
    pub fn new(root: impl Into<PathBuf>, images: ImageStore, mounter: Arc<dyn Mounter>) -> Self {
        Self {
            root: root.into(),
            images,
            mounter,
        }
    }

    /// Layout of the workspace of `name`.
    #[must_use]
    pub fn layers(&self, name: &str) -> WorkspaceLayers {
        WorkspaceLayers::new(&self.root, name)
    }

    /// Unpacks `image` into `lower` (unless already there), creates `upper`
    /// and `work`, mounts the union on `merged` and binds the volume.
    /// A malformed volume is logged and skipped.
    ///
    /// # Errors
    ///
    /// Returns the first failing step; earlier steps are not undone.
    pub fn create(&self, name: &str, image: &str, volume: &str) -> Result<WorkspaceLayers> {
        let layers = self.layers(name);

        if layers.lower.exists() {
            tracing::debug!(lower = %layers.lower.display(), "image already unpacked");
        } else {
            let archive = self.images.resolve(image)?;
            create_dir(&layers.lower, PERM_0755)?;
            let _layer = layer::extract_layer(&archive, &layers.lower)?;
        }

        create_dir(&layers.upper, PERM_0777)?;
        create_dir(&layers.work, PERM_0777)?;
        create_dir(&layers.merged, PERM_0777)?;
        self.mounter.mount_overlay(&layers.overlay())?;

        match VolumeSpec::parse(volume) {
            Ok(Some(spec)) => self.mount_volume(&layers, &spec)?,
            Ok(None) => {}
            Err(e) => tracing::warn!(volume, error = %e, "volume not mounted"),
        }

        tracing::info!(name, image, root = %layers.root.display(), "workspace created");
        Ok(layers)
    }

    fn mount_volume(&self, layers: &WorkspaceLayers, spec: &VolumeSpec) -> Result<()> {
        let target = spec.target_in(&layers.merged);
        create_dir(&spec.host, PERM_0777)?;
        create_dir(&target, PERM_0777)?;
        self.mounter.bind(&spec.host, &target)?;
        tracing::info!(host = %spec.host.display(), target = %target.display(), "volume mounted");
        Ok(())
    }

    /// Unmounts the volume, removes `lower`, `upper` and `work`, unmounts
    /// and removes `merged`, then removes the workspace root.
    ///
    /// # Errors
    ///
    /// Returns the first failing step; later steps are skipped.
    pub fn destroy(&self, name: &str, volume: &str) -> Result<()> {
        let layers = self.layers(name);

        if let Ok(Some(spec)) = VolumeSpec::parse(volume) {
            self.mounter.unmount(&spec.target_in(&layers.merged))?;
        }

        remove_dir(&layers.lower)?;
        remove_dir(&layers.upper)?;
        remove_dir(&layers.work)?;

        if layers.merged.exists() {
            self.mounter.unmount_overlay(&layers.merged)?;
        }
        remove_dir(&layers.merged)?;
        remove_dir(&layers.root)?;

        tracing::info!(name, "workspace destroyed");
        Ok(())
    }
}
