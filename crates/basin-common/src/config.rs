//! Global configuration model for the basin runtime.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::constants;
use crate::error::{BasinError, Result};

/// Every on-disk location and name the runtime uses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BasinConfig {
    /// Directory holding image archives.
    pub image_dir: PathBuf,
    /// Directory under which `<name>/{lower,upper,work,merged}` are created.
    pub workspace_root: PathBuf,
    /// Directory holding `<name>/config.json` and `<name>/container.log`.
    pub run_root: PathBuf,
    /// Directory holding one descriptor file per network.
    pub network_dir: PathBuf,
    /// Persisted address allocation table.
    pub ipam_file: PathBuf,
    /// Hierarchy name created under every cgroup controller mount.
    pub cgroup_name: String,
}

impl Default for BasinConfig {
    fn default() -> Self {
        Self {
            image_dir: PathBuf::from(constants::DEFAULT_IMAGE_DIR),
            workspace_root: PathBuf::from(constants::DEFAULT_WORKSPACE_ROOT),
            run_root: PathBuf::from(constants::DEFAULT_RUN_ROOT),
            network_dir: PathBuf::from(constants::DEFAULT_NETWORK_DIR),
            ipam_file: PathBuf::from(constants::DEFAULT_IPAM_FILE),
            cgroup_name: constants::DEFAULT_CGROUP_NAME.to_string(),
        }
    }
}

impl BasinConfig {
    /// Places all state below a single directory, keeping the default
    /// layout underneath it.
    #[must_use]
    pub fn with_root(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref();
        let run_root = root.join("run");
        let network_state = run_root.join(constants::NETWORK_STATE_DIR);
        Self {
            image_dir: root.join("images"),
            workspace_root: root.join("containers"),
            network_dir: network_state.join("network"),
            ipam_file: network_state.join("ipam").join("subnet.json"),
            run_root,
            cgroup_name: constants::DEFAULT_CGROUP_NAME.to_string(),
        }
    }

    /// Reads a JSON configuration file. Missing keys take their defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| BasinError::io(path, e))?;
        let config = serde_json::from_str(&content)?;
        tracing::debug!(path = %path.display(), "configuration loaded");
        Ok(config)
    }

    /// Directory holding one container's record and log.
    #[must_use]
    pub fn container_dir(&self, name: &str) -> PathBuf {
        self.run_root.join(name)
    }

    /// Path of one container's `config.json`.
    #[must_use]
    pub fn record_path(&self, name: &str) -> PathBuf {
        self.container_dir(name).join(constants::CONFIG_FILE_NAME)
    }

    /// Path of one container's `container.log`.
    #[must_use]
    pub fn log_path(&self, name: &str) -> PathBuf {
        self.container_dir(name).join(constants::LOG_FILE_NAME)
    }
}
