//! Network descriptors and the driver interface.

use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use basin_common::error::{BasinError, Result};

use crate::endpoint::Endpoint;
use crate::subnet::Ipv4Cidr;

/// A named network, persisted as one JSON file named after it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Network {
    /// Network name; also the bridge device name.
    pub name: String,
    /// Gateway address with the subnet prefix, e.g. `172.18.0.1/24`.
    #[serde(rename = "ipRange")]
    pub ip_range: Ipv4Cidr,
    /// Name of the driver that manages the network.
    pub driver: String,
}

impl Network {
    /// Gateway address assigned to the bridge.
    #[must_use]
    pub const fn gateway(&self) -> Ipv4Addr {
        self.ip_range.addr()
    }

    /// The subnet with host bits cleared.
    #[must_use]
    pub fn subnet(&self) -> Ipv4Cidr {
        self.ip_range.network()
    }

    /// Path of the descriptor inside `dir`.
    #[must_use]
    pub fn descriptor_path(&self, dir: &Path) -> PathBuf {
        dir.join(&self.name)
    }

    /// Writes the descriptor to `dir`, creating it if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory or file cannot be written.
    pub fn dump(&self, dir: &Path) -> Result<()> {
        std::fs::create_dir_all(dir).map_err(|e| BasinError::io(dir, e))?;
        let path = self.descriptor_path(dir);
        let json = serde_json::to_string(self)?;
        std::fs::write(&path, json).map_err(|e| BasinError::io(&path, e))
    }

    /// Reads a descriptor file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| BasinError::io(path, e))?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Deletes the descriptor from `dir`; a missing file is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be removed.
    pub fn remove(&self, dir: &Path) -> Result<()> {
        let path = self.descriptor_path(dir);
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(BasinError::io(&path, e)),
        }
    }
}

/// Builds and tears down the host side of a network.
pub trait NetworkDriver: Send + Sync + std::fmt::Debug {
    /// Driver name, as stored in [`Network::driver`].
    fn name(&self) -> &str;

    /// Creates the network `name` with the gateway address `ip_range`.
    ///
    /// # Errors
    ///
    /// Returns an error if any host device or rule cannot be created.
    fn create(&self, ip_range: Ipv4Cidr, name: &str) -> Result<Network>;

    /// Removes the network's host devices.
    ///
    /// # Errors
    ///
    /// Returns an error if the devices cannot be removed.
    fn delete(&self, network: &Network) -> Result<()>;

    /// Creates the endpoint's devices and attaches the host side to the
    /// network.
    ///
    /// # Errors
    ///
    /// Returns an error if a device cannot be created or attached.
    fn connect(&self, network: &Network, endpoint: &Endpoint) -> Result<()>;

    /// Detaches an endpoint from the network.
    ///
    /// # Errors
    ///
    /// Returns an error if the endpoint cannot be detached.
    fn disconnect(&self, network: &Network, endpoint: &Endpoint) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn testnet() -> Network {
        Network {
            name: "testnet".into(),
            ip_range: "172.18.0.1/24".parse().expect("cidr"),
            driver: "bridge".into(),
        }
    }

    #[test]
    fn descriptor_json_uses_ip_range_key() {
        let json = serde_json::to_value(testnet()).expect("serialize");
        assert_eq!(json["name"], "testnet");
        assert_eq!(json["ipRange"], "172.18.0.1/24");
        assert_eq!(json["driver"], "bridge");
    }

    #[test]
    fn dump_load_remove() {
        let dir = tempfile::tempdir().expect("tempdir");
        let net_dir = dir.path().join("network");
        let network = testnet();

        network.dump(&net_dir).expect("dump");
        let loaded = Network::load(&net_dir.join("testnet")).expect("load");
        assert_eq!(loaded, network);
        assert_eq!(loaded.gateway(), Ipv4Addr::new(172, 18, 0, 1));
        assert_eq!(loaded.subnet().to_string(), "172.18.0.0/24");

        network.remove(&net_dir).expect("remove");
        assert!(!net_dir.join("testnet").exists());
        network.remove(&net_dir).expect("second remove is a no-op");
    }
}
