//! The set of known networks and their drivers.
//!
//! A registry is built once per invocation from the descriptor files in the
//! network directory and owned by the caller; there is no global state.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use basin_common::error::{BasinError, Result};
use basin_common::types::ContainerRecord;

use crate::bridge::BridgeDriver;
use crate::command::CommandRunner;
use crate::driver::{Network, NetworkDriver};
use crate::endpoint::Endpoint;
use crate::ipam::Ipam;
use crate::iptables;
use crate::subnet::Ipv4Cidr;

/// Known networks, the drivers that manage them and the allocator for
/// their addresses.
#[derive(Debug)]
pub struct NetworkRegistry {
    dir: PathBuf,
    ipam: Ipam,
    runner: Arc<dyn CommandRunner>,
    drivers: BTreeMap<String, Arc<dyn NetworkDriver>>,
    networks: BTreeMap<String, Network>,
}

impl NetworkRegistry {
    /// Loads every descriptor in `dir` (created if missing) and registers
    /// the bridge driver. Unreadable descriptors are logged and skipped.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created or listed.
    pub fn load(dir: impl Into<PathBuf>, ipam: Ipam, runner: Arc<dyn CommandRunner>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(|e| BasinError::io(&dir, e))?;

        let mut networks = BTreeMap::new();
        for entry in std::fs::read_dir(&dir).map_err(|e| BasinError::io(&dir, e))? {
            let path = entry.map_err(|e| BasinError::io(&dir, e))?.path();
            if !path.is_file() {
                continue;
            }
            match Network::load(&path) {
                Ok(network) => {
                    let _ = networks.insert(network.name.clone(), network);
                }
                Err(e) => tracing::warn!(path = %path.display(), error = %e, "skipping network descriptor"),
            }
        }
        tracing::debug!(count = networks.len(), dir = %dir.display(), "networks loaded");

        let mut registry = Self {
            dir,
            ipam,
            runner: Arc::clone(&runner),
            drivers: BTreeMap::new(),
            networks,
        };
        registry.register_driver(Arc::new(BridgeDriver::new(runner)));
        Ok(registry)
    }

    /// Adds or replaces a driver under its own name.
    pub fn register_driver(&mut self, driver: Arc<dyn NetworkDriver>) {
        let _ = self.drivers.insert(driver.name().to_string(), driver);
    }

    /// Directory holding the descriptors.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// The address allocator.
    #[must_use]
    pub const fn ipam(&self) -> &Ipam {
        &self.ipam
    }

    /// Looks up a network by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Network> {
        self.networks.get(name)
    }

    /// All networks, ordered by name.
    pub fn list(&self) -> impl Iterator<Item = &Network> {
        self.networks.values()
    }

    fn driver(&self, name: &str) -> Result<&Arc<dyn NetworkDriver>> {
        self.drivers.get(name).ok_or_else(|| BasinError::NotFound {
            kind: "network driver",
            id: name.to_string(),
        })
    }

    fn network(&self, name: &str) -> Result<&Network> {
        self.get(name).ok_or_else(|| BasinError::NotFound {
            kind: "network",
            id: name.to_string(),
        })
    }

    /// Creates the network `name` over `subnet` with `driver`: allocates
    /// the gateway, builds the devices, persists the descriptor.
    ///
    /// # Errors
    ///
    /// Returns an error for an unknown driver, a duplicate or invalid name,
    /// an invalid subnet, or any failing step. Steps already done are not
    /// undone.
    pub fn create_network(&mut self, driver: &str, subnet: &str, name: &str) -> Result<&Network> {
        if name.is_empty() || name.contains('/') {
            return Err(BasinError::config(format!("invalid network name '{name}'")));
        }
        if self.networks.contains_key(name) {
            return Err(BasinError::InvalidState {
                message: format!("network {name} already exists"),
            });
        }
        let driver = Arc::clone(self.driver(driver)?);
        let subnet: Ipv4Cidr = subnet.parse()?;

        let gateway = self.ipam.allocate(&subnet)?;
        let network = driver.create(subnet.network().with_addr(gateway), name)?;
        network.dump(&self.dir)?;
        tracing::info!(network = name, ip_range = %network.ip_range, "network created");

        Ok(self.networks.entry(name.to_string()).or_insert(network))
    }

    /// Deletes the network `name`: releases the gateway, removes the
    /// devices and the descriptor.
    ///
    /// # Errors
    ///
    /// Returns an error if the network is unknown or a step fails.
    pub fn delete_network(&mut self, name: &str) -> Result<()> {
        let network = self.network(name)?.clone();
        self.ipam.release(&network.ip_range, network.gateway())?;
        self.driver(&network.driver)?.delete(&network)?;
        network.remove(&self.dir)?;
        let _ = self.networks.remove(name);
        tracing::info!(network = name, "network deleted");
        Ok(())
    }

    /// Connects the running container to the network `name`: allocates an
    /// address, creates the veth pair, configures the container side inside
    /// its network namespace and publishes its ports.
    ///
    /// # Errors
    ///
    /// Returns an error if the network is unknown, the container has no
    /// pid, or any step fails. Port mapping entries never fail the call.
    pub fn connect(&self, name: &str, container: &ContainerRecord) -> Result<Endpoint> {
        let network = self.network(name)?;
        let pid = container.pid.ok_or_else(|| BasinError::InvalidState {
            message: format!("container {} has no running process", container.name),
        })?;
        let driver = self.driver(&network.driver)?;

        let ip = self.ipam.allocate(&network.ip_range)?;
        let endpoint = Endpoint::new(&container.id, network, ip, container.port_mapping.clone());

        driver.connect(network, &endpoint)?;
        endpoint.configure(self.runner.as_ref(), network, pid)?;
        let published = iptables::publish_ports(self.runner.as_ref(), ip, &endpoint.port_mapping);
        tracing::info!(
            container = %container.name,
            network = name,
            ip = %ip,
            published,
            "container connected"
        );
        Ok(endpoint)
    }
}

#[cfg(test)]
mod tests {
    use std::net::Ipv4Addr;

    use super::*;
    use crate::command::testing::RecordingRunner;
    use basin_common::types::{ContainerId, ContainerRecord};

    struct Fixture {
        _dir: tempfile::TempDir,
        net_dir: PathBuf,
        ipam_file: PathBuf,
        runner: Arc<RecordingRunner>,
    }

    impl Fixture {
        fn new() -> Self {
            let dir = tempfile::tempdir().expect("tempdir");
            Self {
                net_dir: dir.path().join("network"),
                ipam_file: dir.path().join("ipam").join("subnet.json"),
                _dir: dir,
                runner: Arc::new(RecordingRunner::failing_times("ip link show", 1)),
            }
        }

        fn registry(&self) -> NetworkRegistry {
            NetworkRegistry::load(
                &self.net_dir,
                Ipam::new(&self.ipam_file),
                Arc::clone(&self.runner) as Arc<dyn CommandRunner>,
            )
            .expect("load registry")
        }
    }

    #[test]
    fn create_network_allocates_gateway_and_persists() {
        let fx = Fixture::new();
        let mut registry = fx.registry();

        let network = registry
            .create_network("bridge", "172.18.0.0/24", "testnet")
            .expect("create")
            .clone();
        assert_eq!(network.ip_range.to_string(), "172.18.0.1/24");
        assert!(fx.net_dir.join("testnet").is_file());

        let reloaded = fx.registry();
        assert_eq!(reloaded.get("testnet"), Some(&network));
        assert_eq!(reloaded.list().count(), 1);
    }

    #[test]
    fn delete_network_releases_gateway_and_descriptor() {
        let fx = Fixture::new();
        let mut registry = fx.registry();
        let _ = registry
            .create_network("bridge", "172.18.0.0/24", "testnet")
            .expect("create");

        registry.delete_network("testnet").expect("delete");
        assert!(registry.get("testnet").is_none());
        assert!(!fx.net_dir.join("testnet").exists());
        assert!(fx.runner.calls().contains(&"ip link del testnet".to_string()));

        let ip = Ipam::new(&fx.ipam_file)
            .allocate(&"172.18.0.0/24".parse().expect("cidr"))
            .expect("allocate");
        assert_eq!(ip, Ipv4Addr::new(172, 18, 0, 1));
    }

    #[test]
    fn duplicate_and_unknown_inputs_are_refused() {
        let fx = Fixture::new();
        let mut registry = fx.registry();
        let _ = registry
            .create_network("bridge", "172.18.0.0/24", "testnet")
            .expect("create");

        assert!(matches!(
            registry.create_network("bridge", "172.19.0.0/24", "testnet"),
            Err(BasinError::InvalidState { .. })
        ));
        assert!(matches!(
            registry.create_network("macvlan", "172.19.0.0/24", "other"),
            Err(BasinError::NotFound { .. })
        ));
        assert!(matches!(
            registry.create_network("bridge", "not-a-cidr", "other"),
            Err(BasinError::Config { .. })
        ));
        assert!(matches!(
            registry.delete_network("missing"),
            Err(BasinError::NotFound { .. })
        ));
    }

    #[test]
    fn corrupt_descriptors_are_skipped() {
        let fx = Fixture::new();
        std::fs::create_dir_all(&fx.net_dir).expect("mkdir");
        std::fs::write(fx.net_dir.join("broken"), "{not json").expect("write");
        assert_eq!(fx.registry().list().count(), 0);
    }

    #[test]
    fn connect_requires_a_known_network_and_a_pid() {
        let fx = Fixture::new();
        let mut registry = fx.registry();
        let _ = registry
            .create_network("bridge", "172.18.0.0/24", "testnet")
            .expect("create");

        let mut record = ContainerRecord::running(4242, ContainerId::new("0123456789"), "web", &[]);
        assert!(matches!(
            registry.connect("missing", &record),
            Err(BasinError::NotFound { .. })
        ));

        record.mark_stopped();
        assert!(matches!(
            registry.connect("testnet", &record),
            Err(BasinError::InvalidState { .. })
        ));
    }
}
