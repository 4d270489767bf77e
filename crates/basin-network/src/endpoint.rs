//! A container's attachment to a network.
//!
//! The host end of the veth pair stays on the bridge; the peer end is
//! moved into the container's network namespace and configured from
//! inside it.

use std::net::Ipv4Addr;

use basin_common::constants::{VETH_NAME_PREFIX_LEN, VETH_PEER_PREFIX};
use basin_common::error::Result;
use basin_common::types::ContainerId;
use basin_core::namespace::network::with_netns;

use crate::command::CommandRunner;
use crate::driver::Network;
use crate::link;

/// Names of the two ends of a veth pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VethPair {
    /// End attached to the bridge.
    pub host: String,
    /// End moved into the container.
    pub peer: String,
}

impl VethPair {
    /// Derives both names from an endpoint ID.
    #[must_use]
    pub fn for_endpoint(endpoint_id: &str) -> Self {
        let host: String = endpoint_id.chars().take(VETH_NAME_PREFIX_LEN).collect();
        let peer = format!("{VETH_PEER_PREFIX}{host}");
        Self { host, peer }
    }
}

/// One (container, network) connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    /// `<container id>-<network name>`.
    pub id: String,
    /// The veth pair carrying the traffic.
    pub device: VethPair,
    /// Address of the container on the network.
    pub ip: Ipv4Addr,
    /// MAC address of the container-side end.
    pub mac: String,
    /// Name of the network.
    pub network: String,
    /// Published ports, `hostPort:containerPort`.
    pub port_mapping: Vec<String>,
}

impl Endpoint {
    /// Describes the endpoint of `container` on `network` with address `ip`.
    #[must_use]
    pub fn new(container: &ContainerId, network: &Network, ip: Ipv4Addr, port_mapping: Vec<String>) -> Self {
        let id = format!("{container}-{}", network.name);
        Self {
            device: VethPair::for_endpoint(&id),
            id,
            ip,
            mac: link::mac_for(ip),
            network: network.name.clone(),
            port_mapping,
        }
    }

    /// `ip` argument lists run on the host: give the peer its MAC and hand
    /// it to the namespace of `pid`.
    #[must_use]
    pub fn host_commands(&self, pid: u32) -> Vec<Vec<String>> {
        vec![
            link::set_mac(&self.device.peer, &self.mac),
            link::set_netns(&self.device.peer, pid),
        ]
    }

    /// `ip` argument lists run inside the container's network namespace:
    /// address the peer, bring it and loopback up, route through the
    /// gateway.
    #[must_use]
    pub fn namespace_commands(&self, network: &Network) -> Vec<Vec<String>> {
        let peer = &self.device.peer;
        vec![
            link::add_addr(peer, &network.ip_range.with_addr(self.ip)),
            link::set_up(peer),
            link::set_up("lo"),
            link::add_default_route(peer, network.gateway()),
        ]
    }

    /// Moves the peer into the namespace of `pid` and configures it there.
    /// The calling thread returns to its own namespace on every path.
    ///
    /// # Errors
    ///
    /// Returns the first failing command, or the namespace switch error.
    pub fn configure(&self, runner: &dyn CommandRunner, network: &Network, pid: u32) -> Result<()> {
        for args in self.host_commands(pid) {
            let _ = runner.run(link::IP, &args)?;
        }
        with_netns(pid, || {
            for args in self.namespace_commands(network) {
                let _ = runner.run(link::IP, &args)?;
            }
            Ok(())
        })?;
        tracing::info!(endpoint = %self.id, ip = %self.ip, pid, "endpoint configured");
        Ok(())
    }
}
