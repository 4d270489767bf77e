//! The `bridge` network driver.
//!
//! A network is a Linux bridge named after it, holding the gateway address
//! and masqueraded towards the other host interfaces. Endpoints are veth
//! pairs whose host end is enslaved to the bridge.

use std::sync::Arc;

use basin_common::constants::BRIDGE_DRIVER;
use basin_common::error::{BasinError, Result};

use crate::command::CommandRunner;
use crate::driver::{Network, NetworkDriver};
use crate::endpoint::Endpoint;
use crate::iptables::{self, IPTABLES};
use crate::link::{self, IP};
use crate::subnet::Ipv4Cidr;

/// Bridge driver backed by `ip` and `iptables`.
#[derive(Debug, Clone)]
pub struct BridgeDriver {
    runner: Arc<dyn CommandRunner>,
}

impl BridgeDriver {
    /// Creates a driver running its commands through `runner`.
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self { runner }
    }

    fn ip(&self, args: &[String]) -> Result<()> {
        self.runner.run(IP, args).map(drop)
    }
}

impl NetworkDriver for BridgeDriver {
    fn name(&self) -> &str {
        BRIDGE_DRIVER
    }

    fn create(&self, ip_range: Ipv4Cidr, name: &str) -> Result<Network> {
        if link::exists(self.runner.as_ref(), name) {
            return Err(BasinError::InvalidState {
                message: format!("network device {name} already exists"),
            });
        }

        self.ip(&link::add_bridge(name))?;
        link::wait_for(self.runner.as_ref(), name)?;
        self.ip(&link::add_addr(name, &ip_range))?;
        self.ip(&link::set_up(name))?;
        let _ = self
            .runner
            .run(IPTABLES, &iptables::masquerade(&ip_range, name))?;

        tracing::info!(bridge = name, gateway = %ip_range, "bridge created");
        Ok(Network {
            name: name.to_string(),
            ip_range,
            driver: BRIDGE_DRIVER.to_string(),
        })
    }

    fn delete(&self, network: &Network) -> Result<()> {
        self.ip(&link::delete_link(&network.name))?;
        tracing::info!(bridge = %network.name, "bridge deleted");
        Ok(())
    }

    fn connect(&self, network: &Network, endpoint: &Endpoint) -> Result<()> {
        let veth = &endpoint.device;
        self.ip(&link::add_veth(&veth.host, &veth.peer))?;
        self.ip(&link::set_master(&veth.host, &network.name))?;
        self.ip(&link::set_up(&veth.host))?;
        tracing::debug!(bridge = %network.name, veth = %veth.host, "veth attached");
        Ok(())
    }

    fn disconnect(&self, network: &Network, endpoint: &Endpoint) -> Result<()> {
        tracing::debug!(bridge = %network.name, endpoint = %endpoint.id, "disconnect is a no-op");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::net::Ipv4Addr;

    use super::*;
    use crate::command::testing::RecordingRunner;
    use basin_common::types::ContainerId;

    fn driver(runner: &Arc<RecordingRunner>) -> BridgeDriver {
        BridgeDriver::new(Arc::clone(runner) as Arc<dyn CommandRunner>)
    }

    #[test]
    fn create_builds_addresses_and_masquerades_the_bridge() {
        let runner = Arc::new(RecordingRunner::failing_times("ip link show testbr", 1));
        let gw: Ipv4Cidr = "172.18.0.1/24".parse().expect("cidr");

        let network = driver(&runner).create(gw, "testbr").expect("create");
        assert_eq!(network.driver, "bridge");
        assert_eq!(network.ip_range, gw);
        assert_eq!(
            runner.calls(),
            vec![
                "ip link show testbr",
                "ip link add testbr type bridge",
                "ip link show testbr",
                "ip addr add 172.18.0.1/24 dev testbr",
                "ip link set testbr up",
                "iptables -t nat -A POSTROUTING -s 172.18.0.0/24 ! -o testbr -j MASQUERADE",
            ]
        );
    }

    #[test]
    fn create_refuses_an_existing_device() {
        let runner = Arc::new(RecordingRunner::default());
        let gw: Ipv4Cidr = "172.18.0.1/24".parse().expect("cidr");
        let err = driver(&runner).create(gw, "eth0").unwrap_err();
        assert!(matches!(err, BasinError::InvalidState { .. }));
        assert_eq!(runner.calls().len(), 1);
    }

    #[test]
    fn failing_step_aborts_create() {
        let runner = Arc::new(
            RecordingRunner::failing_times("ip link show", 1).and_failing_times("ip addr add", 1),
        );
        let gw: Ipv4Cidr = "172.18.0.1/24".parse().expect("cidr");
        let result = driver(&runner).create(gw, "testbr");
        assert!(matches!(result, Err(BasinError::Command { .. })));
        let calls = runner.calls();
        assert_eq!(calls.last().map(String::as_str), Some("ip addr add 172.18.0.1/24 dev testbr"));
        assert!(!calls.iter().any(|c| c.starts_with("iptables")));
    }

    #[test]
    fn connect_attaches_host_end_to_bridge() {
        let runner = Arc::new(RecordingRunner::default());
        let network = Network {
            name: "testbr".into(),
            ip_range: "172.18.0.1/24".parse().expect("cidr"),
            driver: "bridge".into(),
        };
        let ep = Endpoint::new(
            &ContainerId::new("0123456789"),
            &network,
            Ipv4Addr::new(172, 18, 0, 2),
            Vec::new(),
        );

        let driver = driver(&runner);
        driver.connect(&network, &ep).expect("connect");
        driver.disconnect(&network, &ep).expect("disconnect");
        assert_eq!(
            runner.calls(),
            vec![
                "ip link add 01234 type veth peer name cif-01234",
                "ip link set 01234 master testbr",
                "ip link set 01234 up",
            ]
        );
    }

    #[test]
    fn delete_removes_the_bridge() {
        let runner = Arc::new(RecordingRunner::default());
        let network = Network {
            name: "testbr".into(),
            ip_range: "172.18.0.1/24".parse().expect("cidr"),
            driver: "bridge".into(),
        };
        driver(&runner).delete(&network).expect("delete");
        assert_eq!(runner.calls(), vec!["ip link del testbr"]);
    }
}
