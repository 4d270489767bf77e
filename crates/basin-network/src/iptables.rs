//! NAT rules: masquerade for outbound traffic, DNAT for published ports.

use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

use basin_common::error::{BasinError, Result};

use crate::command::CommandRunner;
use crate::subnet::Ipv4Cidr;

/// The `iptables` binary.
pub const IPTABLES: &str = "iptables";

/// A published port, `hostPort:containerPort`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortMapping {
    /// Port on the host.
    pub host: u16,
    /// Port inside the container.
    pub container: u16,
}

impl FromStr for PortMapping {
    type Err = BasinError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || BasinError::config(format!("invalid port mapping '{s}'"));
        let (host, container) = s.split_once(':').ok_or_else(invalid)?;
        Ok(Self {
            host: host.trim().parse().map_err(|_| invalid())?,
            container: container.trim().parse().map_err(|_| invalid())?,
        })
    }
}

impl fmt::Display for PortMapping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.container)
    }
}

/// Source-NAT everything leaving `subnet` through an interface other than
/// `bridge`.
#[must_use]
pub fn masquerade(subnet: &Ipv4Cidr, bridge: &str) -> Vec<String> {
    [
        "-t",
        "nat",
        "-A",
        "POSTROUTING",
        "-s",
        &subnet.network().to_string(),
        "!",
        "-o",
        bridge,
        "-j",
        "MASQUERADE",
    ]
    .iter()
    .map(ToString::to_string)
    .collect()
}

/// Redirect TCP traffic arriving on `mapping.host` to `ip:mapping.container`.
#[must_use]
pub fn dnat(mapping: PortMapping, ip: Ipv4Addr) -> Vec<String> {
    [
        "-t",
        "nat",
        "-A",
        "PREROUTING",
        "-p",
        "tcp",
        "-m",
        "tcp",
        "--dport",
        &mapping.host.to_string(),
        "-j",
        "DNAT",
        "--to-destination",
        &format!("{ip}:{}", mapping.container),
    ]
    .iter()
    .map(ToString::to_string)
    .collect()
}

/// Installs one DNAT rule per mapping. Malformed entries and failing rules
/// are logged and skipped; the remaining entries are still applied.
///
/// Returns the number of rules installed.
pub fn publish_ports(runner: &dyn CommandRunner, ip: Ipv4Addr, mappings: &[String]) -> usize {
    let mut installed = 0;
    for entry in mappings {
        let mapping = match entry.parse::<PortMapping>() {
            Ok(mapping) => mapping,
            Err(e) => {
                tracing::warn!(entry = %entry, error = %e, "skipping port mapping");
                continue;
            }
        };
        match runner.run(IPTABLES, &dnat(mapping, ip)) {
            Ok(_) => {
                installed += 1;
                tracing::debug!(mapping = %mapping, ip = %ip, "port published");
            }
            Err(e) => tracing::warn!(mapping = %mapping, error = %e, "publishing port failed"),
        }
    }
    installed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::render;
    use crate::command::testing::RecordingRunner;

    #[test]
    fn masquerade_uses_the_network_address() {
        let gw: Ipv4Cidr = "172.18.0.1/24".parse().expect("cidr");
        assert_eq!(
            render(IPTABLES, &masquerade(&gw, "testbridge")),
            "iptables -t nat -A POSTROUTING -s 172.18.0.0/24 ! -o testbridge -j MASQUERADE"
        );
    }

    #[test]
    fn dnat_targets_endpoint_address() {
        let mapping: PortMapping = "8080:80".parse().expect("mapping");
        assert_eq!(
            render(IPTABLES, &dnat(mapping, Ipv4Addr::new(172, 18, 0, 2))),
            "iptables -t nat -A PREROUTING -p tcp -m tcp --dport 8080 -j DNAT --to-destination 172.18.0.2:80"
        );
    }

    #[test]
    fn malformed_entries_are_skipped() {
        let runner = RecordingRunner::default();
        let mappings = vec![
            "8080:80".to_string(),
            "oops".to_string(),
            "443:".to_string(),
            "2222:22".to_string(),
        ];
        let installed = publish_ports(&runner, Ipv4Addr::new(172, 18, 0, 2), &mappings);
        assert_eq!(installed, 2);
        assert_eq!(runner.calls().len(), 2);
    }

    #[test]
    fn failing_rule_does_not_stop_the_rest() {
        let runner = RecordingRunner::failing_times("iptables", 1);
        let mappings = vec!["8080:80".to_string(), "2222:22".to_string()];
        assert_eq!(
            publish_ports(&runner, Ipv4Addr::new(10, 0, 0, 2), &mappings),
            1
        );
    }
}
