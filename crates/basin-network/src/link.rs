//! `ip` invocations for links, addresses and routes.

use std::net::Ipv4Addr;
use std::thread;
use std::time::Duration;

use basin_common::constants::{LINK_LOOKUP_DELAY_MS, LINK_LOOKUP_RETRIES};
use basin_common::error::Result;

use crate::command::CommandRunner;
use crate::subnet::Ipv4Cidr;

/// The `ip` binary.
pub const IP: &str = "ip";

fn args(parts: &[&str]) -> Vec<String> {
    parts.iter().map(ToString::to_string).collect()
}

/// `ip link add NAME type bridge`
#[must_use]
pub fn add_bridge(name: &str) -> Vec<String> {
    args(&["link", "add", name, "type", "bridge"])
}

/// `ip link add HOST type veth peer name PEER`
#[must_use]
pub fn add_veth(host: &str, peer: &str) -> Vec<String> {
    args(&["link", "add", host, "type", "veth", "peer", "name", peer])
}

/// `ip link del NAME`
#[must_use]
pub fn delete_link(name: &str) -> Vec<String> {
    args(&["link", "del", name])
}

/// `ip link show NAME`
#[must_use]
pub fn show_link(name: &str) -> Vec<String> {
    args(&["link", "show", name])
}

/// `ip link set NAME up`
#[must_use]
pub fn set_up(name: &str) -> Vec<String> {
    args(&["link", "set", name, "up"])
}

/// `ip link set NAME master BRIDGE`
#[must_use]
pub fn set_master(name: &str, bridge: &str) -> Vec<String> {
    args(&["link", "set", name, "master", bridge])
}

/// `ip link set dev NAME address MAC`
#[must_use]
pub fn set_mac(name: &str, mac: &str) -> Vec<String> {
    args(&["link", "set", "dev", name, "address", mac])
}

/// `ip link set NAME netns PID`
#[must_use]
pub fn set_netns(name: &str, pid: u32) -> Vec<String> {
    args(&["link", "set", name, "netns", &pid.to_string()])
}

/// `ip addr add CIDR dev NAME`
#[must_use]
pub fn add_addr(name: &str, cidr: &Ipv4Cidr) -> Vec<String> {
    args(&["addr", "add", &cidr.to_string(), "dev", name])
}

/// `ip route add default via GATEWAY dev NAME`
#[must_use]
pub fn add_default_route(name: &str, gateway: Ipv4Addr) -> Vec<String> {
    args(&["route", "add", "default", "via", &gateway.to_string(), "dev", name])
}

/// Returns `true` if a link called `name` is visible.
#[must_use]
pub fn exists(runner: &dyn CommandRunner, name: &str) -> bool {
    runner.run(IP, &show_link(name)).is_ok()
}

/// Waits for a freshly created link to become queryable, trying a fixed
/// number of times with a fixed delay in between.
///
/// # Errors
///
/// Returns the last lookup error once the attempts are used up.
pub fn wait_for(runner: &dyn CommandRunner, name: &str) -> Result<()> {
    wait_for_with_delay(runner, name, Duration::from_millis(LINK_LOOKUP_DELAY_MS))
}

pub(crate) fn wait_for_with_delay(
    runner: &dyn CommandRunner,
    name: &str,
    delay: Duration,
) -> Result<()> {
    let mut attempt = 1;
    loop {
        match runner.run(IP, &show_link(name)) {
            Ok(_) => return Ok(()),
            Err(e) if attempt >= LINK_LOOKUP_RETRIES => return Err(e),
            Err(e) => {
                tracing::debug!(link = name, attempt, error = %e, "link not visible yet, retrying");
                attempt += 1;
                thread::sleep(delay);
            }
        }
    }
}

/// Locally administered MAC derived from an IPv4 address:
/// `02:42:` followed by the four octets in hex.
#[must_use]
pub fn mac_for(ip: Ipv4Addr) -> String {
    let [a, b, c, d] = ip.octets();
    format!("02:42:{a:02x}:{b:02x}:{c:02x}:{d:02x}")
}
