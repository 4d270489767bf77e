//! IPv4 CIDR values.
//!
//! An [`Ipv4Cidr`] keeps the address it was written with, so
//! `172.18.0.1/24` is both "the gateway of 172.18.0.0/24" and a valid
//! argument to `ip addr add`. [`Ipv4Cidr::network`] masks the host part off.

use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use basin_common::error::{BasinError, Result};

/// An IPv4 address with a prefix length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Ipv4Cidr {
    addr: Ipv4Addr,
    prefix: u8,
}

impl Ipv4Cidr {
    /// Builds a CIDR from an address and a prefix length.
    ///
    /// # Errors
    ///
    /// Returns [`BasinError::Config`] if `prefix` exceeds 32.
    pub fn new(addr: Ipv4Addr, prefix: u8) -> Result<Self> {
        if prefix > 32 {
            return Err(BasinError::config(format!(
                "prefix length {prefix} is out of range for IPv4"
            )));
        }
        Ok(Self { addr, prefix })
    }

    /// The address part as written.
    #[must_use]
    pub const fn addr(&self) -> Ipv4Addr {
        self.addr
    }

    /// The prefix length.
    #[must_use]
    pub const fn prefix(&self) -> u8 {
        self.prefix
    }

    /// The netmask as an integer.
    #[must_use]
    pub const fn mask(&self) -> u32 {
        if self.prefix == 0 {
            0
        } else {
            u32::MAX << (32 - self.prefix)
        }
    }

    /// The network this address belongs to, host bits cleared.
    #[must_use]
    pub fn network(&self) -> Self {
        Self {
            addr: Ipv4Addr::from(u32::from(self.addr) & self.mask()),
            prefix: self.prefix,
        }
    }

    /// The same prefix with a different address.
    #[must_use]
    pub const fn with_addr(&self, addr: Ipv4Addr) -> Self {
        Self {
            addr,
            prefix: self.prefix,
        }
    }

    /// Number of assignable host addresses: everything except the network
    /// and broadcast addresses.
    #[must_use]
    pub fn host_count(&self) -> usize {
        let total = 1u64 << (32 - u32::from(self.prefix));
        usize::try_from(total.saturating_sub(2)).unwrap_or(usize::MAX)
    }

    /// Returns `true` if `ip` lies inside this network.
    #[must_use]
    pub fn contains(&self, ip: Ipv4Addr) -> bool {
        u32::from(ip) & self.mask() == u32::from(self.network().addr)
    }

    /// Host address at `offset`: offset 0 is the first address after the
    /// network address.
    #[must_use]
    pub fn host(&self, offset: usize) -> Option<Ipv4Addr> {
        if offset >= self.host_count() {
            return None;
        }
        let offset = u32::try_from(offset).ok()?;
        let base = u32::from(self.network().addr);
        Some(Ipv4Addr::from(base + offset + 1))
    }

    /// Inverse of [`Ipv4Cidr::host`].
    #[must_use]
    pub fn offset_of(&self, ip: Ipv4Addr) -> Option<usize> {
        if !self.contains(ip) {
            return None;
        }
        let delta = u32::from(ip) - u32::from(self.network().addr);
        let offset = usize::try_from(delta.checked_sub(1)?).ok()?;
        (offset < self.host_count()).then_some(offset)
    }
}

impl fmt::Display for Ipv4Cidr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.addr, self.prefix)
    }
}

impl FromStr for Ipv4Cidr {
    type Err = BasinError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || BasinError::config(format!("invalid CIDR '{s}'"));
        let (addr, prefix) = s.trim().split_once('/').ok_or_else(invalid)?;
        let addr = addr.parse::<Ipv4Addr>().map_err(|_| invalid())?;
        let prefix = prefix.parse::<u8>().map_err(|_| invalid())?;
        Self::new(addr, prefix)
    }
}

impl TryFrom<String> for Ipv4Cidr {
    type Error = BasinError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<Ipv4Cidr> for String {
    fn from(value: Ipv4Cidr) -> Self {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cidr(s: &str) -> Ipv4Cidr {
        s.parse().expect("valid cidr")
    }

    #[test]
    fn parse_and_display_keep_the_written_address() {
        let gw = cidr("172.18.0.1/24");
        assert_eq!(gw.addr(), Ipv4Addr::new(172, 18, 0, 1));
        assert_eq!(gw.prefix(), 24);
        assert_eq!(gw.to_string(), "172.18.0.1/24");
        assert_eq!(gw.network().to_string(), "172.18.0.0/24");
    }

    #[test]
    fn malformed_cidrs_are_rejected() {
        for bad in ["172.18.0.0", "172.18.0.0/33", "172.18.0/24", "x/24", ""] {
            assert!(bad.parse::<Ipv4Cidr>().is_err(), "{bad} should not parse");
        }
    }

    #[test]
    fn host_count_excludes_network_and_broadcast() {
        assert_eq!(cidr("172.18.0.0/24").host_count(), 254);
        assert_eq!(cidr("10.0.0.0/30").host_count(), 2);
        assert_eq!(cidr("10.0.0.0/31").host_count(), 0);
    }

    #[test]
    fn host_offsets_carry_across_octets() {
        let net = cidr("10.0.0.0/16");
        assert_eq!(net.host(0), Some(Ipv4Addr::new(10, 0, 0, 1)));
        assert_eq!(net.host(255), Some(Ipv4Addr::new(10, 0, 1, 0)));
        assert_eq!(net.offset_of(Ipv4Addr::new(10, 0, 1, 0)), Some(255));
    }

    #[test]
    fn offsets_outside_the_host_range_are_none() {
        let net = cidr("172.18.0.0/24");
        assert_eq!(net.host(254), None);
        assert_eq!(net.offset_of(Ipv4Addr::new(172, 18, 0, 0)), None);
        assert_eq!(net.offset_of(Ipv4Addr::new(172, 18, 0, 255)), None);
        assert_eq!(net.offset_of(Ipv4Addr::new(172, 19, 0, 1)), None);
    }

    #[test]
    fn serializes_as_a_string() {
        let json = serde_json::to_string(&cidr("192.168.10.1/24")).expect("serialize");
        assert_eq!(json, "\"192.168.10.1/24\"");
        let back: Ipv4Cidr = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, cidr("192.168.10.1/24"));
    }
}
