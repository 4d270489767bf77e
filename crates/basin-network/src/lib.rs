//! # basin-network
//!
//! Single-host bridge networking for basin containers.
//!
//! - **Subnets**: [`subnet::Ipv4Cidr`], the CIDR value used everywhere.
//! - **IPAM**: a persisted bit-vector of allocated host addresses per subnet.
//! - **Driver**: the `bridge` driver builds Linux bridges, veth pairs and
//!   NAT rules through `ip` and `iptables`.
//! - **Registry**: network descriptors loaded from disk, plus endpoint
//!   wiring into a container's network namespace and port mapping.

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod bitmap;
pub mod bridge;
pub mod command;
pub mod driver;
pub mod endpoint;
pub mod ipam;
pub mod iptables;
pub mod link;
pub mod registry;
pub mod subnet;
