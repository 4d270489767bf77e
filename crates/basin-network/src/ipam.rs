//! IPv4 address management.
//!
//! The allocation table maps a subnet (its network CIDR, e.g.
//! `172.18.0.0/24`) to an [`AllocationBitmap`] with one bit per host
//! address. Bit `n` stands for the address `network + n + 1`.
//!
//! Every [`Ipam`] call loads the table from disk, mutates it and stores it
//! back; nothing is cached between calls. By default the whole
//! load-mutate-store runs under an exclusive `flock(2)` on a sibling
//! `.lock` file, which serializes allocations from concurrent processes.
//! [`Ipam::unlocked`] skips the lock: two such callers can read the same
//! snapshot and hand out the same address.

use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};

use nix::fcntl::{Flock, FlockArg};
use serde::{Deserialize, Serialize};

use basin_common::error::{BasinError, Result};

use crate::bitmap::AllocationBitmap;
use crate::subnet::Ipv4Cidr;

/// Persisted subnet → bitmap mapping.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AllocationTable {
    subnets: BTreeMap<String, AllocationBitmap>,
}

impl AllocationTable {
    /// Reads the table at `path`; a missing file is an empty table.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(content) if content.trim().is_empty() => Ok(Self::default()),
            Ok(content) => Ok(serde_json::from_str(&content)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(BasinError::io(path, e)),
        }
    }

    /// Writes the table to `path`, creating parent directories.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory or file cannot be written.
    pub fn store(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| BasinError::io(parent, e))?;
        }
        let json = serde_json::to_string(self)?;
        std::fs::write(path, json).map_err(|e| BasinError::io(path, e))
    }

    /// Bitmap of `subnet`, if the subnet has been seen.
    #[must_use]
    pub fn bitmap(&self, subnet: &Ipv4Cidr) -> Option<&AllocationBitmap> {
        self.subnets.get(&subnet.network().to_string())
    }

    /// Marks the lowest free host address of `subnet` as allocated and
    /// returns it. A subnet seen for the first time starts all clear.
    ///
    /// # Errors
    ///
    /// Returns [`BasinError::AddressExhausted`] when every host address is
    /// taken.
    pub fn allocate(&mut self, subnet: &Ipv4Cidr) -> Result<Ipv4Addr> {
        let network = subnet.network();
        let bitmap = self
            .subnets
            .entry(network.to_string())
            .or_insert_with(|| AllocationBitmap::zeroed(network.host_count()));

        let exhausted = || BasinError::AddressExhausted {
            subnet: network.to_string(),
        };
        let offset = bitmap.first_clear().ok_or_else(exhausted)?;
        let ip = network.host(offset).ok_or_else(exhausted)?;
        let _ = bitmap.set(offset, true);
        Ok(ip)
    }

    /// Clears the bit of `ip` in `subnet`.
    ///
    /// # Errors
    ///
    /// Returns [`BasinError::Config`] if `ip` is not a host address of
    /// `subnet`, or [`BasinError::InvalidState`] if it is not allocated.
    pub fn release(&mut self, subnet: &Ipv4Cidr, ip: Ipv4Addr) -> Result<()> {
        let network = subnet.network();
        let offset = network.offset_of(ip).ok_or_else(|| {
            BasinError::config(format!("{ip} is not a host address of {network}"))
        })?;
        let previous = self
            .subnets
            .get_mut(&network.to_string())
            .and_then(|bitmap| bitmap.set(offset, false));
        if previous == Some(true) {
            Ok(())
        } else {
            Err(BasinError::InvalidState {
                message: format!("{ip} is not allocated in {network}"),
            })
        }
    }
}

/// Allocator bound to one allocation table file.
#[derive(Debug, Clone)]
pub struct Ipam {
    path: PathBuf,
    locked: bool,
}

impl Ipam {
    /// Allocator that serializes every call with an exclusive file lock.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            locked: true,
        }
    }

    /// Allocator without the file lock.
    pub fn unlocked(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            locked: false,
        }
    }

    /// Path of the allocation table.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Path of the lock file guarding the table.
    #[must_use]
    pub fn lock_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_owned();
        name.push(".lock");
        PathBuf::from(name)
    }

    /// Allocates the lowest free host address of `subnet`.
    ///
    /// # Errors
    ///
    /// Returns an error if the table cannot be loaded or stored, or if the
    /// subnet is exhausted.
    pub fn allocate(&self, subnet: &Ipv4Cidr) -> Result<Ipv4Addr> {
        let ip = self.update(|table| table.allocate(subnet))?;
        tracing::debug!(subnet = %subnet.network(), ip = %ip, "address allocated");
        Ok(ip)
    }

    /// Returns `ip` to the free pool of `subnet`.
    ///
    /// # Errors
    ///
    /// Returns an error if the table cannot be loaded or stored, or if `ip`
    /// is not an allocated host address of `subnet`.
    pub fn release(&self, subnet: &Ipv4Cidr, ip: Ipv4Addr) -> Result<()> {
        self.update(|table| table.release(subnet, ip))?;
        tracing::debug!(subnet = %subnet.network(), ip = %ip, "address released");
        Ok(())
    }

    fn update<T>(&self, mutate: impl FnOnce(&mut AllocationTable) -> Result<T>) -> Result<T> {
        let _lock = if self.locked {
            Some(self.lock()?)
        } else {
            None
        };
        let mut table = AllocationTable::load(&self.path)?;
        let value = mutate(&mut table)?;
        table.store(&self.path)?;
        Ok(value)
    }

    fn lock(&self) -> Result<Flock<File>> {
        let path = self.lock_path();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| BasinError::io(parent, e))?;
        }
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&path)
            .map_err(|e| BasinError::io(&path, e))?;
        Flock::lock(file, FlockArg::LockExclusive)
            .map_err(|(_, e)| BasinError::syscall(format!("flock {}", path.display()), e))
    }
}
