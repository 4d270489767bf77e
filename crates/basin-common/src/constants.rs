//! System-wide constants and default paths.

/// Application name used in paths, cgroup names and log output.
pub const APP_NAME: &str = "basin";

/// Binary name for the CLI.
pub const BIN_NAME: &str = "basin";

/// Hidden subcommand the binary re-executes itself with to enter the
/// container init path.
pub const INIT_SUBCOMMAND: &str = "init";

/// Default directory holding image archives (`<name>.tar`).
pub const DEFAULT_IMAGE_DIR: &str = "/root";

/// Default directory under which per-container overlay layers live.
pub const DEFAULT_WORKSPACE_ROOT: &str = "/root";

/// Default directory holding one record directory per container.
pub const DEFAULT_RUN_ROOT: &str = "/var/run/basin";

/// Default directory holding one descriptor file per network.
pub const DEFAULT_NETWORK_DIR: &str = "/var/run/basin/network/network";

/// Default path of the persisted address allocation table.
pub const DEFAULT_IPAM_FILE: &str = "/var/run/basin/network/ipam/subnet.json";

/// Name of the cgroup hierarchy created under every controller mount.
pub const DEFAULT_CGROUP_NAME: &str = "basin-cgroup";

/// Name of the directory under `run_root` that is not a container record.
pub const NETWORK_STATE_DIR: &str = "network";

/// Container record file name inside a container's run directory.
pub const CONFIG_FILE_NAME: &str = "config.json";

/// Log file name inside a container's run directory.
pub const LOG_FILE_NAME: &str = "container.log";

/// Length of a generated container ID.
pub const ID_LENGTH: usize = 10;

/// Timestamp format of `createTime` in container records.
pub const CREATE_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// CFS accounting period in microseconds used to turn a CPU percentage
/// into an absolute quota.
pub const CPU_PERIOD_US: u64 = 100_000;

/// Upper bound of the CPU quota percentage.
pub const CPU_PERCENT_MAX: u32 = 100;

/// Index of the mount point field in a `/proc/self/mountinfo` line.
pub const MOUNTINFO_MOUNT_POINT_INDEX: usize = 4;

/// Running mount table scanned for cgroup controller mount points.
pub const MOUNTINFO_PATH: &str = "/proc/self/mountinfo";

/// File descriptor number the init process reads its command from.
pub const COMMAND_PIPE_FD: i32 = 3;

/// Directory created inside the new root to hold the old root during
/// `pivot_root(2)`.
pub const PIVOT_DIR_NAME: &str = ".pivot_root";

/// Number of endpoint-ID characters used to name the host-side veth.
pub const VETH_NAME_PREFIX_LEN: usize = 5;

/// Prefix of the container-side veth name.
pub const VETH_PEER_PREFIX: &str = "cif-";

/// Name of the only network driver.
pub const BRIDGE_DRIVER: &str = "bridge";

/// Attempts made to look up a link that was just created.
pub const LINK_LOOKUP_RETRIES: u32 = 2;

/// Delay between link lookup attempts, in milliseconds.
pub const LINK_LOOKUP_DELAY_MS: u64 = 2_000;

/// Mode for directories everybody may traverse and write (upper/work/merged).
pub const PERM_0777: u32 = 0o777;

/// Mode for cgroup directories, run directories and the lower layer.
pub const PERM_0755: u32 = 0o755;

/// Mode for container records.
pub const PERM_0644: u32 = 0o644;
