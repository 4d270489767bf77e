//! Domain types used across the basin workspace.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Unique identifier for a container instance.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContainerId(String);

impl ContainerId {
    /// Creates a container ID from a string value.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generates a random ID of [`crate::constants::ID_LENGTH`] characters.
    #[must_use]
    pub fn generate() -> Self {
        let mut id = uuid::Uuid::new_v4().simple().to_string();
        id.truncate(crate::constants::ID_LENGTH);
        Self(id)
    }

    /// Returns the inner string representation.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContainerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle status of a container as persisted in its record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerStatus {
    /// The sandboxed process was started and has not been stopped.
    Running,
    /// The container was stopped by the operator.
    Stopped,
    /// The sandboxed process ended on its own.
    Exited,
}

impl fmt::Display for ContainerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Running => write!(f, "running"),
            Self::Stopped => write!(f, "stopped"),
            Self::Exited => write!(f, "exited"),
        }
    }
}

/// Persisted record of one container, stored as `config.json`.
///
/// The `id` never changes once assigned; `pid` is only meaningful while
/// `status` is [`ContainerStatus::Running`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerRecord {
    /// Host PID of the init process.
    #[serde(default)]
    pub pid: Option<u32>,
    /// Generated container ID.
    pub id: ContainerId,
    /// Operator-chosen name (defaults to the ID).
    pub name: String,
    /// Launch command, arguments joined by single spaces.
    pub command: String,
    /// Current status.
    pub status: ContainerStatus,
    /// Volume spec `hostPath:containerPath`, empty when none.
    #[serde(default)]
    pub volume: String,
    /// Port mappings `hostPort:containerPort`.
    #[serde(default, rename = "portmapping")]
    pub port_mapping: Vec<String>,
    /// Creation time, formatted with [`crate::constants::CREATE_TIME_FORMAT`].
    #[serde(rename = "createTime")]
    pub created_at: String,
}

impl ContainerRecord {
    /// Creates a record in the `running` state stamped with the current
    /// local time.
    #[must_use]
    pub fn running(pid: u32, id: ContainerId, name: impl Into<String>, command: &[String]) -> Self {
        Self {
            pid: Some(pid),
            id,
            name: name.into(),
            command: command.join(" "),
            status: ContainerStatus::Running,
            volume: String::new(),
            port_mapping: Vec::new(),
            created_at: chrono::Local::now()
                .format(crate::constants::CREATE_TIME_FORMAT)
                .to_string(),
        }
    }

    /// Marks the record stopped and clears the pid.
    pub fn mark_stopped(&mut self) {
        self.status = ContainerStatus::Stopped;
        self.pid = None;
    }

    /// Marks the record exited and clears the pid.
    pub fn mark_exited(&mut self) {
        self.status = ContainerStatus::Exited;
        self.pid = None;
    }
}

/// Resource limits applied through the cgroup manager.
///
/// Zero or empty fields mean "leave the controller default".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CgroupLimits {
    /// CPU quota as a percentage of one CPU (1-100), 0 when unset.
    pub cpu_quota_percent: u32,
    /// Raw `cpu.shares` value.
    pub cpu_share: String,
    /// `cpuset.cpus` specification, e.g. `0-1`.
    pub cpuset: String,
    /// Raw `memory.limit_in_bytes` value, e.g. `100m`.
    pub memory_limit: String,
}

impl CgroupLimits {
    /// Returns `true` when no limit is set at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cpu_quota_percent == 0
            && self.cpu_share.is_empty()
            && self.cpuset.is_empty()
            && self.memory_limit.is_empty()
    }
}

/// Parameters of a `run` request.
#[derive(Debug, Clone, Default)]
pub struct RunParam {
    /// Attach the container to the caller's terminal and wait for it.
    pub tty: bool,
    /// Container name; a generated ID is used when `None`.
    pub name: Option<String>,
    /// Extra environment variables, `KEY=VALUE`.
    pub envs: Vec<String>,
    /// Network to connect the container to.
    pub network: Option<String>,
    /// Port mappings `hostPort:containerPort`.
    pub port_mapping: Vec<String>,
    /// Volume spec `hostPath:containerPath`.
    pub volume: Option<String>,
    /// Image archive name, without extension.
    pub image: String,
    /// Command and arguments to run inside the container.
    pub command: Vec<String>,
    /// Resource limits.
    pub limits: CgroupLimits,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_id_has_fixed_length() {
        let id = ContainerId::generate();
        assert_eq!(id.as_str().len(), crate::constants::ID_LENGTH);
    }

    #[test]
    fn generated_ids_differ() {
        assert_ne!(ContainerId::generate(), ContainerId::generate());
    }

    #[test]
    fn record_serializes_with_wire_field_names() {
        let mut record = ContainerRecord::running(
            42,
            ContainerId::new("0123456789"),
            "web",
            &["/bin/sh".to_string(), "-c".to_string(), "top".to_string()],
        );
        record.port_mapping = vec!["8080:80".into()];
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["pid"], 42);
        assert_eq!(json["command"], "/bin/sh -c top");
        assert_eq!(json["status"], "running");
        assert_eq!(json["portmapping"][0], "8080:80");
        assert!(json["createTime"].is_string());
    }

    #[test]
    fn mark_stopped_clears_pid_only() {
        let mut record =
            ContainerRecord::running(7, ContainerId::new("abc"), "db", &["sleep".to_string()]);
        record.volume = "/data:/data".into();
        let before = record.clone();
        record.mark_stopped();
        assert_eq!(record.status, ContainerStatus::Stopped);
        assert_eq!(record.pid, None);
        assert_eq!(record.id, before.id);
        assert_eq!(record.name, before.name);
        assert_eq!(record.command, before.command);
        assert_eq!(record.volume, before.volume);
        assert_eq!(record.created_at, before.created_at);
    }

    #[test]
    fn status_display_matches_wire_format() {
        assert_eq!(ContainerStatus::Exited.to_string(), "exited");
        let json = serde_json::to_string(&ContainerStatus::Stopped).unwrap();
        assert_eq!(json, "\"stopped\"");
    }

    #[test]
    fn empty_limits_are_detected() {
        assert!(CgroupLimits::default().is_empty());
        let limits = CgroupLimits {
            cpuset: "0".into(),
            ..CgroupLimits::default()
        };
        assert!(!limits.is_empty());
    }
}
