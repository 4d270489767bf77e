//! Persistent container records.
//!
//! Each container has a directory `<run_root>/<name>/` holding its
//! `config.json` record and, for detached containers, `container.log`.
//! Records are read and written whole on every access.

use std::io::Write;
use std::os::unix::fs::{DirBuilderExt, OpenOptionsExt};
use std::path::{Path, PathBuf};

use basin_common::constants::{CONFIG_FILE_NAME, NETWORK_STATE_DIR, PERM_0644, PERM_0755};
use basin_common::error::{BasinError, Result};
use basin_common::types::ContainerRecord;

/// Directory of container records.
#[derive(Debug, Clone)]
pub struct RecordStore {
    root: PathBuf,
}

impl RecordStore {
    /// Creates a store over `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Directory of the container `name`.
    #[must_use]
    pub fn container_dir(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    /// Path of the record of `name`.
    #[must_use]
    pub fn record_path(&self, name: &str) -> PathBuf {
        self.container_dir(name).join(CONFIG_FILE_NAME)
    }

    /// Returns `true` if a record directory for `name` exists.
    #[must_use]
    pub fn exists(&self, name: &str) -> bool {
        self.container_dir(name).is_dir()
    }

    /// Creates the directory of `name` if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn ensure_dir(&self, name: &str) -> Result<PathBuf> {
        let dir = self.container_dir(name);
        std::fs::DirBuilder::new()
            .recursive(true)
            .mode(PERM_0755)
            .create(&dir)
            .map_err(|e| BasinError::io(&dir, e))?;
        Ok(dir)
    }

    /// Writes `record` to `<name>/config.json`, replacing any previous one.
    ///
    /// # Errors
    ///
    /// Returns an error if the record cannot be serialized or written.
    pub fn save(&self, record: &ContainerRecord) -> Result<()> {
        let _dir = self.ensure_dir(&record.name)?;
        let path = self.record_path(&record.name);
        let json = serde_json::to_string(record)?;
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .mode(PERM_0644)
            .open(&path)
            .map_err(|e| BasinError::io(&path, e))?;
        file.write_all(json.as_bytes())
            .map_err(|e| BasinError::io(&path, e))?;
        tracing::debug!(name = %record.name, status = %record.status, "record saved");
        Ok(())
    }

    /// Reads the record of `name`.
    ///
    /// # Errors
    ///
    /// Returns [`BasinError::NotFound`] if there is no record, or an error
    /// if it cannot be read or parsed.
    pub fn load(&self, name: &str) -> Result<ContainerRecord> {
        let path = self.record_path(name);
        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(BasinError::NotFound {
                    kind: "container",
                    id: name.to_string(),
                });
            }
            Err(e) => return Err(BasinError::io(&path, e)),
        };
        Ok(serde_json::from_str(&content)?)
    }

    /// Removes the directory of `name` with everything in it.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory exists but cannot be removed.
    pub fn delete(&self, name: &str) -> Result<()> {
        let dir = self.container_dir(name);
        match std::fs::remove_dir_all(&dir) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(BasinError::io(&dir, e)),
        }
    }

    /// Every readable record, ordered by name. The network state directory
    /// and unreadable records are skipped.
    ///
    /// # Errors
    ///
    /// Returns an error if the root cannot be listed. A missing root is an
    /// empty list.
    pub fn list(&self) -> Result<Vec<ContainerRecord>> {
        let entries = match std::fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(BasinError::io(&self.root, e)),
        };

        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| BasinError::io(&self.root, e))?;
            if !entry.path().is_dir() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            if name != NETWORK_STATE_DIR {
                names.push(name);
            }
        }
        names.sort();

        Ok(names
            .iter()
            .filter_map(|name| match self.load(name) {
                Ok(record) => Some(record),
                Err(e) => {
                    tracing::warn!(name = %name, error = %e, "skipping unreadable container record");
                    None
                }
            })
            .collect())
    }

    /// The directory all records live in.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use basin_common::types::{ContainerId, ContainerStatus};

    fn record(name: &str) -> ContainerRecord {
        ContainerRecord::running(
            4242,
            ContainerId::new("0123456789"),
            name,
            &["top".to_string(), "-b".to_string()],
        )
    }

    #[test]
    fn save_and_load() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = RecordStore::new(dir.path());
        let web = record("web");

        store.save(&web).expect("save");
        assert!(dir.path().join("web/config.json").is_file());
        assert_eq!(store.load("web").expect("load"), web);
    }

    #[test]
    fn record_json_uses_persisted_field_names() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = RecordStore::new(dir.path());
        let mut web = record("web");
        web.port_mapping = vec!["8080:80".into()];
        store.save(&web).expect("save");

        let json: serde_json::Value = serde_json::from_str(
            &std::fs::read_to_string(store.record_path("web")).expect("read"),
        )
        .expect("json");
        assert_eq!(json["pid"], 4242);
        assert_eq!(json["command"], "top -b");
        assert_eq!(json["status"], "running");
        assert_eq!(json["portmapping"][0], "8080:80");
        assert!(json["createTime"].is_string());
    }

    #[test]
    fn missing_record_is_not_found() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = RecordStore::new(dir.path());
        assert!(matches!(
            store.load("ghost"),
            Err(BasinError::NotFound { kind: "container", .. })
        ));
    }

    #[test]
    fn list_skips_network_dir_and_broken_records() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = RecordStore::new(dir.path());
        store.save(&record("web")).expect("save");
        store.save(&record("db")).expect("save");
        std::fs::create_dir_all(dir.path().join("network/network")).expect("mkdir");
        std::fs::create_dir_all(dir.path().join("broken")).expect("mkdir");
        std::fs::write(dir.path().join("broken/config.json"), "{").expect("write");

        let names: Vec<String> = store
            .list()
            .expect("list")
            .into_iter()
            .map(|r| r.name)
            .collect();
        assert_eq!(names, vec!["db", "web"]);
    }

    #[test]
    fn list_of_missing_root_is_empty() {
        let store = RecordStore::new("/nonexistent/basin/run");
        assert!(store.list().expect("list").is_empty());
    }

    #[test]
    fn delete_removes_directory() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = RecordStore::new(dir.path());
        let mut web = record("web");
        web.mark_stopped();
        store.save(&web).expect("save");
        assert_eq!(store.load("web").expect("load").status, ContainerStatus::Stopped);

        store.delete("web").expect("delete");
        assert!(!store.exists("web"));
        store.delete("web").expect("second delete is a no-op");
    }
}
