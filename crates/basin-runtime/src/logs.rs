//! Container log files.
//!
//! A detached container's stdout and stderr go to
//! `<run_root>/<name>/container.log`; interactive containers write to the
//! terminal and have no log file.

use std::fs::File;
use std::path::Path;

use basin_common::error::{BasinError, Result};

/// Creates (or truncates) the log file at `path`, creating its directory.
///
/// # Errors
///
/// Returns an error if the directory or file cannot be created.
pub fn create_log_file(path: &Path) -> Result<File> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| BasinError::io(parent, e))?;
    }
    File::create(path).map_err(|e| BasinError::io(path, e))
}

/// Reads the whole log at `path`; a missing file reads as empty.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read.
pub fn read_logs(path: &Path) -> Result<String> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(content),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(String::new()),
        Err(e) => Err(BasinError::io(path, e)),
    }
}
