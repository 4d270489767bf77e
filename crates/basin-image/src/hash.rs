//! SHA-256 digests of image archives.

use std::fmt;
use std::io::Read;
use std::path::Path;

use sha2::{Digest as _, Sha256};

use basin_common::error::{BasinError, Result};

const READ_CHUNK: usize = 64 * 1024;

/// Hex-encoded SHA-256 digest.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ArchiveDigest(String);

impl ArchiveDigest {
    /// Lowercase hex form without the algorithm prefix.
    #[must_use]
    pub fn as_hex(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ArchiveDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sha256:{}", self.0)
    }
}

/// Computes the SHA-256 digest of a file, streaming it in chunks.
///
/// # Errors
///
/// Returns an error if the file cannot be opened or read.
pub fn hash_file(path: &Path) -> Result<ArchiveDigest> {
    tracing::debug!(path = %path.display(), "computing SHA-256 digest");
    let mut file = std::fs::File::open(path).map_err(|e| BasinError::io(path, e))?;
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; READ_CHUNK];
    loop {
        let n = file.read(&mut buf).map_err(|e| BasinError::io(path, e))?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(ArchiveDigest(format!("{:x}", hasher.finalize())))
}
