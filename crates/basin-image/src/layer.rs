//! Unpacking image archives into lower layers.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use basin_common::error::{BasinError, Result};

use crate::hash::{ArchiveDigest, hash_file};

/// Result of unpacking one archive.
#[derive(Debug, Clone)]
pub struct Layer {
    /// Digest of the archive the layer came from.
    pub digest: ArchiveDigest,
    /// Size of the archive in bytes.
    pub size_bytes: u64,
}

/// Unpacks `archive_path` into `target`, creating `target` if needed.
///
/// Plain `.tar` and gzip-compressed `.tar.gz` / `.tgz` archives are
/// supported; the format is chosen by extension.
///
/// # Errors
///
/// Returns an error if the archive cannot be opened, read or unpacked.
pub fn extract_layer(archive_path: &Path, target: &Path) -> Result<Layer> {
    tracing::info!(
        archive = %archive_path.display(),
        target = %target.display(),
        "extracting image"
    );

    std::fs::create_dir_all(target).map_err(|e| BasinError::io(target, e))?;

    let file = File::open(archive_path).map_err(|e| BasinError::io(archive_path, e))?;
    let size_bytes = file
        .metadata()
        .map_err(|e| BasinError::io(archive_path, e))?
        .len();

    if is_gzip_archive(archive_path) {
        unpack(flate2::read::GzDecoder::new(file), target)?;
    } else {
        unpack(file, target)?;
    }

    let digest = hash_file(archive_path)?;
    tracing::info!(digest = %digest, size = size_bytes, "image extracted");

    Ok(Layer { digest, size_bytes })
}

fn unpack(reader: impl Read, target: &Path) -> Result<()> {
    let mut archive = tar::Archive::new(reader);
    archive.set_preserve_permissions(true);
    archive.unpack(target).map_err(|e| BasinError::io(target, e))
}

pub(crate) fn is_gzip_archive(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("gz") || ext.eq_ignore_ascii_case("tgz"))
}
