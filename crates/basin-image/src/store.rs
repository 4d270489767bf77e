//! Image lookup in the image directory.
//!
//! An image named `busybox` is the archive `busybox.tar` in the image
//! directory; compressed `busybox.tar.gz` and `busybox.tgz` are accepted
//! when no plain archive exists.

use std::path::{Path, PathBuf};

use basin_common::error::{BasinError, Result};

const ARCHIVE_EXTENSIONS: [&str; 3] = ["tar", "tar.gz", "tgz"];

/// Directory of image archives.
#[derive(Debug, Clone)]
pub struct ImageStore {
    root: PathBuf,
}

impl ImageStore {
    /// Creates a store over `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The image directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Archive path the image would have in its uncompressed form.
    #[must_use]
    pub fn default_archive_path(&self, image: &str) -> PathBuf {
        self.root.join(format!("{image}.{}", ARCHIVE_EXTENSIONS[0]))
    }

    /// Finds the archive for `image`.
    ///
    /// # Errors
    ///
    /// Returns [`BasinError::NotFound`] if no archive with a supported
    /// extension exists, or [`BasinError::Config`] for names that could
    /// escape the image directory.
    pub fn resolve(&self, image: &str) -> Result<PathBuf> {
        if image.is_empty() || image.contains('/') || image == "." || image == ".." {
            return Err(BasinError::config(format!("invalid image name '{image}'")));
        }
        ARCHIVE_EXTENSIONS
            .iter()
            .map(|ext| self.root.join(format!("{image}.{ext}")))
            .find(|path| path.is_file())
            .ok_or_else(|| BasinError::NotFound {
                kind: "image",
                id: self.default_archive_path(image).display().to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_archive_is_preferred() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join("busybox.tar"), b"").expect("write");
        std::fs::write(dir.path().join("busybox.tgz"), b"").expect("write");

        let store = ImageStore::new(dir.path());
        assert_eq!(
            store.resolve("busybox").expect("resolve"),
            dir.path().join("busybox.tar")
        );
    }

    #[test]
    fn compressed_archive_is_fallback() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join("alpine.tar.gz"), b"").expect("write");

        let store = ImageStore::new(dir.path());
        assert_eq!(
            store.resolve("alpine").expect("resolve"),
            dir.path().join("alpine.tar.gz")
        );
    }

    #[test]
    fn missing_image_reports_expected_archive() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = ImageStore::new(dir.path());
        let err = store.resolve("nginx").unwrap_err();
        assert!(err.to_string().contains("nginx.tar"));
    }

    #[test]
    fn path_like_names_are_rejected() {
        let store = ImageStore::new("/root");
        assert!(matches!(
            store.resolve("../etc/passwd"),
            Err(BasinError::Config { .. })
        ));
    }
}
