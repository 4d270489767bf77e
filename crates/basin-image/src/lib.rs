//! # basin-image
//!
//! Image handling for the basin runtime. An image is a tar archive named
//! after the image in the image directory; it is unpacked once per
//! container into that container's lower layer.
//!
//! - **Store**: resolves an image name to its archive.
//! - **Layers**: unpacks plain or gzip-compressed archives.
//! - **Hashing**: SHA-256 digests of archives, logged on extraction.

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod hash;
pub mod layer;
pub mod store;
