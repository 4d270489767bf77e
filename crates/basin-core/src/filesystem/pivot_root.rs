//! Root filesystem switching via `pivot_root(2)`.

use std::os::unix::fs::DirBuilderExt;
use std::path::{Path, PathBuf};

use nix::mount::{MntFlags, MsFlags, mount, umount2};
use nix::unistd::chdir;

use basin_common::constants::{PERM_0777, PIVOT_DIR_NAME};
use basin_common::error::{BasinError, Result};

/// Makes `new_root` the process root.
///
/// Must run inside a private mount namespace. The sequence is: make `/`
/// recursively private, bind `new_root` onto itself, pivot into it with the
/// old root parked in `new_root/.pivot_root`, `chdir("/")`, lazily detach
/// the old root and remove the parking directory. Any failing step aborts
/// and leaves the remaining steps undone.
///
/// # Errors
///
/// Returns the first failing step, wrapped with its operation and path.
pub fn pivot_root(new_root: &Path) -> Result<()> {
    tracing::info!(new_root = %new_root.display(), "performing pivot_root");

    mount(
        None::<&str>,
        "/",
        None::<&str>,
        MsFlags::MS_PRIVATE | MsFlags::MS_REC,
        None::<&str>,
    )
    .map_err(|e| BasinError::syscall("make / private", e))?;

    mount(
        Some(new_root),
        new_root,
        None::<&str>,
        MsFlags::MS_BIND | MsFlags::MS_REC,
        None::<&str>,
    )
    .map_err(|e| BasinError::syscall(format!("bind mount {} onto itself", new_root.display()), e))?;

    let put_old = new_root.join(PIVOT_DIR_NAME);
    std::fs::DirBuilder::new()
        .mode(PERM_0777)
        .create(&put_old)
        .map_err(|e| BasinError::io(&put_old, e))?;

    nix::unistd::pivot_root(new_root, &put_old)
        .map_err(|e| BasinError::syscall(format!("pivot_root {}", new_root.display()), e))?;

    chdir("/").map_err(|e| BasinError::syscall("chdir /", e))?;

    let old_root = old_root_path();
    umount2(&old_root, MntFlags::MNT_DETACH)
        .map_err(|e| BasinError::syscall(format!("umount {}", old_root.display()), e))?;

    std::fs::remove_dir(&old_root).map_err(|e| BasinError::io(&old_root, e))?;
    tracing::debug!("old root detached");
    Ok(())
}

/// Location of the parked old root once the pivot has happened.
#[must_use]
pub fn old_root_path() -> PathBuf {
    Path::new("/").join(PIVOT_DIR_NAME)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn old_root_is_directly_below_new_root() {
        assert_eq!(old_root_path(), PathBuf::from("/.pivot_root"));
    }
}
