//! `basin init`: Container-side half of the spawn. Not for direct use.

use basin_runtime::init;

/// Executes the `init` command. Returns only if the workload could not be
/// started.
///
/// # Errors
///
/// Returns the failing setup step.
pub fn execute() -> anyhow::Result<()> {
    tracing::debug!("container init");
    init::run_container_init()?;
    Ok(())
}
