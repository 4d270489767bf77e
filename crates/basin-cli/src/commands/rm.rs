//! `basin rm`: Remove a stopped container.

use anyhow::Context;
use clap::Args;

use basin_runtime::engine::Engine;

/// Arguments for the `rm` command.
#[derive(Args, Debug)]
pub struct RmArgs {
    /// Container name.
    pub container: String,
}

/// Executes the `rm` command.
///
/// # Errors
///
/// Returns an error if the container is unknown, not stopped, or its
/// record cannot be deleted.
pub fn execute(engine: &Engine, args: &RmArgs) -> anyhow::Result<()> {
    engine
        .remove(&args.container)
        .with_context(|| format!("cannot remove container {}", args.container))?;
    println!("{}", args.container);
    Ok(())
}
