//! `basin ps`: List containers.

use clap::Args;

use basin_common::types::ContainerStatus;
use basin_runtime::engine::Engine;

use crate::output;

/// Arguments for the `ps` command.
#[derive(Args, Debug)]
pub struct PsArgs {
    /// Only show running containers.
    #[arg(long)]
    pub running: bool,
}

/// Executes the `ps` command.
///
/// # Errors
///
/// Returns an error if the container records cannot be listed.
pub fn execute(engine: &Engine, args: &PsArgs) -> anyhow::Result<()> {
    let mut records = engine.list()?;
    if args.running {
        records.retain(|r| r.status == ContainerStatus::Running);
    }
    print!("{}", output::container_table(&records));
    Ok(())
}
