//! `basin stop`: Stop a running container.

use clap::Args;

use basin_runtime::engine::Engine;

/// Arguments for the `stop` command.
#[derive(Args, Debug)]
pub struct StopArgs {
    /// Container name.
    pub container: String,
}

/// Executes the `stop` command.
///
/// # Errors
///
/// Returns an error if the container is unknown or cannot be signalled.
pub fn execute(engine: &Engine, args: &StopArgs) -> anyhow::Result<()> {
    let record = engine.stop(&args.container)?;
    println!("{}", record.name);
    Ok(())
}
