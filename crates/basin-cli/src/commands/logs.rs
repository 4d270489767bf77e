//! `basin logs`: Print the log of a detached container.

use clap::Args;

use basin_runtime::engine::Engine;

/// Arguments for the `logs` command.
#[derive(Args, Debug)]
pub struct LogsArgs {
    /// Container name.
    pub container: String,
}

/// Executes the `logs` command.
///
/// # Errors
///
/// Returns an error if the container is unknown or its log is unreadable.
pub fn execute(engine: &Engine, args: &LogsArgs) -> anyhow::Result<()> {
    print!("{}", engine.logs(&args.container)?);
    Ok(())
}
