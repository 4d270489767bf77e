//! `basin network`: Create, list and remove bridge networks.

use clap::{Args, Subcommand};

use basin_common::constants::BRIDGE_DRIVER;
use basin_runtime::engine::Engine;

use crate::output;

/// Arguments for the `network` command.
#[derive(Args, Debug)]
pub struct NetworkArgs {
    /// Network operation.
    #[command(subcommand)]
    pub command: NetworkCommand,
}

/// Network operations.
#[derive(Subcommand, Debug)]
pub enum NetworkCommand {
    /// Create a network.
    Create(CreateArgs),
    /// List networks.
    Ls,
    /// Remove a network.
    Rm(RemoveArgs),
}

/// Arguments for `network create`.
#[derive(Args, Debug)]
pub struct CreateArgs {
    /// Network driver.
    #[arg(long, default_value = BRIDGE_DRIVER)]
    pub driver: String,

    /// Subnet in CIDR notation, e.g. `192.168.10.0/24`.
    #[arg(long)]
    pub subnet: String,

    /// Network name, also used as the bridge device name.
    pub name: String,
}

/// Arguments for `network rm`.
#[derive(Args, Debug)]
pub struct RemoveArgs {
    /// Network name.
    pub name: String,
}

/// Executes the `network` command.
///
/// # Errors
///
/// Returns an error if the network operation fails.
pub fn execute(mut engine: Engine, args: NetworkArgs) -> anyhow::Result<()> {
    match args.command {
        NetworkCommand::Create(create) => {
            let network = engine.create_network(&create.driver, &create.subnet, &create.name)?;
            println!("{}", network.name);
        }
        NetworkCommand::Ls => print!("{}", output::network_table(&engine.networks())),
        NetworkCommand::Rm(remove) => {
            engine.delete_network(&remove.name)?;
            println!("{}", remove.name);
        }
    }
    Ok(())
}
