//! CLI command definitions and dispatch.

pub mod init;
pub mod logs;
pub mod network;
pub mod ps;
pub mod rm;
pub mod run;
pub mod stop;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use basin_common::config::BasinConfig;
use basin_runtime::engine::Engine;

/// basin: a minimal single-host container runtime.
#[derive(Parser, Debug)]
#[command(name = "basin", version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Command,

    /// Keep all runtime state below this directory.
    #[arg(long, global = true, env = "BASIN_ROOT", conflicts_with = "config")]
    pub root: Option<PathBuf>,

    /// JSON configuration file with the runtime paths.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
}

impl Cli {
    /// Resolves the runtime configuration from the global flags.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration file cannot be loaded.
    pub fn basin_config(&self) -> anyhow::Result<BasinConfig> {
        Ok(match (&self.root, &self.config) {
            (Some(root), _) => BasinConfig::with_root(root),
            (None, Some(path)) => BasinConfig::load(path)?,
            (None, None) => BasinConfig::default(),
        })
    }
}

/// Available CLI subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create and start a container.
    Run(run::RunArgs),
    /// List containers.
    Ps(ps::PsArgs),
    /// Print the log of a detached container.
    Logs(logs::LogsArgs),
    /// Stop a running container.
    Stop(stop::StopArgs),
    /// Remove a stopped container.
    Rm(rm::RmArgs),
    /// Manage bridge networks.
    Network(network::NetworkArgs),
    /// Container-side entry point of a spawned container.
    #[command(hide = true)]
    Init,
}

/// Dispatches the parsed CLI command to its handler.
///
/// # Errors
///
/// Returns an error if the command execution fails.
pub fn execute(cli: Cli) -> anyhow::Result<()> {
    // Runs inside the new namespaces; must not touch host state.
    if matches!(cli.command, Command::Init) {
        return init::execute();
    }

    let engine = Engine::new(cli.basin_config()?)?;
    match cli.command {
        Command::Run(args) => run::execute(&engine, args),
        Command::Ps(args) => ps::execute(&engine, &args),
        Command::Logs(args) => logs::execute(&engine, &args),
        Command::Stop(args) => stop::execute(&engine, &args),
        Command::Rm(args) => rm::execute(&engine, &args),
        Command::Network(args) => network::execute(engine, args),
        Command::Init => init::execute(),
    }
}
