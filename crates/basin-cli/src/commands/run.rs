//! `basin run`: Create and start a container.

use clap::Args;

use basin_common::types::{CgroupLimits, RunParam};
use basin_runtime::engine::Engine;

/// Arguments for the `run` command.
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Keep stdin open (use with -t as `-it`).
    #[arg(short = 'i', long)]
    pub interactive: bool,

    /// Attach the terminal and wait for the container to exit.
    #[arg(short = 't', long)]
    pub tty: bool,

    /// Run in the background, writing output to the container log.
    #[arg(short, long, conflicts_with_all = ["interactive", "tty"])]
    pub detach: bool,

    /// Container name; defaults to the generated ID.
    #[arg(long)]
    pub name: Option<String>,

    /// Memory limit, e.g. `100m`.
    #[arg(long = "mem", default_value = "")]
    pub memory: String,

    /// CPU quota as a percentage of one CPU (1-100).
    #[arg(long, default_value_t = 0, value_parser = clap::value_parser!(u32).range(0..=100))]
    pub cpu: u32,

    /// CPUs the container may run on, e.g. `0-1`.
    #[arg(long, default_value = "")]
    pub cpuset: String,

    /// Relative CPU weight.
    #[arg(long, default_value = "")]
    pub cpushare: String,

    /// Bind mount `hostPath:containerPath`.
    #[arg(short, long)]
    pub volume: Option<String>,

    /// Environment variable `KEY=VALUE` (repeatable).
    #[arg(short = 'e', long = "env")]
    pub envs: Vec<String>,

    /// Network to connect the container to.
    #[arg(long)]
    pub network: Option<String>,

    /// Port mapping `hostPort:containerPort` (repeatable).
    #[arg(short = 'p', long = "publish")]
    pub ports: Vec<String>,

    /// Image archive name.
    pub image: String,

    /// Command and arguments to run.
    #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
    pub command: Vec<String>,
}

impl From<RunArgs> for RunParam {
    fn from(args: RunArgs) -> Self {
        Self {
            tty: args.tty || args.interactive,
            name: args.name,
            envs: args.envs,
            network: args.network,
            port_mapping: args.ports,
            volume: args.volume,
            image: args.image,
            command: args.command,
            limits: CgroupLimits {
                cpu_quota_percent: args.cpu,
                cpu_share: args.cpushare,
                cpuset: args.cpuset,
                memory_limit: args.memory,
            },
        }
    }
}

/// Executes the `run` command.
///
/// # Errors
///
/// Returns an error if any step of the container start fails.
pub fn execute(engine: &Engine, args: RunArgs) -> anyhow::Result<()> {
    let param = RunParam::from(args);
    let tty = param.tty;
    let record = engine.run(&param)?;
    if !tty {
        println!("{}", record.id);
    }
    Ok(())
}
