//! Running the host's network tools.
//!
//! Link, address, route and NAT changes are made through `ip` and
//! `iptables`. Commands inherit the network namespace of the calling
//! thread, which is how endpoint setup reaches into a container.

use std::process::Command;

use basin_common::error::{BasinError, Result};

/// Executes an external program and returns its standard output.
pub trait CommandRunner: Send + Sync + std::fmt::Debug {
    /// Runs `program` with `args`.
    ///
    /// # Errors
    ///
    /// Returns [`BasinError::Command`] if the program cannot be spawned or
    /// exits unsuccessfully.
    fn run(&self, program: &str, args: &[String]) -> Result<String>;
}

/// Runs commands on the host with [`std::process::Command`].
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(&self, program: &str, args: &[String]) -> Result<String> {
        let rendered = render(program, args);
        tracing::debug!(command = %rendered, "running");

        let output = Command::new(program)
            .args(args)
            .output()
            .map_err(|e| BasinError::Command {
                program: rendered.clone(),
                message: e.to_string(),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(BasinError::Command {
                program: rendered,
                message: format!("{}: {}", output.status, stderr.trim()),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// `program arg1 arg2 ...`, for logs and errors.
#[must_use]
pub fn render(program: &str, args: &[String]) -> String {
    std::iter::once(program)
        .chain(args.iter().map(String::as_str))
        .collect::<Vec<_>>()
        .join(" ")
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_joins_program_and_args() {
        let args = vec!["link".to_string(), "show".to_string(), "br0".to_string()];
        assert_eq!(render("ip", &args), "ip link show br0");
    }

    #[test]
    fn system_runner_captures_stdout() {
        let out = SystemRunner
            .run("echo", &["basin".to_string()])
            .expect("echo runs");
        assert_eq!(out.trim(), "basin");
    }

    #[test]
    fn system_runner_reports_failures() {
        let err = SystemRunner.run("false", &[]).unwrap_err();
        assert!(matches!(err, BasinError::Command { .. }));

        let err = SystemRunner
            .run("/nonexistent/basin-tool", &[])
            .unwrap_err();
        assert!(err.to_string().contains("/nonexistent/basin-tool"));
    }
}
