//! CLI command definitions and dispatch.

pub mod info;
pub mod run;

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracestress_common::constants::BIN_NAME;

/// tracestress — measure ptrace syscall-stop overhead under load.
#[derive(Parser, Debug)]
#[command(name = BIN_NAME, version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Command,

    /// Log filter used when `RUST_LOG` is unset.
    #[arg(long, global = true, default_value = "info")]
    pub log_level: String,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    pub log_json: bool,
}

/// Available CLI subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run ptrace stressor instances and report their counts.
    Run(run::RunArgs),
    /// Show whether this host can run the ptrace stressor.
    Info(info::InfoArgs),
}

/// Dispatches the parsed CLI command to its handler.
///
/// # Errors
///
/// Returns an error if the command execution fails.
pub fn execute(cli: Cli) -> anyhow::Result<ExitCode> {
    match cli.command {
        Command::Run(args) => run::execute(&args),
        Command::Info(args) => info::execute(&args),
    }
}
