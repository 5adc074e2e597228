//! `tstress info` — Report whether this host can run the ptrace stressor.

use std::process::ExitCode;

use clap::Args;
use serde::Serialize;
use tracestress_core::detect_stressor;

/// Yama LSM ptrace policy file.
const YAMA_PTRACE_SCOPE: &str = "/proc/sys/kernel/yama/ptrace_scope";

/// Arguments for the `info` command.
#[derive(Args, Debug)]
pub struct InfoArgs {
    /// Print as JSON on stdout.
    #[arg(long)]
    pub json: bool,
}

/// Host capabilities relevant to the ptrace stressor.
#[derive(Debug, Clone, Serialize)]
pub struct PlatformInfo {
    /// Host operating system name.
    pub os: String,
    /// Host CPU architecture.
    pub arch: String,
    /// Whether the stressor was built with ptrace support.
    pub ptrace_supported: bool,
    /// Yama `ptrace_scope`, when the LSM is present.
    pub yama_ptrace_scope: Option<u8>,
}

impl PlatformInfo {
    /// Scope 3 forbids `PTRACE_TRACEME`; subjects then exit without being counted.
    #[must_use]
    pub fn traceme_allowed(&self) -> bool {
        self.ptrace_supported && self.yama_ptrace_scope.is_none_or(|scope| scope < 3)
    }
}

/// Collects host information.
#[must_use]
pub fn platform_info() -> PlatformInfo {
    PlatformInfo {
        os: std::env::consts::OS.to_string(),
        arch: std::env::consts::ARCH.to_string(),
        ptrace_supported: detect_stressor().is_supported(),
        yama_ptrace_scope: std::fs::read_to_string(YAMA_PTRACE_SCOPE)
            .ok()
            .and_then(|s| s.trim().parse().ok()),
    }
}

/// Executes the `info` command.
///
/// # Errors
///
/// Returns an error if JSON serialization fails.
#[allow(clippy::print_stdout, clippy::print_stderr)]
pub fn execute(args: &InfoArgs) -> anyhow::Result<ExitCode> {
    let info = platform_info();
    if args.json {
        println!("{}", serde_json::to_string_pretty(&info)?);
    } else {
        eprintln!("  os:               {} ({})", info.os, info.arch);
        eprintln!("  ptrace stressor:  {}", if info.ptrace_supported { "available" } else { "not implemented" });
        eprintln!(
            "  yama ptrace_scope: {}",
            info.yama_ptrace_scope.map_or_else(|| "absent".to_string(), |s| s.to_string())
        );
        eprintln!("  traceme allowed:  {}", info.traceme_allowed());
    }
    Ok(ExitCode::SUCCESS)
}
