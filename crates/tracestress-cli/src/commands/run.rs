//! `tstress run` — Run stressor instances until a bound, timeout, or Ctrl+C.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};

use clap::Args;
use nix::unistd::getpgrp;
use serde::Serialize;
use tracestress_common::config::StressConfig;
use tracestress_common::constants::{
    EXIT_FAILURE, EXIT_NOT_IMPLEMENTED, EXIT_SUCCESS, PTRACE_STRESSOR,
};
use tracestress_common::error::Result as StressResult;
use tracestress_common::types::{RunContext, StopReason, StressOutcome, exit_code};
use tracestress_core::detect_stressor;

use crate::output;

/// Arguments for the `run` command.
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Number of concurrent stressor instances.
    #[arg(short = 'n', long)]
    pub instances: Option<u32>,

    /// Stop each instance after this many syscall stops (0 = unbounded).
    #[arg(long)]
    pub max_ops: Option<u64>,

    /// Stop all instances after this many seconds (0 = until Ctrl+C).
    #[arg(short, long)]
    pub timeout: Option<u64>,

    /// JSON configuration file; flags override its values.
    #[arg(short, long, env = "TSTRESS_CONFIG")]
    pub config: Option<PathBuf>,

    /// Skip the explicit setpgid; subjects stay in the process group they
    /// inherit from the harness.
    #[arg(long)]
    pub no_pgrp: bool,

    /// Do not ask subjects to die with their tracer.
    #[arg(long)]
    pub no_pdeathsig: bool,

    /// Print the summary as JSON on stdout.
    #[arg(long)]
    pub json: bool,
}

/// Per-instance line of the run summary.
#[derive(Debug, Clone, Serialize)]
pub struct InstanceSummary {
    /// Instance number.
    pub instance: u32,
    /// Final counter value.
    pub ops: u64,
    /// `completed`, `not_implemented`, or `failed`.
    pub status: &'static str,
    /// Why the trace loop stopped, when it ran.
    pub stop: Option<StopReason>,
    /// Failure message, when it failed.
    pub error: Option<String>,
}

/// Aggregated result of a run.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    /// Stressor name.
    pub stressor: &'static str,
    /// Wall-clock start of the run.
    pub started_at: chrono::DateTime<chrono::Utc>,
    /// Elapsed seconds.
    pub elapsed_secs: f64,
    /// Sum of all instance counters.
    pub total_ops: u64,
    /// `total_ops / elapsed_secs`.
    pub ops_per_sec: f64,
    /// Per-instance results.
    pub instances: Vec<InstanceSummary>,
    /// Process exit code for the whole run.
    pub exit_code: i32,
}

/// Executes the `run` command.
///
/// # Errors
///
/// Returns an error if the configuration is invalid or the Ctrl+C handler
/// cannot be installed.
pub fn execute(args: &RunArgs) -> anyhow::Result<ExitCode> {
    let config = resolve_config(args).map_err(|e| anyhow::anyhow!("{e}"))?;

    let run = Arc::new(AtomicBool::new(true));
    let r = Arc::clone(&run);
    ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    })
    .map_err(|e| anyhow::anyhow!("failed to set Ctrl+C handler: {e}"))?;

    tracing::info!(
        instances = config.instances,
        max_ops = config.max_ops,
        timeout_secs = config.timeout_secs,
        "starting ptrace stressor"
    );

    let started_at = chrono::Utc::now();
    let start = Instant::now();
    let instances = run_instances(&config, &run);
    let summary = summarize(started_at, start.elapsed(), instances);

    if args.json {
        output::print_json(&summary)?;
    } else {
        output::print_summary(&summary);
    }

    Ok(ExitCode::from(u8::try_from(summary.exit_code).unwrap_or(1)))
}

/// Loads the config file (if any) and applies flag overrides.
fn resolve_config(args: &RunArgs) -> StressResult<StressConfig> {
    let mut config = match &args.config {
        Some(path) => StressConfig::load(path)?,
        None => StressConfig::default(),
    };
    if let Some(instances) = args.instances {
        config.instances = instances;
    }
    if let Some(max_ops) = args.max_ops {
        config.max_ops = max_ops;
    }
    if let Some(timeout) = args.timeout {
        config.timeout_secs = timeout;
    }
    if args.no_pgrp {
        config.join_process_group = false;
    }
    if args.no_pdeathsig {
        config.parent_death_signal = false;
    }
    config.validate()?;
    Ok(config)
}

/// Runs every instance on its own thread and clears `run` on timeout.
fn run_instances(
    config: &StressConfig,
    run: &Arc<AtomicBool>,
) -> Vec<(u32, u64, StressResult<StressOutcome>)> {
    let pgrp = config.join_process_group.then(getpgrp);
    let (done_tx, done_rx) = mpsc::channel::<()>();

    thread::scope(|scope| {
        if config.timeout_secs > 0 {
            let timeout = Duration::from_secs(config.timeout_secs);
            let run = Arc::clone(run);
            let _ = scope.spawn(move || {
                if matches!(done_rx.recv_timeout(timeout), Err(RecvTimeoutError::Timeout)) {
                    tracing::info!(?timeout, "timeout reached, stopping instances");
                    run.store(false, Ordering::SeqCst);
                }
            });
        }

        let handles: Vec<_> = (0..config.instances)
            .map(|instance| {
                let mut ctx = RunContext::new(PTRACE_STRESSOR, instance)
                    .with_max_ops(config.max_ops)
                    .with_run_flag(Arc::clone(run))
                    .with_parent_death_signal(config.parent_death_signal);
                if let Some(pgrp) = pgrp {
                    ctx = ctx.with_process_group(pgrp);
                }
                scope.spawn(move || {
                    let result = detect_stressor().run(&ctx);
                    (instance, ctx.ops(), result)
                })
            })
            .collect();

        let results = handles
            .into_iter()
            .zip(0..)
            .map(|(handle, instance)| {
                handle.join().unwrap_or_else(|_| {
                    tracing::error!(instance, "stressor thread panicked");
                    (
                        instance,
                        0,
                        Err(tracestress_common::error::StressError::Config {
                            message: format!("instance {instance} panicked"),
                        }),
                    )
                })
            })
            .collect();
        drop(done_tx);
        results
    })
}

fn summarize(
    started_at: chrono::DateTime<chrono::Utc>,
    elapsed: Duration,
    results: Vec<(u32, u64, StressResult<StressOutcome>)>,
) -> RunSummary {
    let codes: Vec<i32> = results.iter().map(|(_, _, r)| exit_code(r)).collect();
    let instances: Vec<InstanceSummary> = results
        .into_iter()
        .map(|(instance, ops, result)| match result {
            Ok(StressOutcome::Completed(report)) => InstanceSummary {
                instance,
                ops,
                status: "completed",
                stop: Some(report.stop),
                error: None,
            },
            Ok(StressOutcome::NotImplemented { reason }) => InstanceSummary {
                instance,
                ops,
                status: "not_implemented",
                stop: None,
                error: Some(reason),
            },
            Err(e) => InstanceSummary {
                instance,
                ops,
                status: "failed",
                stop: None,
                error: Some(e.to_string()),
            },
        })
        .collect();

    let total_ops = instances.iter().map(|i| i.ops).sum();
    let elapsed_secs = elapsed.as_secs_f64();
    RunSummary {
        stressor: PTRACE_STRESSOR,
        started_at,
        elapsed_secs,
        total_ops,
        ops_per_sec: output::rate(total_ops, elapsed_secs),
        instances,
        exit_code: combine_exit_codes(&codes),
    }
}

/// Any failure fails the run; otherwise an all-unsupported run is "not implemented".
fn combine_exit_codes(codes: &[i32]) -> i32 {
    if codes.contains(&EXIT_FAILURE) {
        EXIT_FAILURE
    } else if !codes.is_empty() && codes.iter().all(|c| *c == EXIT_NOT_IMPLEMENTED) {
        EXIT_NOT_IMPLEMENTED
    } else {
        EXIT_SUCCESS
    }
}
