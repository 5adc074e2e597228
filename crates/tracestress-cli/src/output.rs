//! Formatted output helpers for CLI commands.
//!
//! Human summaries go to stderr with ANSI highlighting; `--json`
//! summaries go to stdout so they can be piped.

use crate::commands::run::RunSummary;

const BOLD: &str = "\x1b[1m";
const DIM: &str = "\x1b[2m";
const GREEN: &str = "\x1b[32m";
const RED: &str = "\x1b[31m";
const YELLOW: &str = "\x1b[33m";
const RESET: &str = "\x1b[0m";

/// Events per second, or zero for an empty interval.
#[allow(clippy::cast_precision_loss)]
#[must_use]
pub fn rate(ops: u64, elapsed_secs: f64) -> f64 {
    if elapsed_secs > 0.0 {
        ops as f64 / elapsed_secs
    } else {
        0.0
    }
}

/// Formats an event rate with a metric suffix (e.g., "1.2M/s").
#[must_use]
pub fn format_rate(per_sec: f64) -> String {
    if per_sec >= 1_000_000.0 {
        format!("{:.1}M/s", per_sec / 1_000_000.0)
    } else if per_sec >= 1_000.0 {
        format!("{:.1}k/s", per_sec / 1_000.0)
    } else {
        format!("{per_sec:.1}/s")
    }
}

/// Prints the human-readable run summary.
#[allow(clippy::print_stderr)]
pub fn print_summary(summary: &RunSummary) {
    eprintln!();
    eprintln!(
        "  {BOLD}{}{RESET} {DIM}started {}{RESET}",
        summary.stressor,
        summary.started_at.to_rfc3339()
    );
    for inst in &summary.instances {
        let (color, detail) = match (inst.stop, &inst.error) {
            (Some(stop), _) => (GREEN, stop.to_string()),
            (None, Some(error)) if inst.status == "not_implemented" => (YELLOW, error.clone()),
            (None, Some(error)) => (RED, error.clone()),
            (None, None) => (DIM, String::new()),
        };
        eprintln!(
            "    {color}●{RESET} #{:<3} {:>12} stops  {DIM}{}{RESET}",
            inst.instance, inst.ops, detail
        );
    }
    eprintln!();
    eprintln!(
        "  {BOLD}{} syscall stops{RESET} in {:.2}s ({})",
        summary.total_ops,
        summary.elapsed_secs,
        format_rate(summary.ops_per_sec)
    );
}

/// Prints the run summary as pretty JSON on stdout.
///
/// # Errors
///
/// Returns an error if serialization fails.
#[allow(clippy::print_stdout)]
pub fn print_json(summary: &RunSummary) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(summary)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_of_empty_interval_is_zero() {
        assert!(rate(100, 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn format_rate_plain() {
        assert_eq!(format_rate(512.0), "512.0/s");
    }

    #[test]
    fn format_rate_thousands() {
        assert_eq!(format_rate(2_500.0), "2.5k/s");
    }

    #[test]
    fn format_rate_millions() {
        assert_eq!(format_rate(3_000_000.0), "3.0M/s");
    }
}
