//! The traced subject.
//!
//! Runs only inside the forked child. The child asks to be traced, stops
//! itself so the tracer can arm syscall stops, then spins on cheap identity
//! and time queries until its run flag clears or the tracer kills it.
//!
//! Nothing here may allocate, lock, or log: the parent may have been
//! multi-threaded at fork time.
//!
//! The run flag polled by the loop is the subject's own post-fork copy. Only
//! a flag already cleared at fork time stops the workload from the inside;
//! a flag cleared later by the harness is seen by the tracer alone, which then
//! ends the subject with `SIGKILL`.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use nix::sys::prctl;
use nix::sys::ptrace;
use nix::sys::signal::{Signal, raise};
use nix::time::{ClockId, clock_gettime};
use nix::unistd::{
    Pid, getegid, geteuid, getgid, getpgrp, getppid, getuid, setpgid, write,
};
use tracestress_common::constants::EXIT_SUCCESS;
use tracestress_common::types::RunContext;

/// Everything the subject needs, captured before fork.
#[derive(Debug)]
pub struct SubjectPlan {
    run: Arc<AtomicBool>,
    pgrp: Option<Pid>,
    parent_death_signal: bool,
    attach_denied: String,
}

impl SubjectPlan {
    /// Captures the subject's view of a run context.
    #[must_use]
    pub fn new(ctx: &RunContext) -> Self {
        Self {
            run: ctx.run_flag(),
            pgrp: ctx.pgrp,
            parent_death_signal: ctx.parent_death_signal,
            attach_denied: format!(
                "{}: ptrace child being traced already, aborting\n",
                ctx.name
            ),
        }
    }

    /// Diagnostic written when the subject cannot be traced.
    #[must_use]
    pub fn attach_denied_message(&self) -> &str {
        &self.attach_denied
    }
}

/// Subject entry point. Never returns.
pub fn run(plan: &SubjectPlan) -> ! {
    if let Some(pgrp) = plan.pgrp {
        let _ = setpgid(Pid::from_raw(0), pgrp);
    }
    if plan.parent_death_signal {
        let _ = prctl::set_pdeathsig(Signal::SIGKILL);
    }

    // A foreign tracer makes counting meaningless; leave quietly.
    if ptrace::traceme().is_err() {
        let _ = write(std::io::stderr(), plan.attach_denied.as_bytes());
        exit_now(EXIT_SUCCESS);
    }

    // The tracer's first wait observes this stop.
    let _ = raise(Signal::SIGSTOP);

    while plan.run.load(Ordering::Relaxed) {
        syscall_mix();
    }
    exit_now(EXIT_SUCCESS)
}

/// Leaves the process immediately, skipping atexit handlers and stdio flushes.
pub fn exit_now(code: i32) -> ! {
    // SAFETY: `_exit(2)` is async-signal-safe and touches no state inherited
    // from the parent's other threads.
    unsafe { libc::_exit(code) }
}

/// One round of side-effect-free syscalls.
fn syscall_mix() {
    let _ = getppid();
    let _ = getgid();
    let _ = getegid();
    let _ = getuid();
    let _ = geteuid();
    let _ = getpgrp();
    let _ = clock_gettime(ClockId::CLOCK_REALTIME);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plan_preformats_attach_diagnostic() {
        let ctx = RunContext::new("ptrace", 2);
        let plan = SubjectPlan::new(&ctx);
        assert_eq!(
            plan.attach_denied_message(),
            "ptrace: ptrace child being traced already, aborting\n"
        );
    }

    #[test]
    fn plan_shares_the_run_flag() {
        let ctx = RunContext::new("ptrace", 0).with_process_group(Pid::from_raw(77));
        let plan = SubjectPlan::new(&ctx);
        assert_eq!(plan.pgrp, Some(Pid::from_raw(77)));
        ctx.stop();
        assert!(!plan.run.load(Ordering::Relaxed));
    }
}
