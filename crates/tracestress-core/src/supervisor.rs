//! Tracer-side control loop.
//!
//! The supervisor forks the subject, waits for its self-stop, enables
//! `PTRACE_O_TRACESYSGOOD`, then alternates strictly between one
//! "run to the next syscall boundary" request and one blocking wait. Every
//! boundary stop, entry and exit alike, counts as one event, so a single
//! syscall contributes two.
//!
//! Fatal conditions (fork failure, a handshake wait failing with anything
//! but `EINTR`, a failed `PTRACE_SETOPTIONS`) are logged once and returned
//! as errors. Everything else ends the loop with a [`StopReason`]. The subject
//! is killed and reaped on every path by [`SubjectProcess`].

use nix::errno::Errno;
use tracestress_common::error::{Result, StressError};
use tracestress_common::types::{RunContext, StopReason, TraceReport};

use crate::classify::StopEvent;
use crate::guard::SubjectProcess;
use crate::ops::TraceOps;

/// Result of one resume/wait round trip, or of several when the subject
/// reports stops that are not syscall boundaries.
enum Boundary {
    Reached,
    Stopped(StopReason),
}

/// Runs one complete trace session against `ops`.
///
/// # Errors
///
/// Returns [`StressError::CreationFailure`] if the subject cannot be forked,
/// [`StressError::FacilityFailure`] if syscall stops cannot be enabled, and
/// [`StressError::WaitFailure`] if the handshake wait fails for a reason
/// other than signal interruption.
pub fn trace<O: TraceOps>(ops: &O, ctx: &RunContext) -> Result<TraceReport> {
    let pid = ops.spawn_subject(ctx).map_err(|source| {
        tracing::error!(name = %ctx.name, instance = ctx.instance, error = %source, "fork failed");
        StressError::CreationFailure {
            name: ctx.name.clone(),
            source,
        }
    })?;
    tracing::debug!(name = %ctx.name, instance = ctx.instance, %pid, "subject forked");

    let mut subject = SubjectProcess::new(ops, &ctx.name, pid);
    if let Some(pgrp) = ctx.pgrp {
        // The subject joins from its side too; losing this race is harmless.
        if let Err(e) = ops.join_group(pid, pgrp) {
            tracing::debug!(%pid, %pgrp, error = %e, "setpgid from tracer failed");
        }
    }

    let (counted, stop) = supervise(ops, &mut subject, ctx)?;
    subject.terminate();

    tracing::info!(
        name = %ctx.name,
        instance = ctx.instance,
        %pid,
        counted,
        ops = ctx.ops(),
        %stop,
        "trace finished"
    );
    Ok(TraceReport {
        subject_pid: pid.as_raw(),
        counted,
        stop,
    })
}

fn supervise<O: TraceOps>(
    ops: &O,
    subject: &mut SubjectProcess<'_, O>,
    ctx: &RunContext,
) -> Result<(u64, StopReason)> {
    let pid = subject.pid();

    // Handshake: the subject's self-stop, or its exit if it could not attach.
    match subject.wait() {
        Ok(status) if StopEvent::from(status).is_terminal() => {
            tracing::debug!(%pid, ?status, "subject exited before tracing began");
            return Ok((0, StopReason::SubjectExited));
        }
        Ok(status) => tracing::trace!(%pid, ?status, "subject stopped for handshake"),
        Err(Errno::EINTR) => return Ok((0, StopReason::WaitInterrupted)),
        Err(source) => return Err(wait_failure(ctx, pid.as_raw(), source)),
    }

    ops.enable_syscall_stops(pid).map_err(|source| {
        tracing::error!(name = %ctx.name, %pid, error = %source, "PTRACE_SETOPTIONS failed");
        StressError::FacilityFailure {
            name: ctx.name.clone(),
            request: "PTRACE_SETOPTIONS",
            pid: pid.as_raw(),
            source,
        }
    })?;

    let mut counted = 0;
    loop {
        if !ctx.keep_running() {
            return Ok((counted, StopReason::RunFlagCleared));
        }
        if ctx.bound_reached() {
            return Ok((counted, StopReason::BoundReached));
        }
        match next_boundary(ops, subject, ctx)? {
            Boundary::Reached if ctx.keep_running() => {
                let _ = ctx.bump();
                counted += 1;
            }
            Boundary::Reached => return Ok((counted, StopReason::RunFlagCleared)),
            Boundary::Stopped(reason) => return Ok((counted, reason)),
        }
    }
}

/// Resumes the subject until the next syscall-boundary stop.
fn next_boundary<O: TraceOps>(
    ops: &O,
    subject: &mut SubjectProcess<'_, O>,
    ctx: &RunContext,
) -> Result<Boundary> {
    let pid = subject.pid();
    while ctx.keep_running() {
        if let Err(e) = ops.resume_to_syscall(pid) {
            tracing::warn!(name = %ctx.name, %pid, error = %e, "PTRACE_SYSCALL failed");
            return Ok(Boundary::Stopped(StopReason::FacilityFailure { errno: e as i32 }));
        }
        match subject.wait() {
            Ok(status) => match StopEvent::from(status) {
                StopEvent::SyscallBoundary => return Ok(Boundary::Reached),
                StopEvent::Exited => return Ok(Boundary::Stopped(StopReason::SubjectExited)),
                StopEvent::Other => tracing::trace!(%pid, ?status, "non-syscall stop"),
            },
            Err(Errno::EINTR) => return Ok(Boundary::Stopped(StopReason::WaitInterrupted)),
            Err(e) => {
                tracing::error!(name = %ctx.name, %pid, error = %e, "waitpid failed");
                return Ok(Boundary::Stopped(StopReason::WaitFailed { errno: e as i32 }));
            }
        }
    }
    Ok(Boundary::Stopped(StopReason::RunFlagCleared))
}

fn wait_failure(ctx: &RunContext, pid: i32, source: Errno) -> StressError {
    tracing::error!(name = %ctx.name, pid, error = %source, "waitpid failed");
    StressError::WaitFailure {
        name: ctx.name.clone(),
        pid,
        source,
    }
}
