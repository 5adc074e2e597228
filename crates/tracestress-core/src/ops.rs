//! Kernel facility seam for the trace loop.
//!
//! [`TraceOps`] is the narrow set of blocking calls the supervisor and the
//! lifecycle guard make. [`Ptrace`] maps them onto `fork(2)`, `ptrace(2)`,
//! `waitpid(2)`, and `kill(2)`.

use nix::sys::ptrace;
use nix::sys::signal::{Signal, kill};
use nix::sys::wait::{WaitStatus, waitpid};
use nix::unistd::{ForkResult, Pid, fork, setpgid};
use tracestress_common::types::RunContext;

use crate::subject::{self, SubjectPlan};

/// Blocking process-control calls used by the tracer.
pub trait TraceOps {
    /// Creates the subject and returns its pid. Does not return in the subject.
    ///
    /// # Errors
    ///
    /// Returns the errno of a failed `fork(2)`.
    fn spawn_subject(&self, ctx: &RunContext) -> nix::Result<Pid>;

    /// Moves the subject into a process group.
    ///
    /// # Errors
    ///
    /// Returns the errno of a failed `setpgid(2)`.
    fn join_group(&self, pid: Pid, pgrp: Pid) -> nix::Result<()>;

    /// Makes syscall stops distinguishable from signal stops.
    ///
    /// # Errors
    ///
    /// Returns the errno of a failed `PTRACE_SETOPTIONS`.
    fn enable_syscall_stops(&self, pid: Pid) -> nix::Result<()>;

    /// Lets the subject run until its next syscall boundary.
    ///
    /// # Errors
    ///
    /// Returns the errno of a failed `PTRACE_SYSCALL`.
    fn resume_to_syscall(&self, pid: Pid) -> nix::Result<()>;

    /// Blocks until the subject changes state.
    ///
    /// # Errors
    ///
    /// Returns the errno of a failed `waitpid(2)`, including `EINTR`.
    fn wait(&self, pid: Pid) -> nix::Result<WaitStatus>;

    /// Sends `SIGKILL` to the subject.
    ///
    /// # Errors
    ///
    /// Returns the errno of a failed `kill(2)`.
    fn kill(&self, pid: Pid) -> nix::Result<()>;
}

/// The real ptrace facility.
#[derive(Debug, Clone, Copy, Default)]
pub struct Ptrace;

impl TraceOps for Ptrace {
    fn spawn_subject(&self, ctx: &RunContext) -> nix::Result<Pid> {
        // Everything the child touches is prepared here, before fork.
        let plan = SubjectPlan::new(ctx);

        // SAFETY: the child only issues async-signal-safe syscalls through
        // `subject::run` and leaves with `_exit`, so it never touches locks or
        // allocator state inherited from other threads of the parent.
        match unsafe { fork() }? {
            ForkResult::Parent { child } => Ok(child),
            ForkResult::Child => subject::run(&plan),
        }
    }

    fn join_group(&self, pid: Pid, pgrp: Pid) -> nix::Result<()> {
        setpgid(pid, pgrp)
    }

    fn enable_syscall_stops(&self, pid: Pid) -> nix::Result<()> {
        ptrace::setoptions(pid, ptrace::Options::PTRACE_O_TRACESYSGOOD)
    }

    fn resume_to_syscall(&self, pid: Pid) -> nix::Result<()> {
        ptrace::syscall(pid, None)
    }

    fn wait(&self, pid: Pid) -> nix::Result<WaitStatus> {
        waitpid(pid, None)
    }

    fn kill(&self, pid: Pid) -> nix::Result<()> {
        kill(pid, Signal::SIGKILL)
    }
}
