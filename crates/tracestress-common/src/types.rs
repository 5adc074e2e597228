//! Run context and outcome types exchanged between the harness and a stressor.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use nix::errno::Errno;
use nix::unistd::Pid;
use serde::{Deserialize, Serialize};

use crate::constants::{EXIT_FAILURE, EXIT_NOT_IMPLEMENTED, EXIT_SUCCESS};
use crate::error::Result;

/// Per-invocation state owned by the harness and lent to a stressor.
///
/// The stressor only ever increments [`RunContext::bump`] and reads the run
/// flag. Cloning the context shares the counter and the flag.
#[derive(Debug, Clone)]
pub struct RunContext {
    /// Stressor name, used for diagnostics only.
    pub name: String,
    /// Instance number within the harness.
    pub instance: u32,
    /// Upper bound on counted events, `None` when unbounded.
    pub max_ops: Option<u64>,
    /// Process group the subject joins, if any.
    pub pgrp: Option<Pid>,
    /// Whether the subject asks for `SIGKILL` when its parent dies.
    pub parent_death_signal: bool,
    counter: Arc<AtomicU64>,
    run: Arc<AtomicBool>,
}

impl RunContext {
    /// Creates an unbounded context with a fresh counter and a set run flag.
    #[must_use]
    pub fn new(name: impl Into<String>, instance: u32) -> Self {
        Self {
            name: name.into(),
            instance,
            max_ops: None,
            pgrp: None,
            parent_death_signal: true,
            counter: Arc::new(AtomicU64::new(0)),
            run: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Bounds the counter. Zero means unbounded.
    #[must_use]
    pub fn with_max_ops(mut self, max_ops: u64) -> Self {
        self.max_ops = (max_ops > 0).then_some(max_ops);
        self
    }

    /// Places the subject into the given process group.
    #[must_use]
    pub const fn with_process_group(mut self, pgrp: Pid) -> Self {
        self.pgrp = Some(pgrp);
        self
    }

    /// Toggles the parent-death signal request in the subject.
    #[must_use]
    pub const fn with_parent_death_signal(mut self, enabled: bool) -> Self {
        self.parent_death_signal = enabled;
        self
    }

    /// Shares an existing counter with the harness.
    #[must_use]
    pub fn with_shared_counter(mut self, counter: Arc<AtomicU64>) -> Self {
        self.counter = counter;
        self
    }

    /// Shares an existing run flag with the harness.
    #[must_use]
    pub fn with_run_flag(mut self, run: Arc<AtomicBool>) -> Self {
        self.run = run;
        self
    }

    /// Returns whether the cooperative run flag is still set.
    pub fn keep_running(&self) -> bool {
        self.run.load(Ordering::Relaxed)
    }

    /// Clears the run flag.
    pub fn stop(&self) {
        self.run.store(false, Ordering::Relaxed);
    }

    /// Returns the current counter value.
    pub fn ops(&self) -> u64 {
        self.counter.load(Ordering::Relaxed)
    }

    /// Returns whether the counter has reached the configured bound.
    pub fn bound_reached(&self) -> bool {
        self.max_ops.is_some_and(|max| self.ops() >= max)
    }

    /// Increments the counter by one and returns the new value.
    pub fn bump(&self) -> u64 {
        self.counter.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Returns a handle to the shared run flag.
    #[must_use]
    pub fn run_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.run)
    }
}

/// Why a trace loop stopped without a fatal error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// The run flag was cleared.
    RunFlagCleared,
    /// The counter reached `max_ops`.
    BoundReached,
    /// The subject exited or was killed on its own.
    SubjectExited,
    /// A resume request failed once tracing was established.
    FacilityFailure {
        /// Raw errno of the failed request.
        errno: i32,
    },
    /// A blocking wait was interrupted by a signal.
    WaitInterrupted,
    /// A wait failed once tracing was established.
    WaitFailed {
        /// Raw errno of the failed wait.
        errno: i32,
    },
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RunFlagCleared => write!(f, "run flag cleared"),
            Self::BoundReached => write!(f, "bound reached"),
            Self::SubjectExited => write!(f, "subject exited"),
            Self::FacilityFailure { errno } => {
                write!(f, "resume failed ({})", Errno::from_raw(*errno))
            }
            Self::WaitInterrupted => write!(f, "wait interrupted"),
            Self::WaitFailed { errno } => {
                write!(f, "wait failed ({})", Errno::from_raw(*errno))
            }
        }
    }
}

/// Summary of one completed trace run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceReport {
    /// Process id of the (now reaped) subject.
    pub subject_pid: i32,
    /// Syscall-boundary stops counted during this invocation.
    pub counted: u64,
    /// Why the loop ended.
    pub stop: StopReason,
}

/// Non-failure result of a stressor invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StressOutcome {
    /// The stressor ran and its counter is final.
    Completed(TraceReport),
    /// The platform lacks the facility this stressor exercises.
    NotImplemented {
        /// Human-readable explanation.
        reason: String,
    },
}

impl StressOutcome {
    /// Returns the trace report when the stressor actually ran.
    #[must_use]
    pub const fn report(&self) -> Option<&TraceReport> {
        match self {
            Self::Completed(report) => Some(report),
            Self::NotImplemented { .. } => None,
        }
    }
}

/// Maps a stressor result onto the harness' process exit codes.
#[must_use]
pub const fn exit_code(result: &Result<StressOutcome>) -> i32 {
    match result {
        Ok(StressOutcome::Completed(_)) => EXIT_SUCCESS,
        Ok(StressOutcome::NotImplemented { .. }) => EXIT_NOT_IMPLEMENTED,
        Err(_) => EXIT_FAILURE,
    }
}
