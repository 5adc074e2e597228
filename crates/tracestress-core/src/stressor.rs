//! Stressor capability abstraction for platform-agnostic operation.

use tracestress_common::constants::PTRACE_STRESSOR;
use tracestress_common::error::Result;
use tracestress_common::types::{RunContext, StressOutcome};

/// A workload the harness can run against a [`RunContext`].
///
/// Implementors either exercise the kernel facility or, where it is
/// missing, report [`StressOutcome::NotImplemented`] without doing anything.
pub trait Stressor {
    /// Short stressor name.
    fn name(&self) -> &'static str;

    /// Runs one invocation, incrementing the context's counter.
    ///
    /// # Errors
    ///
    /// Returns an error if the invocation fails fatally.
    fn run(&self, ctx: &RunContext) -> Result<StressOutcome>;

    /// Returns whether this stressor does real work on the current platform.
    fn is_supported(&self) -> bool;
}

/// Ptrace stressor backed by a [`crate::ops::TraceOps`] facility.
#[cfg(target_os = "linux")]
#[derive(Debug, Clone, Default)]
pub struct PtraceStressor<O = crate::ops::Ptrace> {
    ops: O,
}

#[cfg(target_os = "linux")]
impl<O> PtraceStressor<O> {
    /// Creates a stressor over the given facility.
    pub const fn with_ops(ops: O) -> Self {
        Self { ops }
    }
}

#[cfg(target_os = "linux")]
impl PtraceStressor {
    /// Creates a stressor over the real ptrace facility.
    #[must_use]
    pub const fn new() -> Self {
        Self::with_ops(crate::ops::Ptrace)
    }
}

#[cfg(target_os = "linux")]
impl<O: crate::ops::TraceOps> Stressor for PtraceStressor<O> {
    fn name(&self) -> &'static str {
        PTRACE_STRESSOR
    }

    fn run(&self, ctx: &RunContext) -> Result<StressOutcome> {
        crate::supervisor::trace(&self.ops, ctx).map(StressOutcome::Completed)
    }

    fn is_supported(&self) -> bool {
        true
    }
}

/// Stand-in for platforms without the facility a stressor needs.
#[derive(Debug, Clone)]
pub struct UnsupportedStressor {
    name: &'static str,
    reason: &'static str,
}

impl UnsupportedStressor {
    /// Creates a stub for the named stressor.
    #[must_use]
    pub const fn new(name: &'static str, reason: &'static str) -> Self {
        Self { name, reason }
    }
}

impl Stressor for UnsupportedStressor {
    fn name(&self) -> &'static str {
        self.name
    }

    fn run(&self, ctx: &RunContext) -> Result<StressOutcome> {
        tracing::info!(name = %ctx.name, reason = self.reason, "stressor not implemented on this platform");
        Ok(StressOutcome::NotImplemented {
            reason: self.reason.to_string(),
        })
    }

    fn is_supported(&self) -> bool {
        false
    }
}

/// Selects the ptrace stressor variant for the build target.
#[must_use]
pub fn detect_stressor() -> Box<dyn Stressor> {
    #[cfg(target_os = "linux")]
    {
        Box::new(PtraceStressor::new())
    }
    #[cfg(not(target_os = "linux"))]
    {
        Box::new(UnsupportedStressor::new(
            PTRACE_STRESSOR,
            "PTRACE_SYSCALL syscall-stop tracing requires Linux",
        ))
    }
}

/// Runs the ptrace stressor once against `ctx`.
///
/// # Errors
///
/// Returns an error if the subject cannot be created or traced.
pub fn stress_ptrace(ctx: &RunContext) -> Result<StressOutcome> {
    detect_stressor().run(ctx)
}
