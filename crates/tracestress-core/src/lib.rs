//! # tracestress-core
//!
//! The ptrace stressor. A tracer forks a subject, attaches to it with
//! `PTRACE_TRACEME`, and counts every syscall-boundary stop the subject
//! produces while it spins on cheap identity and time queries.
//!
//! - **Classification**: raw wait statuses become [`classify::StopEvent`]s.
//! - **Subject**: the forked child's workload, see [`subject`].
//! - **Supervisor**: the tracer's resume/wait/count loop, see [`supervisor`].
//! - **Lifecycle**: [`guard::SubjectProcess`] kills and reaps the subject on
//!   every exit path.
//!
//! Hosts without ptrace get [`stressor::UnsupportedStressor`], selected at
//! build time by [`stressor::detect_stressor`].

#![allow(unsafe_code)]
#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

#[cfg(target_os = "linux")]
pub mod classify;
#[cfg(all(test, target_os = "linux"))]
mod fake;
#[cfg(target_os = "linux")]
pub mod guard;
#[cfg(target_os = "linux")]
pub mod ops;
pub mod stressor;
#[cfg(target_os = "linux")]
pub mod subject;
#[cfg(target_os = "linux")]
pub mod supervisor;

pub use stressor::{Stressor, detect_stressor, stress_ptrace};
