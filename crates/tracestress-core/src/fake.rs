//! Scripted in-memory [`TraceOps`] for driving the supervisor in unit tests.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use nix::errno::Errno;
use nix::sys::wait::WaitStatus;
use nix::unistd::Pid;
use tracestress_common::types::RunContext;

use crate::ops::TraceOps;

/// A recorded facility call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Call {
    Spawn,
    JoinGroup,
    SetOptions,
    Resume,
    Wait,
    Kill,
}

pub struct ScriptedOps {
    spawn: nix::Result<Pid>,
    join: nix::Result<()>,
    set_options: nix::Result<()>,
    kill: nix::Result<()>,
    resumes: RefCell<VecDeque<nix::Result<()>>>,
    waits: RefCell<VecDeque<nix::Result<WaitStatus>>>,
    clear_after_waits: Option<(usize, Arc<AtomicBool>)>,
    calls: RefCell<Vec<Call>>,
}

impl ScriptedOps {
    pub fn new() -> Self {
        Self {
            spawn: Ok(Pid::from_raw(4242)),
            join: Ok(()),
            set_options: Ok(()),
            kill: Ok(()),
            resumes: RefCell::new(VecDeque::new()),
            waits: RefCell::new(VecDeque::new()),
            clear_after_waits: None,
            calls: RefCell::new(Vec::new()),
        }
    }

    pub fn spawn_result(mut self, result: nix::Result<Pid>) -> Self {
        self.spawn = result;
        self
    }

    pub fn join_result(mut self, result: nix::Result<()>) -> Self {
        self.join = result;
        self
    }

    pub fn set_options_result(mut self, result: nix::Result<()>) -> Self {
        self.set_options = result;
        self
    }

    pub fn kill_result(mut self, result: nix::Result<()>) -> Self {
        self.kill = result;
        self
    }

    /// Resume results in order; once exhausted every resume succeeds.
    pub fn resumes(self, results: impl IntoIterator<Item = nix::Result<()>>) -> Self {
        self.resumes.borrow_mut().extend(results);
        self
    }

    /// Wait results in order; once exhausted every wait fails with `ECHILD`.
    pub fn waits(self, results: impl IntoIterator<Item = nix::Result<WaitStatus>>) -> Self {
        self.waits.borrow_mut().extend(results);
        self
    }

    /// Clears `run` as soon as the `n`th wait returns.
    pub fn clear_run_after_waits(mut self, n: usize, run: Arc<AtomicBool>) -> Self {
        self.clear_after_waits = Some((n, run));
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.borrow().clone()
    }

    pub fn count(&self, call: Call) -> usize {
        self.calls.borrow().iter().filter(|c| **c == call).count()
    }

    fn record(&self, call: Call) {
        self.calls.borrow_mut().push(call);
    }
}

impl TraceOps for ScriptedOps {
    fn spawn_subject(&self, _ctx: &RunContext) -> nix::Result<Pid> {
        self.record(Call::Spawn);
        self.spawn
    }

    fn join_group(&self, _pid: Pid, _pgrp: Pid) -> nix::Result<()> {
        self.record(Call::JoinGroup);
        self.join
    }

    fn enable_syscall_stops(&self, _pid: Pid) -> nix::Result<()> {
        self.record(Call::SetOptions);
        self.set_options
    }

    fn resume_to_syscall(&self, _pid: Pid) -> nix::Result<()> {
        self.record(Call::Resume);
        self.resumes.borrow_mut().pop_front().unwrap_or(Ok(()))
    }

    fn wait(&self, _pid: Pid) -> nix::Result<WaitStatus> {
        self.record(Call::Wait);
        let result = self.waits.borrow_mut().pop_front().unwrap_or(Err(Errno::ECHILD));
        if let Some((n, run)) = &self.clear_after_waits {
            if self.count(Call::Wait) >= *n {
                run.store(false, Ordering::Relaxed);
            }
        }
        result
    }

    fn kill(&self, _pid: Pid) -> nix::Result<()> {
        self.record(Call::Kill);
        self.kill
    }
}
