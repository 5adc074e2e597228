//! Subject lifecycle guard.
//!
//! A [`SubjectProcess`] owns the forked child from the moment `fork(2)`
//! returns. Dropping it kills the subject if it may still be alive and reaps
//! it, so every path out of the supervisor (success, error, early stop)
//! leaves no zombie behind. A subject whose exit was already observed
//! through [`SubjectProcess::wait`] is not touched again.

use nix::errno::Errno;
use nix::sys::wait::WaitStatus;
use nix::unistd::Pid;

use crate::classify::StopEvent;
use crate::ops::TraceOps;

/// The traced child and its last observed status.
pub struct SubjectProcess<'a, O: TraceOps> {
    ops: &'a O,
    name: &'a str,
    pid: Pid,
    last_status: Option<WaitStatus>,
    reaped: bool,
}

impl<'a, O: TraceOps> SubjectProcess<'a, O> {
    /// Takes ownership of a freshly forked subject.
    pub const fn new(ops: &'a O, name: &'a str, pid: Pid) -> Self {
        Self {
            ops,
            name,
            pid,
            last_status: None,
            reaped: false,
        }
    }

    /// Subject process id.
    pub const fn pid(&self) -> Pid {
        self.pid
    }

    /// The most recent status returned by [`Self::wait`].
    pub const fn last_status(&self) -> Option<WaitStatus> {
        self.last_status
    }

    /// Whether the subject has already been reaped.
    pub const fn is_reaped(&self) -> bool {
        self.reaped
    }

    /// Blocks for the subject's next state change and records it.
    ///
    /// # Errors
    ///
    /// Returns the errno of a failed wait.
    pub fn wait(&mut self) -> nix::Result<WaitStatus> {
        let status = self.ops.wait(self.pid)?;
        self.last_status = Some(status);
        if StopEvent::from(status).is_terminal() {
            self.reaped = true;
        }
        Ok(status)
    }

    /// Kills the subject if needed and reaps it. Idempotent.
    pub fn terminate(&mut self) {
        if self.reaped {
            return;
        }
        match self.ops.kill(self.pid) {
            Ok(()) | Err(Errno::ESRCH) => {}
            Err(e) => tracing::warn!(name = self.name, pid = %self.pid, error = %e, "kill failed"),
        }
        loop {
            match self.wait() {
                Ok(status) if self.reaped => {
                    tracing::debug!(name = self.name, pid = %self.pid, ?status, "subject reaped");
                    break;
                }
                Ok(_) | Err(Errno::EINTR) => {}
                Err(e) => {
                    // The count is already final; a failed reap is only a diagnostic.
                    tracing::warn!(name = self.name, pid = %self.pid, error = %e, "waitpid failed while reaping subject");
                    self.reaped = true;
                    break;
                }
            }
        }
    }
}

impl<O: TraceOps> Drop for SubjectProcess<'_, O> {
    fn drop(&mut self) {
        self.terminate();
    }
}

#[cfg(test)]
mod tests {
    use nix::sys::signal::Signal;

    use super::*;
    use crate::fake::{Call, ScriptedOps};

    const PID: i32 = 4242;

    fn pid() -> Pid {
        Pid::from_raw(PID)
    }

    #[test]
    fn drop_kills_and_reaps_a_live_subject() {
        let ops = ScriptedOps::new().waits([Ok(WaitStatus::Signaled(pid(), Signal::SIGKILL, false))]);
        {
            let _subject = SubjectProcess::new(&ops, "ptrace", pid());
        }
        assert_eq!(ops.calls(), vec![Call::Kill, Call::Wait]);
    }

    #[test]
    fn observed_exit_is_not_reaped_twice() {
        let ops = ScriptedOps::new().waits([Ok(WaitStatus::Exited(pid(), 0))]);
        {
            let mut subject = SubjectProcess::new(&ops, "ptrace", pid());
            let _ = subject.wait().unwrap();
            assert!(subject.is_reaped());
        }
        assert_eq!(ops.calls(), vec![Call::Wait]);
    }

    #[test]
    fn reap_skips_pending_stops_and_retries_interrupted_waits() {
        let ops = ScriptedOps::new().waits([
            Ok(WaitStatus::PtraceSyscall(pid())),
            Err(Errno::EINTR),
            Ok(WaitStatus::Signaled(pid(), Signal::SIGKILL, false)),
        ]);
        let mut subject = SubjectProcess::new(&ops, "ptrace", pid());
        subject.terminate();
        assert!(subject.is_reaped());
        assert_eq!(
            subject.last_status(),
            Some(WaitStatus::Signaled(pid(), Signal::SIGKILL, false))
        );
        drop(subject);
        assert_eq!(ops.calls(), vec![Call::Kill, Call::Wait, Call::Wait, Call::Wait]);
    }

    #[test]
    fn failed_reap_is_not_retried() {
        let ops = ScriptedOps::new().kill_result(Err(Errno::ESRCH)).waits([Err(Errno::ECHILD)]);
        let mut subject = SubjectProcess::new(&ops, "ptrace", pid());
        subject.terminate();
        subject.terminate();
        assert!(subject.is_reaped());
        drop(subject);
        assert_eq!(ops.calls(), vec![Call::Kill, Call::Wait]);
    }
}
