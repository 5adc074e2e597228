//! Syscall-stop classification.
//!
//! With `PTRACE_O_TRACESYSGOOD` enabled the kernel reports syscall stops as
//! `SIGTRAP | 0x80`, which separates them from genuine `SIGTRAP` deliveries.

use nix::sys::wait::WaitStatus;

/// Bit set in the stop signal of a syscall-boundary stop.
pub const SYSCALL_STOP_MARKER: i32 = 0x80;

/// What a single wait status means to the trace loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopEvent {
    /// The subject stopped at a syscall entry or exit.
    SyscallBoundary,
    /// The subject terminated, normally or by a signal.
    Exited,
    /// Any other change. Not counted and not terminal.
    Other,
}

impl StopEvent {
    /// Classifies a raw `waitpid(2)` status word.
    #[must_use]
    pub fn from_raw(status: i32) -> Self {
        if libc::WIFSTOPPED(status) && libc::WSTOPSIG(status) & SYSCALL_STOP_MARKER != 0 {
            Self::SyscallBoundary
        } else if libc::WIFEXITED(status) || libc::WIFSIGNALED(status) {
            Self::Exited
        } else {
            Self::Other
        }
    }

    /// Returns whether the subject is gone after this event.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Exited)
    }
}

impl From<WaitStatus> for StopEvent {
    fn from(status: WaitStatus) -> Self {
        match status {
            WaitStatus::PtraceSyscall(_) => Self::SyscallBoundary,
            WaitStatus::Exited(..) | WaitStatus::Signaled(..) => Self::Exited,
            _ => Self::Other,
        }
    }
}

#[cfg(test)]
mod tests {
    use nix::unistd::Pid;

    use super::*;

    const SYSCALL_STOP: i32 = ((libc::SIGTRAP | SYSCALL_STOP_MARKER) << 8) | 0x7f;
    const SIGSTOP_STOP: i32 = (libc::SIGSTOP << 8) | 0x7f;
    const SIGTRAP_STOP: i32 = (libc::SIGTRAP << 8) | 0x7f;
    const EXEC_EVENT_STOP: i32 = (libc::PTRACE_EVENT_EXEC << 16) | SIGTRAP_STOP;
    const EXITED_ZERO: i32 = 0;
    const EXITED_THREE: i32 = 3 << 8;
    const KILLED: i32 = libc::SIGKILL;
    const CONTINUED: i32 = 0xffff;

    #[test]
    fn marked_stop_is_a_syscall_boundary() {
        assert_eq!(StopEvent::from_raw(SYSCALL_STOP), StopEvent::SyscallBoundary);
    }

    #[test]
    fn plain_signal_stops_are_other() {
        assert_eq!(StopEvent::from_raw(SIGSTOP_STOP), StopEvent::Other);
        assert_eq!(StopEvent::from_raw(SIGTRAP_STOP), StopEvent::Other);
        assert_eq!(StopEvent::from_raw(EXEC_EVENT_STOP), StopEvent::Other);
        assert_eq!(StopEvent::from_raw(CONTINUED), StopEvent::Other);
    }

    #[test]
    fn exit_and_kill_are_terminal() {
        for raw in [EXITED_ZERO, EXITED_THREE, KILLED] {
            let event = StopEvent::from_raw(raw);
            assert_eq!(event, StopEvent::Exited, "status {raw:#x}");
            assert!(event.is_terminal());
        }
        assert!(!StopEvent::SyscallBoundary.is_terminal());
    }

    #[test]
    fn decoded_status_agrees_with_raw_classification() {
        let pid = Pid::from_raw(1234);
        for raw in [
            SYSCALL_STOP,
            SIGSTOP_STOP,
            SIGTRAP_STOP,
            EXEC_EVENT_STOP,
            EXITED_ZERO,
            EXITED_THREE,
            KILLED,
        ] {
            let decoded = WaitStatus::from_raw(pid, raw).unwrap();
            assert_eq!(
                StopEvent::from(decoded),
                StopEvent::from_raw(raw),
                "status {raw:#x} decoded as {decoded:?}"
            );
        }
    }

    #[test]
    fn still_alive_is_other() {
        assert_eq!(StopEvent::from(WaitStatus::StillAlive), StopEvent::Other);
    }
}
