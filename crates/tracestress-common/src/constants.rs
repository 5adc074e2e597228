//! System-wide constants.

/// Binary name for the CLI.
pub const BIN_NAME: &str = "tstress";

/// Name of the ptrace stressor.
pub const PTRACE_STRESSOR: &str = "ptrace";

/// Exit code for a stressor that ran to completion.
pub const EXIT_SUCCESS: i32 = 0;

/// Exit code for a stressor that hit a fatal error.
pub const EXIT_FAILURE: i32 = 1;

/// Exit code for a stressor that is unsupported on this platform.
pub const EXIT_NOT_IMPLEMENTED: i32 = 4;

/// Default run duration in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Upper limit on concurrent stressor instances.
pub const MAX_INSTANCES: u32 = 4096;
