// Executor constants (no magic values)
use std::time::Duration;

/// Concurrent enable/disable tasks allowed by default
pub const DEFAULT_MAX_CONCURRENT_TASKS: usize = 16;

/// How long shutdown waits for the board to drain (5 seconds)
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// How long an offline task waits for the device's in-flight enable and
/// disable tasks before reading the enabled ledger (30 seconds)
pub const OFFLINE_SETTLE_TIMEOUT: Duration = Duration::from_secs(30);

/// Attempts per enable/disable, including the first one (no retry)
pub const DEFAULT_MAX_ATTEMPTS: u32 = 1;

/// Default retry base delay (1000ms = 1s)
pub const DEFAULT_RETRY_BASE_DELAY_MS: i64 = 1000;

/// Default exponential backoff multiplier
pub const DEFAULT_BACKOFF_FACTOR: f64 = 2.0;

/// Upper bound for one handler invocation run as a subprocess (10 seconds)
pub const DEFAULT_HANDLER_TIMEOUT_MS: u64 = 10_000;

/// Grace period between SIGTERM and SIGKILL for handler subprocesses
pub const GRACEFUL_SHUTDOWN_TIMEOUT_MS: i64 = 5000;
