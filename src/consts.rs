//! Runtime configuration constants and default values.
//!
//! These constants control scheduler tuning, protocol timing, and the
//! initial capacities of the runtime's internal tables.

use std::time::Duration;

// -----------------------------------------------------------------------------
// Exit Codes
// -----------------------------------------------------------------------------

/// Exit code indicating successful runtime initialization and execution.
pub const E_CODE_SUCCESS: i32 = 0;

/// Exit code indicating a failure during runtime initialization.
pub const E_CODE_FAILURE_INIT: i32 = -1;

/// Exit code indicating a failure during runtime execution.
pub const E_CODE_FAILURE_EXEC: i32 = -2;

// -----------------------------------------------------------------------------
// System - Scheduler Behavior
// -----------------------------------------------------------------------------

/// Default parallelism used when host CPU information is unavailable.
///
/// This value determines the number of worker threads created when the
/// system cannot detect CPU count. In practice, CPU detection usually
/// succeeds, making this a fallback value.
pub const DEFAULT_PARALLELISM: usize = 1;

/// Scheduler ticks between polling for external events.
pub const DEFAULT_EVENT_INTERVAL: u32 = 61;

/// Scheduler ticks between polling the global task queue.
pub const DEFAULT_GLOBAL_QUEUE_INTERVAL: u32 = 31;

/// Maximum number of additional blocking threads spawned by the runtime.
pub const DEFAULT_MAX_BLOCKING_THREADS: usize = 512;

/// Maximum number of I/O events processed per scheduler tick.
pub const DEFAULT_MAX_IO_EVENTS_PER_TICK: usize = 1024;

/// Duration that idle blocking threads are kept alive.
pub const DEFAULT_THREAD_KEEP_ALIVE: Duration = Duration::from_millis(10 * 1000);

/// Stack size allocated for each worker thread.
///
/// This value applies to both async worker threads and blocking task
/// threads. The default of 2 MiB balances stack overflow safety with
/// memory efficiency.
pub const DEFAULT_THREAD_STACK_SIZE: usize = 2 * 1024 * 1024;

// -----------------------------------------------------------------------------
// System - Shutdown
// -----------------------------------------------------------------------------

/// Maximum duration allowed for graceful runtime shutdown.
///
/// The runtime waits up to this duration for routines to terminate cleanly
/// during shutdown.
pub const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

// -----------------------------------------------------------------------------
// Service Protocol
// -----------------------------------------------------------------------------

/// Default interval between heartbeat pings on an open channel.
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(10);

/// Maximum size of a single protocol frame (in bytes).
///
/// Frames exceeding this limit indicate a corrupt stream and close the
/// channel with a serialization error.
pub const MAX_FRAME_SIZE: usize = 64 * 1024 * 1024;

// -----------------------------------------------------------------------------
// Service Locator
// -----------------------------------------------------------------------------

/// Number of random bytes in a session id (128-bit).
pub const SESSION_ID_BYTES: usize = 16;

/// Number of random bytes in a password salt.
pub const PASSWORD_SALT_BYTES: usize = 16;

// -----------------------------------------------------------------------------
// System - Memory Allocation
// -----------------------------------------------------------------------------

/// Initial capacity of the routine table.
pub(crate) const CAP_ROUTINE_TABLE: usize = 64;

/// Initial capacity of a protocol client's correlation table.
pub(crate) const CAP_CORRELATION_TABLE: usize = 16;

/// Initial capacity of a publisher's subscriber list.
pub(crate) const CAP_PUBLISHER_MONITORS: usize = 4;
