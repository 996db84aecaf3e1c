use std::io::Error;
use std::num::NonZeroUsize;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::thread;
use std::time::Duration;
use tokio::runtime::Builder;
use tokio::runtime::Runtime as TokioRuntime;

use crate::consts;

// -----------------------------------------------------------------------------
// Runtime Config
// -----------------------------------------------------------------------------

/// Tuning for the worker pool backing a Beam runtime.
///
/// The worker count is the M in the M:N model: one kernel thread per
/// detected CPU, with the remaining knobs taken from [`consts`].
#[derive(Clone, Copy, Debug)]
struct RuntimeConfig {
  workers: usize,
  stack_size: usize,
  blocking_limit: usize,
  blocking_keep_alive: Duration,
  event_interval: u32,
  global_queue_interval: u32,
  io_events_per_tick: usize,
}

impl RuntimeConfig {
  /// Detects the host parallelism and fills in the default tuning.
  fn detect() -> Self {
    let workers: usize = thread::available_parallelism()
      .map_or(consts::DEFAULT_PARALLELISM, NonZeroUsize::get);

    Self {
      workers,
      stack_size: consts::DEFAULT_THREAD_STACK_SIZE,
      blocking_limit: consts::DEFAULT_MAX_BLOCKING_THREADS,
      blocking_keep_alive: consts::DEFAULT_THREAD_KEEP_ALIVE,
      event_interval: consts::DEFAULT_EVENT_INTERVAL,
      global_queue_interval: consts::DEFAULT_GLOBAL_QUEUE_INTERVAL,
      io_events_per_tick: consts::DEFAULT_MAX_IO_EVENTS_PER_TICK,
    }
  }

  fn build(&self) -> Result<TokioRuntime, Error> {
    let mut builder: Builder = Builder::new_multi_thread();

    // Thread pool shape.
    builder
      .worker_threads(self.workers)
      .thread_name_fn(worker_name)
      .thread_stack_size(self.stack_size)
      .max_blocking_threads(self.blocking_limit)
      .thread_keep_alive(self.blocking_keep_alive);

    // Scheduler cadence.
    builder
      .enable_time()
      .event_interval(self.event_interval)
      .global_queue_interval(self.global_queue_interval)
      .max_io_events_per_tick(self.io_events_per_tick);

    builder.build()
  }
}

fn worker_name() -> String {
  static SEQUENCE: AtomicUsize = AtomicUsize::new(0);

  let worker: usize = SEQUENCE.fetch_add(1, Ordering::Relaxed);
  format!("beam-worker-{worker}")
}

// -----------------------------------------------------------------------------
// Entry Point
// -----------------------------------------------------------------------------

/// Runs the given `future` to completion on a Beam runtime.
///
/// Builds the worker pool from the detected host parallelism and the
/// default tuning, runs `future`, then shuts the runtime down, waiting
/// up to [`SHUTDOWN_TIMEOUT`] for in-flight routines to drain.
///
/// Returns a process exit code.
///
/// [`SHUTDOWN_TIMEOUT`]: consts::SHUTDOWN_TIMEOUT
pub fn block_on<F>(future: F) -> i32
where
  F: Future<Output = ()> + Send + 'static,
{
  let runtime: TokioRuntime = match RuntimeConfig::detect().build() {
    Ok(runtime) => runtime,
    Err(error) => {
      tracing::error!(%error, "failed to initialize runtime");
      return consts::E_CODE_FAILURE_INIT;
    }
  };

  runtime.block_on(future);
  runtime.shutdown_timeout(consts::SHUTDOWN_TIMEOUT);

  consts::E_CODE_SUCCESS
}

// -----------------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
  use std::sync::Arc;
  use std::sync::atomic::AtomicBool;
  use std::sync::atomic::Ordering;

  use crate::consts;
  use crate::routines;

  #[test]
  fn test_block_on_runs_routines() {
    let done: Arc<AtomicBool> = Arc::new(AtomicBool::new(false));
    let flag: Arc<AtomicBool> = Arc::clone(&done);

    let code: i32 = routines::block_on(async move {
      let id = routines::spawn(async move {
        flag.store(true, Ordering::SeqCst);
      });

      routines::wait(&id).await;
    });

    assert_eq!(code, consts::E_CODE_SUCCESS);
    assert!(done.load(Ordering::SeqCst));
  }
}
