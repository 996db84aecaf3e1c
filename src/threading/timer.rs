use async_trait::async_trait;
use parking_lot::Mutex as SpinMutex;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::queues::QueueWriterPublisher;
use crate::queues::ScopedQueueWriter;
use crate::queues::Publisher;
use crate::routines;
use crate::routines::Async;
use crate::routines::Eval;

// -----------------------------------------------------------------------------
// Timer Result
// -----------------------------------------------------------------------------

/// Outcome of a timer cycle.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq)]
pub enum TimerResult {
  /// The timer ran its full interval.
  Expired,
  /// The timer was canceled before expiring.
  Canceled,
}

// -----------------------------------------------------------------------------
// Timer
// -----------------------------------------------------------------------------

/// A restartable one-shot timer publishing its outcome.
///
/// Each `start` produces exactly one [`TimerResult`], delivered to `wait`
/// callers and to every monitoring queue. A routine races a timer against
/// an [`Async`] by monitoring both onto the same queue.
///
/// [`Async`]: crate::routines::Async
#[async_trait]
pub trait Timer: Send + Sync {
  /// Arms the timer. A no-op while a cycle is in progress.
  fn start(&self);

  /// Cancels the current cycle, publishing [`Canceled`].
  ///
  /// [`Canceled`]: TimerResult::Canceled
  fn cancel(&self);

  /// Parks until the current cycle completes.
  ///
  /// Returns the most recent result; [`Canceled`] if the timer was never
  /// started.
  ///
  /// [`Canceled`]: TimerResult::Canceled
  async fn wait(&self) -> TimerResult;

  /// Streams every published result into `monitor`.
  fn monitor(&self, monitor: ScopedQueueWriter<TimerResult>);
}

// -----------------------------------------------------------------------------
// Live Timer
// -----------------------------------------------------------------------------

#[derive(Debug)]
struct LiveState {
  token: Option<CancellationToken>,
  outcome: Option<Async<TimerResult>>,
}

struct LiveInner {
  interval: Duration,
  state: SpinMutex<LiveState>,
  publisher: QueueWriterPublisher<TimerResult>,
}

/// A wall-clock timer driven by a spawned routine.
#[derive(Clone)]
pub struct LiveTimer {
  inner: Arc<LiveInner>,
}

impl LiveTimer {
  /// Constructs a timer that expires `interval` after each start.
  pub fn new(interval: Duration) -> Self {
    Self {
      inner: Arc::new(LiveInner {
        interval,
        state: SpinMutex::new(LiveState {
          token: None,
          outcome: None,
        }),
        publisher: QueueWriterPublisher::new(),
      }),
    }
  }
}

#[async_trait]
impl Timer for LiveTimer {
  fn start(&self) {
    let (token, eval): (CancellationToken, Eval<TimerResult>) = {
      let mut state = self.inner.state.lock();

      if state.token.is_some() {
        return;
      }

      let token: CancellationToken = CancellationToken::new();
      let outcome: Async<TimerResult> = Async::new();
      let eval: Eval<TimerResult> = outcome.eval();

      state.token = Some(token.clone());
      state.outcome = Some(outcome);

      (token, eval)
    };

    let inner: Arc<LiveInner> = Arc::clone(&self.inner);

    routines::spawn(async move {
      let result: TimerResult = tokio::select! {
        _ = token.cancelled() => TimerResult::Canceled,
        _ = tokio::time::sleep(inner.interval) => TimerResult::Expired,
      };

      inner.state.lock().token = None;

      eval.set(result);
      inner.publisher.push(result);
    });
  }

  fn cancel(&self) {
    let state = self.inner.state.lock();

    if let Some(token) = state.token.as_ref() {
      token.cancel();
    }
  }

  async fn wait(&self) -> TimerResult {
    let outcome: Option<Async<TimerResult>> = self.inner.state.lock().outcome.clone();

    match outcome {
      Some(outcome) => outcome.get().await.unwrap_or(TimerResult::Canceled),
      None => TimerResult::Canceled,
    }
  }

  fn monitor(&self, monitor: ScopedQueueWriter<TimerResult>) {
    self.inner.publisher.monitor(monitor);
  }
}

// -----------------------------------------------------------------------------
// Trigger Timer
// -----------------------------------------------------------------------------

#[derive(Debug)]
struct TriggerState {
  eval: Option<Eval<TimerResult>>,
  outcome: Option<Async<TimerResult>>,
}

struct TriggerInner {
  state: SpinMutex<TriggerState>,
  publisher: QueueWriterPublisher<TimerResult>,
}

/// A manually fired timer for tests.
///
/// Never expires on its own: [`trigger`] publishes [`Expired`], and
/// [`cancel`] publishes [`Canceled`].
///
/// [`trigger`]: Self::trigger
/// [`Expired`]: TimerResult::Expired
/// [`Canceled`]: TimerResult::Canceled
#[derive(Clone)]
pub struct TriggerTimer {
  inner: Arc<TriggerInner>,
}

impl TriggerTimer {
  /// Constructs an unarmed trigger timer.
  pub fn new() -> Self {
    Self {
      inner: Arc::new(TriggerInner {
        state: SpinMutex::new(TriggerState {
          eval: None,
          outcome: None,
        }),
        publisher: QueueWriterPublisher::new(),
      }),
    }
  }

  /// Completes the current cycle with [`Expired`].
  ///
  /// [`Expired`]: TimerResult::Expired
  pub fn trigger(&self) {
    self.finish(TimerResult::Expired);
  }

  fn finish(&self, result: TimerResult) {
    let eval: Option<Eval<TimerResult>> = self.inner.state.lock().eval.take();

    if let Some(eval) = eval {
      eval.set(result);
      self.inner.publisher.push(result);
    }
  }
}

impl Default for TriggerTimer {
  #[inline]
  fn default() -> Self {
    Self::new()
  }
}

#[async_trait]
impl Timer for TriggerTimer {
  fn start(&self) {
    let mut state = self.inner.state.lock();

    if state.eval.is_some() {
      return;
    }

    let outcome: Async<TimerResult> = Async::new();

    state.eval = Some(outcome.eval());
    state.outcome = Some(outcome);
  }

  fn cancel(&self) {
    self.finish(TimerResult::Canceled);
  }

  async fn wait(&self) -> TimerResult {
    let outcome: Option<Async<TimerResult>> = self.inner.state.lock().outcome.clone();

    match outcome {
      Some(outcome) => outcome.get().await.unwrap_or(TimerResult::Canceled),
      None => TimerResult::Canceled,
    }
  }

  fn monitor(&self, monitor: ScopedQueueWriter<TimerResult>) {
    self.inner.publisher.monitor(monitor);
  }
}

// -----------------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
  use std::sync::Arc;
  use std::time::Duration;

  use crate::queues::Queue;
  use crate::queues::ScopedQueueWriter;
  use crate::queues::WeakQueue;
  use crate::threading::LiveTimer;
  use crate::threading::Timer;
  use crate::threading::TimerResult;
  use crate::threading::TriggerTimer;

  #[tokio::test]
  async fn test_live_timer_expires() {
    let timer: LiveTimer = LiveTimer::new(Duration::from_millis(1));

    timer.start();
    assert_eq!(timer.wait().await, TimerResult::Expired);
  }

  #[tokio::test]
  async fn test_live_timer_cancel() {
    let timer: LiveTimer = LiveTimer::new(Duration::from_secs(3600));

    timer.start();
    timer.cancel();

    assert_eq!(timer.wait().await, TimerResult::Canceled);
  }

  #[tokio::test]
  async fn test_trigger_timer_publishes() {
    let timer: TriggerTimer = TriggerTimer::new();
    let queue: Arc<Queue<TimerResult>> = Arc::new(Queue::new());

    timer.monitor(ScopedQueueWriter::new(Arc::new(WeakQueue::new(&queue))));

    timer.start();
    timer.trigger();

    assert_eq!(timer.wait().await, TimerResult::Expired);
    assert_eq!(queue.pop().await.unwrap(), TimerResult::Expired);
  }

  #[tokio::test]
  async fn test_wait_before_start() {
    let timer: TriggerTimer = TriggerTimer::new();
    assert_eq!(timer.wait().await, TimerResult::Canceled);
  }
}
