use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;

use crate::error::BeamError;
use crate::error::Result;
use crate::queues::Queue;
use crate::queues::QueueReader;
use crate::queues::ScopedQueueReader;
use crate::routines;

/// Combines multiple queue readers into a single reader.
///
/// One drain routine per source forwards values into an internal queue.
/// When every source has broken, the internal queue breaks with the last
/// source's error; breaking the aggregate breaks every source.
pub struct AggregateQueueReader<T>
where
  T: Clone + Send + 'static,
{
  sources: Vec<ScopedQueueReader<T>>,
  destination: Arc<Queue<T>>,
}

impl<T> AggregateQueueReader<T>
where
  T: Clone + Send + 'static,
{
  /// Constructs an aggregate over `sources`, spawning one drain routine
  /// per source.
  ///
  /// An empty source list produces an immediately broken reader.
  pub fn new(sources: Vec<ScopedQueueReader<T>>) -> Self {
    let destination: Arc<Queue<T>> = Arc::new(Queue::new());
    let remaining: Arc<AtomicUsize> = Arc::new(AtomicUsize::new(sources.len()));

    if sources.is_empty() {
      destination.break_pipe();
    }

    for source in sources.iter() {
      let reader = source.share();
      let destination = Arc::clone(&destination);
      let remaining = Arc::clone(&remaining);

      routines::spawn(async move {
        let error: BeamError = loop {
          match reader.pop().await {
            Ok(value) => {
              if let Err(error) = destination.push(value) {
                break error;
              }
            }
            Err(error) => break error,
          }
        };

        if remaining.fetch_sub(1, Ordering::AcqRel) == 1 {
          destination.break_with(error);
        }
      });
    }

    Self {
      sources,
      destination,
    }
  }
}

#[async_trait]
impl<T> QueueReader<T> for AggregateQueueReader<T>
where
  T: Clone + Send + 'static,
{
  async fn pop(&self) -> Result<T> {
    self.destination.pop().await
  }

  async fn top(&self) -> Result<T> {
    self.destination.top().await
  }

  fn try_pop(&self) -> Option<T> {
    self.destination.try_pop()
  }

  fn try_top(&self) -> Option<T> {
    self.destination.try_top()
  }

  fn break_with(&self, error: BeamError) {
    for source in self.sources.iter() {
      source.break_with(error.clone());
    }

    self.destination.break_with(error);
  }
}

impl<T> Drop for AggregateQueueReader<T>
where
  T: Clone + Send + 'static,
{
  fn drop(&mut self) {
    // The drain routines exit once their sources break.
    QueueReader::break_with(self, BeamError::pipe_broken());
  }
}

// -----------------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
  use std::sync::Arc;

  use crate::error::BeamError;
  use crate::error::ErrorKind;
  use crate::queues::AggregateQueueReader;
  use crate::queues::Queue;
  use crate::queues::QueueReader;
  use crate::queues::ScopedQueueReader;
  use crate::routines;

  #[tokio::test]
  async fn test_merges_sources() {
    let first: Arc<Queue<u32>> = Arc::new(Queue::new());
    let second: Arc<Queue<u32>> = Arc::new(Queue::new());

    let aggregate: AggregateQueueReader<u32> = AggregateQueueReader::new(vec![
      ScopedQueueReader::from(Arc::clone(&first)),
      ScopedQueueReader::from(Arc::clone(&second)),
    ]);

    first.push(1).unwrap();
    second.push(2).unwrap();

    let mut seen: Vec<u32> = vec![aggregate.pop().await.unwrap(), aggregate.pop().await.unwrap()];
    seen.sort_unstable();

    assert_eq!(seen, vec![1, 2]);
  }

  #[tokio::test]
  async fn test_breaks_after_all_sources_break() {
    let first: Arc<Queue<u32>> = Arc::new(Queue::new());
    let second: Arc<Queue<u32>> = Arc::new(Queue::new());

    let aggregate: AggregateQueueReader<u32> = AggregateQueueReader::new(vec![
      ScopedQueueReader::from(Arc::clone(&first)),
      ScopedQueueReader::from(Arc::clone(&second)),
    ]);

    first.push(10).unwrap();
    first.break_pipe();
    assert_eq!(aggregate.pop().await.unwrap(), 10);

    // One source still open: the aggregate keeps serving it.
    second.push(20).unwrap();
    assert_eq!(aggregate.pop().await.unwrap(), 20);

    second.break_with(BeamError::end_of_file());

    // Both sources broken: the last error propagates.
    let error = aggregate.pop().await.unwrap_err();
    assert!(matches!(error.kind(), ErrorKind::PipeBroken | ErrorKind::EndOfFile));
  }

  #[tokio::test]
  async fn test_empty_sources() {
    let aggregate: AggregateQueueReader<u32> = AggregateQueueReader::new(Vec::new());

    assert_eq!(aggregate.pop().await.unwrap_err().kind(), ErrorKind::PipeBroken);

    routines::yield_now().await;
  }
}
