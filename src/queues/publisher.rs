use crate::queues::ScopedQueueWriter;

/// Fan-out of a value stream to attached queue writers.
///
/// Snapshot-capable publishers deliver their snapshot to a new monitor
/// atomically with respect to pushes: a subscriber sees the snapshot up to
/// some point and then every push strictly after it, with no gap and no
/// reordering.
pub trait Publisher<T>: Send + Sync
where
  T: Clone + Send + 'static,
{
  /// Adds `monitor` to the subscriber set.
  ///
  /// A snapshot-capable publisher first replays its snapshot into
  /// `monitor`.
  fn monitor(&self, monitor: ScopedQueueWriter<T>);

  /// Runs `f` while holding the publisher's lock, excluding concurrent
  /// pushes and monitors.
  ///
  /// The lock is reentrant: `f` may call back into the publisher.
  fn with(&self, f: &mut dyn FnMut());
}

/// A [`Publisher`] carrying a replayable snapshot of its stream.
pub trait SnapshotPublisher<T>: Publisher<T>
where
  T: Clone + Send + 'static,
{
  /// Runs `f` with the current snapshot under the publisher's lock.
  ///
  /// `None` indicates the publisher has no snapshot yet.
  fn with_snapshot(&self, f: &mut dyn FnMut(Option<&[T]>));
}
