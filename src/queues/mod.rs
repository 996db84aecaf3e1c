//! Queues and publishers participating in routine suspension.
//!
//! Readers park the calling routine while a queue is empty; writers never
//! block and resume exactly one waiter per push. A broken queue releases
//! every current and future reader with its break error.

mod aggregate_queue_reader;
mod converter_queue_writer;
mod publisher;
mod queue;
mod queue_reader;
mod queue_writer;
mod queue_writer_publisher;
mod routine_task_queue;
mod scoped_queue_reader;
mod scoped_queue_writer;
mod sequence_publisher;
mod state_queue;
mod weak_queue;

pub use self::aggregate_queue_reader::AggregateQueueReader;
pub use self::converter_queue_writer::ConverterQueueWriter;
pub use self::publisher::Publisher;
pub use self::publisher::SnapshotPublisher;
pub use self::queue::Queue;
pub use self::queue_reader::QueueReader;
pub use self::queue_writer::QueueWriter;
pub use self::queue_writer_publisher::QueueWriterPublisher;
pub use self::routine_task_queue::RoutineTaskQueue;
pub use self::scoped_queue_reader::ScopedQueueReader;
pub use self::scoped_queue_writer::ScopedQueueWriter;
pub use self::sequence_publisher::SequencePublisher;
pub use self::state_queue::StateQueue;
pub use self::weak_queue::WeakQueue;
