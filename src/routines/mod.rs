//! Cooperative routine runtime.
//!
//! Routines are user-space tasks multiplexed onto the runtime's kernel
//! threads. A routine never blocks a thread: suspension primitives park it
//! on a per-primitive FIFO waiter queue and the scheduler runs the next
//! routine until it is resumed.

mod eval;
mod handler;
mod routine;
mod routine_id;
mod runtimes;
mod scheduler;
mod suspended_queue;

pub use self::eval::Async;
pub use self::eval::Eval;
pub use self::handler::RoutineHandler;
pub use self::handler::RoutineHandlerGroup;
pub use self::routine::RoutineState;
pub use self::routine_id::RoutineId;
pub use self::runtimes::block_on;
pub use self::scheduler::current_id;
pub use self::scheduler::routine_count;
pub use self::scheduler::spawn;
pub use self::scheduler::wait;
pub use self::scheduler::yield_now;

pub(crate) use self::suspended_queue::Park;
pub(crate) use self::suspended_queue::SuspendedRoutineQueue;
