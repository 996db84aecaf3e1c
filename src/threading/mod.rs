//! Suspension primitives.
//!
//! Mutexes, condition variables, and timers that park the calling routine
//! instead of blocking the underlying kernel thread. Contended waiters
//! resume in FIFO order per primitive.

mod condition_variable;
mod mutex;
mod recursive_mutex;
mod timer;

pub use self::condition_variable::ConditionVariable;
pub use self::mutex::Mutex;
pub use self::mutex::MutexGuard;
pub use self::recursive_mutex::RecursiveMutex;
pub use self::recursive_mutex::RecursiveMutexGuard;
pub use self::timer::LiveTimer;
pub use self::timer::Timer;
pub use self::timer::TimerResult;
pub use self::timer::TriggerTimer;
