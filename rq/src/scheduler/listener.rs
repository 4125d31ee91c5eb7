//! Lifecycle listener

/// Observer for queue lifecycle transitions
///
/// Called synchronously on the thread performing the transition, after the
/// scheduler has released its internal lock, so implementations may call
/// back into the scheduler.
///
/// Because calls happen outside the lock, transitions triggered from
/// different threads at nearly the same time may be observed out of order
/// (for example a `finish` from the draining task before a racing `start`).
/// Read [`Scheduler::state`](super::Scheduler::state) when the exact current
/// state matters.
pub trait QueueListener: Send + Sync {
    /// The scheduler entered the running state
    fn on_queue_start(&self) {}

    /// The scheduler was paused
    fn on_queue_pause(&self) {}

    /// The queue drained, or the scheduler was stopped
    fn on_queue_finish(&self) {}
}
