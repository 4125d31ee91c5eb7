//! Queue items and priority policies

use std::cmp::Ordering;
use std::time::Instant;

use super::task::{BoxedTask, Completion};

/// How an enqueued request's priority is chosen
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriorityPolicy {
    /// Behind everything currently pending
    Append,

    /// Ahead of everything currently pending
    Prepend,

    /// Caller-chosen priority (lower runs earlier)
    Explicit(i64),
}

/// A request waiting in the queue
pub(crate) struct QueueItem<T> {
    pub(crate) tag: String,
    pub(crate) priority: i64,
    pub(crate) seq: i64,
    pub(crate) enqueued_at: Instant,
    pub(crate) task: BoxedTask<T>,
    pub(crate) completion: Completion<T>,
}

impl<T> QueueItem<T> {
    pub(crate) fn new(tag: String, priority: i64, seq: i64, task: BoxedTask<T>, completion: Completion<T>) -> Self {
        Self {
            tag,
            priority,
            seq,
            enqueued_at: Instant::now(),
            task,
            completion,
        }
    }
}

impl<T> std::fmt::Debug for QueueItem<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueueItem")
            .field("tag", &self.tag)
            .field("priority", &self.priority)
            .field("seq", &self.seq)
            .field("completion", &self.completion)
            .finish_non_exhaustive()
    }
}

impl<T> Eq for QueueItem<T> {}

impl<T> PartialEq for QueueItem<T> {
    fn eq(&self, other: &Self) -> bool {
        self.seq == other.seq
    }
}

impl<T> Ord for QueueItem<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap is a max-heap: lower priority, then earlier seq, is "greater"
        other
            .priority
            .cmp(&self.priority)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl<T> PartialOrd for QueueItem<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TaskError;
    use crate::scheduler::task::boxed;

    fn item(tag: &str, priority: i64, seq: i64) -> QueueItem<()> {
        QueueItem::new(
            tag.to_string(),
            priority,
            seq,
            boxed(async { Ok::<_, TaskError>(()) }),
            Completion::ignore(),
        )
    }

    #[test]
    fn test_lower_priority_runs_first() {
        let one = item("one", 1, 5);
        let two = item("two", 2, 0);

        // Lower number should come first, regardless of seq
        assert!(one > two);
    }

    #[test]
    fn test_same_priority_fifo() {
        let first = item("first", 3, 0);
        let second = item("second", 3, 1);

        // Earlier seq should come first (so it's "greater" in the heap)
        assert!(first > second);
    }

    #[test]
    fn test_equality_by_seq() {
        let a = item("same", 1, 9);
        let b = item("other", 4, 9);
        assert_eq!(a, b);
    }
}
