//! Pending request collection

use std::collections::{BinaryHeap, HashSet};

use tracing::debug;

use super::item::{PriorityPolicy, QueueItem};
use super::task::{BoxedTask, Completion};

/// Min-priority-first collection of requests that have not started yet
///
/// Ties on priority are broken by a per-queue sequence number, so equal
/// priorities drain in enqueue order. Prepends draw their sequence numbers
/// counting down from -1, so a prepend still sorts first when its priority
/// saturates at `i64::MIN`.
pub(crate) struct PendingQueue<T> {
    heap: BinaryHeap<QueueItem<T>>,
    next_back_seq: i64,
    next_front_seq: i64,
}

impl<T> PendingQueue<T> {
    pub(crate) fn new() -> Self {
        Self {
            heap: BinaryHeap::new(),
            next_back_seq: 0,
            next_front_seq: -1,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.heap.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    pub(crate) fn contains(&self, tag: &str) -> bool {
        self.heap.iter().any(|item| item.tag == tag)
    }

    /// Lowest priority value currently pending
    pub(crate) fn min_priority(&self) -> Option<i64> {
        self.heap.peek().map(|item| item.priority)
    }

    /// Highest priority value currently pending
    pub(crate) fn max_priority(&self) -> Option<i64> {
        self.heap.iter().map(|item| item.priority).max()
    }

    /// Resolve a policy against the current contents
    pub(crate) fn priority_for(&self, policy: PriorityPolicy) -> i64 {
        match policy {
            PriorityPolicy::Append => {
                let by_count = self.heap.len() as i64 + 1;
                self.max_priority().map_or(by_count, |max| by_count.max(max))
            }
            PriorityPolicy::Prepend => self.min_priority().map_or(0, |min| min.saturating_sub(1)),
            PriorityPolicy::Explicit(priority) => priority,
        }
    }

    /// Insert a request, returning the priority it was given
    pub(crate) fn push(
        &mut self,
        tag: String,
        policy: PriorityPolicy,
        task: BoxedTask<T>,
        completion: Completion<T>,
    ) -> i64 {
        let priority = self.priority_for(policy);
        let seq = match policy {
            PriorityPolicy::Prepend => {
                let seq = self.next_front_seq;
                self.next_front_seq -= 1;
                seq
            }
            PriorityPolicy::Append | PriorityPolicy::Explicit(_) => {
                let seq = self.next_back_seq;
                self.next_back_seq += 1;
                seq
            }
        };
        debug!(%tag, priority, seq, ?policy, "PendingQueue::push: called");
        self.heap.push(QueueItem::new(tag, priority, seq, task, completion));
        priority
    }

    /// Remove the next request in execution order
    pub(crate) fn pop(&mut self) -> Option<QueueItem<T>> {
        self.heap.pop()
    }

    /// Remove the first request (in execution order) carrying `tag`
    pub(crate) fn remove_first(&mut self, tag: &str) -> Option<QueueItem<T>> {
        let mut items = std::mem::take(&mut self.heap).into_vec();
        let index = items
            .iter()
            .enumerate()
            .filter(|(_, item)| item.tag == tag)
            .max_by(|(_, a), (_, b)| a.cmp(b))
            .map(|(index, _)| index);
        let removed = index.map(|index| items.swap_remove(index));
        self.heap = items.into();
        removed
    }

    /// Remove every request whose tag is in `tags`
    pub(crate) fn remove_tagged(&mut self, tags: &HashSet<&str>) -> Vec<QueueItem<T>> {
        let (removed, kept): (Vec<_>, Vec<_>) = std::mem::take(&mut self.heap)
            .into_vec()
            .into_iter()
            .partition(|item| tags.contains(item.tag.as_str()));
        self.heap = kept.into();
        removed
    }

    /// Remove everything
    pub(crate) fn drain_all(&mut self) -> Vec<QueueItem<T>> {
        self.heap.drain().collect()
    }

    /// Pending items in execution order
    pub(crate) fn ordered(&self) -> Vec<&QueueItem<T>> {
        let mut items: Vec<_> = self.heap.iter().collect();
        items.sort_by(|a, b| b.cmp(a));
        items
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TaskError;
    use crate::scheduler::task::boxed;
    use proptest::prelude::*;

    fn push(queue: &mut PendingQueue<()>, tag: &str, policy: PriorityPolicy) -> i64 {
        queue.push(
            tag.to_string(),
            policy,
            boxed(async { Ok::<_, TaskError>(()) }),
            Completion::ignore(),
        )
    }

    fn drain_tags(queue: &mut PendingQueue<()>) -> Vec<String> {
        std::iter::from_fn(|| queue.pop()).map(|item| item.tag).collect()
    }

    #[test]
    fn test_append_counts_from_one() {
        let mut queue = PendingQueue::new();
        assert_eq!(push(&mut queue, "a", PriorityPolicy::Append), 1);
        assert_eq!(push(&mut queue, "b", PriorityPolicy::Append), 2);
        assert_eq!(push(&mut queue, "c", PriorityPolicy::Append), 3);
        assert_eq!(drain_tags(&mut queue), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_prepend_goes_first() {
        let mut queue = PendingQueue::new();
        push(&mut queue, "a", PriorityPolicy::Append);
        push(&mut queue, "b", PriorityPolicy::Append);
        assert_eq!(push(&mut queue, "c", PriorityPolicy::Prepend), 0);
        assert_eq!(push(&mut queue, "d", PriorityPolicy::Prepend), -1);
        assert_eq!(drain_tags(&mut queue), vec!["d", "c", "a", "b"]);
    }

    #[test]
    fn test_prepend_on_empty_queue() {
        let mut queue = PendingQueue::new();
        assert_eq!(push(&mut queue, "only", PriorityPolicy::Prepend), 0);
    }

    #[test]
    fn test_prepend_ahead_of_lowest_possible_priority() {
        let mut queue = PendingQueue::new();
        push(&mut queue, "min", PriorityPolicy::Explicit(i64::MIN));
        push(&mut queue, "tail", PriorityPolicy::Append);

        assert_eq!(push(&mut queue, "front", PriorityPolicy::Prepend), i64::MIN);
        assert_eq!(push(&mut queue, "very-front", PriorityPolicy::Prepend), i64::MIN);
        push(&mut queue, "also-min", PriorityPolicy::Explicit(i64::MIN));

        assert_eq!(
            drain_tags(&mut queue),
            vec!["very-front", "front", "min", "also-min", "tail"]
        );
    }

    #[test]
    fn test_append_behind_highest_possible_priority() {
        let mut queue = PendingQueue::new();
        push(&mut queue, "max", PriorityPolicy::Explicit(i64::MAX));
        assert_eq!(push(&mut queue, "after", PriorityPolicy::Append), i64::MAX);
        assert_eq!(drain_tags(&mut queue), vec!["max", "after"]);
    }

    #[test]
    fn test_append_stays_behind_after_removals() {
        let mut queue = PendingQueue::new();
        push(&mut queue, "a", PriorityPolicy::Append);
        push(&mut queue, "b", PriorityPolicy::Append);
        push(&mut queue, "c", PriorityPolicy::Append);
        queue.pop();
        queue.pop();

        // Only "c" (priority 3) is left; a count-based priority would be 2
        assert_eq!(push(&mut queue, "d", PriorityPolicy::Append), 3);
        assert_eq!(drain_tags(&mut queue), vec!["c", "d"]);
    }

    #[test]
    fn test_remove_first_takes_earliest_match() {
        let mut queue = PendingQueue::new();
        push(&mut queue, "dup", PriorityPolicy::Explicit(5));
        push(&mut queue, "other", PriorityPolicy::Explicit(1));
        push(&mut queue, "dup", PriorityPolicy::Explicit(2));

        let removed = queue.remove_first("dup").unwrap();
        assert_eq!(removed.priority, 2);
        assert!(queue.remove_first("missing").is_none());
        assert_eq!(drain_tags(&mut queue), vec!["other", "dup"]);
    }

    #[test]
    fn test_remove_tagged() {
        let mut queue = PendingQueue::new();
        for tag in ["a", "b", "a", "c"] {
            push(&mut queue, tag, PriorityPolicy::Append);
        }
        let tags: HashSet<&str> = ["a", "c", "zzz"].into_iter().collect();
        assert_eq!(queue.remove_tagged(&tags).len(), 3);
        assert_eq!(drain_tags(&mut queue), vec!["b"]);
    }

    #[test]
    fn test_ordered_snapshot_does_not_consume() {
        let mut queue = PendingQueue::new();
        push(&mut queue, "late", PriorityPolicy::Explicit(9));
        push(&mut queue, "early", PriorityPolicy::Explicit(-3));
        let tags: Vec<_> = queue.ordered().iter().map(|item| item.tag.clone()).collect();
        assert_eq!(tags, vec!["early", "late"]);
        assert_eq!(queue.len(), 2);
        assert!(queue.contains("late"));
        assert_eq!(queue.drain_all().len(), 2);
        assert!(queue.is_empty());
    }

    proptest! {
        #[test]
        fn prop_pops_sorted_by_priority_then_seq(priorities in proptest::collection::vec(-50_i64..50, 0..40)) {
            let mut queue = PendingQueue::new();
            for (i, priority) in priorities.iter().enumerate() {
                push(&mut queue, &i.to_string(), PriorityPolicy::Explicit(*priority));
            }

            let popped: Vec<(i64, i64)> = std::iter::from_fn(|| queue.pop())
                .map(|item| (item.priority, item.seq))
                .collect();
            let mut expected = popped.clone();
            expected.sort();
            prop_assert_eq!(popped, expected);
        }

        #[test]
        fn prop_append_never_jumps_ahead(ops in proptest::collection::vec(any::<bool>(), 1..40)) {
            // true = append, false = pop
            let mut queue = PendingQueue::new();
            let mut model = std::collections::VecDeque::new();
            for (i, op) in ops.into_iter().enumerate() {
                if op {
                    push(&mut queue, &i.to_string(), PriorityPolicy::Append);
                    model.push_back(i.to_string());
                } else {
                    prop_assert_eq!(queue.pop().map(|item| item.tag), model.pop_front());
                }
            }
            prop_assert_eq!(drain_tags(&mut queue), Vec::from(model));
        }
    }
}
