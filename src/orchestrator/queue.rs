//! Priority queue entry ordering, mirroring the teacher's
//! `scheduler::queue::ScheduledRequest` (`Ord` keyed on priority, then FIFO).

use chrono::{DateTime, Utc};

use crate::domain::Priority;

/// An entry in the pending-task heap. Ordering is `(priority, created_at)`
/// with higher priority first and, within a priority tier, earlier
/// `created_at` first (spec §4.1 scheduling algorithm).
#[derive(Debug, Clone)]
pub struct QueueEntry {
    pub task_id: String,
    pub priority: Priority,
    pub created_at: DateTime<Utc>,
}

impl PartialEq for QueueEntry {
    fn eq(&self, other: &Self) -> bool {
        self.task_id == other.task_id
    }
}
impl Eq for QueueEntry {}

impl Ord for QueueEntry {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        // BinaryHeap is a max-heap: higher priority must compare Greater.
        // Among equal priorities, the earlier created_at must compare
        // Greater so it's popped first (FIFO tie-break).
        self.priority
            .cmp(&other.priority)
            .then_with(|| other.created_at.cmp(&self.created_at))
    }
}

impl PartialOrd for QueueEntry {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BinaryHeap;

    fn entry(id: &str, priority: Priority, offset_ms: i64) -> QueueEntry {
        QueueEntry {
            task_id: id.to_string(),
            priority,
            created_at: Utc::now() + chrono::Duration::milliseconds(offset_ms),
        }
    }

    #[test]
    fn higher_priority_pops_first() {
        let mut heap = BinaryHeap::new();
        heap.push(entry("low", 1, 0));
        heap.push(entry("high", 9, 0));
        heap.push(entry("mid", 5, 0));

        assert_eq!(heap.pop().unwrap().task_id, "high");
        assert_eq!(heap.pop().unwrap().task_id, "mid");
        assert_eq!(heap.pop().unwrap().task_id, "low");
    }

    #[test]
    fn equal_priority_is_fifo() {
        let mut heap = BinaryHeap::new();
        heap.push(entry("first", 5, 0));
        heap.push(entry("second", 5, 10));

        assert_eq!(heap.pop().unwrap().task_id, "first");
        assert_eq!(heap.pop().unwrap().task_id, "second");
    }
}
