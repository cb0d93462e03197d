//! Work queue for batch sends.
//!
//! Messages are never copied or reordered: the plan hands out index ranges
//! into the caller's slice. Completing a range drops it from the queue, and
//! shrinking re-partitions only what has not been broadcast yet.

use std::ops::Range;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchPlan {
    total: usize,
    next: usize,
    batch_size: usize,
}

impl BatchPlan {
    /// Plan for `total` messages in groups of `batch_size` (at least 1).
    pub fn new(total: usize, batch_size: usize) -> Self {
        Self {
            total,
            next: 0,
            batch_size: batch_size.max(1),
        }
    }

    /// Range of the next group to send, or `None` when everything is sent.
    pub fn next_group(&self) -> Option<Range<usize>> {
        if self.next >= self.total {
            return None;
        }
        let end = (self.next + self.batch_size).min(self.total);
        Some(self.next..end)
    }

    /// Mark `group` as broadcast.
    pub fn complete(&mut self, group: Range<usize>) {
        debug_assert_eq!(group.start, self.next);
        self.next = group.end.min(self.total);
    }

    /// Halve the batch size. Returns false if it is already 1.
    pub fn shrink(&mut self) -> bool {
        if self.batch_size <= 1 {
            return false;
        }
        self.batch_size /= 2;
        true
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Messages not yet broadcast.
    pub fn remaining(&self) -> usize {
        self.total - self.next
    }

    pub fn is_done(&self) -> bool {
        self.remaining() == 0
    }
}
