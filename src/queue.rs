//! Process queues — FIFO-per-priority-level collections
//!
//! Pure data-structure logic: no blocking semantics, no state
//! transitions. The ready queue and the blocked-on-memory queue are
//! two independent instances of [`PriorityQueue`], indexed identically
//! by priority level.
//!
//! Author: Moroya Sakamoto

use std::collections::VecDeque;

use crate::process::{Pid, Priority, NUM_PRIORITIES};

/// FIFO of process ids at one priority level.
#[derive(Debug, Default)]
pub struct ProcessQueue {
    items: VecDeque<Pid>,
}

impl ProcessQueue {
    pub fn new() -> Self {
        Self { items: VecDeque::new() }
    }

    /// Append at the tail.
    pub fn enqueue(&mut self, pid: Pid) {
        self.items.push_back(pid);
    }

    /// Remove and return the head, or `None` if empty.
    pub fn dequeue(&mut self) -> Option<Pid> {
        self.items.pop_front()
    }

    /// Unlink a specific pid without disturbing the order of the rest.
    /// Returns whether the pid was present.
    pub fn remove(&mut self, pid: Pid) -> bool {
        match self.items.iter().position(|&p| p == pid) {
            Some(idx) => {
                self.items.remove(idx);
                true
            }
            None => false,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }
}

/// One FIFO per priority level.
#[derive(Debug)]
pub struct PriorityQueue {
    queues: [ProcessQueue; NUM_PRIORITIES],
}

impl PriorityQueue {
    pub fn new() -> Self {
        Self {
            queues: std::array::from_fn(|_| ProcessQueue::new()),
        }
    }

    /// Append `pid` at the tail of the FIFO for `priority`.
    pub fn enqueue(&mut self, pid: Pid, priority: Priority) {
        self.queues[priority.index()].enqueue(pid);
    }

    /// Scan levels from most to least urgent and pop the head of the
    /// first non-empty FIFO.
    pub fn dequeue_highest(&mut self) -> Option<Pid> {
        for queue in self.queues.iter_mut() {
            if let Some(pid) = queue.dequeue() {
                return Some(pid);
            }
        }
        None
    }

    /// Unlink `pid` from the FIFO at `priority`. Returns whether the
    /// pid was found there.
    pub fn remove(&mut self, pid: Pid, priority: Priority) -> bool {
        self.queues[priority.index()].remove(pid)
    }

    /// Move `pid` from the `old` level to the tail of the `new` level.
    /// Returns false (and changes nothing) if `pid` is not queued at
    /// `old`.
    pub fn reprioritize(&mut self, pid: Pid, old: Priority, new: Priority) -> bool {
        if self.remove(pid, old) {
            self.enqueue(pid, new);
            true
        } else {
            false
        }
    }

    pub fn is_empty(&self) -> bool {
        self.queues.iter().all(ProcessQueue::is_empty)
    }

    pub fn len(&self) -> usize {
        self.queues.iter().map(ProcessQueue::len).sum()
    }
}

impl Default for PriorityQueue {
    fn default() -> Self {
        Self::new()
    }
}
