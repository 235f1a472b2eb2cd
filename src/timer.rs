//! Delayed delivery — the timer process' expiry-sorted queue
//!
//! Envelopes from `delayed_send` wait here until their expiry tick.
//! The queue stays sorted by ascending expiry; for the common case of
//! monotonically arriving delays an insert is O(1) (append). Equal
//! expiries keep arrival order.
//!
//! Author: Moroya Sakamoto

use std::collections::VecDeque;

use crate::pool::BlockId;

/// Expiry-ordered FIFO of undelivered envelopes.
#[derive(Debug, Default)]
pub struct DelayQueue {
    // (expiry, block) pairs, ascending by expiry
    items: VecDeque<(u64, BlockId)>,
}

impl DelayQueue {
    pub fn new() -> Self {
        Self { items: VecDeque::new() }
    }

    /// Splice a block in at its sorted position.
    ///
    /// Append if the queue is empty or `expiry` is at least the tail's;
    /// prepend if it is below the head's; otherwise scan forward from
    /// the head and insert after the last entry due no later than
    /// `expiry`.
    pub fn insert(&mut self, expiry: u64, block: BlockId) {
        let append = match self.items.back() {
            None => true,
            Some(&(tail, _)) => expiry >= tail,
        };
        if append {
            self.items.push_back((expiry, block));
            return;
        }
        if let Some(&(head, _)) = self.items.front() {
            if expiry < head {
                self.items.push_front((expiry, block));
                return;
            }
        }
        let pos = self
            .items
            .iter()
            .position(|&(e, _)| expiry < e)
            .unwrap_or(self.items.len());
        self.items.insert(pos, (expiry, block));
    }

    /// Pop the head if it is due at `now`.
    pub fn pop_due(&mut self, now: u64) -> Option<BlockId> {
        let due = matches!(self.items.front(), Some(&(expiry, _)) if expiry <= now);
        if due {
            self.items.pop_front().map(|(_, b)| b)
        } else {
            None
        }
    }

    /// Expiry of the next envelope to come due.
    pub fn next_expiry(&self) -> Option<u64> {
        self.items.front().map(|&(e, _)| e)
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }
}
