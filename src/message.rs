//! Message types — envelopes, letters, mailboxes
//!
//! A message is an ordinary pool block: the hidden [`Envelope`] header
//! (sender, destination, expiry) is what distinguishes it from raw
//! memory, and the visible [`Letter`] payload occupies the rest of the
//! block. Requesting and releasing a message is the same pool
//! operation as for any other block.
//!
//! Author: Moroya Sakamoto

use std::collections::VecDeque;

use crate::pool::BlockId;
use crate::process::Pid;

/// Longest letter body, in bytes.
pub const MAX_LETTER_LENGTH: usize = 35;

/// Hidden per-message header. Stamped by the kernel on send; user code
/// never sees it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Envelope {
    /// Pid of the sending process
    pub sender: Pid,
    /// Final destination pid (not necessarily the mailbox the envelope
    /// currently sits in — delayed sends park at the timer process)
    pub destination: Pid,
    /// Tick at which the message becomes due; equals the send tick for
    /// immediate delivery
    pub expiry: u64,
}

/// User-visible message payload: a type tag plus a fixed-length body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Letter {
    /// Application-defined message type
    pub kind: i32,
    /// Message body
    pub text: [u8; MAX_LETTER_LENGTH],
}

impl Letter {
    pub fn new(kind: i32, text: &[u8]) -> Self {
        let mut letter = Letter { kind, ..Self::default() };
        letter.set_text(text);
        letter
    }

    /// Copy `text` into the body, truncating to [`MAX_LETTER_LENGTH`].
    pub fn set_text(&mut self, text: &[u8]) {
        self.text = [0u8; MAX_LETTER_LENGTH];
        let len = text.len().min(MAX_LETTER_LENGTH);
        self.text[..len].copy_from_slice(&text[..len]);
    }

    /// Body bytes up to the first NUL.
    pub fn text(&self) -> &[u8] {
        let end = self.text.iter().position(|&b| b == 0).unwrap_or(MAX_LETTER_LENGTH);
        &self.text[..end]
    }
}

impl Default for Letter {
    fn default() -> Self {
        Self { kind: 0, text: [0u8; MAX_LETTER_LENGTH] }
    }
}

/// Per-process FIFO of pending message blocks.
///
/// Delivery order, not priority, governs message order within one
/// mailbox.
#[derive(Debug, Default)]
pub struct Mailbox {
    items: VecDeque<BlockId>,
}

impl Mailbox {
    pub fn new() -> Self {
        Self { items: VecDeque::new() }
    }

    /// Append a delivered envelope at the tail.
    pub fn enqueue(&mut self, block: BlockId) {
        self.items.push_back(block);
    }

    /// Remove and return the oldest envelope.
    pub fn dequeue(&mut self) -> Option<BlockId> {
        self.items.pop_front()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_letter_text_roundtrip() {
        let letter = Letter::new(2, b"wall clock");
        assert_eq!(letter.kind, 2);
        assert_eq!(letter.text(), b"wall clock");
    }

    #[test]
    fn test_letter_truncates() {
        let long = [b'x'; 64];
        let letter = Letter::new(0, &long);
        assert_eq!(letter.text().len(), MAX_LETTER_LENGTH);
    }

    #[test]
    fn test_letter_set_text_clears_old_body() {
        let mut letter = Letter::new(1, b"a longer body");
        letter.set_text(b"hi");
        assert_eq!(letter.text(), b"hi");
    }

    #[test]
    fn test_mailbox_fifo() {
        let mut mailbox = Mailbox::new();
        assert!(mailbox.is_empty());
        mailbox.enqueue(BlockId(0));
        mailbox.enqueue(BlockId(4));
        mailbox.enqueue(BlockId(2));
        assert_eq!(mailbox.len(), 3);
        assert_eq!(mailbox.dequeue(), Some(BlockId(0)));
        assert_eq!(mailbox.dequeue(), Some(BlockId(4)));
        assert_eq!(mailbox.dequeue(), Some(BlockId(2)));
        assert_eq!(mailbox.dequeue(), None);
    }
}
