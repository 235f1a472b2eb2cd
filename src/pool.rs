//! Block pool — fixed-block memory manager
//!
//! Partitions a static arena into N equal blocks chained into a singly
//! linked free list. Handles are stable indices (no pointer
//! arithmetic); the address-range/alignment invariant of the hardware
//! original collapses into handle validity. Letter bytes are opaque to
//! this module — it only tracks whether a block is free, raw, or
//! sealed as an in-flight message.
//!
//! Blocking acquire lives in the kernel, where the scheduler is; this
//! module is the non-blocking core plus validated release.
//!
//! Author: Moroya Sakamoto

use crate::error::KernelError;
use crate::message::{Envelope, Letter};

/// Handle to one pool block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockId(pub(crate) usize);

/// One fixed-size unit of the pool.
///
/// A free block stores only the next-free link; an in-use block is
/// either raw payload or a sealed message carrying its envelope.
#[derive(Debug)]
enum Block {
    Free { next: Option<usize> },
    Raw { letter: Letter },
    Message { envelope: Envelope, letter: Letter },
}

/// Fixed-block allocator with a singly linked free list.
#[derive(Debug)]
pub struct BlockPool {
    blocks: Vec<Block>,
    free_head: Option<usize>,
    available: usize,
    used: usize,
}

impl BlockPool {
    /// Partition an arena of `block_count` blocks into a free list.
    pub fn new(block_count: usize) -> Self {
        let blocks = (0..block_count)
            .map(|i| Block::Free {
                next: if i + 1 < block_count { Some(i + 1) } else { None },
            })
            .collect();
        Self {
            blocks,
            free_head: if block_count > 0 { Some(0) } else { None },
            available: block_count,
            used: 0,
        }
    }

    /// Pop a block from the free list, or `None` if the pool is empty.
    pub fn acquire(&mut self) -> Option<BlockId> {
        let idx = self.free_head?;
        let next = match self.blocks[idx] {
            Block::Free { next } => next,
            // free_head only ever points at free blocks
            _ => panic!("pool corruption: free head {idx} is not free"),
        };
        self.free_head = next;
        self.blocks[idx] = Block::Raw { letter: Letter::default() };
        self.available -= 1;
        self.used += 1;
        log::trace!("pool: acquired block {idx}, {} left", self.available);
        Some(BlockId(idx))
    }

    /// Validate and push a block back onto the free list.
    ///
    /// Fails with `InvalidBlock` — mutating nothing — if the handle is
    /// out of range, the block is already free, or the block is sealed
    /// inside an undelivered message.
    pub fn release(&mut self, block: BlockId) -> Result<(), KernelError> {
        let idx = block.0;
        match self.blocks.get(idx) {
            Some(Block::Raw { .. }) => {}
            _ => return Err(KernelError::InvalidBlock),
        }
        self.blocks[idx] = Block::Free { next: self.free_head };
        self.free_head = Some(idx);
        self.available += 1;
        self.used -= 1;
        log::trace!("pool: released block {idx}, {} free", self.available);
        Ok(())
    }

    /// Seal a raw block into a message by stamping its envelope.
    pub fn seal(&mut self, block: BlockId, envelope: Envelope) -> Result<(), KernelError> {
        let idx = block.0;
        let letter = match self.blocks.get(idx) {
            Some(Block::Raw { letter }) => *letter,
            _ => return Err(KernelError::InvalidBlock),
        };
        self.blocks[idx] = Block::Message { envelope, letter };
        Ok(())
    }

    /// Strip the envelope off a delivered message, leaving a raw block
    /// the receiver owns. Returns the envelope.
    pub fn open(&mut self, block: BlockId) -> Result<Envelope, KernelError> {
        let idx = block.0;
        let (envelope, letter) = match self.blocks.get(idx) {
            Some(Block::Message { envelope, letter }) => (*envelope, *letter),
            _ => return Err(KernelError::InvalidBlock),
        };
        self.blocks[idx] = Block::Raw { letter };
        Ok(envelope)
    }

    /// Envelope of an in-flight message block.
    pub fn envelope(&self, block: BlockId) -> Option<&Envelope> {
        match self.blocks.get(block.0) {
            Some(Block::Message { envelope, .. }) => Some(envelope),
            _ => None,
        }
    }

    /// Payload of a raw block the caller owns.
    pub fn letter(&self, block: BlockId) -> Result<&Letter, KernelError> {
        match self.blocks.get(block.0) {
            Some(Block::Raw { letter }) => Ok(letter),
            _ => Err(KernelError::InvalidBlock),
        }
    }

    /// Mutable payload of a raw block the caller owns.
    pub fn letter_mut(&mut self, block: BlockId) -> Result<&mut Letter, KernelError> {
        match self.blocks.get_mut(block.0) {
            Some(Block::Raw { letter }) => Ok(letter),
            _ => Err(KernelError::InvalidBlock),
        }
    }

    /// Blocks currently free.
    pub fn available(&self) -> usize {
        self.available
    }

    /// Blocks currently handed out.
    pub fn used(&self) -> usize {
        self.used
    }

    /// Total pool capacity.
    pub fn total(&self) -> usize {
        self.blocks.len()
    }
}
