//! ALICE-RTX — Message-Passing Real-Time Executive
//!
//! Don't share state, mail it.
//!
//! Small preemptive kernel model for a single-core target:
//! - Fixed process table with FIFO-per-priority scheduling
//! - Blocking fixed-block memory pool (a message *is* a pool block)
//! - Envelope/letter mailbox IPC with delayed, expiry-ordered delivery
//! - Explicit state-machine dispatch; no timeslice, no heap surprises
//!
//! Author: Moroya Sakamoto

pub mod error;
pub mod kernel;
pub mod message;
pub mod pool;
pub mod process;
pub mod queue;
pub mod timer;

pub use error::KernelError;
pub use kernel::{Acquire, Delivery, Kernel, KernelConfig};
pub use message::{Envelope, Letter, Mailbox, MAX_LETTER_LENGTH};
pub use pool::{BlockId, BlockPool};
pub use process::{
    Context, Pcb, Pid, ProcInit, ProcessKind, ProcessState, Priority, NULL_PROCESS,
};
pub use queue::{PriorityQueue, ProcessQueue};
pub use timer::DelayQueue;
