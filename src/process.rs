//! Process descriptors — fixed-at-boot process table entries
//!
//! Each process is a PCB: pid, priority, state, opaque saved context
//! and a private mailbox. The process set is configured once at boot
//! and never grows; pids are stable indices into the kernel's table.
//!
//! Author: Moroya Sakamoto

use crate::message::Mailbox;

/// Process id — a stable index into the kernel process table.
pub type Pid = usize;

/// Pid of the null (idle) process, always slot 0.
pub const NULL_PROCESS: Pid = 0;

/// Number of priority levels, including the two reserved ones.
pub const NUM_PRIORITIES: usize = 6;

/// Process priority (lower number = more urgent)
///
/// The outer two levels are reserved: `PRIVILEGED` for system
/// processes, `NULL` for the idle process. `set_process_priority`
/// only accepts the user band `HIGH..=LOWEST`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Priority(pub u8);

impl Priority {
    /// Reserved for system processes; never user-assignable
    pub const PRIVILEGED: Priority = Priority(0);
    /// Most urgent user level
    pub const HIGH: Priority = Priority(1);
    pub const MEDIUM: Priority = Priority(2);
    pub const LOW: Priority = Priority(3);
    /// Least urgent user level
    pub const LOWEST: Priority = Priority(4);
    /// Reserved for the null process; dispatched only when nothing
    /// else is runnable
    pub const NULL: Priority = Priority(5);

    /// Queue index for this level.
    pub fn index(self) -> usize {
        self.0 as usize
    }

    /// Is this a level `set_process_priority` may assign?
    pub fn is_settable(self) -> bool {
        self >= Priority::HIGH && self <= Priority::LOWEST
    }

    /// Strictly more urgent than `other`?
    pub fn is_more_urgent_than(self, other: Priority) -> bool {
        self < other
    }
}

/// Process execution state
///
/// Membership in the kernel queues corresponds 1:1 with the state:
/// `Ready`/`New` live in the ready queue, `BlockedOnMemory` in the
/// blocked-on-memory queue, `BlockedOnReceive` in no queue at all
/// (found only by pid), and `Running` is the single current process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    /// Never dispatched yet
    New,
    /// Runnable, queued at its priority level
    Ready,
    /// The currently executing process
    Running,
    /// Waiting for a pool block
    BlockedOnMemory,
    /// Waiting for a message
    BlockedOnReceive,
}

/// What kind of process a table entry describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessKind {
    /// The idle process, pid 0, priority `NULL`
    Null,
    /// Ordinary user process; the only kind with a changeable priority
    User,
    /// Privileged system process
    System,
    /// Interrupt pseudo-process (timer, UART). Never enters the ready
    /// queue; uses the non-blocking/non-preemptive primitive variants.
    Interrupt,
}

/// Saved execution context, restored verbatim on resume.
///
/// In this state-machine model the context is an opaque cookie seeded
/// from the entry token on first dispatch; the kernel never interprets
/// it afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Context {
    /// Resume point token
    pub pc: usize,
}

impl Context {
    /// First-entry context for a NEW process.
    pub fn initial(entry: usize) -> Self {
        Self { pc: entry }
    }
}

/// Boot-table entry: one fixed process.
#[derive(Debug, Clone, Copy)]
pub struct ProcInit {
    /// Process name (8 ASCII chars max)
    pub name: [u8; 8],
    /// Initial priority
    pub priority: Priority,
    /// Process kind
    pub kind: ProcessKind,
    /// Entry-point token, seeds the first-entry context
    pub entry: usize,
}

impl ProcInit {
    fn named(name: &[u8], priority: Priority, kind: ProcessKind, entry: usize) -> Self {
        let mut n = [0u8; 8];
        let len = name.len().min(8);
        n[..len].copy_from_slice(&name[..len]);
        Self { name: n, priority, kind, entry }
    }

    /// An ordinary user process. `priority` must be in the settable
    /// band; `Kernel::boot` rejects reserved levels.
    pub fn user(name: &[u8], priority: Priority, entry: usize) -> Self {
        Self::named(name, priority, ProcessKind::User, entry)
    }

    /// A privileged system process.
    pub fn system(name: &[u8], entry: usize) -> Self {
        Self::named(name, Priority::PRIVILEGED, ProcessKind::System, entry)
    }

    /// An interrupt pseudo-process (UART-style collaborator). Present
    /// in the table, never scheduled.
    pub fn interrupt(name: &[u8], entry: usize) -> Self {
        Self::named(name, Priority::PRIVILEGED, ProcessKind::Interrupt, entry)
    }

    pub(crate) fn null() -> Self {
        Self::named(b"null", Priority::NULL, ProcessKind::Null, 0)
    }

    pub(crate) fn timer() -> Self {
        Self::named(b"timer", Priority::PRIVILEGED, ProcessKind::Interrupt, 0)
    }
}

/// Process control block.
#[derive(Debug)]
pub struct Pcb {
    pub pid: Pid,
    pub name: [u8; 8],
    pub priority: Priority,
    pub state: ProcessState,
    pub kind: ProcessKind,
    pub(crate) entry: usize,
    pub(crate) context: Context,
    pub(crate) mailbox: Mailbox,
}

impl Pcb {
    pub(crate) fn new(pid: Pid, init: ProcInit) -> Self {
        Self {
            pid,
            name: init.name,
            priority: init.priority,
            state: ProcessState::New,
            kind: init.kind,
            entry: init.entry,
            context: Context::default(),
            mailbox: Mailbox::new(),
        }
    }

    /// Does this process ever enter the ready queue?
    pub fn is_schedulable(&self) -> bool {
        self.kind != ProcessKind::Interrupt
    }
}
