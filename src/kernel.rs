//! Kernel — scheduler, dispatcher and the kernel primitives
//!
//! One [`Kernel`] value owns every piece of shared kernel state: the
//! process table, the block pool, the ready and blocked-on-memory
//! queues, the mailboxes and the delayed-delivery queue. Primitives
//! take `&mut self`, which models the single-core run-to-yield
//! discipline of the hardware original: exactly one process mutates
//! kernel state at a time, and control only transfers at the yield
//! points a primitive itself creates.
//!
//! Blocking primitives are rendered as explicit state transitions: if
//! the resource is unavailable the caller is marked blocked, the
//! dispatcher picks the next process, and the primitive returns a
//! `Blocked` value. The process harness re-issues the call when the
//! process runs again — the retry loop lives at the call site instead
//! of inside a stack switch. Saved contexts stay inside each PCB and
//! are restored verbatim on resume.
//!
//! Author: Moroya Sakamoto

use crate::error::KernelError;
use crate::message::{Envelope, Letter};
use crate::pool::{BlockId, BlockPool};
use crate::process::{Context, Pcb, Pid, ProcInit, ProcessKind, ProcessState, Priority, NULL_PROCESS};
use crate::queue::PriorityQueue;
use crate::timer::DelayQueue;

/// Static kernel configuration, fixed at boot.
#[derive(Debug, Clone, Copy)]
pub struct KernelConfig {
    /// Number of fixed-size blocks in the memory pool
    pub block_count: usize,
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self { block_count: 10 }
    }
}

/// Outcome of a blocking memory request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Acquire {
    /// A block was free and is now owned by the caller
    Granted(BlockId),
    /// Pool was empty: the caller is now `BlockedOnMemory` and another
    /// process has been dispatched. Retry when scheduled again.
    Blocked,
}

/// Outcome of a blocking receive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Oldest mailbox entry, envelope already stripped
    Message { block: BlockId, sender: Pid },
    /// Mailbox was empty: the caller is now `BlockedOnReceive` and
    /// another process has been dispatched. Retry when scheduled again.
    Blocked,
}

/// ALICE-RTX kernel instance.
#[derive(Debug)]
pub struct Kernel {
    procs: Vec<Pcb>,
    pool: BlockPool,
    ready: PriorityQueue,
    blocked_on_memory: PriorityQueue,
    delayed: DelayQueue,
    current: Pid,
    now: u64,
    timer_pid: Pid,
    /// Total context switches since boot
    pub context_switches: u64,
}

impl Kernel {
    /// Build the fixed process table and perform the first dispatch.
    ///
    /// The null process always occupies pid 0; the boot `table` gets
    /// pids 1.. in order; the timer i-process is appended last. User
    /// entries must use a settable priority, system and interrupt
    /// entries the privileged level.
    pub fn boot(config: KernelConfig, table: &[ProcInit]) -> Result<Self, KernelError> {
        let mut procs = Vec::with_capacity(table.len() + 2);
        procs.push(Pcb::new(NULL_PROCESS, ProcInit::null()));

        for init in table {
            match init.kind {
                ProcessKind::Null => return Err(KernelError::InvalidProcess),
                ProcessKind::User => {
                    if !init.priority.is_settable() {
                        return Err(KernelError::InvalidPriority);
                    }
                }
                ProcessKind::System | ProcessKind::Interrupt => {
                    if init.priority != Priority::PRIVILEGED {
                        return Err(KernelError::InvalidPriority);
                    }
                }
            }
            let pid = procs.len();
            procs.push(Pcb::new(pid, *init));
        }

        let timer_pid = procs.len();
        procs.push(Pcb::new(timer_pid, ProcInit::timer()));

        let mut kernel = Self {
            procs,
            pool: BlockPool::new(config.block_count),
            ready: PriorityQueue::new(),
            blocked_on_memory: PriorityQueue::new(),
            delayed: DelayQueue::new(),
            current: NULL_PROCESS,
            now: 0,
            timer_pid,
            context_switches: 0,
        };

        for pid in 0..kernel.procs.len() {
            if kernel.procs[pid].is_schedulable() {
                let priority = kernel.procs[pid].priority;
                kernel.ready.enqueue(pid, priority);
            }
        }

        kernel.dispatch(NULL_PROCESS);
        log::debug!(
            "booted: {} processes, {} pool blocks, pid {} running",
            kernel.procs.len(),
            kernel.pool.total(),
            kernel.current
        );
        Ok(kernel)
    }

    /// Voluntary yield. Re-enqueues the current process according to
    /// its state, then runs the highest-priority ready process.
    /// Returns the pid now running.
    pub fn release_processor(&mut self) -> Pid {
        let old = self.current;
        let priority = self.procs[old].priority;
        let state = self.procs[old].state;
        match state {
            // blocked-on-receive processes are not queued anywhere;
            // delivery finds them by pid
            ProcessState::BlockedOnReceive => {}
            ProcessState::BlockedOnMemory => self.blocked_on_memory.enqueue(old, priority),
            _ => {
                self.procs[old].state = ProcessState::Ready;
                self.ready.enqueue(old, priority);
            }
        }
        self.dispatch(old)
    }

    /// Pop the next process and switch to it. Fatal if the pick is not
    /// READY or NEW — that means a queue holds a pid whose state lies.
    fn dispatch(&mut self, old: Pid) -> Pid {
        let next = match self.ready.dequeue_highest() {
            Some(pid) => pid,
            None => panic!("scheduler corruption: no runnable process"),
        };

        if next != old {
            let state = self.procs[next].state;
            match state {
                ProcessState::New => {
                    let entry = self.procs[next].entry;
                    self.procs[next].context = Context::initial(entry);
                }
                ProcessState::Ready => {}
                state => {
                    panic!("scheduler corruption: pid {next} dispatched in state {state:?}")
                }
            }
            self.procs[next].state = ProcessState::Running;
            self.current = next;
            self.context_switches += 1;
            log::debug!("dispatch: pid {old} -> pid {next}");
        } else {
            self.procs[next].state = ProcessState::Running;
        }
        self.current
    }

    /// Read a process' priority. The null process' priority is not
    /// readable.
    pub fn get_process_priority(&self, pid: Pid) -> Result<Priority, KernelError> {
        if pid == NULL_PROCESS || pid >= self.procs.len() {
            return Err(KernelError::InvalidProcess);
        }
        Ok(self.procs[pid].priority)
    }

    /// Change a user process' priority.
    ///
    /// Rejects non-user pids and the two reserved levels. A no-op when
    /// the priority does not change (the process keeps its queue
    /// position). Changing the running process demotes it in place and
    /// forces a yield; changing a blocked-on-receive process updates
    /// the stored priority only; otherwise the process is re-linked at
    /// its new level and a yield lets it preempt if now more urgent.
    pub fn set_process_priority(&mut self, pid: Pid, priority: Priority) -> Result<(), KernelError> {
        let pcb = self.procs.get(pid).ok_or(KernelError::InvalidProcess)?;
        if pcb.kind != ProcessKind::User {
            return Err(KernelError::InvalidProcess);
        }
        if !priority.is_settable() {
            return Err(KernelError::InvalidPriority);
        }

        let old = pcb.priority;
        if old == priority {
            return Ok(());
        }

        if pid == self.current {
            self.procs[pid].priority = priority;
            self.release_processor();
            return Ok(());
        }

        if self.procs[pid].state == ProcessState::BlockedOnReceive {
            // not queued anywhere; takes effect on unblock
            self.procs[pid].priority = priority;
            return Ok(());
        }

        if self.ready.reprioritize(pid, old, priority)
            || self.blocked_on_memory.reprioritize(pid, old, priority)
        {
            self.procs[pid].priority = priority;
            self.release_processor();
            return Ok(());
        }

        Err(KernelError::InvalidProcess)
    }

    /// Request a pool block, blocking if none is free.
    pub fn request_memory_block(&mut self) -> Acquire {
        match self.pool.acquire() {
            Some(block) => Acquire::Granted(block),
            None => {
                let cur = self.current;
                log::debug!("pid {cur} blocked on memory");
                self.procs[cur].state = ProcessState::BlockedOnMemory;
                self.release_processor();
                Acquire::Blocked
            }
        }
    }

    /// Non-blocking acquire for interrupt context.
    pub fn try_request_memory_block(&mut self) -> Result<BlockId, KernelError> {
        self.pool.acquire().ok_or(KernelError::ResourceExhausted)
    }

    /// Validate and free a block, then wake the most urgent process
    /// waiting on memory, letting it preempt the caller.
    pub fn release_memory_block(&mut self, block: BlockId) -> Result<(), KernelError> {
        self.pool.release(block)?;
        self.handle_memory_release(true);
        Ok(())
    }

    /// Release variant for interrupt context: wakes a waiter but never
    /// dispatches.
    pub fn release_memory_block_nonpreemptive(&mut self, block: BlockId) -> Result<(), KernelError> {
        self.pool.release(block)?;
        self.handle_memory_release(false);
        Ok(())
    }

    fn handle_memory_release(&mut self, preempt: bool) {
        if let Some(pid) = self.blocked_on_memory.dequeue_highest() {
            self.procs[pid].state = ProcessState::Ready;
            let priority = self.procs[pid].priority;
            self.ready.enqueue(pid, priority);
            log::debug!("pid {pid} unblocked from memory wait");
            if preempt {
                self.release_processor();
            }
        }
    }

    /// Preemptive send: stamp the caller's block and append it to the
    /// destination mailbox. A blocked receiver is woken, and runs
    /// immediately if more urgent than the caller.
    pub fn send_message(&mut self, destination: Pid, block: BlockId) -> Result<(), KernelError> {
        let sender = self.current;
        self.deliver(sender, destination, destination, block, 0)?;
        self.wake_receiver(destination, true);
        Ok(())
    }

    /// Non-preemptive send for interrupt context: same delivery and
    /// wake-up, but dispatch waits for the next voluntary yield.
    pub fn send_message_nonpreemptive(
        &mut self,
        source: Pid,
        destination: Pid,
        block: BlockId,
    ) -> Result<(), KernelError> {
        self.deliver(source, destination, destination, block, 0)?;
        self.wake_receiver(destination, false);
        Ok(())
    }

    /// Send after `delay` ticks: the envelope parks in the timer
    /// process' mailbox and is truly delivered by [`Kernel::tick`]
    /// once its expiry is reached.
    pub fn delayed_send(&mut self, destination: Pid, block: BlockId, delay: u64) -> Result<(), KernelError> {
        let sender = self.current;
        let timer = self.timer_pid;
        self.deliver(sender, destination, timer, block, delay)
    }

    /// Blocking receive: pop the oldest envelope in the caller's
    /// mailbox and return its payload block with the envelope
    /// stripped, plus the sender pid.
    pub fn receive_message(&mut self) -> Delivery {
        let cur = self.current;
        match self.procs[cur].mailbox.dequeue() {
            Some(block) => {
                let envelope = match self.pool.open(block) {
                    Ok(env) => env,
                    Err(_) => panic!("mailbox corruption: pid {cur} queued an unsealed block"),
                };
                Delivery::Message { block, sender: envelope.sender }
            }
            None => {
                log::debug!("pid {cur} blocked on receive");
                self.procs[cur].state = ProcessState::BlockedOnReceive;
                self.release_processor();
                Delivery::Blocked
            }
        }
    }

    /// Non-blocking receive for interrupt context.
    pub fn try_receive_message(&mut self, receiver: Pid) -> Result<Option<(BlockId, Pid)>, KernelError> {
        if receiver >= self.procs.len() {
            return Err(KernelError::InvalidProcess);
        }
        match self.procs[receiver].mailbox.dequeue() {
            Some(block) => {
                let envelope = match self.pool.open(block) {
                    Ok(env) => env,
                    Err(_) => panic!("mailbox corruption: pid {receiver} queued an unsealed block"),
                };
                Ok(Some((block, envelope.sender)))
            }
            None => Ok(None),
        }
    }

    /// Stamp `block` and append it to `via`'s mailbox. `via` differs
    /// from `destination` only for delayed sends, which park at the
    /// timer process. Validation happens before any mutation.
    fn deliver(
        &mut self,
        sender: Pid,
        destination: Pid,
        via: Pid,
        block: BlockId,
        delay: u64,
    ) -> Result<(), KernelError> {
        if destination >= self.procs.len() {
            return Err(KernelError::InvalidProcess);
        }
        let envelope = Envelope { sender, destination, expiry: self.now + delay };
        self.pool.seal(block, envelope)?;
        self.procs[via].mailbox.enqueue(block);
        log::trace!(
            "envelope pid {sender} -> pid {destination} via pid {via}, due tick {}",
            envelope.expiry
        );
        Ok(())
    }

    fn wake_receiver(&mut self, destination: Pid, preemptive: bool) {
        if self.procs[destination].state == ProcessState::BlockedOnReceive {
            self.procs[destination].state = ProcessState::Ready;
            let priority = self.procs[destination].priority;
            self.ready.enqueue(destination, priority);
            log::debug!("pid {destination} unblocked by delivery");
            if preemptive && priority.is_more_urgent_than(self.procs[self.current].priority) {
                self.release_processor();
            }
        }
    }

    /// Timer interrupt: advance the tick counter by `delta`, drain
    /// newly arrived delayed-send requests into the sorted queue, then
    /// deliver every envelope now due, oldest expiry first. Runs in
    /// interrupt context: wake-ups are non-preemptive and no dispatch
    /// happens here.
    pub fn tick(&mut self, delta: u64) {
        self.now += delta;

        let timer = self.timer_pid;
        while let Some(block) = self.procs[timer].mailbox.dequeue() {
            let expiry = match self.pool.envelope(block) {
                Some(env) => env.expiry,
                None => panic!("timer corruption: unsealed block queued for delayed delivery"),
            };
            self.delayed.insert(expiry, block);
        }

        while let Some(block) = self.delayed.pop_due(self.now) {
            let destination = match self.pool.envelope(block) {
                Some(env) => env.destination,
                None => panic!("timer corruption: unsealed block in delay queue"),
            };
            self.procs[destination].mailbox.enqueue(block);
            log::debug!("timer: envelope due at tick {} delivered to pid {destination}", self.now);
            self.wake_receiver(destination, false);
        }
    }

    /// Read the payload of a block the caller owns.
    pub fn letter(&self, block: BlockId) -> Result<&Letter, KernelError> {
        self.pool.letter(block)
    }

    /// Write the payload of a block the caller owns.
    pub fn letter_mut(&mut self, block: BlockId) -> Result<&mut Letter, KernelError> {
        self.pool.letter_mut(block)
    }

    /// Pid of the currently running process.
    pub fn current(&self) -> Pid {
        self.current
    }

    /// Current tick count.
    pub fn now(&self) -> u64 {
        self.now
    }

    /// Pid of the timer i-process (the delayed-send mailbox).
    pub fn timer_pid(&self) -> Pid {
        self.timer_pid
    }

    pub fn process_count(&self) -> usize {
        self.procs.len()
    }

    pub fn process_state(&self, pid: Pid) -> Result<ProcessState, KernelError> {
        self.procs
            .get(pid)
            .map(|p| p.state)
            .ok_or(KernelError::InvalidProcess)
    }

    /// Undelivered messages sitting in a mailbox.
    pub fn pending_messages(&self, pid: Pid) -> Result<usize, KernelError> {
        self.procs
            .get(pid)
            .map(|p| p.mailbox.len())
            .ok_or(KernelError::InvalidProcess)
    }

    pub fn available_blocks(&self) -> usize {
        self.pool.available()
    }

    pub fn used_blocks(&self) -> usize {
        self.pool.used()
    }

    pub fn total_blocks(&self) -> usize {
        self.pool.total()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn init_logging() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    /// proc_a at HIGH (pid 1), proc_b at MEDIUM (pid 2), 10 blocks.
    fn boot_two() -> Kernel {
        init_logging();
        Kernel::boot(
            KernelConfig { block_count: 10 },
            &[
                ProcInit::user(b"proc_a", Priority::HIGH, 0xa),
                ProcInit::user(b"proc_b", Priority::MEDIUM, 0xb),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_boot_dispatches_most_urgent() {
        let k = boot_two();
        assert_eq!(k.current(), 1);
        assert_eq!(k.process_state(1), Ok(ProcessState::Running));
        assert_eq!(k.process_state(2), Ok(ProcessState::New));
        // null + two users + timer
        assert_eq!(k.process_count(), 4);
    }

    #[test]
    fn test_boot_empty_table_runs_null() {
        init_logging();
        let k = Kernel::boot(KernelConfig::default(), &[]).unwrap();
        assert_eq!(k.current(), NULL_PROCESS);
        assert_eq!(k.process_state(NULL_PROCESS), Ok(ProcessState::Running));
    }

    #[test]
    fn test_boot_rejects_reserved_priority_for_user() {
        init_logging();
        let err = Kernel::boot(
            KernelConfig::default(),
            &[ProcInit::user(b"bad", Priority::NULL, 0)],
        )
        .unwrap_err();
        assert_eq!(err, KernelError::InvalidPriority);
    }

    #[test]
    fn test_first_entry_context_setup() {
        let k = boot_two();
        assert_eq!(k.procs[1].context, Context::initial(0xa));
        // never dispatched, so still the default context
        assert_eq!(k.procs[2].context, Context::default());
    }

    #[test]
    fn test_yield_keeps_most_urgent_running() {
        let mut k = boot_two();
        // proc_a is more urgent than everything else, so a voluntary
        // yield hands control straight back
        assert_eq!(k.release_processor(), 1);
        assert_eq!(k.process_state(2), Ok(ProcessState::New));
    }

    #[test]
    fn test_fifo_within_priority_level() {
        init_logging();
        let mut k = Kernel::boot(
            KernelConfig::default(),
            &[
                ProcInit::user(b"first", Priority::MEDIUM, 0),
                ProcInit::user(b"second", Priority::MEDIUM, 0),
            ],
        )
        .unwrap();
        assert_eq!(k.current(), 1);
        // a yielding process goes to the back of its own level
        assert_eq!(k.release_processor(), 2);
        assert_eq!(k.release_processor(), 1);
        assert_eq!(k.release_processor(), 2);
    }

    #[test]
    fn test_pool_conservation_through_primitives() {
        let mut k = boot_two();
        let a = match k.request_memory_block() {
            Acquire::Granted(b) => b,
            Acquire::Blocked => panic!("pool unexpectedly empty"),
        };
        assert_eq!(k.used_blocks() + k.available_blocks(), k.total_blocks());
        k.release_memory_block(a).unwrap();
        assert_eq!(k.used_blocks(), 0);
        assert_eq!(k.release_memory_block(a), Err(KernelError::InvalidBlock));
        assert_eq!(k.available_blocks(), 10);
    }

    #[test]
    fn test_blocking_acquire_roundtrip() {
        let mut k = boot_two();

        // proc_a drains the pool
        let mut held = Vec::new();
        for _ in 0..10 {
            match k.request_memory_block() {
                Acquire::Granted(b) => held.push(b),
                Acquire::Blocked => panic!("pool drained early"),
            }
        }

        // the 11th request blocks and proc_b runs
        assert_eq!(k.request_memory_block(), Acquire::Blocked);
        assert_eq!(k.process_state(1), Ok(ProcessState::BlockedOnMemory));
        assert_eq!(k.current(), 2);

        // proc_b frees one block: proc_a is more urgent, so the
        // release preempts straight back to it
        let freed = held.pop().unwrap();
        k.release_memory_block(freed).unwrap();
        assert_eq!(k.current(), 1);
        assert_eq!(k.process_state(2), Ok(ProcessState::Ready));

        // proc_a retries and receives that exact block
        assert_eq!(k.request_memory_block(), Acquire::Granted(freed));
    }

    #[test]
    fn test_send_receive_roundtrip() {
        let mut k = boot_two();

        // proc_a waits for mail; proc_b runs
        assert_eq!(k.receive_message(), Delivery::Blocked);
        assert_eq!(k.process_state(1), Ok(ProcessState::BlockedOnReceive));
        assert_eq!(k.current(), 2);

        // proc_b mails proc_a; proc_a is more urgent and preempts
        let block = match k.request_memory_block() {
            Acquire::Granted(b) => b,
            Acquire::Blocked => unreachable!(),
        };
        *k.letter_mut(block).unwrap() = Letter::new(7, b"hello proc_a");
        k.send_message(1, block).unwrap();
        assert_eq!(k.current(), 1);

        // proc_a retries its receive and reads the letter
        match k.receive_message() {
            Delivery::Message { block, sender } => {
                assert_eq!(sender, 2);
                let letter = k.letter(block).unwrap();
                assert_eq!(letter.kind, 7);
                assert_eq!(letter.text(), b"hello proc_a");
                k.release_memory_block(block).unwrap();
            }
            Delivery::Blocked => panic!("mail was delivered"),
        }
        assert_eq!(k.used_blocks(), 0);
    }

    #[test]
    fn test_send_to_running_process_queues_only() {
        let mut k = boot_two();
        let block = match k.request_memory_block() {
            Acquire::Granted(b) => b,
            Acquire::Blocked => unreachable!(),
        };
        // destination is not blocked on receive: no wake-up, no switch
        k.send_message(2, block).unwrap();
        assert_eq!(k.current(), 1);
        assert_eq!(k.pending_messages(2), Ok(1));
    }

    #[test]
    fn test_mailbox_fifo_across_sends() {
        let mut k = boot_two();
        let b1 = k.try_request_memory_block().unwrap();
        let b2 = k.try_request_memory_block().unwrap();
        k.send_message(2, b1).unwrap();
        k.send_message(2, b2).unwrap();

        // proc_a blocks so proc_b can drain its mailbox
        assert_eq!(k.receive_message(), Delivery::Blocked);
        assert_eq!(k.current(), 2);
        assert_eq!(k.receive_message(), Delivery::Message { block: b1, sender: 1 });
        assert_eq!(k.receive_message(), Delivery::Message { block: b2, sender: 1 });
    }

    #[test]
    fn test_nonpreemptive_send_defers_dispatch() {
        let mut k = boot_two();
        assert_eq!(k.receive_message(), Delivery::Blocked);
        assert_eq!(k.current(), 2);

        let block = k.try_request_memory_block().unwrap();
        let uart = k.timer_pid(); // any i-process-style source pid
        k.send_message_nonpreemptive(uart, 1, block).unwrap();

        // proc_a woke up but proc_b keeps the processor until it yields
        assert_eq!(k.process_state(1), Ok(ProcessState::Ready));
        assert_eq!(k.current(), 2);
        assert_eq!(k.release_processor(), 1);
        assert_eq!(k.receive_message(), Delivery::Message { block, sender: uart });
    }

    #[test]
    fn test_delayed_send_delivers_in_expiry_order() {
        let mut k = boot_two();

        // proc_a waits for mail; proc_b schedules two delayed sends,
        // the later-due one first
        assert_eq!(k.receive_message(), Delivery::Blocked);
        assert_eq!(k.current(), 2);
        let slow = k.try_request_memory_block().unwrap();
        let fast = k.try_request_memory_block().unwrap();
        k.delayed_send(1, slow, 1000).unwrap();
        k.delayed_send(1, fast, 500).unwrap();
        assert_eq!(k.pending_messages(k.timer_pid()), Ok(2));

        // nothing is due before tick 500
        k.tick(499);
        assert_eq!(k.pending_messages(1), Ok(0));

        // tick 500: `fast` is delivered and proc_a wakes, but the tick
        // runs in interrupt context so proc_b keeps running
        k.tick(1);
        assert_eq!(k.pending_messages(1), Ok(1));
        assert_eq!(k.process_state(1), Ok(ProcessState::Ready));
        assert_eq!(k.current(), 2);

        assert_eq!(k.release_processor(), 1);
        assert_eq!(k.receive_message(), Delivery::Message { block: fast, sender: 2 });

        // proc_a waits again for the second message
        assert_eq!(k.receive_message(), Delivery::Blocked);
        assert_eq!(k.current(), 2);
        k.tick(500);
        assert_eq!(k.now(), 1000);
        assert_eq!(k.release_processor(), 1);
        assert_eq!(k.receive_message(), Delivery::Message { block: slow, sender: 2 });
    }

    #[test]
    fn test_tick_delivers_batch_in_expiry_order() {
        let mut k = boot_two();
        let slow = k.try_request_memory_block().unwrap();
        let fast = k.try_request_memory_block().unwrap();
        k.delayed_send(2, slow, 1000).unwrap();
        k.delayed_send(2, fast, 500).unwrap();

        // one big tick covers both expiries at once
        k.tick(1500);
        assert_eq!(k.pending_messages(2), Ok(2));
        assert_eq!(k.receive_message(), Delivery::Blocked); // proc_a steps aside
        assert_eq!(k.current(), 2);
        assert_eq!(k.receive_message(), Delivery::Message { block: fast, sender: 1 });
        assert_eq!(k.receive_message(), Delivery::Message { block: slow, sender: 1 });
    }

    #[test]
    fn test_self_demotion_yields_to_more_urgent() {
        let mut k = boot_two();
        assert_eq!(k.current(), 1);
        // proc_a demotes itself below proc_b: proc_b must run next
        k.set_process_priority(1, Priority::LOW).unwrap();
        assert_eq!(k.current(), 2);
        assert_eq!(k.process_state(1), Ok(ProcessState::Ready));
        assert_eq!(k.get_process_priority(1), Ok(Priority::LOW));
    }

    #[test]
    fn test_promote_ready_process_preempts() {
        let mut k = boot_two();
        assert_eq!(k.current(), 1);
        // proc_b joins proc_a's level ahead of it (proc_a re-enqueues
        // behind during the yield), so the change dispatches proc_b
        k.set_process_priority(2, Priority::HIGH).unwrap();
        assert_eq!(k.current(), 2);
        assert_eq!(k.process_state(1), Ok(ProcessState::Ready));
    }

    #[test]
    fn test_set_priority_same_value_is_noop() {
        let mut k = boot_two();
        let switches = k.context_switches;
        k.set_process_priority(1, Priority::HIGH).unwrap();
        assert_eq!(k.current(), 1);
        assert_eq!(k.context_switches, switches);
    }

    #[test]
    fn test_set_priority_blocked_on_receive_no_dispatch() {
        let mut k = boot_two();
        // both user processes end up waiting for mail; null runs
        assert_eq!(k.receive_message(), Delivery::Blocked);
        assert_eq!(k.receive_message(), Delivery::Blocked);
        assert_eq!(k.current(), NULL_PROCESS);

        // priority updates in place, no dispatch, still blocked
        k.set_process_priority(2, Priority::HIGH).unwrap();
        assert_eq!(k.current(), NULL_PROCESS);
        assert_eq!(k.process_state(2), Ok(ProcessState::BlockedOnReceive));
        assert_eq!(k.get_process_priority(2), Ok(Priority::HIGH));

        // the new priority takes effect when delivery wakes it
        let block = k.try_request_memory_block().unwrap();
        k.send_message(2, block).unwrap();
        assert_eq!(k.current(), 2);
    }

    #[test]
    fn test_priority_errors() {
        let mut k = boot_two();
        assert_eq!(
            k.set_process_priority(NULL_PROCESS, Priority::LOW),
            Err(KernelError::InvalidProcess)
        );
        assert_eq!(
            k.set_process_priority(99, Priority::LOW),
            Err(KernelError::InvalidProcess)
        );
        let timer = k.timer_pid();
        assert_eq!(
            k.set_process_priority(timer, Priority::LOW),
            Err(KernelError::InvalidProcess)
        );
        assert_eq!(
            k.set_process_priority(1, Priority::PRIVILEGED),
            Err(KernelError::InvalidPriority)
        );
        assert_eq!(
            k.set_process_priority(1, Priority::NULL),
            Err(KernelError::InvalidPriority)
        );

        assert_eq!(k.get_process_priority(NULL_PROCESS), Err(KernelError::InvalidProcess));
        assert_eq!(k.get_process_priority(99), Err(KernelError::InvalidProcess));
        assert_eq!(k.get_process_priority(timer), Ok(Priority::PRIVILEGED));
    }

    #[test]
    fn test_send_errors_leave_state_untouched() {
        let mut k = boot_two();
        let block = k.try_request_memory_block().unwrap();

        // unknown destination: block stays caller-owned raw payload
        assert_eq!(k.send_message(99, block), Err(KernelError::InvalidProcess));
        assert!(k.letter(block).is_ok());
        assert_eq!(k.delayed_send(99, block, 10), Err(KernelError::InvalidProcess));

        // a sealed (in-flight) block cannot be sent or released again
        k.send_message(2, block).unwrap();
        assert_eq!(k.send_message(2, block), Err(KernelError::InvalidBlock));
        assert_eq!(k.release_memory_block(block), Err(KernelError::InvalidBlock));
        assert_eq!(k.pending_messages(2), Ok(1));
    }

    #[test]
    fn test_release_forged_handle() {
        let mut k = boot_two();
        assert_eq!(k.release_memory_block(BlockId(99)), Err(KernelError::InvalidBlock));
        assert_eq!(k.available_blocks(), 10);
    }

    #[test]
    fn test_interrupt_variants() {
        init_logging();
        let mut k = Kernel::boot(
            KernelConfig { block_count: 2 },
            &[
                ProcInit::user(b"proc_a", Priority::HIGH, 0),
                ProcInit::interrupt(b"uart", 0),
            ],
        )
        .unwrap();
        let uart = 2;
        assert_eq!(k.process_state(uart), Ok(ProcessState::New));

        // i-process acquires without blocking, even when exhausted
        let b1 = k.try_request_memory_block().unwrap();
        let b2 = k.try_request_memory_block().unwrap();
        assert_eq!(k.try_request_memory_block(), Err(KernelError::ResourceExhausted));

        // mail to the i-process never wakes or schedules it
        k.send_message(uart, b1).unwrap();
        assert_eq!(k.current(), 1);
        assert_eq!(k.try_receive_message(uart), Ok(Some((b1, 1))));
        assert_eq!(k.try_receive_message(uart), Ok(None));
        assert_eq!(k.try_receive_message(99), Err(KernelError::InvalidProcess));

        // non-preemptive release keeps the caller running
        k.release_memory_block_nonpreemptive(b1).unwrap();
        k.release_memory_block_nonpreemptive(b2).unwrap();
        assert_eq!(k.current(), 1);
        assert_eq!(k.available_blocks(), 2);
    }

    #[test]
    fn test_context_switch_counter() {
        let mut k = boot_two();
        let before = k.context_switches;
        assert_eq!(k.receive_message(), Delivery::Blocked); // 1 -> 2
        assert_eq!(k.receive_message(), Delivery::Blocked); // 2 -> null
        assert!(k.context_switches >= before + 2);
    }
}
