pub mod clock;
pub mod interrupt;
pub mod machine;
pub mod queue;
pub mod thread;

use std::collections::BTreeMap;
use std::rc::Rc;

use log::debug;

use crate::sched::{
    clock::{Clock, PreemptFlag},
    interrupt::{IntStatus, Interrupts},
    machine::Machine,
    queue::ReadyQueue,
    thread::{Band, L1_MIN_PRIORITY, L2_MIN_PRIORITY, PRIORITY_MAX, Status, Thread, ThreadId},
};

/// Ticks a thread may sit in a ready queue before aging promotes it.
pub const AGING_WAIT: i64 = 1500;

/// Priority gained per aging promotion, capped at `PRIORITY_MAX`.
pub const AGING_BOOST: u32 = 10;

/// The multilevel-feedback scheduler.
///
/// Ready threads live in one of three queues by priority band: L1
/// `[100,149]` ordered by shortest predicted burst (preemptive), L2
/// `[50,99]` ordered by highest priority, L3 `[0,49]` round-robin FIFO.
/// Selection always drains a higher queue before touching a lower one.
///
/// Every entry point requires interrupts to be disabled: on one CPU that
/// makes the caller the sole mutator of scheduler state.
pub struct Scheduler {
    threads: BTreeMap<ThreadId, Thread>,
    next_id: u32,
    l1: ReadyQueue,
    l2: ReadyQueue,
    l3: ReadyQueue,
    current: ThreadId,
    /// Pending-reap slot: a finished thread cannot free itself while its
    /// own stack is live, so the next dispatch consumes this after the
    /// switch.
    to_be_destroyed: Option<ThreadId>,
    clock: Rc<Clock>,
    preempt: Rc<PreemptFlag>,
    interrupts: Rc<Interrupts>,
}

impl Scheduler {
    /// Constructs a scheduler whose current thread is the bootstrap thread
    /// the kernel came up on.
    pub fn new(clock: Rc<Clock>, preempt: Rc<PreemptFlag>, interrupts: Rc<Interrupts>) -> Self {
        let main_id = ThreadId(0);
        let mut main = Thread::new(main_id, "main", 0);
        main.status = Status::Running;

        let mut threads = BTreeMap::new();
        threads.insert(main_id, main);

        Self {
            threads,
            next_id: 1,
            l1: ReadyQueue::new(),
            l2: ReadyQueue::new(),
            l3: ReadyQueue::new(),
            current: main_id,
            to_be_destroyed: None,
            clock,
            preempt,
            interrupts,
        }
    }

    /// Creates a thread. It takes no CPU until `ready_to_run`.
    ///
    /// # Panics
    /// Panics if `priority` is above `PRIORITY_MAX`.
    pub fn fork(&mut self, name: &str, priority: u32) -> ThreadId {
        assert!(priority <= PRIORITY_MAX, "priority {priority} out of range");

        let id = ThreadId(self.next_id);
        self.next_id += 1;
        self.threads.insert(id, Thread::new(id, name, priority));
        debug!("forked thread {id} ({name}), priority {priority}");
        id
    }

    pub fn current(&self) -> ThreadId {
        self.current
    }

    /// Returns the thread behind `id`.
    ///
    /// # Panics
    /// Panics if the thread does not exist (or was already reaped).
    pub fn thread(&self, id: ThreadId) -> &Thread {
        &self.threads[&id]
    }

    pub fn thread_mut(&mut self, id: ThreadId) -> &mut Thread {
        self.threads.get_mut(&id).expect("unknown thread")
    }

    pub fn contains(&self, id: ThreadId) -> bool {
        self.threads.contains_key(&id)
    }

    /// Returns the queue contents of a band, front first. For inspection.
    pub fn queued(&self, band: Band) -> Vec<ThreadId> {
        self.queue(band).iter().collect()
    }

    /// Classifies `id` by its priority band and inserts it into the
    /// matching queue, stamping the start of its wait.
    pub fn ready_to_run(&mut self, id: ThreadId) {
        assert_eq!(self.interrupts.level(), IntStatus::Off);

        let now = self.clock.now();
        let thread = self.threads.get_mut(&id).expect("unknown thread");
        thread.status = Status::Ready;
        thread.ready_start_time = now;

        self.enqueue(id);
    }

    /// Removes and returns the next thread to dispatch: the front of the
    /// highest non-empty queue. Charges the dequeued thread its wait.
    pub fn find_next_to_run(&mut self) -> Option<ThreadId> {
        assert_eq!(self.interrupts.level(), IntStatus::Off);

        let now = self.clock.now();
        let (id, band) = if let Some(id) = self.l1.pop_front() {
            (id, Band::L1)
        } else if let Some(id) = self.l2.pop_front() {
            (id, Band::L2)
        } else if let Some(id) = self.l3.pop_front() {
            (id, Band::L3)
        } else {
            return None;
        };

        let thread = self.threads.get_mut(&id).expect("unknown thread");
        thread.time_in_ready_queue += now - thread.ready_start_time;
        debug!("tick {now}: thread {id} leaves {band}");
        Some(id)
    }

    /// Dispatches the CPU to `next`. The caller has already moved the
    /// current thread out of `Running` (to ready, blocked or finished).
    ///
    /// When the switch hands control back, the epilogue runs on the stack
    /// of the thread that now owns the CPU: it reaps any thread parked in
    /// the pending-reap slot and restores the user state of the now-current
    /// thread.
    pub fn run(&mut self, machine: &mut impl Machine, next: ThreadId, finishing: bool) {
        assert_eq!(self.interrupts.level(), IntStatus::Off);

        let old = self.current;
        if finishing {
            assert!(self.to_be_destroyed.is_none());
            self.to_be_destroyed = Some(old);
        }

        let registers = machine.registers();
        if let Some(user) = self.threads.get_mut(&old).and_then(|t| t.user.as_mut()) {
            user.registers = registers;
        }
        machine.check_overflow(old);

        let now = self.clock.now();
        self.current = next;
        let thread = self.threads.get_mut(&next).expect("unknown thread");
        thread.status = Status::Running;
        thread.start_time = now;

        debug!("tick {now}: switching from thread {old} to thread {next}");
        machine.switch(old, next);

        // Back on a live stack: interrupts stay off across the switch.
        assert_eq!(self.interrupts.level(), IntStatus::Off);
        self.check_to_be_destroyed();

        let current = self.current;
        if let Some(user) = self.threads.get(&current).and_then(|t| t.user.as_ref()) {
            machine.restore_registers(&user.registers);
        }
    }

    fn check_to_be_destroyed(&mut self) {
        if let Some(id) = self.to_be_destroyed.take() {
            debug!("reaping finished thread {id}");
            self.threads.remove(&id);
        }
    }

    /// Applies aging to L1, L2 and L3, in that order.
    pub fn aging_check(&mut self) {
        assert_eq!(self.interrupts.level(), IntStatus::Off);

        self.age_queue(Band::L1);
        self.age_queue(Band::L2);
        self.age_queue(Band::L3);
    }

    fn age_queue(&mut self, band: Band) {
        let now = self.clock.now();
        let snapshot: Vec<ThreadId> = self.queue(band).iter().collect();

        for id in snapshot {
            let thread = self.threads.get_mut(&id).expect("unknown thread");
            let waited = now - thread.ready_start_time + thread.time_in_ready_queue;
            if waited < AGING_WAIT {
                continue;
            }

            let old_priority = thread.priority;
            thread.time_in_ready_queue = waited - AGING_WAIT;
            thread.ready_start_time = now;
            thread.priority = (old_priority + AGING_BOOST).min(PRIORITY_MAX);
            debug!(
                "tick {now}: thread {id} ages, priority {old_priority} -> {}",
                thread.priority
            );

            let new_band = thread.band();
            let predict_time = thread.predict_time;

            self.queue_mut(band).remove(id);
            if new_band != band {
                debug!("tick {now}: thread {id} moves from {band} to {new_band}");
            }
            self.enqueue(id);

            // A promotion may call for displacing the running thread.
            let current = &self.threads[&self.current];
            match new_band {
                Band::L1 => {
                    if current.priority < L1_MIN_PRIORITY
                        || current.predict_time > predict_time
                    {
                        self.preempt.raise();
                    }
                }
                Band::L2 => {
                    if current.priority < L2_MIN_PRIORITY {
                        self.preempt.raise();
                    }
                }
                Band::L3 => {}
            }
        }
    }

    /// The SJF preemption poll: raises the preempt flag when an L1 thread
    /// predicts a shorter burst than the L1-band thread on the CPU.
    pub fn preempt_check_l1(&self) {
        assert_eq!(self.interrupts.level(), IntStatus::Off);

        let current = &self.threads[&self.current];
        for id in self.l1.iter() {
            if current.priority >= L1_MIN_PRIORITY
                && current.predict_time > self.threads[&id].predict_time
            {
                self.preempt.raise();
            }
        }
    }

    /// Relinquishes the CPU but stays ready; dispatches whoever selection
    /// prefers. With nothing else ready the thread just keeps running.
    pub fn yield_current(&mut self, machine: &mut impl Machine) {
        let old_level = self.interrupts.set_level(IntStatus::Off);

        if let Some(next) = self.find_next_to_run() {
            self.ready_to_run(self.current);
            self.run(machine, next, false);
        }

        self.interrupts.set_level(old_level);
    }

    /// Blocks the current thread until someone readies it again. The burst
    /// that just ended feeds the next-burst estimate. Precondition:
    /// interrupts are disabled.
    ///
    /// # Panics
    /// Panics if no thread is ready: with everyone asleep there is nothing
    /// to dispatch.
    pub fn sleep_current(&mut self, machine: &mut impl Machine, finishing: bool) {
        assert_eq!(self.interrupts.level(), IntStatus::Off);

        let now = self.clock.now();
        let thread = self
            .threads
            .get_mut(&self.current)
            .expect("unknown thread");
        thread.status = if finishing {
            Status::Finished
        } else {
            Status::Blocked
        };
        thread.update_burst_estimate(now);

        let next = self.find_next_to_run().expect("no ready thread to dispatch");
        self.run(machine, next, finishing);
    }

    /// Ends the current thread. The carcass is parked in the pending-reap
    /// slot and freed after the switch, once a different stack runs.
    pub fn finish_current(&mut self, machine: &mut impl Machine) {
        let old_level = self.interrupts.set_level(IntStatus::Off);
        debug!("thread {} finishing", self.current);
        self.sleep_current(machine, true);
        self.interrupts.set_level(old_level);
    }

    fn queue(&self, band: Band) -> &ReadyQueue {
        match band {
            Band::L1 => &self.l1,
            Band::L2 => &self.l2,
            Band::L3 => &self.l3,
        }
    }

    fn queue_mut(&mut self, band: Band) -> &mut ReadyQueue {
        match band {
            Band::L1 => &mut self.l1,
            Band::L2 => &mut self.l2,
            Band::L3 => &mut self.l3,
        }
    }

    /// Inserts a ready thread into the queue its band dictates: L1 by
    /// ascending predicted burst, L2 by descending priority, L3 at the
    /// tail.
    fn enqueue(&mut self, id: ThreadId) {
        let now = self.clock.now();
        let band = self.threads[&id].band();
        debug!("tick {now}: thread {id} enters {band}");

        let Self {
            threads, l1, l2, l3, ..
        } = &mut *self;
        let threads = &*threads;

        match band {
            Band::L1 => l1.insert_by(id, |new, queued| {
                threads[&new].predict_time < threads[&queued].predict_time
            }),
            Band::L2 => l2.insert_by(id, |new, queued| {
                threads[&new].priority > threads[&queued].priority
            }),
            Band::L3 => l3.push_back(id),
        }
    }
}
