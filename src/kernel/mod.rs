use std::rc::Rc;

use crate::{
    disk::Disk,
    fs::{FileSystem, error::Result},
    kernel::file::{FileDescriptor, OpenFileTable},
    sched::{
        Scheduler,
        clock::{Clock, PreemptFlag},
        interrupt::{IntStatus, Interrupts},
        machine::Machine,
        thread::Band,
    },
};

pub mod file;
pub mod syscall;

/// Ticks between timer interrupts; doubles as the L3 round-robin slice.
pub const TIMER_TICKS: i64 = 100;

/// A model for the kernel: the scheduler and filesystem cores wired to
/// their collaborator handles (tick source, preempt flag, interrupt cell,
/// machine, disk).
pub struct Kernel<D: Disk, M: Machine> {
    pub clock: Rc<Clock>,
    pub preempt: Rc<PreemptFlag>,
    pub interrupts: Rc<Interrupts>,
    pub scheduler: Scheduler,
    pub fs: FileSystem<D>,
    machine: M,
    open_files: OpenFileTable,
    next_descriptor: FileDescriptor,
    halted: bool,
}

impl<D: Disk, M: Machine> Kernel<D, M> {
    /// Boots over `disk`: formats it when `format` is set, otherwise mounts
    /// the filesystem already on it.
    pub fn new(disk: D, machine: M, format: bool) -> Result<Self> {
        let clock = Rc::new(Clock::new());
        let preempt = Rc::new(PreemptFlag::new());
        let interrupts = Rc::new(Interrupts::new());
        let scheduler = Scheduler::new(clock.clone(), preempt.clone(), interrupts.clone());

        let fs = if format {
            FileSystem::format(disk)?
        } else {
            FileSystem::mount(disk)?
        };

        Ok(Self {
            clock,
            preempt,
            interrupts,
            scheduler,
            fs,
            machine,
            open_files: OpenFileTable::new(),
            next_descriptor: 0,
            halted: false,
        })
    }

    pub fn machine(&self) -> &M {
        &self.machine
    }

    pub fn machine_mut(&mut self) -> &mut M {
        &mut self.machine
    }

    /// The timer callback: advances the clock one slice, ages the waiters,
    /// polls for SJF preemption, then consumes the preempt flag. The
    /// running thread is yielded when the flag was raised, or on every
    /// slice while an L3 thread holds the CPU (round robin).
    pub fn tick(&mut self) {
        self.clock.advance(TIMER_TICKS);

        let old_level = self.interrupts.set_level(IntStatus::Off);
        self.scheduler.aging_check();
        self.scheduler.preempt_check_l1();
        let quantum_expired =
            self.scheduler.thread(self.scheduler.current()).band() == Band::L3;
        let should_yield = self.preempt.take() || quantum_expired;
        self.interrupts.set_level(old_level);

        if should_yield {
            self.scheduler.yield_current(&mut self.machine);
        }
    }
}
