use std::cell::Cell;

/// The timer collaborator's tick counter: monotonic, in arbitrary ticks.
/// The scheduler holds a shared handle and only ever reads it; the timer
/// driver advances it.
#[derive(Default)]
pub struct Clock {
    ticks: Cell<i64>,
}

impl Clock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn now(&self) -> i64 {
        self.ticks.get()
    }

    pub fn advance(&self, ticks: i64) {
        self.ticks.set(self.ticks.get() + ticks);
    }
}

/// The shared preemption request cell.
///
/// The scheduler only ever raises it; the timer interrupt handler takes it
/// and, when raised, yields the running thread.
#[derive(Default)]
pub struct PreemptFlag {
    raised: Cell<bool>,
}

impl PreemptFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raise(&self) {
        self.raised.set(true);
    }

    pub fn is_raised(&self) -> bool {
        self.raised.get()
    }

    /// Consumes the request, returning whether it was raised.
    pub fn take(&self) -> bool {
        self.raised.replace(false)
    }
}
