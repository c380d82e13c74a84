use std::cell::Cell;

/// Whether interrupts are serviced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntStatus {
    Off,
    On,
}

/// The interrupt-enable cell.
///
/// On a single CPU, running with interrupts off makes the current thread the
/// sole mutator of kernel state; every scheduler entry point asserts that it
/// holds.
pub struct Interrupts {
    level: Cell<IntStatus>,
}

impl Interrupts {
    pub fn new() -> Self {
        Self {
            level: Cell::new(IntStatus::On),
        }
    }

    pub fn level(&self) -> IntStatus {
        self.level.get()
    }

    /// Switches the interrupt level, returning the previous one so callers
    /// can restore it.
    pub fn set_level(&self, level: IntStatus) -> IntStatus {
        self.level.replace(level)
    }
}

impl Default for Interrupts {
    fn default() -> Self {
        Self::new()
    }
}
