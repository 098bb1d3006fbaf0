//! Single-bit handoffs between interrupt context and the mission cycle.

use portable_atomic::{AtomicBool, Ordering};

/// Readiness flag written by an interrupt handler and consumed by the cycle.
///
/// The producer only ever calls [`signal`](Self::signal); the consumer calls
/// [`take`](Self::take), which clears the flag in the same atomic operation.
#[derive(Debug, Default)]
pub struct ReadyFlag {
    ready: AtomicBool,
}

impl ReadyFlag {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            ready: AtomicBool::new(false),
        }
    }

    /// Marks new data as available.
    pub fn signal(&self) {
        self.ready.store(true, Ordering::Release);
    }

    /// Returns whether data was ready and clears the flag.
    pub fn take(&self) -> bool {
        self.ready.swap(false, Ordering::AcqRel)
    }

    /// Reads the flag without consuming it.
    pub fn is_set(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn take_consumes_a_single_signal() {
        static FLAG: ReadyFlag = ReadyFlag::new();

        assert!(!FLAG.take());
        FLAG.signal();
        FLAG.signal();
        assert!(FLAG.is_set());
        assert!(FLAG.take());
        assert!(!FLAG.take());
    }
}
