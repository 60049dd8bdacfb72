//! Single-producer/single-consumer event flag shared with interrupt context.
//!
//! The wake interrupt and the control loop share exactly one datum: a boolean
//! that the handler raises and the loop reads-and-clears. [`InterruptFlag`] is
//! meant to live in a `static`; access goes through narrow views so every
//! write site and every read/clear site can be found by type:
//!
//! - [`FlagRaiser`] is handed to the interrupt handler and can only `raise`.
//! - [`FlagReader`] is owned by the control loop and can observe or clear.
//!   [`InterruptFlag::take_reader`] hands it out once per flag.
//! - [`FlagMonitor`] can only observe. Anything outside the loop that needs to
//!   know about a pending event (the low-power HAL) holds one of these.
//!
//! Raising uses `Release` ordering and clearing swaps with `Acquire`, so
//! anything the handler wrote before raising is visible to the loop once it
//! takes the flag.

use portable_atomic::{AtomicBool, Ordering};

/// Boolean event cell written from interrupt context.
#[derive(Debug)]
pub struct InterruptFlag {
    raised: AtomicBool,
    reader_claimed: AtomicBool,
}

impl InterruptFlag {
    /// Creates a lowered flag. Usable in `static` initializers.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            raised: AtomicBool::new(false),
            reader_claimed: AtomicBool::new(false),
        }
    }

    /// Returns the interrupt-side view.
    #[must_use]
    pub const fn raiser(&self) -> FlagRaiser<'_> {
        FlagRaiser { flag: self }
    }

    /// Hands out the loop-side view. Only the first call succeeds; every later
    /// call returns `None`, so the flag has a single reader and clearer.
    #[must_use]
    pub fn take_reader(&self) -> Option<FlagReader<'_>> {
        if self.reader_claimed.swap(true, Ordering::AcqRel) {
            None
        } else {
            Some(FlagReader { flag: self })
        }
    }

    /// Returns an observe-only view.
    #[must_use]
    pub const fn monitor(&self) -> FlagMonitor<'_> {
        FlagMonitor { flag: self }
    }
}

impl Default for InterruptFlag {
    fn default() -> Self {
        Self::new()
    }
}

/// Write-only view used by the interrupt handler.
#[derive(Copy, Clone, Debug)]
pub struct FlagRaiser<'a> {
    flag: &'a InterruptFlag,
}

impl FlagRaiser<'_> {
    /// Marks the event as pending. A single store; never blocks.
    pub fn raise(&self) {
        self.flag.raised.store(true, Ordering::Release);
    }
}

/// Read/clear view owned by the control loop.
#[derive(Debug)]
pub struct FlagReader<'a> {
    flag: &'a InterruptFlag,
}

impl FlagReader<'_> {
    /// Clears the flag and reports whether it was raised.
    ///
    /// The clear happens before the caller acts on the event, so an edge that
    /// arrives while the event is being handled raises the flag again instead
    /// of being absorbed by a stale read.
    pub fn take(&mut self) -> bool {
        self.flag.raised.swap(false, Ordering::Acquire)
    }

    /// Lowers the flag without reporting its previous value.
    pub fn clear(&mut self) {
        self.flag.raised.swap(false, Ordering::Acquire);
    }

    /// Peeks at the flag without clearing it.
    #[must_use]
    pub fn is_raised(&self) -> bool {
        self.flag.raised.load(Ordering::Acquire)
    }
}

/// Observe-only view. Cannot lower the flag.
#[derive(Copy, Clone, Debug)]
pub struct FlagMonitor<'a> {
    flag: &'a InterruptFlag,
}

impl FlagMonitor<'_> {
    /// Peeks at the flag without clearing it.
    #[must_use]
    pub fn is_raised(&self) -> bool {
        self.flag.raised.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn take_reports_and_clears() {
        let flag = InterruptFlag::new();
        let mut reader = flag.take_reader().expect("first claim");

        assert!(!reader.take());
        flag.raiser().raise();
        assert!(reader.is_raised());
        assert!(reader.take());
        assert!(!reader.is_raised());
        assert!(!reader.take());
    }

    #[test]
    fn clearing_twice_is_a_no_op() {
        let flag = InterruptFlag::new();
        let mut reader = flag.take_reader().expect("first claim");

        flag.raiser().raise();
        reader.clear();
        reader.clear();
        assert!(!reader.is_raised());
        assert!(!flag.monitor().is_raised());
    }

    #[test]
    fn repeated_raises_collapse_into_one_event() {
        static FLAG: InterruptFlag = InterruptFlag::new();
        let raiser = FLAG.raiser();
        let mut reader = FLAG.take_reader().expect("first claim");

        raiser.raise();
        raiser.raise();
        assert!(reader.take());
        assert!(!reader.take());
    }

    #[test]
    fn reader_is_handed_out_once() {
        let flag = InterruptFlag::new();

        {
            let first = flag.take_reader();
            assert!(first.is_some());
            assert!(flag.take_reader().is_none());
        }
        assert!(flag.take_reader().is_none(), "the claim outlives the reader");
    }

    #[test]
    fn monitor_observes_without_consuming() {
        let flag = InterruptFlag::new();
        let mut reader = flag.take_reader().expect("first claim");
        let monitor = flag.monitor();

        flag.raiser().raise();
        assert!(monitor.is_raised());
        assert!(monitor.is_raised());
        assert!(reader.take(), "the event is still there for the reader");
        assert!(!monitor.is_raised());
    }
}
