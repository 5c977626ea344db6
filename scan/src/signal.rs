//! Signals from interrupt handlers to the main loop
//!
//! Only atomic loads and stores are used, so these work on ARMv6-M cores that
//! have no atomic read-modify-write instructions. Each flag must have a single
//! consumer.

use core::sync::atomic::{AtomicBool, Ordering};

pub struct Flag(AtomicBool);

impl Flag {
    pub const fn new() -> Self {
        Self(AtomicBool::new(false))
    }

    pub fn raise(&self) {
        self.0.store(true, Ordering::Release);
    }

    /// Clear the flag without consuming it
    pub fn lower(&self) {
        self.0.store(false, Ordering::Release);
    }

    pub fn peek(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    /// Consume the flag. A raise that lands between the load and the clear is
    /// merged with the one being consumed.
    pub fn take(&self) -> bool {
        if self.0.load(Ordering::Acquire) {
            self.0.store(false, Ordering::Release);
            true
        } else {
            false
        }
    }
}
