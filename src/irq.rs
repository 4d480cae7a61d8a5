//! Receive interrupt scheduling
//!
//! The interrupt handler masks the receive-ready source and schedules the drain; the drain
//! loop clears the flag once the ring is empty. The flag keeps two drains from ever running at
//! the same time, even when the interrupt fires again in between.

use core::sync::atomic::{AtomicBool, Ordering};

#[derive(Debug, Default)]
pub struct RxSchedule {
    scheduled: AtomicBool,
}

impl RxSchedule {
    pub const fn new() -> Self {
        RxSchedule {
            scheduled: AtomicBool::new(false),
        }
    }

    /// Claim the drain. Returns `false` if one is already scheduled, in which case the caller
    /// must not run another.
    pub fn try_schedule(&self) -> bool {
        self.scheduled
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub fn is_scheduled(&self) -> bool {
        self.scheduled.load(Ordering::Acquire)
    }

    pub(crate) fn complete(&self) {
        self.scheduled.store(false, Ordering::Release);
    }
}
