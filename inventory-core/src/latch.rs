use std::sync::atomic::{AtomicBool, Ordering};

/// Non-blocking re-entrancy guard.
///
/// `try_acquire` either takes the latch or reports that another call on the
/// same instance is still in flight. The latch is released when the guard drops.
#[derive(Debug, Default)]
pub struct Latch {
    held: AtomicBool,
}

impl Latch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn try_acquire(&self) -> Option<LatchGuard<'_>> {
        self.held
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| LatchGuard { latch: self })
    }

    pub fn is_held(&self) -> bool {
        self.held.load(Ordering::Acquire)
    }
}

pub struct LatchGuard<'a> {
    latch: &'a Latch,
}

impl Drop for LatchGuard<'_> {
    fn drop(&mut self) {
        self.latch.held.store(false, Ordering::Release);
    }
}
