use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// One-shot flag shared by every submission trigger (explicit submit, timer
/// expiry, teardown). Only the trigger that wins `try_acquire` submits.
#[derive(Debug, Clone, Default)]
pub struct SubmitLatch {
    fired: Arc<AtomicBool>,
}

impl SubmitLatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Atomically claims the latch. `false` if another trigger already holds it.
    pub fn try_acquire(&self) -> bool {
        self.fired
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Re-arms the latch after a failed submission so the user can retry.
    pub fn release(&self) {
        self.fired.store(false, Ordering::Release);
    }

    pub fn is_fired(&self) -> bool {
        self.fired.load(Ordering::Acquire)
    }
}
