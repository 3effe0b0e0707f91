use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

/// Cancellation flag shared by an engine, its worker and every child engine.
#[derive(Debug, Clone, Default)]
pub struct StopControl {
    flag: Arc<AtomicBool>,
    signal: Arc<(Mutex<()>, Condvar)>,
}

impl StopControl {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }

    pub fn request_stop(&self) {
        self.flag.store(true, Ordering::Release);
        let (lock, condvar) = &*self.signal;
        let _guard = lock.lock();
        condvar.notify_all();
    }

    pub fn reset(&self) {
        self.flag.store(false, Ordering::Release);
    }

    /// Sleeps for `duration`, waking at least every `poll` to look at the flag.
    /// Returns `false` if a stop was requested before the time was up.
    pub fn sleep_interruptible(&self, duration: Duration, poll: Duration) -> bool {
        let deadline = Instant::now() + duration;
        let (lock, condvar) = &*self.signal;
        let mut guard = lock.lock();

        loop {
            if self.is_stopped() {
                return false;
            }
            let now = Instant::now();
            if now >= deadline {
                return true;
            }
            let chunk = (deadline - now).min(poll);
            let _ = condvar.wait_for(&mut guard, chunk);
        }
    }
}
