//! Lifecycle flags shared between the controller and the connection thread

use std::sync::atomic::{AtomicBool, Ordering};

/// Three independent flags; the closing transition is one-way.
#[derive(Debug)]
pub(crate) struct LifecycleFlags {
    running: AtomicBool,
    closed: AtomicBool,
    retry_enabled: AtomicBool,
}

impl Default for LifecycleFlags {
    fn default() -> Self {
        Self {
            running: AtomicBool::new(true),
            closed: AtomicBool::new(false),
            retry_enabled: AtomicBool::new(true),
        }
    }
}

impl LifecycleFlags {
    /// Reading and dispatching may continue
    pub fn is_active(&self) -> bool {
        self.running.load(Ordering::SeqCst) && !self.closed.load(Ordering::SeqCst)
    }

    /// The reconnection loop may start another attempt
    pub fn should_retry(&self) -> bool {
        self.is_active() && self.retry_enabled.load(Ordering::SeqCst)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Flip `closed` to true. Only the first caller gets `true`.
    pub fn try_begin_close(&self) -> bool {
        self.closed
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    /// Stop reading and reconnecting
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        self.retry_enabled.store(false, Ordering::SeqCst);
    }
}
