//! A backend address plus its latest observed health.

use std::sync::atomic::{AtomicBool, Ordering};

/// One backend the proxy can forward to. `healthy` is updated by
/// [`crate::proxy::health`] and read by [`crate::proxy::select`] on every
/// request; an `AtomicBool` lets both happen without a lock.
#[derive(Debug)]
pub struct Backend {
    pub address: String,
    healthy: AtomicBool,
}

impl Backend {
    /// A newly constructed backend starts out healthy; the first health
    /// probe will correct that within one interval if it's wrong.
    pub fn new(address: impl Into<String>) -> Self {
        Backend {
            address: address.into(),
            healthy: AtomicBool::new(true),
        }
    }

    pub fn is_healthy(&self) -> bool {
        self.healthy.load(Ordering::Relaxed)
    }

    pub fn set_healthy(&self, healthy: bool) {
        self.healthy.store(healthy, Ordering::Relaxed);
    }
}
