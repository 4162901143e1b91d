/// Response slot - latest-wins handoff from the listener to the correlator
///
/// Holds either nothing or the most recently received reply. A new write
/// replaces whatever was there; older replies are dropped without notice.
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::Notify;
use tokio::time::Instant;

use crate::contracts::Reply;

#[derive(Debug, Default)]
pub struct ResponseSlot {
    value: Mutex<Option<Reply>>,
    arrived: Notify,
}

impl ResponseSlot {
    pub fn new() -> Self {
        Self::default()
    }

    // The stored value is always whole, so a poisoned lock is still usable.
    fn lock(&self) -> MutexGuard<'_, Option<Reply>> {
        self.value.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn clear(&self) {
        *self.lock() = None;
    }

    /// Replace the current value and wake a pending `wait`
    pub fn write(&self, reply: Reply) {
        *self.lock() = Some(reply);
        self.arrived.notify_waiters();
    }

    pub fn peek(&self) -> Option<Reply> {
        self.lock().clone()
    }

    pub fn take(&self) -> Option<Reply> {
        self.lock().take()
    }

    /// Wait until the slot holds a value or `timeout` elapses
    ///
    /// Returns a copy of the value; the slot itself is left untouched.
    pub async fn wait(&self, timeout: Duration) -> Option<Reply> {
        let deadline = Instant::now() + timeout;
        loop {
            // Register before checking so a write in between is not missed.
            let notified = self.arrived.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if let Some(reply) = self.peek() {
                return Some(reply);
            }
            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return self.peek();
            }
        }
    }
}
