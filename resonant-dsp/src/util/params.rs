//! Single-slot parameter mailbox for control thread -> audio thread hand-off
//!
//! The control side overwrites the slot and raises a dirty flag. The audio
//! side drains it at most once per buffer with `try_lock`, so a contended
//! slot is simply picked up on the next buffer instead of blocking the
//! render callback.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

/// Latest-value-wins settings slot shared between two threads
#[derive(Debug, Default)]
pub struct Params<T> {
    slot: Mutex<Option<T>>,
    changed: AtomicBool,
}

impl<T: Clone> Params<T> {
    pub fn new() -> Self {
        Self {
            slot: Mutex::new(None),
            changed: AtomicBool::new(false),
        }
    }

    /// Publish new settings (control thread). Older unread settings are replaced.
    pub fn set(&self, params: &T) {
        let mut slot = self.slot.lock();
        *slot = Some(params.clone());
        self.changed.store(true, Ordering::Release);
    }

    /// Take the settings if they changed since the last call (audio thread).
    ///
    /// Never blocks: returns `None` when nothing changed or when the control
    /// thread currently holds the lock.
    pub fn get_if_changed(&self) -> Option<T> {
        if !self.changed.load(Ordering::Acquire) {
            return None;
        }
        let mut slot = self.slot.try_lock()?;
        let params = slot.take();
        self.changed.store(false, Ordering::Release);
        params
    }

    /// Whether a value is waiting to be drained
    pub fn has_pending(&self) -> bool {
        self.changed.load(Ordering::Acquire)
    }
}
