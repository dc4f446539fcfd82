//! Single-slot callback registration

use std::sync::{Arc, PoisonError, RwLock};

/// Holds at most one listener for an event
///
/// Setting a new listener replaces the previous one. Readers clone the
/// current listener out under the lock and invoke it after releasing it, so a
/// listener may replace itself or call back into the bridge.
pub struct CallbackSlot<F: ?Sized> {
    inner: RwLock<Option<Arc<F>>>,
}

impl<F: ?Sized> Default for CallbackSlot<F> {
    fn default() -> Self {
        Self::new()
    }
}

impl<F: ?Sized> CallbackSlot<F> {
    /// Creates an empty slot
    pub const fn new() -> Self {
        Self {
            inner: RwLock::new(None),
        }
    }

    /// Replaces the listener, returning whether one was registered before
    ///
    /// `None` clears the slot.
    pub fn set(&self, callback: Option<Arc<F>>) -> bool {
        let mut slot = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        std::mem::replace(&mut *slot, callback).is_some()
    }

    /// The current listener, if any
    pub fn get(&self) -> Option<Arc<F>> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Whether a listener is registered
    pub fn is_set(&self) -> bool {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }
}
