//! Generation-checked handles for native surfaces
//!
//! The host receives an opaque pointer-sized value. Internally it packs a slot
//! index in the low half and a generation counter in the high half, so a
//! handle that outlives its surface no longer resolves once the slot is
//! reused.

use std::ffi::c_void;
use std::fmt;
use std::num::NonZeroUsize;

use crate::error::{BridgeError, Result};

const HALF_BITS: u32 = usize::BITS / 2;
const HALF_MASK: usize = (1 << HALF_BITS) - 1;

/// Opaque identifier for a value stored in a [`HandleArena`]
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Handle(NonZeroUsize);

impl Handle {
    fn new(index: usize, generation: usize) -> Self {
        debug_assert!(index <= HALF_MASK && (1..=HALF_MASK).contains(&generation));
        let raw = (generation << HALF_BITS) | index;
        // generation is never zero, so neither is raw
        Handle(NonZeroUsize::new(raw).unwrap_or(NonZeroUsize::MIN))
    }

    /// Rebuild a handle from the value handed to the host
    ///
    /// Returns `None` for zero, which the host uses as "no handle".
    pub fn from_raw(raw: usize) -> Option<Self> {
        NonZeroUsize::new(raw).map(Handle)
    }

    /// Rebuild a handle from a host-side pointer value
    pub fn from_ptr(ptr: *const c_void) -> Option<Self> {
        Self::from_raw(ptr as usize)
    }

    /// The raw value handed to the host
    pub fn into_raw(self) -> usize {
        self.0.get()
    }

    /// The raw value as the `void*` the C interface expects
    pub fn as_ptr(self) -> *mut c_void {
        self.0.get() as *mut c_void
    }

    fn index(self) -> usize {
        self.0.get() & HALF_MASK
    }

    fn generation(self) -> usize {
        self.0.get() >> HALF_BITS
    }
}

impl fmt::Debug for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Handle({}v{})", self.index(), self.generation())
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0.get())
    }
}

struct Slot<T> {
    generation: usize,
    value: Option<T>,
}

/// Slot arena indexed by generation-checked [`Handle`]s
pub struct HandleArena<T> {
    slots: Vec<Slot<T>>,
    free: Vec<usize>,
    len: usize,
}

impl<T> Default for HandleArena<T> {
    fn default() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            len: 0,
        }
    }
}

impl<T> HandleArena<T> {
    /// Creates an empty arena
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a value and returns its handle
    pub fn insert(&mut self, value: T) -> Result<Handle> {
        self.try_insert_with(|_| Ok(value))
    }

    /// Stores a value built from its own handle
    ///
    /// When `build` fails the slot is released again and no handle escapes.
    pub fn try_insert_with(
        &mut self,
        build: impl FnOnce(Handle) -> Result<T>,
    ) -> Result<Handle> {
        let index = self.vacant_index()?;
        let handle = Handle::new(index, self.slots[index].generation);

        match build(handle) {
            Ok(value) => {
                self.slots[index].value = Some(value);
                self.len += 1;
                Ok(handle)
            }
            Err(err) => {
                self.free.push(index);
                Err(err)
            }
        }
    }

    fn vacant_index(&mut self) -> Result<usize> {
        if let Some(index) = self.free.pop() {
            return Ok(index);
        }

        let index = self.slots.len();
        if index > HALF_MASK {
            return Err(BridgeError::ArenaFull);
        }
        self.slots.push(Slot {
            generation: 1,
            value: None,
        });
        Ok(index)
    }

    /// Shared access to a live value
    pub fn get(&self, handle: Handle) -> Option<&T> {
        self.slots
            .get(handle.index())
            .filter(|slot| slot.generation == handle.generation())
            .and_then(|slot| slot.value.as_ref())
    }

    /// Exclusive access to a live value
    pub fn get_mut(&mut self, handle: Handle) -> Option<&mut T> {
        self.slots
            .get_mut(handle.index())
            .filter(|slot| slot.generation == handle.generation())
            .and_then(|slot| slot.value.as_mut())
    }

    /// Whether `handle` names a live value
    pub fn contains(&self, handle: Handle) -> bool {
        self.get(handle).is_some()
    }

    /// Removes a value, invalidating its handle
    pub fn remove(&mut self, handle: Handle) -> Option<T> {
        let index = handle.index();
        let slot = self
            .slots
            .get_mut(index)
            .filter(|slot| slot.generation == handle.generation())?;
        let value = slot.value.take()?;

        slot.generation = if slot.generation >= HALF_MASK {
            1
        } else {
            slot.generation + 1
        };
        self.free.push(index);
        self.len -= 1;
        Some(value)
    }

    /// Number of live values
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the arena holds no live values
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Iterates over live handles and values
    pub fn iter(&self) -> impl Iterator<Item = (Handle, &T)> {
        self.slots.iter().enumerate().filter_map(|(index, slot)| {
            slot.value
                .as_ref()
                .map(|value| (Handle::new(index, slot.generation), value))
        })
    }
}
