//! Ordered delivery of native events to the host

use crossbeam_channel::{Receiver, Sender, unbounded};
use std::sync::{Mutex, TryLockError};

/// Channel of pending native events with a single active consumer
///
/// Any thread may post. Delivery is done by whichever thread wins the delivery
/// guard; others return immediately and their events are picked up by the
/// active consumer. Events are delivered in post order and never
/// concurrently with each other.
pub struct EventQueue<E> {
    sender: Sender<E>,
    receiver: Receiver<E>,
    delivery: Mutex<()>,
}

impl<E> Default for EventQueue<E> {
    fn default() -> Self {
        let (sender, receiver) = unbounded();
        Self {
            sender,
            receiver,
            delivery: Mutex::new(()),
        }
    }
}

impl<E> EventQueue<E> {
    /// Creates an empty queue
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue an event without delivering it
    pub fn post(&self, event: E) {
        // the receiver lives as long as self, so send cannot fail
        let _ = self.sender.send(event);
    }

    /// A sender for producers that must not deliver inline
    pub fn sender(&self) -> Sender<E> {
        self.sender.clone()
    }

    /// Number of events waiting for delivery
    pub fn pending(&self) -> usize {
        self.receiver.len()
    }

    /// Deliver every pending event, unless another thread is already doing so
    ///
    /// Returns the number of events this call delivered. Re-entrant calls from
    /// inside `deliver` return 0; their events are delivered by the outer loop.
    pub fn drain(&self, mut deliver: impl FnMut(E)) -> usize {
        let mut delivered = 0;

        loop {
            let guard = match self.delivery.try_lock() {
                Ok(guard) => guard,
                Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
                Err(TryLockError::WouldBlock) => break,
            };

            while let Ok(event) = self.receiver.try_recv() {
                deliver(event);
                delivered += 1;
            }

            drop(guard);

            // a post may have raced with the release of the guard
            if self.receiver.is_empty() {
                break;
            }
        }

        delivered
    }
}
