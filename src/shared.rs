//! State shared by the two halves of a lock-free buffer

use crate::tagged::{AtomicTaggedSlot, Slot, TaggedSlot};

use crossbeam_utils::CachePadded;

use std::{
    cell::UnsafeCell,
    sync::{atomic::Ordering, Arc},
};

/// Lock-free buffer shared state
///
/// In the lock-free buffering protocols, the producer and consumer share the
/// following storage:
///
/// - N memory slots suitable for storing the data at hand
/// - One hand-off word, telling which slot is currently up for grabs and
///   whether it holds a publication that the consumer has not claimed yet.
///
/// Which slots the producer and the consumer own is private to each of them.
///
#[derive(Debug)]
pub(crate) struct SharedState<T: Send, const N: usize> {
    /// Data storage slots
    slots: [Slot<T>; N],

    /// Slot currently parked in the hand-off position, with its dirty bit
    pub(crate) handoff: CachePadded<AtomicTaggedSlot<T>>,
}
//
impl<T: Send, const N: usize> SharedState<T, N> {
    /// Build the shared state, parking slot `handoff_idx` in the hand-off word
    ///
    /// Slot addresses are only known once the storage has reached its final
    /// location, so the hand-off word is pointed at its slot after allocation.
    ///
    pub(crate) fn new(values: [T; N], handoff_idx: usize) -> Arc<Self> {
        let slots = values.map(|value| CachePadded::new(UnsafeCell::new(value)));
        let shared = Arc::new(Self {
            slots,
            handoff: CachePadded::new(AtomicTaggedSlot::null()),
        });
        shared
            .handoff
            .store(shared.slot(handoff_idx), Ordering::Relaxed);
        shared
    }

    /// Clean reference to one of the slots
    pub(crate) fn slot(&self, idx: usize) -> TaggedSlot<T> {
        TaggedSlot::new(&self.slots[idx])
    }

    /// Position of a slot in the storage array, ignoring the dirty bit
    #[cfg(test)]
    pub(crate) fn index_of(&self, slot: TaggedSlot<T>) -> usize {
        let slot = slot.without_dirty();
        (0..N)
            .find(|&idx| self.slot(idx) == slot)
            .expect("Tagged slot does not belong to this buffer")
    }
}
//
// The synchronization protocol ensures that each slot is only accessed by one
// thread at a time, with ownership handed over through the hand-off word.
unsafe impl<T: Send, const N: usize> Sync for SharedState<T, N> {}
