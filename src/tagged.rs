//! Tagged slot addresses
//!
//! The lock-free buffers hand slots over by exchanging their addresses through
//! a single atomic word. The lowest bit of that word is the "dirty" flag: the
//! producer sets it when it publishes a slot, and the consumer clears it when
//! it claims the published slot.
//!
//! This module is the only place where slot addresses and tags are mixed.
//! Tags are applied with strict-provenance address manipulation, so a pointer
//! is never rebuilt from a bare integer.

use crossbeam_utils::CachePadded;

use std::{
    cell::UnsafeCell,
    fmt, ptr,
    sync::atomic::{AtomicPtr, Ordering},
};

/// Storage for one buffered value
///
/// Each slot is padded and aligned to the target's cache line size, so that
/// the producer and the consumer never write to the same cache line while
/// working on different slots. The alignment also keeps the low bits of every
/// slot address at zero, which is what makes room for the dirty bit.
///
pub(crate) type Slot<T> = CachePadded<UnsafeCell<T>>;

/// Bit of a slot address which carries the dirty flag
const DIRTY_BIT: usize = 0b1;

// Every slot address must leave the dirty bit free
const _: () = assert!(std::mem::align_of::<Slot<u8>>() > DIRTY_BIT);

/// Address of a slot, possibly tagged with the dirty bit
pub(crate) struct TaggedSlot<T>(*mut Slot<T>);
//
impl<T> TaggedSlot<T> {
    /// Clean reference to a slot
    pub(crate) fn new(slot: &Slot<T>) -> Self {
        Self(ptr::from_ref(slot).cast_mut())
    }

    /// Same slot, with the dirty bit set
    pub(crate) fn with_dirty(self) -> Self {
        Self(self.0.map_addr(|addr| addr | DIRTY_BIT))
    }

    /// Same slot, with the dirty bit cleared
    pub(crate) fn without_dirty(self) -> Self {
        Self(self.0.map_addr(|addr| addr & !DIRTY_BIT))
    }

    /// Truth that the dirty bit is set
    pub(crate) fn is_dirty(self) -> bool {
        self.0.addr() & DIRTY_BIT != 0
    }

    /// Raw pointer to the slot's value
    ///
    /// The tag is stripped first, so this is valid whether or not the dirty
    /// bit was set. Dereferencing it is subject to the usual rules.
    ///
    pub(crate) fn get(self) -> *mut T {
        let slot = self.without_dirty().0;
        // Safety: tagged slots are only built from live slot references, and
        // the buffers keep their slots alive as long as any handle exists.
        unsafe { (*slot).get() }
    }

    /// Shared access to the slot's value
    ///
    /// # Safety
    ///
    /// The slot must outlive `'a`, and no one may mutate it during `'a`. The
    /// buffer protocols guarantee this for the slot a consumer last claimed.
    ///
    pub(crate) unsafe fn as_ref<'a>(self) -> &'a T {
        &*self.get()
    }

    /// Exclusive access to the slot's value
    ///
    /// # Safety
    ///
    /// The slot must outlive `'a`, and no one else may access it during `'a`.
    /// The buffer protocols guarantee this for the producer's back slot.
    ///
    pub(crate) unsafe fn as_mut<'a>(self) -> &'a mut T {
        &mut *self.get()
    }
}
//
impl<T> Clone for TaggedSlot<T> {
    fn clone(&self) -> Self {
        *self
    }
}
//
impl<T> Copy for TaggedSlot<T> {}
//
impl<T> PartialEq for TaggedSlot<T> {
    fn eq(&self, other: &Self) -> bool {
        ptr::eq(self.0, other.0)
    }
}
//
impl<T> Eq for TaggedSlot<T> {}
//
impl<T> fmt::Debug for TaggedSlot<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaggedSlot")
            .field("slot", &self.without_dirty().0)
            .field("dirty", &self.is_dirty())
            .finish()
    }
}

/// Atomic word holding a tagged slot address
pub(crate) struct AtomicTaggedSlot<T>(AtomicPtr<Slot<T>>);
//
impl<T> AtomicTaggedSlot<T> {
    /// Placeholder word, to be stored into before anyone loads from it
    pub(crate) fn null() -> Self {
        Self(AtomicPtr::new(ptr::null_mut()))
    }

    /// Read the current value
    pub(crate) fn load(&self, order: Ordering) -> TaggedSlot<T> {
        TaggedSlot(self.0.load(order))
    }

    /// Overwrite the current value
    pub(crate) fn store(&self, slot: TaggedSlot<T>, order: Ordering) {
        self.0.store(slot.0, order)
    }

    /// Replace the current value, returning the former one
    pub(crate) fn swap(&self, slot: TaggedSlot<T>, order: Ordering) -> TaggedSlot<T> {
        TaggedSlot(self.0.swap(slot.0, order))
    }

    /// Replace the current value if it matches `current`
    ///
    /// On failure, returns the value that was observed instead.
    ///
    pub(crate) fn compare_exchange(
        &self,
        current: TaggedSlot<T>,
        new: TaggedSlot<T>,
        success: Ordering,
        failure: Ordering,
    ) -> Result<TaggedSlot<T>, TaggedSlot<T>> {
        self.0
            .compare_exchange(current.0, new.0, success, failure)
            .map(TaggedSlot)
            .map_err(TaggedSlot)
    }
}
//
impl<T> fmt::Debug for AtomicTaggedSlot<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("AtomicTaggedSlot")
            .field(&self.load(Ordering::Relaxed))
            .finish()
    }
}
