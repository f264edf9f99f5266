//! Lock-guarded double buffer
//!
//! Two slots, each behind its own reader-writer lock. A coarse state lock
//! tells which slot readers should use, and is only held exclusively while the
//! roles of the two slots are being swapped. Unlike the lock-free buffers,
//! this one can be shared by any number of consumer threads, at the cost of
//! taking locks on every access.

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use std::{
    ops::{Deref, DerefMut},
    sync::atomic::{AtomicBool, AtomicUsize, Ordering},
};

/// Slot index of a given role, as a function of the "read from slot A" flag
fn read_slot(read_from_a: bool) -> usize {
    if read_from_a {
        0
    } else {
        1
    }
}
//
fn write_slot(read_from_a: bool) -> usize {
    read_slot(!read_from_a)
}

/// A double buffer protected by locks
///
/// The producer prepares the next value in the write slot via
/// `acquire_for_write()`, then makes it the read slot with `swap_buffers()`.
/// Consumers access the read slot via `acquire_for_read()`.
///
/// Readers and the writer never contend as long as they work on different
/// slots. They do contend when a reader still holds the former read slot
/// after a swap, since that slot is the next one the producer writes into.
///
#[derive(Debug)]
pub struct GuardedDoubleBuffer<T> {
    /// Truth that readers should use slot A (`slots[0]`)
    state: RwLock<bool>,

    /// Truth that the slots were swapped since the last read
    changed: AtomicBool,

    /// Data storage slots
    slots: [RwLock<T>; 2],

    /// Number of live write guards, used to check swap_buffers() usage
    writers: AtomicUsize,
}
//
impl<T> GuardedDoubleBuffer<T> {
    /// Construct a double buffer with explicit initial slot contents
    ///
    /// Readers initially see `front`, and the first write goes to `back`.
    ///
    pub fn with_seeds(back: T, front: T) -> Self {
        Self {
            state: RwLock::new(true),
            changed: AtomicBool::new(false),
            slots: [RwLock::new(front), RwLock::new(back)],
            writers: AtomicUsize::new(0),
        }
    }

    /// Lock the read slot for reading
    ///
    /// Blocks while the producer writes into that same slot, which can only
    /// happen if it is misusing `swap_buffers()`. Any number of readers may
    /// hold the read slot at once.
    ///
    /// The returned guard also tells whether the slots were swapped since the
    /// last time anyone acquired them for reading. Each swap is reported to
    /// exactly one reader.
    ///
    pub fn acquire_for_read(&self) -> ReadGuard<'_, T> {
        let read_from_a = self.state.read();
        let slot = self.slots[read_slot(*read_from_a)].read();
        ReadGuard {
            slot,
            // Ordered with respect to swaps by the state lock
            changed: self.changed.swap(false, Ordering::Relaxed),
        }
    }

    /// Lock the read slot for reading, without blocking
    ///
    /// Returns `None` if the slot is busy or a swap is in progress.
    ///
    pub fn try_acquire_for_read(&self) -> Option<ReadGuard<'_, T>> {
        let read_from_a = self.state.try_read()?;
        let slot = self.slots[read_slot(*read_from_a)].try_read()?;
        Some(ReadGuard {
            slot,
            changed: self.changed.swap(false, Ordering::Relaxed),
        })
    }

    /// Lock the write slot for writing
    ///
    /// Blocks while readers are still holding that slot from before the last
    /// swap. Only the producer should call this.
    ///
    pub fn acquire_for_write(&self) -> WriteGuard<'_, T> {
        let read_from_a = self.state.read();
        let slot = self.slots[write_slot(*read_from_a)].write();
        WriteGuard::new(slot, &self.writers)
    }

    /// Lock the write slot for writing, without blocking
    ///
    /// Returns `None` if readers still hold the slot or a swap is in progress.
    ///
    pub fn try_acquire_for_write(&self) -> Option<WriteGuard<'_, T>> {
        let read_from_a = self.state.try_read()?;
        let slot = self.slots[write_slot(*read_from_a)].try_write()?;
        Some(WriteGuard::new(slot, &self.writers))
    }

    /// Exchange the roles of the read and write slots
    ///
    /// The slot which was just written becomes visible to readers, and the
    /// next `acquire_for_read()` reports the change.
    ///
    /// Only the producer should call this, after dropping its `WriteGuard`.
    /// Swapping while a write guard is alive would hand out a slot which is
    /// still being written to readers; debug builds panic when this happens.
    ///
    pub fn swap_buffers(&self) {
        debug_assert_eq!(
            self.writers.load(Ordering::Relaxed),
            0,
            "swap_buffers() called while a WriteGuard is alive"
        );
        let mut read_from_a = self.state.write();
        *read_from_a = !*read_from_a;
        self.changed.store(true, Ordering::Relaxed);
    }

    /// Tell whether the slots were swapped since the last read
    ///
    /// Unlike `acquire_for_read()`, this does not clear the flag. It is only
    /// intended for diagnostics purposes.
    ///
    pub fn changed(&self) -> bool {
        let _state = self.state.read();
        self.changed.load(Ordering::Relaxed)
    }
}
//
impl<T: Default> GuardedDoubleBuffer<T> {
    /// Construct a double buffer whose readers initially see `front`
    ///
    /// The write slot is default-constructed.
    ///
    pub fn new(front: T) -> Self {
        Self::with_seeds(T::default(), front)
    }
}
//
impl<T: Default> Default for GuardedDoubleBuffer<T> {
    /// Construct a double buffer with default-constructed slots
    fn default() -> Self {
        Self::new(T::default())
    }
}

/// Read access to the read slot of a `GuardedDoubleBuffer`
///
/// The slot stays locked for reading until this guard is dropped.
///
#[derive(Debug)]
#[must_use = "the slot is unlocked as soon as the guard is dropped"]
pub struct ReadGuard<'a, T> {
    slot: RwLockReadGuard<'a, T>,
    changed: bool,
}
//
impl<T> ReadGuard<'_, T> {
    /// Truth that this read is the first one since the last swap
    pub fn changed(&self) -> bool {
        self.changed
    }
}
//
impl<T> Deref for ReadGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.slot
    }
}

/// Write access to the write slot of a `GuardedDoubleBuffer`
///
/// The slot stays locked for writing until this guard is dropped. Drop it
/// before calling `swap_buffers()`.
///
#[derive(Debug)]
#[must_use = "the slot is unlocked as soon as the guard is dropped"]
pub struct WriteGuard<'a, T> {
    slot: RwLockWriteGuard<'a, T>,
    writers: &'a AtomicUsize,
}
//
impl<'a, T> WriteGuard<'a, T> {
    /// Wrap a slot lock, keeping track of live write guards
    fn new(slot: RwLockWriteGuard<'a, T>, writers: &'a AtomicUsize) -> Self {
        writers.fetch_add(1, Ordering::Relaxed);
        Self { slot, writers }
    }
}
//
impl<T> Deref for WriteGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.slot
    }
}
//
impl<T> DerefMut for WriteGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.slot
    }
}
//
impl<T> Drop for WriteGuard<'_, T> {
    fn drop(&mut self) {
        self.writers.fetch_sub(1, Ordering::Relaxed);
    }
}
