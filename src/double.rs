//! Lock-free double buffer
//!
//! Two slots are shared between one producer and one consumer. The consumer
//! always owns one of them (the front slot). The other one (the back slot) is
//! parked in the hand-off word, and its dirty bit says who may touch it:
//!
//! - Clean: the slot belongs to the producer, which writes into it.
//! - Dirty: the slot was published by the producer, and the consumer may claim
//!   it by swapping its front slot in.
//!
//! If the producer wants to write again before the consumer claimed its last
//! publication, it takes the publication back and overwrites it. Hence neither
//! side ever waits, but a consumer can miss updates which the producer
//! retracted. Use the triple buffer if that is a problem.

use crate::{shared::SharedState, tagged::TaggedSlot};

use std::{sync::atomic::Ordering, sync::Arc};

/// Initial slot assignment
const BACK_SLOT: usize = 0;
const FRONT_SLOT: usize = 1;

/// A lock-free double buffer for one producer and one consumer
///
/// Like the triple buffer, this behaves like a shared variable that the
/// producer updates and the consumer reads, but it uses one less slot at the
/// cost of letting the producer overwrite publications which the consumer did
/// not fetch yet.
///
/// Use `split()` to get the producer and consumer interfaces.
///
#[derive(Debug)]
pub struct LockFreeDoubleBuffer<T: Send> {
    /// Input object used by producers to send updates
    input: DoubleBufferInput<T>,

    /// Output object used by consumers to read the current value
    output: DoubleBufferOutput<T>,
}
//
impl<T: Send> LockFreeDoubleBuffer<T> {
    /// Construct a double buffer with explicit initial slot contents
    ///
    /// The consumer will initially read `front`, while the producer will
    /// initially write into the slot holding `back`.
    ///
    pub fn with_seeds(back: T, front: T) -> Self {
        let shared = SharedState::new([back, front], BACK_SLOT);
        LockFreeDoubleBuffer {
            input: DoubleBufferInput {
                back: None,
                shared: shared.clone(),
            },
            output: DoubleBufferOutput {
                front: shared.slot(FRONT_SLOT),
                shared,
            },
        }
    }

    /// Extract input and output of the double buffer
    pub fn split(self) -> (DoubleBufferInput<T>, DoubleBufferOutput<T>) {
        (self.input, self.output)
    }
}
//
impl<T: Default + Send> LockFreeDoubleBuffer<T> {
    /// Construct a double buffer whose consumer initially reads `front`
    ///
    /// The back slot is default-constructed.
    ///
    pub fn new(front: T) -> Self {
        Self::with_seeds(T::default(), front)
    }
}
//
impl<T: Default + Send> Default for LockFreeDoubleBuffer<T> {
    /// Construct a double buffer with default-constructed slots
    fn default() -> Self {
        Self::new(T::default())
    }
}

/// Producer interface to the double buffer
#[derive(Debug)]
pub struct DoubleBufferInput<T: Send> {
    /// Reference-counted shared state
    shared: Arc<SharedState<T, 2>>,

    /// Back slot, while the producer owns it (from write() to commit())
    back: Option<TaggedSlot<T>>,
}
//
// Public interface
impl<T: Send> DoubleBufferInput<T> {
    /// Access the back slot, to prepare the next update in place
    ///
    /// If the previous update was not fetched by the consumer yet, it is taken
    /// back and will be overwritten. Otherwise, the slot which the consumer
    /// released is recycled. Either way, the slot contains an older value of
    /// type T which should be fully overwritten before committing.
    ///
    /// This method may be called any number of times before `commit()`. It
    /// always returns the same slot, so the last modification wins.
    ///
    pub fn write(&mut self) -> &mut T {
        let back = match self.back {
            Some(back) => back,
            None => {
                let claimed = self.claim();
                self.back = Some(claimed);
                claimed
            }
        };
        // Safety: the hand-off word holds this slot with a clean tag, which
        // the consumer never touches, until we commit.
        unsafe { back.as_mut() }
    }

    /// Publish the back slot to the consumer
    ///
    /// This does nothing if `write()` was not called since the last commit.
    ///
    pub fn commit(&mut self) {
        let Some(back) = self.back.take() else {
            return;
        };

        // Mark the back slot as dirty, handing it over to the consumer
        let former = self.shared.handoff.swap(
            back.with_dirty(),
            Ordering::AcqRel, // Propagate our writes to the consumer
        );
        debug_assert_eq!(former, back, "Back slot was taken during a write");
    }

    /// Write a new value into the double buffer and publish it
    pub fn publish(&mut self, value: T) {
        *self.write() = value;
        self.commit();
    }

    /// Check if the consumer has fetched our last submission yet
    ///
    /// This method is only intended for diagnostics purposes.
    ///
    pub fn consumed(&self) -> bool {
        !self.shared.handoff.load(Ordering::Relaxed).is_dirty()
    }
}
//
// Internal interface
impl<T: Send> DoubleBufferInput<T> {
    /// Take ownership of the slot which is parked in the hand-off word
    fn claim(&self) -> TaggedSlot<T> {
        let handoff = &self.shared.handoff;

        // A clean slot is ours already. Acquire the consumer's release of it,
        // in case it was the consumer's former front slot.
        let parked = handoff.load(Ordering::Acquire);
        if !parked.is_dirty() {
            return parked;
        }

        // Try to retract our unread publication. If the consumer claimed it
        // first, it left its former front slot behind, with a clean tag.
        match handoff.compare_exchange(
            parked,
            parked.without_dirty(),
            Ordering::Acquire,
            Ordering::Acquire,
        ) {
            Ok(_) => parked.without_dirty(),
            Err(released) => {
                debug_assert!(!released.is_dirty());
                released
            }
        }
    }
}
//
// Only this input writes into the back slot, and it must be moved (not
// shared) to the producer thread.
unsafe impl<T: Send> Send for DoubleBufferInput<T> {}

/// Consumer interface to the double buffer
#[derive(Debug)]
pub struct DoubleBufferOutput<T: Send> {
    /// Reference-counted shared state
    shared: Arc<SharedState<T, 2>>,

    /// Front slot (which is private to the consumer)
    front: TaggedSlot<T>,
}
//
// Public interface
impl<T: Send> DoubleBufferOutput<T> {
    /// Access the latest value from the double buffer
    ///
    /// Also tells whether a new value was fetched from the producer. If not,
    /// the returned reference targets the same slot as the previous read.
    ///
    pub fn read(&mut self) -> (&T, bool) {
        let changed = self.update();

        // Safety: the producer only writes into the slot parked in the
        // hand-off word, which is never our front slot.
        (unsafe { self.front.as_ref() }, changed)
    }

    /// Tell whether a buffer update is incoming from the producer
    ///
    /// This method is only intended for diagnostics purposes. Even if it
    /// returns true, the producer may still retract the update before the
    /// next read.
    ///
    pub fn updated(&self) -> bool {
        self.shared.handoff.load(Ordering::Relaxed).is_dirty()
    }
}
//
// Internal interface
impl<T: Send> DoubleBufferOutput<T> {
    /// Check out incoming updates, telling whether one was carried out
    fn update(&mut self) -> bool {
        let handoff = &self.shared.handoff;

        // A stale "clean" observation only delays the update to the next read
        let published = handoff.load(Ordering::Relaxed);
        if !published.is_dirty() {
            return false;
        }

        // Swap our front slot for the published one, unless the producer
        // retracted it in the meantime.
        match handoff.compare_exchange(
            published,
            self.front,
            Ordering::AcqRel, // Fetch producer writes, release our slot
            Ordering::Relaxed,
        ) {
            Ok(_) => {
                self.front = published.without_dirty();
                true
            }
            Err(_) => false,
        }
    }
}
//
// Only this output reads the front slot, and it must be moved (not shared) to
// the consumer thread.
unsafe impl<T: Send> Send for DoubleBufferOutput<T> {}
