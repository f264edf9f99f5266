//! Lock-free triple buffer
//!
//! Three slots are shared between one producer and one consumer. The producer
//! owns one of them (the back slot), the consumer owns another one (the front
//! slot), and the third one sits in the middle, in the hand-off word. The
//! producer commits by swapping its back slot into the middle, and the consumer
//! fetches updates by swapping its front slot into the middle, so neither of
//! them ever has to wait for the other.

use crate::{shared::SharedState, tagged::TaggedSlot};

use std::{mem, sync::atomic::Ordering, sync::Arc};

/// Initial slot assignment
const BACK_SLOT: usize = 0;
const MIDDLE_SLOT: usize = 1;
const FRONT_SLOT: usize = 2;

/// A triple buffer, useful for nonblocking and thread-safe data sharing
///
/// A triple buffer is a single-producer single-consumer nonblocking
/// communication channel which behaves like a shared variable: the producer
/// submits regular updates, and the consumer accesses the latest available
/// value whenever it feels like it.
///
/// The input and output fields of this struct are what producers and consumers
/// actually use in practice. Use `split()` to move them away from the
/// LockFreeTripleBuffer struct, typically into the producer and consumer
/// threads.
///
#[derive(Debug)]
pub struct LockFreeTripleBuffer<T: Send> {
    /// Input object used by producers to send updates
    input: TripleBufferInput<T>,

    /// Output object used by consumers to read the current value
    output: TripleBufferOutput<T>,
}
//
impl<T: Send> LockFreeTripleBuffer<T> {
    /// Construct a triple buffer with explicit initial slot contents
    ///
    /// The consumer will initially read `front`. The `back` and `middle`
    /// values are only observable by the producer, through `write()`, as
    /// slots get recycled.
    ///
    pub fn with_seeds(back: T, middle: T, front: T) -> Self {
        // Start with the shared state...
        let shared = SharedState::new([back, middle, front], MIDDLE_SLOT);

        // ...then construct the input and output structs
        LockFreeTripleBuffer {
            input: TripleBufferInput {
                back: shared.slot(BACK_SLOT),
                written: false,
                shared: shared.clone(),
            },
            output: TripleBufferOutput {
                front: shared.slot(FRONT_SLOT),
                shared,
            },
        }
    }

    /// Extract input and output of the triple buffer
    pub fn split(self) -> (TripleBufferInput<T>, TripleBufferOutput<T>) {
        (self.input, self.output)
    }
}
//
impl<T: Default + Send> LockFreeTripleBuffer<T> {
    /// Construct a triple buffer whose consumer initially reads `front`
    ///
    /// The other slots are default-constructed.
    ///
    pub fn new(front: T) -> Self {
        Self::with_seeds(T::default(), T::default(), front)
    }
}
//
impl<T: Default + Send> Default for LockFreeTripleBuffer<T> {
    /// Construct a triple buffer with default-constructed slots
    fn default() -> Self {
        Self::new(T::default())
    }
}

/// Producer interface to the triple buffer
///
/// The producer of data can use this struct to submit updates to the triple
/// buffer whenever it likes. These updates are nonblocking: a collision
/// between the producer and the consumer will result in cache contention, but
/// deadlocks and scheduling-induced slowdowns cannot happen.
///
#[derive(Debug)]
pub struct TripleBufferInput<T: Send> {
    /// Reference-counted shared state
    shared: Arc<SharedState<T, 3>>,

    /// Back slot (which is private to the producer)
    back: TaggedSlot<T>,

    /// Truth that the back slot was handed out since the last commit
    written: bool,
}
//
// Public interface
impl<T: Send> TripleBufferInput<T> {
    /// Access the back slot, to prepare the next update in place
    ///
    /// Keep in mind that the back slot does not contain the last value that
    /// you committed (which is now in the hands of the consumer, or about to
    /// be). All you can safely assume is that it contains a valid value of
    /// type T, possibly an old one. Overwrite it fully before committing.
    ///
    /// This method may be called any number of times before `commit()`. It
    /// always returns the same slot, so the last modification wins.
    ///
    pub fn write(&mut self) -> &mut T {
        self.written = true;
        // Safety: the synchronization protocol ensures that we have exclusive
        // access to the back slot until the next commit.
        unsafe { self.back.as_mut() }
    }

    /// Publish the back slot to the consumer
    ///
    /// The back slot is swapped into the middle position, replacing any
    /// update which the consumer did not fetch yet, and the former middle slot
    /// becomes our new back slot.
    ///
    /// This does nothing if `write()` was not called since the last commit,
    /// since the back slot would then hold stale data.
    ///
    pub fn commit(&mut self) {
        if !mem::take(&mut self.written) {
            return;
        }

        // Swap the back slot and the middle slot, setting the dirty bit
        let former_middle = self.shared.handoff.swap(
            self.back.with_dirty(),
            Ordering::AcqRel, // Propagate our writes, reuse consumer's slot
        );

        // The old middle slot becomes our new back slot
        self.back = former_middle.without_dirty();
    }

    /// Write a new value into the triple buffer and publish it
    pub fn publish(&mut self, value: T) {
        *self.write() = value;
        self.commit();
    }

    /// Check if the consumer has fetched our last submission yet
    ///
    /// This method is only intended for diagnostics purposes. Please do not let
    /// it inform your decision of sending or not sending a value, as that would
    /// effectively be building a very poor spinlock-based double buffer
    /// implementation.
    ///
    pub fn consumed(&self) -> bool {
        !self.shared.handoff.load(Ordering::Relaxed).is_dirty()
    }
}
//
// Only this input accesses the back slot, and it must be moved (not shared)
// to the producer thread.
unsafe impl<T: Send> Send for TripleBufferInput<T> {}

/// Consumer interface to the triple buffer
///
/// The consumer of data can use this struct to access the latest published
/// update from the producer whenever it likes. Readout is nonblocking: a
/// collision between the producer and consumer will result in cache contention,
/// but deadlocks and scheduling-induced slowdowns cannot happen.
///
#[derive(Debug)]
pub struct TripleBufferOutput<T: Send> {
    /// Reference-counted shared state
    shared: Arc<SharedState<T, 3>>,

    /// Front slot (which is private to the consumer)
    front: TaggedSlot<T>,
}
//
// Public interface
impl<T: Send> TripleBufferOutput<T> {
    /// Access the latest value from the triple buffer
    ///
    /// Also tells whether a new value was fetched from the producer. If not,
    /// the returned reference targets the same slot as the previous read.
    ///
    pub fn read(&mut self) -> (&T, bool) {
        // Fetch updates from the producer
        let changed = self.update();

        // Safety: the synchronization protocol ensures that no one writes to
        // the front slot until we hand it back on a later update.
        (unsafe { self.front.as_ref() }, changed)
    }

    /// Tell whether a buffer update is incoming from the producer
    ///
    /// This method is only intended for diagnostics purposes. Please do not let
    /// it inform your decision of reading a value or not, as that would
    /// effectively be building a very poor spinlock-based double buffer
    /// implementation.
    ///
    pub fn updated(&self) -> bool {
        self.shared.handoff.load(Ordering::Relaxed).is_dirty()
    }
}
//
// Internal interface
impl<T: Send> TripleBufferOutput<T> {
    /// Check out incoming updates, telling whether one was carried out
    fn update(&mut self) -> bool {
        // A stale "clean" observation only delays the update to the next read
        let updated = self.updated();
        if updated {
            // If so, exchange our front slot with the middle slot, thusly
            // acquiring exclusive access to the latest update while giving
            // the producer a new slot to recycle.
            let former_middle = self.shared.handoff.swap(
                self.front,
                Ordering::AcqRel, // Fetch producer writes, release our slot
            );
            debug_assert!(former_middle.is_dirty());

            // Make the old middle slot our new front slot
            self.front = former_middle.without_dirty();
        }
        updated
    }
}
//
// Only this output accesses the front slot, and it must be moved (not shared)
// to the consumer thread.
unsafe impl<T: Send> Send for TripleBufferOutput<T> {}
