//! Handing frames of state from a producer thread to a consumer thread
//!
//! In this crate, we provide three implementations of one synchronization
//! pattern: a producer thread repeatedly publishes a fresh snapshot of some
//! value (a "frame" of simulation state, a sensor sample...), while a consumer
//! thread repeatedly reads the latest published snapshot (to render it, display
//! it, act upon it...), without either thread running in lockstep with the
//! other.
//!
//! - [`LockFreeTripleBuffer`] is the general-purpose choice. It is wait-free
//!   for one producer and one consumer, and the producer is never disturbed by
//!   a consumer which holds onto a value for a long time.
//! - [`LockFreeDoubleBuffer`] uses one slot less, but when the producer writes
//!   again before the consumer fetched its last update, that update is taken
//!   back and overwritten.
//! - [`GuardedDoubleBuffer`] takes locks on every access, but supports any
//!   number of consumer threads.
//!
//! # Examples
//!
//! The lock-free buffers are split into an input and an output interface, to
//! be respectively sent to the producer thread and the consumer thread:
//!
//! ```
//! use state_handoff::LockFreeTripleBuffer;
//! use std::thread;
//!
//! // Create a triple buffer, and split it into input and output interfaces
//! let (mut input, mut output) = LockFreeTripleBuffer::new(0u64).split();
//!
//! // The producer prepares the next value in place, then commits it
//! let producer = thread::spawn(move || {
//!     for frame in 1..=100 {
//!         *input.write() = frame;
//!         input.commit();
//!     }
//! });
//!
//! // The consumer accesses the latest value whenever it feels like it
//! let mut last_frame = 0;
//! while last_frame < 100 {
//!     let (frame, _changed) = output.read();
//!     assert!(*frame >= last_frame);
//!     last_frame = *frame;
//! }
//! producer.join().unwrap();
//! ```
//!
//! The guarded double buffer is shared by reference instead, and hands out
//! lock guards:
//!
//! ```
//! use state_handoff::GuardedDoubleBuffer;
//!
//! let buf = GuardedDoubleBuffer::new(String::from("first frame"));
//!
//! // The producer writes into the back slot, then swaps it to the front
//! buf.acquire_for_write().replace_range(.., "second frame");
//! buf.swap_buffers();
//!
//! // Each swap is reported to the first reader which sees it
//! let read = buf.acquire_for_read();
//! assert_eq!(&*read, "second frame");
//! assert!(read.changed());
//! ```
//!
//! # Thread safety
//!
//! The lock-free buffers' input and output interfaces can be moved to other
//! threads, but not shared between threads, and all their operations take
//! `&mut self`. This is what ensures that there is a single producer and a
//! single consumer, which their synchronization protocol relies on.

#![deny(missing_debug_implementations, missing_docs)]

mod double;
mod guarded;
mod shared;
mod tagged;
mod triple;

pub use crate::{
    double::{DoubleBufferInput, DoubleBufferOutput, LockFreeDoubleBuffer},
    guarded::{GuardedDoubleBuffer, ReadGuard, WriteGuard},
    triple::{LockFreeTripleBuffer, TripleBufferInput, TripleBufferOutput},
};
