//! A collection of thread-signaling events that build on the primitives available in the standard
//! library.
//!
//! This library contains the following event types:
//!
//! * [`AutoResetEvent`], a gate that lets exactly one waiting thread through each time it is set,
//!   then closes itself again.
//! * [`ManualResetEvent`], a gate that lets every waiting thread through once it is set, and stays
//!   open until it is reset.
//! * [`SpinResetEvent`], a manual-reset event that polls for a short while before blocking, for
//!   waits that are expected to be short.
//!
//! All three implement the [`Awaitable`] trait, so worker routines can be written once against any
//! of them.
//!
//! Events are plain values. Share them between threads with an `Arc`, by reference inside
//! `std::thread::scope`, or (for the two blocking events, whose constructors are `const`) by
//! putting them in a `static`.
//!
//! ```
//! use reset_event::{AutoResetEvent, Awaitable, ManualResetEvent};
//! use std::thread;
//!
//! let data_ready = AutoResetEvent::new(false);
//! let done = ManualResetEvent::new(false);
//! let mut data = 0;
//!
//! thread::scope(|s| {
//!     s.spawn(|| {
//!         data_ready.wait();
//!         done.set();
//!     });
//!
//!     data = 42;
//!     data_ready.set();
//!     done.wait();
//! });
//!
//! assert_eq!(data, 42);
//! assert!(done.status());
//! ```
//!
//! Internally, every event keeps its flag behind a `Mutex` and parks waiters on a `Condvar`. The
//! flag is only ever checked, flipped, and signaled while holding that mutex, so a `set` can't slip
//! in between a waiter checking the flag and going to sleep. A `SpinResetEvent` also polls a
//! lock-free copy of the flag before it blocks. Diagnostic output is emitted through [`tracing`]
//! at the `trace` level; the library never installs a subscriber.
//!
//! [`AutoResetEvent`]: event/struct.AutoResetEvent.html
//! [`ManualResetEvent`]: event/struct.ManualResetEvent.html
//! [`SpinResetEvent`]: spin/struct.SpinResetEvent.html
//! [`Awaitable`]: event/trait.Awaitable.html
//! [`tracing`]: https://docs.rs/tracing

#![deny(missing_docs)]

mod gate;
mod util;

pub mod event;
pub mod spin;

pub use crate::event::{AutoResetEvent, Awaitable, ManualResetEvent};
pub use crate::spin::{SpinConfig, SpinConfigError, SpinResetEvent, SpinWait, MAX_SPIN_COUNT};
