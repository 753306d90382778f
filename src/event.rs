//! "Event" primitives, allowing one or more threads to wait on a signal from other threads.
//!
//! The primary types in this module are the [`AutoResetEvent`] and the [`ManualResetEvent`]
//! structs, both of which implement the [`Awaitable`] trait. See the documentation on those types
//! for further information.
//!
//! [`AutoResetEvent`]: struct.AutoResetEvent.html
//! [`ManualResetEvent`]: struct.ManualResetEvent.html
//! [`Awaitable`]: trait.Awaitable.html

use std::fmt;
use std::time::{Duration, Instant};

use crate::gate::{Gate, Release, Wake};
use crate::util::deadline_after;

/// The operations shared by every event type in this crate.
///
/// This allows worker routines to be written once and handed any kind of event:
///
/// ```
/// use reset_event::{Awaitable, AutoResetEvent, ManualResetEvent};
///
/// fn drain(event: &dyn Awaitable) -> usize {
///     let mut seen = 0;
///     while event.try_wait() && seen < 3 {
///         seen += 1;
///     }
///     seen
/// }
///
/// // an auto-reset event only lets one call through per signal...
/// assert_eq!(drain(&AutoResetEvent::new(true)), 1);
/// // ...while a manual-reset event stays open
/// assert_eq!(drain(&ManualResetEvent::new(true)), 3);
/// ```
pub trait Awaitable: Send + Sync {
    /// Blocks the current thread until the event lets it through.
    fn wait(&self);

    /// Blocks the current thread until the event lets it through, or until `timeout` elapses.
    /// Returns `true` if the thread was let through and `false` if the timeout elapsed first.
    fn wait_timeout(&self, timeout: Duration) -> bool;

    /// Checks whether the event would let this thread through, without blocking. This is *not* a
    /// `peek`: on an auto-reset event, a `true` result consumes the signal.
    fn try_wait(&self) -> bool;

    /// Sets the signal on this event, waking up one or all threads waiting on it.
    fn set(&self);

    /// Resets the signal on this event, allowing threads that wait on it to block.
    fn reset(&self);

    /// Returns the current signal status of the event.
    fn status(&self) -> bool;
}

/// A synchronization primitive that lets exactly one waiting thread through per signal.
///
/// When an `AutoResetEvent` is signaled with [`set`], one thread blocked in [`wait`] is resumed
/// and the signal is automatically reset, so the next thread to wait will block. If no thread is
/// waiting when the event is set, the signal stays set until the next call to `wait`, which will
/// return immediately and reset it.
///
/// The event is binary, not a counting semaphore: calling `set` several times with no intervening
/// `wait` lets only one waiter through. If more than one thread is blocked when the event is set,
/// which of them is resumed is unspecified.
///
/// `AutoResetEvent` is modeled after [System.Threading.AutoResetEvent][src-link] from .NET.
///
/// [src-link]: https://learn.microsoft.com/en-us/dotnet/api/system.threading.autoresetevent
/// [`set`]: #method.set
/// [`wait`]: #method.wait
///
/// # Example
///
/// This example hands a turn back and forth between two threads with a pair of
/// `AutoResetEvent`s. `ping` starts out set, so the first thread gets to go first; every other
/// step is gated on the other thread finishing its turn.
///
/// ```
/// use reset_event::AutoResetEvent;
/// use std::sync::Arc;
/// use std::thread;
///
/// let ping = Arc::new(AutoResetEvent::new(true));
/// let pong = Arc::new(AutoResetEvent::new(false));
///
/// let (my_turn, their_turn) = (ping.clone(), pong.clone());
/// let first = thread::spawn(move || {
///     for i in 0..3 {
///         my_turn.wait();
///         println!("ping {}", i);
///         their_turn.set();
///     }
/// });
///
/// let (my_turn, their_turn) = (pong.clone(), ping.clone());
/// let second = thread::spawn(move || {
///     for i in 0..3 {
///         my_turn.wait();
///         println!("pong {}", i);
///         their_turn.set();
///     }
/// });
///
/// first.join().unwrap();
/// second.join().unwrap();
/// ```
pub struct AutoResetEvent {
    gate: Gate,
}

impl AutoResetEvent {
    /// Creates a new `AutoResetEvent` with the given starting state.
    ///
    /// If `init_state` is `true`, then this event will start with the signal already set, so that
    /// the first thread that tries to wait will immediately unblock.
    pub const fn new(init_state: bool) -> AutoResetEvent {
        AutoResetEvent {
            gate: Gate::new(init_state),
        }
    }

    /// Returns the current signal status of the `AutoResetEvent`.
    pub fn status(&self) -> bool {
        self.gate.is_signaled()
    }

    /// Returns the number of threads currently blocked on this event. Only a snapshot: it may be
    /// stale by the time the caller looks at it.
    pub fn waiters(&self) -> usize {
        self.gate.waiters()
    }

    /// Sets the signal on this `AutoResetEvent`, resuming one thread waiting on it.
    ///
    /// If no thread is currently waiting, the signal stays set, and the next thread to wait will
    /// unblock immediately. If the signal is already set, this does nothing.
    pub fn set(&self) {
        self.gate.open(Wake::One);
    }

    /// Resets the signal on this `AutoResetEvent`, regardless of its current status.
    pub fn reset(&self) {
        self.gate.close();
    }

    /// Blocks this thread until another thread calls `set`.
    ///
    /// If this event is already set, then this function will immediately return without blocking.
    /// Either way, the signal is reset before returning, so that the next thread to wait will
    /// block.
    pub fn wait(&self) {
        self.gate.wait_until(None, Release::Consume);
    }

    /// Blocks this thread until either another thread calls `set`, or until the timeout elapses.
    ///
    /// Returns `true` if this thread received the signal (which is reset before returning), and
    /// `false` if the timeout elapsed first. A wait that times out never consumes a signal.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        self.gate.wait_until(deadline_after(timeout), Release::Consume)
    }

    /// Blocks this thread until either another thread calls `set`, or until `deadline` passes.
    ///
    /// See [`wait_timeout`](#method.wait_timeout) for details.
    pub fn wait_deadline(&self, deadline: Instant) -> bool {
        self.gate.wait_until(Some(deadline), Release::Consume)
    }

    /// Takes the signal if it is set, without blocking. Returns whether the signal was taken.
    pub fn try_wait(&self) -> bool {
        self.gate.try_acquire(Release::Consume)
    }
}

impl Default for AutoResetEvent {
    fn default() -> AutoResetEvent {
        AutoResetEvent::new(false)
    }
}

impl fmt::Debug for AutoResetEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AutoResetEvent")
            .field("status", &self.status())
            .finish()
    }
}

impl Awaitable for AutoResetEvent {
    fn wait(&self) {
        AutoResetEvent::wait(self)
    }

    fn wait_timeout(&self, timeout: Duration) -> bool {
        AutoResetEvent::wait_timeout(self, timeout)
    }

    fn try_wait(&self) -> bool {
        AutoResetEvent::try_wait(self)
    }

    fn set(&self) {
        AutoResetEvent::set(self)
    }

    fn reset(&self) {
        AutoResetEvent::reset(self)
    }

    fn status(&self) -> bool {
        AutoResetEvent::status(self)
    }
}

/// A synchronization primitive that lets every waiting thread through until it is reset.
///
/// A `ManualResetEvent` is either open (signaled) or closed. [`set`] opens it, resuming every
/// thread blocked in [`wait`], and any thread that waits afterwards returns immediately until
/// [`reset`] closes it again. Setting an open event or resetting a closed one does nothing.
///
/// Every thread that was blocked when `set` was called is released, even if `reset` is called
/// again before it gets a chance to run.
///
/// `ManualResetEvent` is modeled after [System.Threading.ManualResetEvent][src-link] from .NET.
///
/// [src-link]: https://learn.microsoft.com/en-us/dotnet/api/system.threading.manualresetevent
/// [`set`]: #method.set
/// [`wait`]: #method.wait
/// [`reset`]: #method.reset
///
/// # Example
///
/// The following example uses two events:
///
/// * `start_signal` keeps all the worker threads from starting until they all have been spawned.
///   Workers that haven't reached `start.wait()` by the time it is set don't block at all.
/// * `stop_signal` is an [`AutoResetEvent`] that wakes the "coordinator" as soon as the first
///   worker finishes. The coordinator then joins the rest.
///
/// [`AutoResetEvent`]: struct.AutoResetEvent.html
///
/// ```
/// use reset_event::{AutoResetEvent, ManualResetEvent};
/// use std::sync::Arc;
/// use std::thread;
///
/// let start_signal = Arc::new(ManualResetEvent::new(false));
/// let stop_signal = Arc::new(AutoResetEvent::new(false));
/// let thread_count = 5;
/// let mut workers = Vec::new();
///
/// for i in 0..thread_count {
///     let start = start_signal.clone();
///     let stop = stop_signal.clone();
///     workers.push(thread::spawn(move || {
///         // as a manual-reset event, all the threads will start at the same time
///         start.wait();
///         println!("thread {} activated!", i);
///         stop.set();
///     }));
/// }
///
/// start_signal.set();
///
/// // sets don't accumulate, so two workers finishing back to back may only wake us once
/// stop_signal.wait();
/// for worker in workers {
///     worker.join().unwrap();
/// }
///
/// println!("all done!");
/// ```
pub struct ManualResetEvent {
    gate: Gate,
}

impl ManualResetEvent {
    /// Creates a new `ManualResetEvent` with the given starting state.
    ///
    /// If `init_state` is `true`, then this event will start open, so that threads that wait will
    /// immediately unblock until `reset` is called.
    pub const fn new(init_state: bool) -> ManualResetEvent {
        ManualResetEvent {
            gate: Gate::new(init_state),
        }
    }

    /// Returns the current signal status of the `ManualResetEvent`.
    pub fn status(&self) -> bool {
        self.gate.is_signaled()
    }

    /// Returns the number of threads currently blocked on this event. Only a snapshot: it may be
    /// stale by the time the caller looks at it.
    pub fn waiters(&self) -> usize {
        self.gate.waiters()
    }

    /// Opens this `ManualResetEvent`, resuming every thread waiting on it. Does nothing if the
    /// event is already open.
    pub fn set(&self) {
        self.gate.open(Wake::All);
    }

    /// Closes this `ManualResetEvent`, so that threads that wait on it will block until the next
    /// `set`. Does nothing if the event is already closed.
    pub fn reset(&self) {
        self.gate.close();
    }

    /// Blocks this thread until the event is open.
    ///
    /// If the event is already open, this returns immediately. The state of the event is never
    /// changed by waiting on it.
    pub fn wait(&self) {
        self.gate.wait_until(None, Release::Observe);
    }

    /// Blocks this thread until the event is open, or until the timeout elapses. Returns `true` if
    /// the event was opened in time.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        self.gate.wait_until(deadline_after(timeout), Release::Observe)
    }

    /// Blocks this thread until the event is open, or until `deadline` passes. Returns `true` if
    /// the event was opened in time.
    pub fn wait_deadline(&self, deadline: Instant) -> bool {
        self.gate.wait_until(Some(deadline), Release::Observe)
    }

    /// Returns whether the event is open, without blocking.
    pub fn try_wait(&self) -> bool {
        self.gate.try_acquire(Release::Observe)
    }
}

impl Default for ManualResetEvent {
    fn default() -> ManualResetEvent {
        ManualResetEvent::new(false)
    }
}

impl fmt::Debug for ManualResetEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManualResetEvent")
            .field("status", &self.status())
            .finish()
    }
}

impl Awaitable for ManualResetEvent {
    fn wait(&self) {
        ManualResetEvent::wait(self)
    }

    fn wait_timeout(&self, timeout: Duration) -> bool {
        ManualResetEvent::wait_timeout(self, timeout)
    }

    fn try_wait(&self) -> bool {
        ManualResetEvent::try_wait(self)
    }

    fn set(&self) {
        ManualResetEvent::set(self)
    }

    fn reset(&self) {
        ManualResetEvent::reset(self)
    }

    fn status(&self) -> bool {
        ManualResetEvent::status(self)
    }
}
