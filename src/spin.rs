//! A manual-reset event that spins before it blocks.
//!
//! The primary type in this module is [`SpinResetEvent`], along with the [`SpinConfig`] that tunes
//! how long it spins and the [`SpinWait`] backoff helper it spins with.
//!
//! [`SpinResetEvent`]: struct.SpinResetEvent.html
//! [`SpinConfig`]: struct.SpinConfig.html
//! [`SpinWait`]: struct.SpinWait.html

use std::fmt;
use std::hint;
use std::thread;
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::trace;

use crate::event::Awaitable;
use crate::gate::{Gate, Wake};
use crate::util::{deadline_after, remaining};

/// The largest spin count a [`SpinConfig`] accepts.
///
/// [`SpinConfig`]: struct.SpinConfig.html
pub const MAX_SPIN_COUNT: u32 = 2047;

// busy-spin rounds double up to 2^6 hints, then stay there
const MAX_BACKOFF_SHIFT: u32 = 6;

/// The collection of errors that can be returned when configuring a [`SpinResetEvent`].
///
/// [`SpinResetEvent`]: struct.SpinResetEvent.html
#[derive(Error, Debug, Copy, Clone, PartialEq, Eq)]
pub enum SpinConfigError {
    /// Returned when the requested spin count is larger than [`MAX_SPIN_COUNT`].
    ///
    /// [`MAX_SPIN_COUNT`]: constant.MAX_SPIN_COUNT.html
    #[error("spin count {requested} is out of range (maximum is {max})")]
    SpinCountOutOfRange {
        /// The spin count that was asked for.
        requested: u32,
        /// The largest spin count allowed.
        max: u32,
    },
}

/// Tunes how long a [`SpinResetEvent`] polls before it blocks the waiting thread.
///
/// The default spins 35 rounds on machines with more than one CPU, and only once on single-CPU
/// machines, where spinning can't help: the thread that would set the event can't run while we
/// spin.
///
/// [`SpinResetEvent`]: struct.SpinResetEvent.html
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct SpinConfig {
    spin_count: u32,
    yield_after: u32,
}

impl SpinConfig {
    /// Creates a `SpinConfig` with the given spin count and the default yield threshold.
    pub fn new(spin_count: u32) -> SpinConfig {
        SpinConfig {
            spin_count,
            yield_after: 10,
        }
    }

    /// Sets the number of polling rounds to perform before blocking.
    pub fn with_spin_count(mut self, spin_count: u32) -> SpinConfig {
        self.spin_count = spin_count;
        self
    }

    /// Sets the number of busy-spinning rounds after which each round yields the thread to the
    /// scheduler instead.
    pub fn with_yield_after(mut self, yield_after: u32) -> SpinConfig {
        self.yield_after = yield_after;
        self
    }

    /// Returns the number of polling rounds to perform before blocking.
    pub fn spin_count(&self) -> u32 {
        self.spin_count
    }

    /// Returns the number of busy-spinning rounds before rounds start yielding.
    pub fn yield_after(&self) -> u32 {
        self.yield_after
    }

    /// Checks that this configuration is usable.
    ///
    /// # Errors
    ///
    /// If the spin count is larger than [`MAX_SPIN_COUNT`], this returns
    /// `SpinConfigError::SpinCountOutOfRange`.
    ///
    /// [`MAX_SPIN_COUNT`]: constant.MAX_SPIN_COUNT.html
    pub fn validate(self) -> Result<SpinConfig, SpinConfigError> {
        if self.spin_count > MAX_SPIN_COUNT {
            return Err(SpinConfigError::SpinCountOutOfRange {
                requested: self.spin_count,
                max: MAX_SPIN_COUNT,
            });
        }

        Ok(self)
    }
}

impl Default for SpinConfig {
    fn default() -> SpinConfig {
        if num_cpus::get() > 1 {
            SpinConfig::new(35)
        } else {
            SpinConfig::new(1)
        }
    }
}

/// A bounded spin loop with exponential backoff.
///
/// Each call to [`spin`] is one round. The first rounds busy-spin, issuing twice as many
/// `spin_loop` hints as the previous round; past the configured yield threshold, a round yields
/// the thread instead. Once the round budget runs out, `spin` returns `false` and the caller
/// should block.
///
/// [`spin`]: #method.spin
///
/// # Example
///
/// ```
/// use reset_event::{SpinConfig, SpinWait};
///
/// let mut spin = SpinWait::new(&SpinConfig::new(3));
/// let mut rounds = 0;
/// while spin.spin() {
///     rounds += 1;
/// }
/// assert_eq!(rounds, 3);
/// ```
#[derive(Debug)]
pub struct SpinWait {
    round: u32,
    limit: u32,
    yield_after: u32,
}

impl SpinWait {
    /// Creates a new `SpinWait` with the budget from the given configuration.
    pub fn new(config: &SpinConfig) -> SpinWait {
        SpinWait {
            round: 0,
            limit: config.spin_count,
            yield_after: config.yield_after,
        }
    }

    /// Starts the round budget over.
    pub fn reset(&mut self) {
        self.round = 0;
    }

    /// Performs one round of spinning. Returns `false` without spinning if the budget is used up.
    pub fn spin(&mut self) -> bool {
        if self.round >= self.limit {
            return false;
        }

        if self.round < self.yield_after {
            (0..1u32 << self.round.min(MAX_BACKOFF_SHIFT)).for_each(|_| hint::spin_loop());
        } else {
            thread::yield_now();
        }

        self.round += 1;
        true
    }
}

/// A manual-reset event that polls for a short while before blocking.
///
/// A `SpinResetEvent` has the same contract as a [`ManualResetEvent`]: [`set`] opens it and
/// releases every waiting thread, [`reset`] closes it again, and waiting never changes its state.
/// The difference is in how a thread waits. It first polls the event's state with plain atomic
/// loads for the number of rounds given by its [`SpinConfig`], and only blocks if the event is
/// still closed after that. This trades CPU time for wakeup latency, and only pays off when waits
/// are expected to be short.
///
/// Spinning reads a lock-free copy of the event's state. A waiter that is still waiting once its
/// spin budget runs out blocks on the same mutex and condition variable a `ManualResetEvent` uses,
/// so a thread that gives up on a timeout leaves nothing behind.
///
/// `SpinResetEvent` is modeled after [System.Threading.ManualResetEventSlim][src-link] from .NET.
///
/// [src-link]: https://learn.microsoft.com/en-us/dotnet/api/system.threading.manualreseteventslim
/// [`ManualResetEvent`]: ../event/struct.ManualResetEvent.html
/// [`SpinConfig`]: struct.SpinConfig.html
/// [`set`]: #method.set
/// [`reset`]: #method.reset
///
/// # Example
///
/// ```
/// use reset_event::SpinResetEvent;
/// use std::sync::Arc;
/// use std::thread;
///
/// let ready = Arc::new(SpinResetEvent::with_spin_count(false, 100).unwrap());
///
/// let signal = ready.clone();
/// let worker = thread::spawn(move || {
///     // the wait is about as long as it takes to spawn a thread, so spinning likely catches it
///     signal.wait();
///     println!("released by spin event");
/// });
///
/// ready.set();
/// worker.join().unwrap();
/// ```
pub struct SpinResetEvent {
    gate: Gate,
    config: SpinConfig,
}

impl SpinResetEvent {
    /// Creates a new `SpinResetEvent` with the given starting state and the default
    /// configuration.
    pub fn new(init_state: bool) -> SpinResetEvent {
        SpinResetEvent::from_valid_config(init_state, SpinConfig::default())
    }

    /// Creates a new `SpinResetEvent` with the given starting state and configuration.
    ///
    /// # Errors
    ///
    /// See [`SpinConfig::validate`] for the situations where this function will return an error.
    ///
    /// [`SpinConfig::validate`]: struct.SpinConfig.html#method.validate
    pub fn with_config(
        init_state: bool,
        config: SpinConfig,
    ) -> Result<SpinResetEvent, SpinConfigError> {
        Ok(SpinResetEvent::from_valid_config(init_state, config.validate()?))
    }

    /// Creates a new `SpinResetEvent` with the given starting state that polls `spin_count`
    /// rounds before blocking.
    ///
    /// # Errors
    ///
    /// If `spin_count` is larger than [`MAX_SPIN_COUNT`], this function will return
    /// `SpinConfigError::SpinCountOutOfRange`.
    ///
    /// [`MAX_SPIN_COUNT`]: constant.MAX_SPIN_COUNT.html
    pub fn with_spin_count(
        init_state: bool,
        spin_count: u32,
    ) -> Result<SpinResetEvent, SpinConfigError> {
        SpinResetEvent::with_config(init_state, SpinConfig::default().with_spin_count(spin_count))
    }

    fn from_valid_config(init_state: bool, config: SpinConfig) -> SpinResetEvent {
        SpinResetEvent {
            gate: Gate::new(init_state),
            config,
        }
    }

    /// Returns the current signal status of the `SpinResetEvent`.
    pub fn status(&self) -> bool {
        self.gate.snapshot().signaled
    }

    /// Returns the number of polling rounds a waiter performs before blocking.
    pub fn spin_count(&self) -> u32 {
        self.config.spin_count
    }

    /// Returns the number of threads currently blocked on this `SpinResetEvent`.
    ///
    /// Threads that are still spinning are not counted.
    pub fn waiters(&self) -> usize {
        self.gate.waiters()
    }

    /// Opens this `SpinResetEvent`, resuming every thread waiting on it. Does nothing if the event
    /// is already open.
    pub fn set(&self) {
        self.gate.open(Wake::All);
    }

    /// Closes this `SpinResetEvent`, so that threads that wait on it will block until the next
    /// `set`. Does nothing if the event is already closed.
    pub fn reset(&self) {
        self.gate.close();
    }

    /// Returns whether the event is open, without blocking.
    pub fn try_wait(&self) -> bool {
        self.status()
    }

    /// Blocks this thread until the event is open.
    ///
    /// If the event is already open, this returns immediately. Every thread that was waiting when
    /// `set` was called is released, even if the event is reset again before it gets to run.
    pub fn wait(&self) {
        self.wait_until(None);
    }

    /// Blocks this thread until the event is open, or until the timeout elapses. Returns `true` if
    /// the event was opened in time.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        self.wait_until(deadline_after(timeout))
    }

    /// Blocks this thread until the event is open, or until `deadline` passes. Returns `true` if
    /// the event was opened in time.
    pub fn wait_deadline(&self, deadline: Instant) -> bool {
        self.wait_until(Some(deadline))
    }

    fn wait_until(&self, deadline: Option<Instant>) -> bool {
        let entered = self.gate.snapshot();
        if entered.signaled {
            return true;
        }

        let mut spin = SpinWait::new(&self.config);
        while spin.spin() {
            if self.gate.snapshot().released_since(entered) {
                return true;
            }

            if let Some(deadline) = deadline {
                if remaining(deadline).is_none() {
                    return false;
                }
            }
        }

        trace!(spins = self.config.spin_count, "spin budget used up, blocking");
        // a `set` that landed after `entered` was taken still counts, even if it was reset since
        self.gate.wait_since(entered, deadline)
    }
}

impl Default for SpinResetEvent {
    fn default() -> SpinResetEvent {
        SpinResetEvent::new(false)
    }
}

impl fmt::Debug for SpinResetEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpinResetEvent")
            .field("status", &self.status())
            .field("spin_count", &self.config.spin_count)
            .finish()
    }
}

impl Awaitable for SpinResetEvent {
    fn wait(&self) {
        SpinResetEvent::wait(self)
    }

    fn wait_timeout(&self, timeout: Duration) -> bool {
        SpinResetEvent::wait_timeout(self, timeout)
    }

    fn try_wait(&self) -> bool {
        SpinResetEvent::try_wait(self)
    }

    fn set(&self) {
        SpinResetEvent::set(self)
    }

    fn reset(&self) {
        SpinResetEvent::reset(self)
    }

    fn status(&self) -> bool {
        SpinResetEvent::status(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[test]
    fn spin_count_is_validated() {
        assert_eq!(
            SpinResetEvent::with_spin_count(false, MAX_SPIN_COUNT + 1).unwrap_err(),
            SpinConfigError::SpinCountOutOfRange {
                requested: MAX_SPIN_COUNT + 1,
                max: MAX_SPIN_COUNT,
            }
        );

        let event = SpinResetEvent::with_spin_count(false, MAX_SPIN_COUNT).unwrap();
        assert_eq!(event.spin_count(), MAX_SPIN_COUNT);
    }

    #[test]
    fn error_message_names_the_limit() {
        let err = SpinConfig::new(5000).validate().unwrap_err();
        assert_eq!(
            err.to_string(),
            "spin count 5000 is out of range (maximum is 2047)"
        );
    }

    #[test]
    fn default_config_is_valid() {
        let config = SpinConfig::default();
        assert!(config.spin_count() >= 1);
        assert_eq!(config.validate(), Ok(config));
    }

    #[test]
    fn spin_wait_respects_budget() {
        let mut spin = SpinWait::new(&SpinConfig::new(4).with_yield_after(2));
        assert!((0..4).all(|_| spin.spin()));
        assert!(!spin.spin());

        spin.reset();
        assert!(spin.spin());
    }

    #[test]
    fn zero_spin_count_blocks_straight_away() {
        let mut spin = SpinWait::new(&SpinConfig::new(0));
        assert!(!spin.spin());

        let event = SpinResetEvent::with_spin_count(false, 0).unwrap();
        assert!(!event.wait_timeout(Duration::from_millis(10)));
    }

    #[test]
    fn state_machine() {
        let event = SpinResetEvent::new(false);
        assert!(!event.status());

        event.reset();
        assert!(!event.status());

        event.set();
        event.set();
        assert!(event.status());
        assert!(event.try_wait());
        event.wait();
        assert!(event.status());

        event.reset();
        assert!(!event.try_wait());
    }

    #[test]
    fn generation_survives_set_reset() {
        let event = SpinResetEvent::new(false);
        let entered = event.gate.snapshot();

        event.set();
        event.reset();

        assert!(!event.status());
        assert!(event.gate.snapshot().released_since(entered));
        assert!(event.gate.wait_since(entered, Some(Instant::now())));
    }

    #[test]
    fn timed_out_waiters_leave_nothing_behind() {
        let event = SpinResetEvent::with_spin_count(false, 0).unwrap();

        for _ in 0..10_000 {
            assert!(!event.wait_timeout(Duration::ZERO));
        }
        assert_eq!(event.waiters(), 0);

        // a later waiter is still woken by the next `set`
        thread::scope(|s| {
            let waiter = s.spawn(|| event.wait_timeout(Duration::from_secs(30)));

            while event.waiters() < 1 {
                thread::yield_now();
            }
            event.set();

            assert!(waiter.join().unwrap());
        });

        assert_eq!(event.waiters(), 0);
    }

    #[test]
    fn parked_waiter_is_released() {
        // no spinning, so the waiter is guaranteed to go through the blocking path
        let event = SpinResetEvent::with_spin_count(false, 0).unwrap();
        let started = AtomicBool::new(false);

        thread::scope(|s| {
            let waiter = s.spawn(|| {
                started.store(true, Ordering::SeqCst);
                event.wait_timeout(Duration::from_secs(30))
            });

            while !started.load(Ordering::SeqCst) {
                thread::yield_now();
            }
            event.set();

            assert!(waiter.join().unwrap());
        });
    }

    #[test]
    fn timeout_reports_false() {
        let event = SpinResetEvent::with_spin_count(false, 10).unwrap();
        let begin = Instant::now();
        assert!(!event.wait_timeout(Duration::from_millis(20)));
        assert!(begin.elapsed() >= Duration::from_millis(20));
        assert!(!event.status());
    }
}
