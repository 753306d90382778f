//! The shared wait primitive behind every event in this crate.
//!
//! A `Gate` is a boolean guarded by a `Mutex`, plus a `Condvar` to park threads on while the
//! boolean is unset. Every check of the flag, every suspension, and every notification happens
//! while holding the mutex, which is what keeps a `set` from slipping in between a waiter's check
//! and its sleep. The flag and generation are also copied into an atomic word on every change, for
//! [`SpinResetEvent`] to poll without locking.
//!
//! [`SpinResetEvent`]: ../spin/struct.SpinResetEvent.html

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Condvar, Mutex, MutexGuard};
use std::time::Instant;

use tracing::trace;

use crate::util::{guts, remaining};

// generations live in the upper 63 bits of the published word
const GENERATION_MASK: u64 = u64::MAX >> 1;

/// What a waiter does with the signal once it is let through.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Release {
    /// Flip the flag back off, so nobody else gets through on the same signal.
    Consume,
    /// Leave the flag alone. Also lets the waiter through if the gate opened at any point since it
    /// started waiting, even if it has been closed again since.
    Observe,
}

/// How many waiters to wake when the gate opens.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Wake {
    /// Wake a single blocked waiter, which is expected to consume the signal.
    One,
    /// Wake every blocked waiter.
    All,
}

/// A lock-free reading of the gate's flag and generation.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub signaled: bool,
    pub generation: u64,
}

impl Snapshot {
    fn pack(self) -> u64 {
        (self.generation << 1) | self.signaled as u64
    }

    fn unpack(word: u64) -> Snapshot {
        Snapshot {
            signaled: word & 1 != 0,
            generation: word >> 1,
        }
    }

    /// Whether an observer that started waiting at `entered` may go through now.
    pub fn released_since(self, entered: Snapshot) -> bool {
        self.signaled || self.generation != entered.generation
    }
}

#[derive(Debug)]
struct GateState {
    signaled: bool,
    // threads currently blocked on `cond`
    waiters: usize,
    // bumped on every closed -> open transition
    generation: u64,
}

pub struct Gate {
    state: Mutex<GateState>,
    cond: Condvar,
    // copy of `signaled` and `generation`, only written while holding `state`
    published: AtomicU64,
}

impl Gate {
    pub const fn new(signaled: bool) -> Gate {
        Gate {
            state: Mutex::new(GateState {
                signaled,
                waiters: 0,
                generation: 0,
            }),
            cond: Condvar::new(),
            published: AtomicU64::new(signaled as u64),
        }
    }

    fn lock(&self) -> MutexGuard<'_, GateState> {
        guts(self.state.lock())
    }

    fn publish(&self, state: &GateState) {
        let snapshot = Snapshot {
            signaled: state.signaled,
            generation: state.generation,
        };
        self.published.store(snapshot.pack(), Ordering::Release);
    }

    /// Reads the flag and generation without taking the lock.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot::unpack(self.published.load(Ordering::Acquire))
    }

    pub fn is_signaled(&self) -> bool {
        self.lock().signaled
    }

    pub fn waiters(&self) -> usize {
        self.lock().waiters
    }

    /// Takes the signal if it's there, without ever blocking.
    pub fn try_acquire(&self, mode: Release) -> bool {
        let mut state = self.lock();
        self.acquire(&mut state, mode, None)
    }

    /// Blocks until the gate lets this thread through, or until `deadline` passes.
    ///
    /// Returns `true` if the thread was let through. On `false`, the state of the gate has not
    /// been touched, so a timed-out waiter never eats a signal meant for somebody else.
    pub fn wait_until(&self, deadline: Option<Instant>, mode: Release) -> bool {
        let state = self.lock();
        let entered = state.generation;
        self.block(state, entered, deadline, mode)
    }

    /// Like `wait_until` with `Release::Observe`, but counts any opening since `entered` was
    /// taken, including ones that happened before this call.
    pub fn wait_since(&self, entered: Snapshot, deadline: Option<Instant>) -> bool {
        let state = self.lock();
        self.block(state, entered.generation, deadline, Release::Observe)
    }

    fn block(
        &self,
        mut state: MutexGuard<'_, GateState>,
        entered: u64,
        deadline: Option<Instant>,
        mode: Release,
    ) -> bool {
        loop {
            // every wakeup lands back here, spurious or not
            if self.acquire(&mut state, mode, Some(entered)) {
                return true;
            }

            let timeout = match deadline {
                None => None,
                Some(deadline) => match remaining(deadline) {
                    Some(timeout) => Some(timeout),
                    None => {
                        trace!(waiters = state.waiters, "gave up waiting on gate");
                        return false;
                    }
                },
            };

            state.waiters += 1;
            state = match timeout {
                None => guts(self.cond.wait(state)),
                Some(timeout) => guts(self.cond.wait_timeout(state, timeout)).0,
            };
            state.waiters -= 1;
        }
    }

    /// Sets the flag and wakes `wake` waiters. Returns whether the gate was closed beforehand.
    pub fn open(&self, wake: Wake) -> bool {
        let mut state = self.lock();
        if state.signaled {
            // a waiter, if any, has already been told about this signal
            return false;
        }

        state.signaled = true;
        state.generation = state.generation.wrapping_add(1) & GENERATION_MASK;
        self.publish(&state);

        if state.waiters > 0 {
            trace!(
                waiters = state.waiters,
                generation = state.generation,
                ?wake,
                "opening gate"
            );
            match wake {
                Wake::One => self.cond.notify_one(),
                Wake::All => self.cond.notify_all(),
            }
        }

        true
    }

    /// Clears the flag. Returns whether the gate was open beforehand.
    pub fn close(&self) -> bool {
        let mut state = self.lock();
        let was_signaled = state.signaled;
        state.signaled = false;
        self.publish(&state);
        was_signaled
    }

    fn acquire(&self, state: &mut GateState, mode: Release, entered: Option<u64>) -> bool {
        if state.signaled {
            if mode == Release::Consume {
                state.signaled = false;
                self.publish(state);
            }
            return true;
        }

        match (mode, entered) {
            (Release::Observe, Some(generation)) => state.generation != generation,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    fn wait_for_waiters(gate: &Gate, count: usize) {
        while gate.waiters() < count {
            thread::yield_now();
        }
    }

    #[test]
    fn consume_flips_flag_back() {
        let gate = Gate::new(true);
        assert!(gate.wait_until(None, Release::Consume));
        assert!(!gate.is_signaled());
        assert!(!gate.try_acquire(Release::Consume));
    }

    #[test]
    fn observe_leaves_flag_alone() {
        let gate = Gate::new(true);
        assert!(gate.wait_until(None, Release::Observe));
        assert!(gate.try_acquire(Release::Observe));
        assert!(gate.is_signaled());
    }

    #[test]
    fn open_and_close_report_transitions() {
        let gate = Gate::new(false);
        assert!(gate.open(Wake::All));
        assert!(!gate.open(Wake::All));
        assert!(gate.close());
        assert!(!gate.close());
    }

    #[test]
    fn expired_deadline_does_not_touch_state() {
        let gate = Gate::new(false);
        let deadline = Instant::now() + Duration::from_millis(10);
        assert!(!gate.wait_until(Some(deadline), Release::Consume));
        assert!(!gate.is_signaled());
        assert_eq!(gate.waiters(), 0);
    }

    #[test]
    fn snapshot_follows_state() {
        let gate = Gate::new(false);
        let entered = gate.snapshot();
        assert!(!entered.signaled);

        gate.open(Wake::All);
        assert!(gate.snapshot().signaled);

        gate.close();
        let now = gate.snapshot();
        assert!(!now.signaled);
        assert!(now.released_since(entered));
        assert!(!now.released_since(now));

        let gate = Gate::new(true);
        assert!(gate.try_acquire(Release::Consume));
        assert!(!gate.snapshot().signaled);
    }

    #[test]
    fn wait_since_counts_openings_before_the_call() {
        let gate = Gate::new(false);
        let entered = gate.snapshot();

        gate.open(Wake::All);
        gate.close();

        // already opened once since `entered`, so this must not block
        assert!(gate.wait_since(entered, None));
        assert!(!gate.wait_since(gate.snapshot(), Some(Instant::now())));
    }

    #[test]
    fn observer_released_by_open_then_close() {
        let gate = Gate::new(false);

        thread::scope(|s| {
            let waiter = s.spawn(|| gate.wait_until(None, Release::Observe));

            wait_for_waiters(&gate, 1);
            gate.open(Wake::All);
            gate.close();

            assert!(waiter.join().unwrap());
        });

        assert!(!gate.is_signaled());
    }

    #[test]
    fn consumer_woken_by_open() {
        let gate = Gate::new(false);

        thread::scope(|s| {
            let waiter = s.spawn(|| gate.wait_until(None, Release::Consume));

            wait_for_waiters(&gate, 1);
            assert!(gate.open(Wake::One));

            assert!(waiter.join().unwrap());
        });

        assert!(!gate.is_signaled());
        assert_eq!(gate.waiters(), 0);
    }
}
