//! Some utility functions that don't need to be part of the public release.

use std::sync::LockResult;
use std::time::{Duration, Instant};

// Unwrap a LockResult to get the guard even when poisoned.
//
// The state behind every lock in this crate is a flag and a couple of counters, and none of them
// can be left half-written by a panicking thread, so the poison flag carries no information here.
//
// Source for the name: http://bulbapedia.bulbagarden.net/wiki/Guts_(Ability)
pub fn guts<T>(res: LockResult<T>) -> T {
    match res {
        Ok(guard) => guard,
        // The Pokemon's Guts raises its Attack!
        Err(poison) => poison.into_inner(),
    }
}

// Turn a relative timeout into an absolute deadline. A timeout too large to represent is treated
// as "never".
pub fn deadline_after(timeout: Duration) -> Option<Instant> {
    Instant::now().checked_add(timeout)
}

// Time left until `deadline`, or `None` if it has already passed.
pub fn remaining(deadline: Instant) -> Option<Duration> {
    let now = Instant::now();
    if now >= deadline {
        None
    } else {
        Some(deadline - now)
    }
}
