//! Coordination patterns built from the events, with ordering enforced by the events themselves.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use reset_event::{AutoResetEvent, Awaitable, ManualResetEvent, SpinResetEvent};

fn until_blocked(waiters: impl Fn() -> usize, count: usize) {
    while waiters() < count {
        thread::yield_now();
    }
}

// Waits for `wait_on` (if any), records `name`, then signals `then_set` (if any).
fn stage(
    name: &'static str,
    wait_on: Option<&dyn Awaitable>,
    then_set: Option<&dyn Awaitable>,
    log: &Mutex<Vec<&'static str>>,
) {
    if let Some(event) = wait_on {
        event.wait();
    }
    log.lock().unwrap().push(name);
    if let Some(event) = then_set {
        event.set();
    }
}

#[test]
fn rendezvous() {
    let event = Arc::new(AutoResetEvent::new(false));

    let waiter = {
        let event = event.clone();
        thread::spawn(move || event.wait_timeout(Duration::from_secs(30)))
    };

    let signaler = {
        let event = event.clone();
        thread::spawn(move || event.set())
    };

    signaler.join().unwrap();
    assert!(waiter.join().unwrap());
    assert!(!event.status());
}

#[test]
fn sequential_hand_off() {
    let first_done = AutoResetEvent::new(false);
    let second_done = AutoResetEvent::new(false);
    let log = Mutex::new(Vec::new());

    thread::scope(|s| {
        // spawned back to front, so only the events can be putting them in order
        s.spawn(|| stage("part 3", Some(&second_done), None, &log));
        s.spawn(|| stage("part 2", Some(&first_done), Some(&second_done), &log));
        s.spawn(|| stage("part 1", None, Some(&first_done), &log));
    });

    assert_eq!(*log.lock().unwrap(), ["part 1", "part 2", "part 3"]);
}

#[test]
fn single_waiter_wake() {
    let event = AutoResetEvent::new(false);
    let released = AtomicUsize::new(0);

    thread::scope(|s| {
        for _ in 0..2 {
            s.spawn(|| {
                event.wait();
                released.fetch_add(1, Ordering::SeqCst);
            });
        }

        until_blocked(|| event.waiters(), 2);
        event.set();

        // one waiter gets through, and the other one is still parked
        until_blocked(|| released.load(Ordering::SeqCst), 1);
        until_blocked(|| event.waiters(), 1);
        assert_eq!(released.load(Ordering::SeqCst), 1);

        event.set();
    });

    assert_eq!(released.load(Ordering::SeqCst), 2);
}

#[test]
fn broadcast_wake() {
    let group = ManualResetEvent::new(false);
    let released = Mutex::new(Vec::new());

    thread::scope(|s| {
        for name in ["thread 1", "thread 2", "thread 3"] {
            let (group, released) = (&group, &released);
            s.spawn(move || {
                group.wait();
                released.lock().unwrap().push(name);
            });
        }

        until_blocked(|| group.waiters(), 3);
        group.set();
    });

    let mut released = released.into_inner().unwrap();
    released.sort_unstable();
    assert_eq!(released, ["thread 1", "thread 2", "thread 3"]);
}

#[test]
fn global_start() {
    let start = ManualResetEvent::new(false);
    let ready = AutoResetEvent::new(false);
    let working = AtomicUsize::new(0);

    thread::scope(|s| {
        for _ in 0..2 {
            s.spawn(|| {
                ready.set();
                start.wait();
                working.fetch_add(1, Ordering::SeqCst);
            });
        }

        // nobody starts before the go signal, whether or not they've reached `wait` yet
        ready.wait();
        assert_eq!(working.load(Ordering::SeqCst), 0);
        start.set();
    });

    assert_eq!(working.load(Ordering::SeqCst), 2);
}

#[test]
fn producer_consumer() {
    let data_ready = AutoResetEvent::new(false);
    let data = AtomicUsize::new(0);

    let received = thread::scope(|s| {
        let consumer = s.spawn(|| {
            data_ready.wait();
            data.load(Ordering::SeqCst)
        });

        s.spawn(|| {
            data.store(42, Ordering::SeqCst);
            data_ready.set();
        });

        consumer.join().unwrap()
    });

    assert_eq!(received, 42);
}

#[test]
fn release_then_reset() {
    let event = ManualResetEvent::new(false);

    thread::scope(|s| {
        let waiter = s.spawn(|| event.wait_timeout(Duration::from_secs(30)));

        until_blocked(|| event.waiters(), 1);
        event.set();
        event.reset();

        assert!(waiter.join().unwrap());
    });

    assert!(!event.status());
    assert!(!event.try_wait());
}

#[test]
fn slim_wait() {
    let event = SpinResetEvent::new(false);

    let released = thread::scope(|s| {
        let waiter = s.spawn(|| event.wait_timeout(Duration::from_secs(30)));
        event.set();
        waiter.join().unwrap()
    });

    assert!(released);
    assert!(event.status());
}

#[test]
fn alternating_turns() {
    const ROUNDS: usize = 5;
    // the first turn starts set, so side A goes first
    let turn_a = AutoResetEvent::new(true);
    let turn_b = AutoResetEvent::new(false);
    let log = Mutex::new(Vec::new());

    thread::scope(|s| {
        s.spawn(|| {
            for _ in 0..ROUNDS {
                stage("B", Some(&turn_b), Some(&turn_a), &log);
            }
        });
        s.spawn(|| {
            for _ in 0..ROUNDS {
                stage("A", Some(&turn_a), Some(&turn_b), &log);
            }
        });
    });

    let log = log.into_inner().unwrap();
    assert_eq!(log.len(), ROUNDS * 2);
    for (i, name) in log.iter().enumerate() {
        assert_eq!(*name, if i % 2 == 0 { "A" } else { "B" });
    }
}

#[test]
fn completion_detection() {
    let finished = ManualResetEvent::new(false);
    let processed = AtomicUsize::new(0);

    thread::scope(|s| {
        let watchers: Vec<_> = (0..2)
            .map(|_| {
                s.spawn(|| {
                    finished.wait();
                    processed.load(Ordering::SeqCst)
                })
            })
            .collect();

        s.spawn(|| {
            for _ in 0..100 {
                processed.fetch_add(1, Ordering::SeqCst);
            }
            finished.set();
        });

        for watcher in watchers {
            assert_eq!(watcher.join().unwrap(), 100);
        }
    });

    // a latecomer sees the completion without blocking
    assert!(finished.try_wait());
}

#[test]
fn any_event_kind_in_a_hand_off() {
    let events: Vec<Box<dyn Awaitable>> = vec![
        Box::new(AutoResetEvent::new(false)),
        Box::new(ManualResetEvent::new(false)),
        Box::new(SpinResetEvent::new(false)),
    ];

    for event in &events {
        let log = Mutex::new(Vec::new());
        thread::scope(|s| {
            s.spawn(|| stage("after", Some(event.as_ref()), None, &log));
            s.spawn(|| stage("before", None, Some(event.as_ref()), &log));
        });
        assert_eq!(*log.lock().unwrap(), ["before", "after"]);
    }
}
