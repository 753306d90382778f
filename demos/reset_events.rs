//! Walks through a series of small coordination scenarios built from reset events.
//!
//! Run all of them with `cargo run --example reset_events`, or pick one by number with
//! `cargo run --example reset_events -- 9`. Narration goes through `tracing`; set `RUST_LOG=trace`
//! to also see the events' own diagnostics.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use reset_event::{AutoResetEvent, Awaitable, ManualResetEvent, SpinResetEvent};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

type Scenario = fn();

const SCENARIOS: &[(&str, Scenario)] = &[
    ("wait for a signal", wait_for_signal),
    ("sequential hand-off", sequential_hand_off),
    ("single waiter wake", single_waiter_wake),
    ("broadcast wake", broadcast_wake),
    ("global start", global_start),
    ("producer and consumer", producer_consumer),
    ("release then reset", release_then_reset),
    ("spin event", spin_event),
    ("alternating turns", alternating_turns),
    ("completion detection", completion_detection),
];

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_thread_names(true)
        .with_target(false)
        .init();

    let only = std::env::args().nth(1).map(|arg| arg.parse::<usize>());

    for (number, (title, scenario)) in SCENARIOS.iter().enumerate().map(|(i, s)| (i + 1, s)) {
        match &only {
            Some(Ok(wanted)) if *wanted != number => continue,
            Some(Err(err)) => {
                warn!(%err, "expected a scenario number between 1 and {}", SCENARIOS.len());
                return;
            }
            _ => {}
        }

        info!("---------- scenario {}: {} ----------", number, title);
        scenario();
    }
}

fn spawn_named<F>(name: &str, body: F) -> JoinHandle<()>
where
    F: FnOnce() + Send + 'static,
{
    thread::Builder::new()
        .name(name.to_owned())
        .spawn(body)
        .unwrap_or_else(|err| panic!("failed to spawn {}: {}", name, err))
}

fn join_all(handles: Vec<JoinHandle<()>>) {
    for handle in handles {
        if handle.join().is_err() {
            warn!("a worker thread panicked");
        }
    }
}

// pretend to do some work
fn busy(millis: u64) {
    thread::sleep(Duration::from_millis(millis));
}

fn waiter(name: String, event: Arc<dyn Awaitable>) {
    info!("{} waiting for signal...", name);
    event.wait();
    info!("{} received the signal", name);
}

fn wait_for_signal() {
    let event: Arc<dyn Awaitable> = Arc::new(AutoResetEvent::new(false));

    let handles = vec![
        spawn_named("waiter", {
            let event = event.clone();
            move || waiter("waiter".to_owned(), event)
        }),
        spawn_named("signaler", {
            let event = event.clone();
            move || {
                busy(500);
                info!("sending signal");
                event.set();
            }
        }),
    ];

    join_all(handles);
}

fn sequential_hand_off() {
    let first_done = Arc::new(AutoResetEvent::new(false));
    let second_done = Arc::new(AutoResetEvent::new(false));

    let handles = vec![
        spawn_named("part-1", {
            let first_done = first_done.clone();
            move || {
                info!("part 1 done");
                first_done.set();
            }
        }),
        spawn_named("part-2", {
            let (first_done, second_done) = (first_done.clone(), second_done.clone());
            move || {
                first_done.wait();
                info!("part 2 done");
                second_done.set();
            }
        }),
        spawn_named("part-3", {
            let second_done = second_done.clone();
            move || {
                second_done.wait();
                info!("part 3 done");
            }
        }),
    ];

    join_all(handles);
}

fn single_waiter_wake() {
    let event = Arc::new(AutoResetEvent::new(false));

    let handles: Vec<_> = (1..=2)
        .map(|i| {
            let event: Arc<dyn Awaitable> = event.clone();
            spawn_named(&format!("thread-{}", i), move || {
                waiter(format!("thread {}", i), event)
            })
        })
        .collect();

    while event.waiters() < 2 {
        thread::yield_now();
    }

    info!("sending one signal");
    event.set();

    while event.waiters() > 1 {
        thread::yield_now();
    }

    info!("one waiter is still blocked; sending another signal so it can finish");
    event.set();

    join_all(handles);
}

fn broadcast_wake() {
    let group = Arc::new(ManualResetEvent::new(false));

    let mut handles: Vec<_> = (1..=3)
        .map(|i| {
            let group: Arc<dyn Awaitable> = group.clone();
            spawn_named(&format!("thread-{}", i), move || {
                waiter(format!("thread {}", i), group)
            })
        })
        .collect();

    handles.push(spawn_named("releaser", {
        let group = group.clone();
        move || {
            busy(500);
            info!("releasing everyone");
            group.set();
        }
    }));

    join_all(handles);
}

fn global_start() {
    let start = Arc::new(ManualResetEvent::new(false));

    let mut handles: Vec<_> = (1..=2)
        .map(|i| {
            let start = start.clone();
            spawn_named(&format!("worker-{}", i), move || {
                info!("worker {} ready", i);
                start.wait();
                info!("worker {} started working", i);
            })
        })
        .collect();

    handles.push(spawn_named("starter", {
        let start = start.clone();
        move || {
            busy(300);
            info!("global start!");
            start.set();
        }
    }));

    join_all(handles);
}

fn producer_consumer() {
    let data_ready = Arc::new(AutoResetEvent::new(false));
    let data = Arc::new(AtomicUsize::new(0));

    let handles = vec![
        spawn_named("consumer", {
            let (data_ready, data) = (data_ready.clone(), data.clone());
            move || {
                info!("waiting for data...");
                data_ready.wait();
                info!(data = data.load(Ordering::SeqCst), "data received");
            }
        }),
        spawn_named("producer", {
            let (data_ready, data) = (data_ready.clone(), data.clone());
            move || {
                busy(300);
                data.store(42, Ordering::SeqCst);
                info!("data produced");
                data_ready.set();
            }
        }),
    ];

    join_all(handles);
}

fn release_then_reset() {
    let event = Arc::new(ManualResetEvent::new(false));

    let handles = vec![
        spawn_named("waiter", {
            let event = event.clone();
            move || {
                info!("waiting...");
                event.wait();
                info!("unblocked");
            }
        }),
        spawn_named("toggler", {
            let event = event.clone();
            move || {
                while event.waiters() == 0 {
                    thread::yield_now();
                }
                event.set();
                event.reset();
                info!(status = event.status(), "released and reset");
            }
        }),
    ];

    join_all(handles);
}

fn spin_event() {
    let event = Arc::new(SpinResetEvent::new(false));

    let handles = vec![
        spawn_named("spinner", {
            let event = event.clone();
            move || {
                event.wait();
                info!(spin_count = event.spin_count(), "released by spin event");
            }
        }),
        spawn_named("signaler", {
            let event = event.clone();
            move || {
                busy(200);
                event.set();
            }
        }),
    ];

    join_all(handles);
}

fn take_turns(
    name: &'static str,
    rounds: usize,
    mine: Arc<AutoResetEvent>,
    theirs: Arc<AutoResetEvent>,
) {
    for round in 1..=rounds {
        mine.wait();
        info!(round, "{} running", name);
        theirs.set();
    }
}

fn alternating_turns() {
    // A's turn starts set, so A goes first
    let turn_a = Arc::new(AutoResetEvent::new(true));
    let turn_b = Arc::new(AutoResetEvent::new(false));

    let handles = vec![
        spawn_named("thread-a", {
            let (mine, theirs) = (turn_a.clone(), turn_b.clone());
            move || take_turns("thread A", 3, mine, theirs)
        }),
        spawn_named("thread-b", {
            let (mine, theirs) = (turn_b.clone(), turn_a.clone());
            move || take_turns("thread B", 3, mine, theirs)
        }),
    ];

    join_all(handles);
}

fn completion_detection() {
    let finished = Arc::new(ManualResetEvent::new(false));

    let handles = vec![
        spawn_named("processor", {
            let finished = finished.clone();
            move || {
                info!("processing...");
                busy(800);
                finished.set();
            }
        }),
        spawn_named("watcher", {
            let finished = finished.clone();
            move || {
                info!("waiting for completion...");
                finished.wait();
                info!("completion detected");
            }
        }),
    ];

    join_all(handles);
}
