//! Fan-out behaviour across threads.

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crossbeam::channel::{self, Receiver, Sender};
use proptest::prelude::*;
use servokit_events::prelude::*;

type TestResult = Result<(), Box<dyn std::error::Error>>;

struct Forwarding(Sender<Event>);

impl Listener for Forwarding {
    fn position_changed(&self, source: &str, position: f64) {
        self.0
            .send(Event::PositionChanged {
                source: source.to_owned(),
                position,
            })
            .unwrap_or_default();
    }

    fn silent_status_changed(&self, source: &str, active: bool) {
        self.0
            .send(Event::SilentStatusChanged {
                source: source.to_owned(),
                active,
            })
            .unwrap_or_default();
    }

    fn exception(&self, source: &str, error: &ServoError) {
        self.0
            .send(Event::Exception {
                source: source.to_owned(),
                error: error.clone(),
            })
            .unwrap_or_default();
    }
}

struct Panicking;

impl Listener for Panicking {
    fn position_changed(&self, _source: &str, _position: f64) {
        panic!("listener failure");
    }
}

struct Slow(Duration);

impl Listener for Slow {
    fn position_changed(&self, _source: &str, _position: f64) {
        thread::sleep(self.0);
    }
}

/// Blocks every callback until the gate's sender is dropped.
struct Gated(Receiver<()>);

impl Listener for Gated {
    fn position_changed(&self, _source: &str, _position: f64) {
        self.0.recv().unwrap_or_default();
    }
}

struct Quiet;

impl Listener for Quiet {}

fn bus() -> Result<EventBus, ServoError> {
    Ok(EventBus::new(Arc::new(Dispatcher::new(
        "fanout-test",
        DEFAULT_DISPATCH_WORKERS,
    )?)))
}

#[test]
fn test_panicking_listener_does_not_affect_others() -> TestResult {
    let bus = bus()?;
    let (tx, rx) = channel::unbounded();
    bus.add_listener(Arc::new(Panicking));
    bus.add_listener(Arc::new(Forwarding(tx)));

    for i in 0..10u32 {
        bus.publish(Event::PositionChanged {
            source: "3".into(),
            position: f64::from(i) / 10.0,
        });
    }

    let mut received = 0;
    while received < 10 {
        rx.recv_timeout(Duration::from_secs(2))?;
        received += 1;
    }

    bus.dispatcher().shutdown();
    let stats = bus.dispatcher().stats();
    assert_eq!(stats.failed, 10);
    assert_eq!(stats.delivered, 10);
    Ok(())
}

#[test]
fn test_publish_does_not_wait_for_listeners() -> TestResult {
    let bus = bus()?;
    bus.add_listener(Arc::new(Slow(Duration::from_millis(200))));

    let started = Instant::now();
    for _ in 0..5 {
        bus.publish(Event::PositionChanged {
            source: "0".into(),
            position: 0.5,
        });
    }
    assert!(started.elapsed() < Duration::from_millis(150));
    Ok(())
}

#[test]
fn test_every_event_kind_reaches_listener() -> TestResult {
    let bus = bus()?;
    let (tx, rx) = channel::unbounded();
    bus.add_listener(Arc::new(Forwarding(tx)));

    bus.publish(Event::SilentStatusChanged {
        source: "/dev/null".into(),
        active: false,
    });
    bus.publish(Event::Exception {
        source: "/dev/null".into(),
        error: ServoError::hardware_io("/dev/null", "gone"),
    });

    let mut events = vec![
        rx.recv_timeout(Duration::from_secs(2))?,
        rx.recv_timeout(Duration::from_secs(2))?,
    ];
    events.sort_by_key(|e| matches!(e, Event::Exception { .. }));

    assert_eq!(
        events.first(),
        Some(&Event::SilentStatusChanged {
            source: "/dev/null".into(),
            active: false
        })
    );
    assert!(matches!(
        events.get(1),
        Some(Event::Exception {
            error: ServoError::HardwareIo { .. },
            ..
        })
    ));
    Ok(())
}

#[test]
fn test_concurrent_registration_and_publishing() -> TestResult {
    let bus = Arc::new(bus()?);
    let mut handles = Vec::new();

    for i in 0..8u32 {
        let bus = Arc::clone(&bus);
        handles.push(thread::spawn(move || {
            let listener: Arc<dyn Listener> = Arc::new(Slow(Duration::from_micros(10)));
            bus.add_listener(Arc::clone(&listener));
            bus.publish(Event::PositionChanged {
                source: i.to_string(),
                position: 0.1,
            });
            bus.remove_listener(&listener)
        }));
    }

    for handle in handles {
        let joined = handle.join();
        assert!(matches!(joined, Ok(Ok(()))), "thread should not panic or fail");
    }
    assert_eq!(bus.listener_count(), 0);
    Ok(())
}

#[test]
fn test_hung_listener_does_not_stall_other_buses() -> TestResult {
    let dispatcher = Arc::new(Dispatcher::new("fanout-test", DEFAULT_DISPATCH_WORKERS)?);
    let stuck_bus = EventBus::new(Arc::clone(&dispatcher));
    let live_bus = EventBus::new(Arc::clone(&dispatcher));

    let (gate, gate_rx) = channel::unbounded::<()>();
    let (tx, rx) = channel::unbounded();
    stuck_bus.add_listener(Arc::new(Gated(gate_rx)));
    live_bus.add_listener(Arc::new(Forwarding(tx)));

    for i in 0..3u32 {
        stuck_bus.publish(Event::PositionChanged {
            source: "0".into(),
            position: f64::from(i) / 4.0,
        });
    }
    for i in 0..3u32 {
        live_bus.publish(Event::PositionChanged {
            source: "1".into(),
            position: f64::from(i) / 4.0,
        });
    }

    for _ in 0..3 {
        rx.recv_timeout(Duration::from_secs(2))?;
    }
    assert!(dispatcher.stats().spawned > DEFAULT_DISPATCH_WORKERS);

    drop(gate);
    dispatcher.shutdown();
    assert_eq!(dispatcher.stats().delivered, 6);
    Ok(())
}

#[test]
fn test_shutdown_does_not_wait_forever_for_hung_listener() -> TestResult {
    let bus = bus()?;
    let (_gate, gate_rx) = channel::unbounded::<()>();
    bus.add_listener(Arc::new(Gated(gate_rx)));
    bus.publish(Event::PositionChanged {
        source: "0".into(),
        position: 0.5,
    });
    thread::sleep(Duration::from_millis(20));

    let started = Instant::now();
    bus.dispatcher().shutdown();
    assert!(started.elapsed() < SHUTDOWN_GRACE + Duration::from_secs(1));
    assert!(!bus.dispatcher().is_running());
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_registration_table_matches_model(
        ops in prop::collection::vec((any::<bool>(), 0usize..4), 1..40),
    ) {
        let bus = bus().map_err(|e| TestCaseError::fail(e.to_string()))?;
        let listeners: Vec<Arc<dyn Listener>> =
            (0..4).map(|_| Arc::new(Quiet) as Arc<dyn Listener>).collect();
        let mut registered = [false; 4];

        for (add, index) in ops {
            let (Some(listener), Some(slot)) = (listeners.get(index), registered.get_mut(index))
            else {
                return Err(TestCaseError::fail("index out of range"));
            };
            if add {
                bus.add_listener(Arc::clone(listener));
                *slot = true;
            } else {
                let removed = bus.remove_listener(listener);
                prop_assert_eq!(removed.is_ok(), *slot);
                if !*slot {
                    prop_assert_eq!(removed, Err(ServoError::NotRegistered));
                }
                *slot = false;
            }
            prop_assert_eq!(
                bus.listener_count(),
                registered.iter().filter(|r| **r).count()
            );
        }
    }
}
