//! Timing behaviour of the threaded silencer.

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crossbeam::channel::{self, Receiver, Sender};
use proptest::prelude::*;
use servokit_silencer::prelude::*;

type TestResult = Result<(), Box<dyn std::error::Error>>;

struct Recorder(Sender<(SilentCommand, Instant)>);

impl SilentTarget for Recorder {
    fn sleep(&self) {
        self.0.send((SilentCommand::Sleep, Instant::now())).unwrap_or_default();
    }

    fn wake(&self) {
        self.0.send((SilentCommand::Wake, Instant::now())).unwrap_or_default();
    }
}

fn start(
    timeout_ms: u64,
    heartbeat_ms: u64,
) -> Result<(Silencer, Receiver<(SilentCommand, Instant)>), ServoError> {
    let (tx, rx) = channel::unbounded();
    let config = SilencerConfig {
        timeout_ms,
        heartbeat_ms,
    };
    let silencer = Silencer::start("test", config, Arc::new(Recorder(tx)))?;
    Ok((silencer, rx))
}

#[test]
fn test_sleep_then_heartbeat_wake() -> TestResult {
    let (silencer, rx) = start(100, 200)?;
    let t0 = Instant::now();
    silencer.set_enabled(true);

    let (first, at_sleep) = rx.recv_timeout(Duration::from_secs(2))?;
    assert_eq!(first, SilentCommand::Sleep);
    let elapsed = at_sleep.duration_since(t0);
    assert!(elapsed >= Duration::from_millis(90), "slept after {elapsed:?}");
    assert!(elapsed < Duration::from_millis(600), "slept after {elapsed:?}");
    assert!(silencer.is_silent_now());

    let (second, at_wake) = rx.recv_timeout(Duration::from_secs(2))?;
    assert_eq!(second, SilentCommand::Wake);
    let asleep = at_wake.duration_since(at_sleep);
    assert!(asleep >= Duration::from_millis(190), "woke after {asleep:?}");
    assert!(asleep < Duration::from_millis(700), "woke after {asleep:?}");

    silencer.shutdown();
    Ok(())
}

#[test]
fn test_exactly_one_sleep_before_heartbeat() -> TestResult {
    let (silencer, rx) = start(50, 1_000)?;
    silencer.set_enabled(true);

    let (first, _) = rx.recv_timeout(Duration::from_secs(2))?;
    assert_eq!(first, SilentCommand::Sleep);
    assert!(rx.recv_timeout(Duration::from_millis(400)).is_err());
    Ok(())
}

#[test]
fn test_touch_postpones_sleep() -> TestResult {
    let (silencer, rx) = start(150, 10_000)?;
    silencer.set_enabled(true);

    let mut last_touch = Instant::now();
    for _ in 0..8 {
        thread::sleep(Duration::from_millis(50));
        silencer.touch();
        last_touch = Instant::now();
    }
    assert!(rx.try_recv().is_err(), "no sleep while touched");

    let (command, at) = rx.recv_timeout(Duration::from_secs(2))?;
    assert_eq!(command, SilentCommand::Sleep);
    assert!(at.duration_since(last_touch) >= Duration::from_millis(140));
    Ok(())
}

#[test]
fn test_touch_while_sleeping_wakes() -> TestResult {
    let (silencer, rx) = start(50, 10_000)?;
    silencer.set_enabled(true);

    let (command, _) = rx.recv_timeout(Duration::from_secs(2))?;
    assert_eq!(command, SilentCommand::Sleep);

    let touched = Instant::now();
    silencer.touch();
    let (command, at) = rx.recv_timeout(Duration::from_secs(2))?;
    assert_eq!(command, SilentCommand::Wake);
    assert!(at.duration_since(touched) < Duration::from_millis(500));
    assert_eq!(silencer.phase(), SilencerPhase::Active);
    Ok(())
}

#[test]
fn test_disable_while_sleeping() -> TestResult {
    let (silencer, rx) = start(50, 100)?;
    silencer.set_enabled(true);

    let (command, _) = rx.recv_timeout(Duration::from_secs(2))?;
    assert_eq!(command, SilentCommand::Sleep);

    silencer.set_enabled(false);
    let (command, _) = rx.recv_timeout(Duration::from_secs(2))?;
    assert_eq!(command, SilentCommand::Wake);
    assert_eq!(silencer.phase(), SilencerPhase::Disabled);

    assert!(rx.recv_timeout(Duration::from_millis(400)).is_err());
    Ok(())
}

#[test]
fn test_no_commands_after_shutdown() -> TestResult {
    let (silencer, rx) = start(50, 50)?;
    silencer.set_enabled(true);
    silencer.shutdown();
    assert!(!silencer.is_running());

    while rx.try_recv().is_ok() {}
    assert!(rx.recv_timeout(Duration::from_millis(300)).is_err());
    Ok(())
}

#[test]
fn test_set_timeouts_validation() -> TestResult {
    let (silencer, _rx) = start(50, 50)?;
    assert!(matches!(
        silencer.set_timeouts(Duration::ZERO, Duration::from_millis(5)),
        Err(ServoError::InvalidConfiguration { .. })
    ));
    silencer.set_timeouts(Duration::from_millis(500), Duration::from_millis(700))?;
    assert_eq!(
        silencer.timeouts(),
        (Duration::from_millis(500), Duration::from_millis(700))
    );
    Ok(())
}

#[test]
fn test_invalid_config_rejected() {
    let (tx, _rx) = channel::unbounded();
    let config = SilencerConfig {
        timeout_ms: 0,
        heartbeat_ms: 10,
    };
    assert!(matches!(
        Silencer::start("bad", config, Arc::new(Recorder(tx))),
        Err(ServoError::InvalidConfiguration { .. })
    ));
}

proptest! {
    #[test]
    fn prop_deadlines_never_overlap(
        ops in prop::collection::vec((0u8..4, 0u64..500), 1..64),
    ) {
        let t0 = Instant::now();
        let mut state = SilencerState::new(Duration::from_millis(100), Duration::from_millis(200));
        let mut now = t0;

        for (op, advance) in ops {
            now += Duration::from_millis(advance);
            match op {
                0 => { let _ = state.set_enabled(true, now); }
                1 => { let _ = state.set_enabled(false, now); }
                2 => state.touch(now),
                _ => { let _ = state.poll(now); }
            }

            match state.phase() {
                SilencerPhase::Disabled => {
                    prop_assert!(state.next_deadline().is_none());
                    prop_assert!(!state.is_silent_now());
                }
                SilencerPhase::Active => prop_assert!(!state.is_silent_now()),
                SilencerPhase::Sleeping => prop_assert!(state.is_silent_now()),
            }
            if state.is_enabled() {
                prop_assert!(state.next_deadline().is_some());
            }
        }
    }
}
