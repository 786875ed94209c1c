//! Derived servos stacked on hardware servos.

use std::sync::Arc;
use std::time::Duration;

use servokit::prelude::*;
use servokit_test_helpers::prelude::*;

const WAIT: Duration = Duration::from_secs(5);

fn opened(channels: usize) -> Result<(ServoController, DriverProbe), ServoError> {
    let (driver, probe) = RecordingDriver::new(channels);
    let controller = ServoController::new("test", driver)?;
    controller.open()?;
    Ok((controller, probe))
}

#[test]
fn test_reverser_maps_onto_lower_servo() -> TestResult {
    let (controller, probe) = opened(2)?;
    let lower = controller.servo("0")?;
    let reversed = lower.transformed(Reverser)?;

    assert_eq!(reversed.name(), "reverser(0)");
    assert!(reversed.lower().is_some_and(|servo| servo.same(&lower)));
    assert_approx_eq!(reversed.position(), 0.5, 1e-12);

    assert!(reversed.set_position(0.2)?.wait().is_ok());
    assert_eq!(probe.writes().len(), 1);
    assert_approx_eq!(must_some(probe.last_write(0), "write to 0"), 0.8, 1e-12);
    assert_approx_eq!(lower.position(), 0.8, 1e-12);
    assert_approx_eq!(reversed.actual_position(), 0.2, 1e-12);
    Ok(())
}

#[test]
fn test_each_level_has_its_own_listeners() -> TestResult {
    let (controller, _probe) = opened(1)?;
    let lower = controller.servo("0")?;
    let reversed = lower.transformed(Reverser)?;
    let lower_events = RecordingListener::new();
    let upper_events = RecordingListener::new();
    lower.add_listener(lower_events.clone());
    reversed.add_listener(upper_events.clone());

    reversed.set_position(0.25)?;

    let upper = upper_events.wait_for(WAIT, |event| {
        matches!(event, Event::PositionChanged { .. })
    });
    assert_eq!(
        upper,
        Some(Event::PositionChanged {
            source: "reverser(0)".to_owned(),
            position: 0.25,
        })
    );
    let lower = lower_events.wait_for(WAIT, |event| {
        matches!(event, Event::PositionChanged { .. })
    });
    assert_eq!(
        lower,
        Some(Event::PositionChanged {
            source: "0".to_owned(),
            position: 0.75,
        })
    );
    Ok(())
}

#[test]
fn test_nested_transformers_compose() -> TestResult {
    let (controller, probe) = opened(1)?;
    let lower = controller.servo("0")?;
    let limited = lower.transformed(Limit::new(0.2, 0.6)?)?;
    let reversed = limited.transformed(Reverser)?;

    assert_eq!(reversed.name(), "reverser(limit(0))");
    reversed.set_position(1.0)?;
    assert_approx_eq!(must_some(probe.last_write(0), "write to 0"), 0.2, 1e-12);
    reversed.set_position(0.0)?;
    assert_approx_eq!(must_some(probe.last_write(0), "write to 0"), 0.6, 1e-12);
    assert_approx_eq!(reversed.actual_position(), 0.0, 1e-9);
    Ok(())
}

#[test]
fn test_positions_mapped_out_of_range_are_rejected() -> TestResult {
    let (controller, probe) = opened(1)?;
    let doubled = controller.servo("0")?.transformed(Scale::new(2.0, 0.0)?)?;

    assert!(matches!(
        doubled.set_position(0.6),
        Err(ServoError::PositionOutOfRange { .. })
    ));
    assert!(probe.writes().is_empty());
    assert_approx_eq!(doubled.position(), 0.25, 1e-12);

    assert!(doubled.set_position(0.5)?.wait().is_ok());
    assert_eq!(probe.writes_for(0), vec![1.0]);
    Ok(())
}

#[test]
fn test_one_transition_controller_per_stack() -> TestResult {
    let (controller, _probe) = opened(2)?;
    let crawl: Arc<dyn TransitionController> = Arc::new(CrawlTransitionController::new());

    let lower = controller.servo("0")?;
    let upper = lower.transformed(Reverser)?;
    lower.attach(Some(Arc::clone(&crawl)), false)?;
    assert!(matches!(
        upper.attach(Some(Arc::clone(&crawl)), false),
        Err(ServoError::StackConflict { .. })
    ));
    lower.attach(None, false)?;
    upper.attach(Some(Arc::clone(&crawl)), false)?;

    let other = controller.servo("1")?;
    let other_upper = other.transformed(Reverser)?;
    other_upper.attach(Some(Arc::clone(&crawl)), false)?;
    assert!(matches!(
        other.attach(Some(Arc::clone(&crawl)), false),
        Err(ServoError::StackConflict { .. })
    ));

    // Detaching is never a conflict.
    other.attach(None, false)?;
    Ok(())
}

#[test]
fn test_transition_on_derived_servo() -> TestResult {
    let (controller, probe) = opened(1)?;
    let lower = controller.servo("0")?;
    let reversed = lower.transformed(Reverser)?;
    reversed.attach(Some(Arc::new(CrawlTransitionController::new())), false)?;

    let status = reversed.set_position(1.0)?;
    assert!(status.wait_timeout(WAIT)?.is_ok());

    let writes = probe.writes_for(0);
    assert_eq!(writes.len(), 5, "{writes:?}");
    assert_monotonic!(&writes);
    assert_approx_eq!(must_some(writes.last().copied(), "writes"), 0.0, 1e-9);
    assert_approx_eq!(reversed.actual_position(), 1.0, 1e-9);
    assert_eq!(reversed.phase(), ServoPhase::Idle);
    Ok(())
}

#[test]
fn test_enabled_state_is_shared_with_lower_servo() -> TestResult {
    let (controller, _probe) = opened(1)?;
    let lower = controller.servo("0")?;
    let reversed = lower.transformed(Reverser)?;

    reversed.set_enabled(false)?;
    assert!(!lower.is_enabled());
    assert!(!reversed.is_enabled());
    assert_eq!(reversed.phase(), ServoPhase::Disabled);
    assert!(matches!(
        reversed.set_position(0.1),
        Err(ServoError::NotEnabled { .. })
    ));

    lower.set_enabled(true)?;
    assert!(reversed.is_enabled());
    Ok(())
}

#[test]
fn test_derived_servo_shares_metadata() -> TestResult {
    let (driver, _probe) = RecordingDriver::new(1);
    let controller = ServoController::new("test", driver.with_servo_silent())?;
    controller.open()?;
    let lower = controller.servo("0")?;
    let reversed = lower.transformed(Reverser)?;

    assert!(Arc::ptr_eq(&lower.meta(), &reversed.meta()));
    assert!(reversed.meta().supports(keys::SERVO_SILENT));
    Ok(())
}

#[test]
fn test_crank_transformer_stays_in_range() -> TestResult {
    let (controller, probe) = opened(1)?;
    let crank = controller.servo("0")?.transformed(Linear::half_turn())?;

    for position in [0.0, 0.25, 0.5, 0.75, 1.0] {
        crank.set_position(position)?;
        let written = must_some(probe.last_write(0), "write to 0");
        assert!((0.0..=1.0).contains(&written), "{position} -> {written}");
        assert_approx_eq!(crank.actual_position(), position, 1e-9);
    }
    Ok(())
}
