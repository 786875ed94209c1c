//! Movement pattern behaviour against an in-memory target.

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use proptest::prelude::*;
use servokit_meta::{Meta, keys};
use servokit_transition::prelude::*;

type TestResult = Result<(), Box<dyn std::error::Error>>;

struct Target {
    actual: f64,
    meta: Arc<Meta>,
    controller_meta: Arc<Meta>,
}

impl Target {
    fn with_precision(actual: f64, precision: u32) -> Self {
        Self {
            actual,
            meta: Arc::new(
                Meta::builder()
                    .property(keys::SERVO_PRECISION, precision)
                    .build(),
            ),
            controller_meta: Arc::new(Meta::empty()),
        }
    }
}

impl TransitionTarget for Target {
    fn name(&self) -> String {
        "test".to_owned()
    }

    fn actual_position(&self) -> f64 {
        self.actual
    }

    fn meta(&self) -> Arc<Meta> {
        Arc::clone(&self.meta)
    }

    fn controller_meta(&self) -> Arc<Meta> {
        Arc::clone(&self.controller_meta)
    }
}

fn collect(
    pattern: Arc<dyn TransitionController>,
    target: Target,
    position: f64,
) -> (Vec<f64>, ServoResult<()>) {
    let token = Arc::new(TransitionToken::new());
    let producer = {
        let token = Arc::clone(&token);
        thread::spawn(move || {
            let result = pattern.move_to(&target, &token, position);
            match &result {
                Ok(()) => token.finish().unwrap_or_default(),
                Err(_) => token.stop(),
            }
            result
        })
    };

    let mut applied = Vec::new();
    while let Ok(p) = token.consume() {
        applied.push(p);
    }
    let result = producer
        .join()
        .unwrap_or_else(|_| Err(ServoError::transition_failed("pattern panicked")));
    (applied, result)
}

#[test]
fn test_crawl_reaches_target_exactly() -> TestResult {
    let (applied, result) = collect(
        Arc::new(CrawlTransitionController::new()),
        Target::with_precision(0.0, 11),
        1.0,
    );
    result?;

    assert!(applied.len() >= 10 && applied.len() <= 11, "{applied:?}");
    assert_eq!(applied.last().copied(), Some(1.0));
    assert!(applied.windows(2).all(|w| matches!(w, [a, b] if b > a)));
    Ok(())
}

#[test]
fn test_crawl_moves_down() -> TestResult {
    let (applied, result) = collect(
        Arc::new(CrawlTransitionController::new()),
        Target::with_precision(0.8, 11),
        0.2,
    );
    result?;

    assert_eq!(applied.last().copied(), Some(0.2));
    assert!(applied.windows(2).all(|w| matches!(w, [a, b] if b < a)));
    Ok(())
}

#[test]
fn test_crawl_already_there() -> TestResult {
    let (applied, result) = collect(
        Arc::new(CrawlTransitionController::new()),
        Target::with_precision(0.5, 11),
        0.5,
    );
    result?;
    assert!(applied.is_empty());
    Ok(())
}

#[test]
fn test_crawl_falls_back_to_controller_precision() -> TestResult {
    let target = Target {
        actual: 0.0,
        meta: Arc::new(Meta::empty()),
        controller_meta: Arc::new(
            Meta::builder()
                .property(keys::CONTROLLER_PRECISION, 5)
                .build(),
        ),
    };
    let (applied, result) = collect(Arc::new(CrawlTransitionController::new()), target, 1.0);
    result?;
    assert_eq!(applied, vec![0.25, 0.5, 0.75, 1.0]);
    Ok(())
}

#[test]
fn test_crawl_without_precision_fails() {
    let target = Target {
        actual: 0.0,
        meta: Arc::new(Meta::empty()),
        controller_meta: Arc::new(Meta::empty()),
    };
    let (applied, result) = collect(Arc::new(CrawlTransitionController::new()), target, 1.0);
    assert!(applied.is_empty());
    assert!(matches!(
        result,
        Err(ServoError::UnsupportedCapability { .. })
    ));
}

#[test]
fn test_crawl_rejects_degenerate_precision() {
    let (_, result) = collect(
        Arc::new(CrawlTransitionController::new()),
        Target::with_precision(0.0, 1),
        1.0,
    );
    assert!(matches!(result, Err(ServoError::InvalidValue { .. })));
}

#[test]
fn test_linear_interpolates_over_duration() -> TestResult {
    let pattern = LinearTransitionController::new(Duration::from_millis(80), 4)?;
    let started = Instant::now();
    let (applied, result) = collect(Arc::new(pattern), Target::with_precision(0.0, 1024), 1.0);
    result?;

    assert_eq!(applied, vec![0.25, 0.5, 0.75, 1.0]);
    assert!(started.elapsed() >= Duration::from_millis(55));
    Ok(())
}

#[test]
fn test_linear_rejects_zero_steps() {
    assert!(matches!(
        LinearTransitionController::new(Duration::from_millis(10), 0),
        Err(ServoError::InvalidConfiguration { .. })
    ));
}

#[test]
fn test_linear_cancellation_is_prompt() -> TestResult {
    let pattern = LinearTransitionController::new(Duration::from_secs(10), 10)?;
    let token = Arc::new(TransitionToken::new());
    let producer = {
        let token = Arc::clone(&token);
        thread::spawn(move || pattern.move_to(&Target::with_precision(0.0, 1024), &token, 1.0))
    };

    token.consume()?;
    let started = Instant::now();
    token.stop();
    let result = producer.join().map_err(|_| "pattern panicked")?;

    assert_eq!(result, Err(ServoError::TransitionOver));
    assert!(started.elapsed() < Duration::from_secs(2));
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_crawl_is_monotonic_and_bounded(
        start in 0.0f64..=1.0,
        end in 0.0f64..=1.0,
        precision in 2u32..64,
    ) {
        let step = 1.0 / f64::from(precision - 1);
        let (applied, result) = collect(
            Arc::new(CrawlTransitionController::new()),
            Target::with_precision(start, precision),
            end,
        );
        prop_assert!(result.is_ok());

        let mut previous = start;
        for p in &applied {
            prop_assert!((0.0..=1.0).contains(p));
            prop_assert!((p - previous).abs() <= step + 1e-9);
            if end > start {
                prop_assert!(*p > previous);
            } else {
                prop_assert!(*p < previous);
            }
            previous = *p;
        }
        prop_assert!((previous - end).abs() <= step / 2.0);
    }
}
