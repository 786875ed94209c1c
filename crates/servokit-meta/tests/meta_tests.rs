//! Integration tests for the metadata store.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::thread;

use proptest::prelude::*;
use servokit_meta::prelude::*;

type TestResult = Result<(), Box<dyn std::error::Error>>;

fn range_meta() -> Meta {
    Meta::builder()
        .property(keys::SERVO_RANGE_MIN, 0)
        .writer(keys::SERVO_RANGE_MIN, |value, _| {
            let min: i32 = value
                .parse()
                .map_err(|_| ServoError::invalid_value(keys::SERVO_RANGE_MIN, value, "not a number"))?;
            if !(0..=1023).contains(&min) {
                return Err(ServoError::invalid_value(
                    keys::SERVO_RANGE_MIN,
                    value,
                    "outside of 0...1023",
                ));
            }
            Ok(())
        })
        .build()
}

#[test]
fn test_snapshot_serializes_to_json() -> TestResult {
    let meta = Meta::builder()
        .feature(keys::SERVO_SILENT, true)
        .property(keys::MANUFACTURER_MODEL, "8 Channel Demo")
        .build();

    let json = serde_json::to_string(&meta.snapshot())?;
    assert!(json.contains("servo/silent"));
    assert!(json.contains("8 Channel Demo"));

    let back: MetaSnapshot = serde_json::from_str(&json)?;
    assert_eq!(back, meta.snapshot());
    Ok(())
}

#[test]
fn test_concurrent_reads_and_writes() -> TestResult {
    let writes = Arc::new(AtomicU32::new(0));
    let counter = Arc::clone(&writes);
    let meta = Arc::new(
        Meta::builder()
            .property(keys::CONTROLLER_BANDWIDTH, 300)
            .writer(keys::CONTROLLER_BANDWIDTH, move |_, _| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .build(),
    );

    let mut handles = Vec::new();
    for i in 0..8u32 {
        let meta = Arc::clone(&meta);
        handles.push(thread::spawn(move || {
            for j in 0..50u32 {
                if j % 2 == 0 {
                    meta.set_property(keys::CONTROLLER_BANDWIDTH, &(i * 100 + j).to_string())
                        .unwrap_or_default();
                } else {
                    meta.property_as::<u32>(keys::CONTROLLER_BANDWIDTH).unwrap_or_default();
                }
            }
        }));
    }
    for handle in handles {
        assert!(handle.join().is_ok(), "thread should not panic");
    }

    assert_eq!(writes.load(Ordering::SeqCst), 8 * 25);
    let _: u32 = meta.property_as(keys::CONTROLLER_BANDWIDTH)?;
    Ok(())
}

proptest! {
    #[test]
    fn prop_writer_accepts_only_valid_range(min in -2000i32..2000) {
        let meta = range_meta();
        let result = meta.set_property(keys::SERVO_RANGE_MIN, &min.to_string());
        if (0..=1023).contains(&min) {
            prop_assert!(result.is_ok());
            prop_assert_eq!(meta.property_as::<i32>(keys::SERVO_RANGE_MIN).ok(), Some(min));
        } else {
            let rejected = matches!(result, Err(ServoError::InvalidValue { .. }));
            prop_assert!(rejected);
            prop_assert_eq!(meta.property_as::<i32>(keys::SERVO_RANGE_MIN).ok(), Some(0));
        }
    }
}
