//! Unwrap helpers with good error messages.
//!
//! These replace `unwrap()` and `expect()` in test code, with
//! `#[track_caller]` for accurate panic locations.

use std::fmt::Debug;

/// Unwrap a `Result`, panicking with the error on failure.
///
/// ```rust
/// use servokit_test_helpers::must;
///
/// let result: Result<i32, &str> = Ok(42);
/// assert_eq!(must(result), 42);
/// ```
///
/// # Panics
///
/// Panics if the result is `Err`.
#[track_caller]
pub fn must<T, E: Debug>(result: Result<T, E>) -> T {
    match result {
        Ok(v) => v,
        Err(e) => panic!("must: unexpected Err: {e:?}"),
    }
}

/// Unwrap an `Option`, panicking with `msg` if `None`.
///
/// ```rust
/// use servokit_test_helpers::must_some;
///
/// assert_eq!(must_some(Some(42), "expected a value"), 42);
/// ```
///
/// # Panics
///
/// Panics if the option is `None`.
#[track_caller]
pub fn must_some<T>(option: Option<T>, msg: &str) -> T {
    match option {
        Some(v) => v,
        None => panic!("must_some: {msg}"),
    }
}

/// Unwrap a `Result` with a context message.
///
/// # Panics
///
/// Panics if the result is `Err`.
#[track_caller]
pub fn must_with<T, E: Debug>(result: Result<T, E>, context: &str) -> T {
    match result {
        Ok(v) => v,
        Err(e) => panic!("{context}: {e:?}"),
    }
}
