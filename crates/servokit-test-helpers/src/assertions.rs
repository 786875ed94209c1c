//! Assertion macros for normalized positions.

/// Assert that two positions are equal within a tolerance.
///
/// ```rust
/// use servokit_test_helpers::assert_approx_eq;
///
/// assert_approx_eq!(0.5, 0.5001, 0.001);
/// ```
#[macro_export]
macro_rules! assert_approx_eq {
    ($left:expr, $right:expr, $tolerance:expr $(,)?) => {
        let left: f64 = $left;
        let right: f64 = $right;
        let tolerance: f64 = $tolerance;
        let diff = (left - right).abs();
        if diff > tolerance {
            panic!(
                "assertion failed: `(left ≈ right)`\n  left: `{:?}`,\n right: `{:?}`,\n  diff: `{:?}`,\n  tolerance: `{:?}`",
                left, right, diff, tolerance
            );
        }
    };
}

/// Assert that a sequence of positions moves strictly in one direction.
///
/// ```rust
/// use servokit_test_helpers::assert_monotonic;
///
/// assert_monotonic!(&[0.1, 0.2, 0.3]);
/// assert_monotonic!(&[0.3, 0.2]);
/// ```
#[macro_export]
macro_rules! assert_monotonic {
    ($positions:expr $(,)?) => {
        let positions: &[f64] = $positions;
        let rising = positions.windows(2).all(|w| matches!(w, [a, b] if b > a));
        let falling = positions.windows(2).all(|w| matches!(w, [a, b] if b < a));
        if !rising && !falling {
            panic!("positions are not monotonic: {:?}", positions);
        }
    };
}

#[cfg(test)]
mod tests {
    #[test]
    fn test_approx_eq_passes() {
        assert_approx_eq!(0.25, 0.2500001, 1e-6);
    }

    #[test]
    #[should_panic(expected = "left ≈ right")]
    fn test_approx_eq_fails() {
        assert_approx_eq!(0.25, 0.5, 1e-6);
    }

    #[test]
    #[should_panic(expected = "not monotonic")]
    fn test_monotonic_rejects_reversal() {
        assert_monotonic!(&[0.1, 0.3, 0.2]);
    }
}
