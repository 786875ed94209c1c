//! Coordinate transformers.
//!
//! A transformer maps positions of a derived servo onto positions of the
//! servo below it. Both coordinate systems are normalized to `[0.0, 1.0]`,
//! but a transformer is free to use only part of the lower range.

use std::fmt;

use servokit_errors::{ServoError, ServoResult};

/// Bijective mapping between a derived servo and the servo below it.
pub trait CoordinateTransform: Send + Sync + fmt::Debug {
    /// Short name used to build the derived servo's name.
    fn name(&self) -> &'static str;

    /// Map a position of the derived servo to the lower servo.
    fn to_lower(&self, position: f64) -> f64;

    /// Map a position of the lower servo back to the derived servo.
    fn from_lower(&self, position: f64) -> f64;
}

/// Reverses the direction of travel.
#[derive(Debug, Clone, Copy, Default)]
pub struct Reverser;

impl CoordinateTransform for Reverser {
    fn name(&self) -> &'static str {
        "reverser"
    }

    fn to_lower(&self, position: f64) -> f64 {
        1.0 - position
    }

    fn from_lower(&self, position: f64) -> f64 {
        1.0 - position
    }
}

/// `lower = position * scale + shift`.
#[derive(Debug, Clone, Copy)]
pub struct Scale {
    scale: f64,
    shift: f64,
}

impl Scale {
    /// # Errors
    ///
    /// Returns `InvalidConfiguration` if `scale` is zero or either value is
    /// not finite.
    pub fn new(scale: f64, shift: f64) -> ServoResult<Self> {
        if !scale.is_finite() || !shift.is_finite() {
            return Err(ServoError::invalid_config("scale and shift must be finite"));
        }
        if scale.abs() < f64::EPSILON {
            return Err(ServoError::invalid_config("scale must not be 0"));
        }
        Ok(Self { scale, shift })
    }
}

impl CoordinateTransform for Scale {
    fn name(&self) -> &'static str {
        "scale"
    }

    fn to_lower(&self, position: f64) -> f64 {
        position.mul_add(self.scale, self.shift)
    }

    fn from_lower(&self, position: f64) -> f64 {
        (position - self.shift) / self.scale
    }
}

/// Confines the derived servo to `[min, max]` of the lower range.
#[derive(Debug, Clone, Copy)]
pub struct Limit {
    min: f64,
    max: f64,
}

impl Limit {
    /// # Errors
    ///
    /// Returns `InvalidConfiguration` unless `0 <= min < max <= 1`.
    pub fn new(min: f64, max: f64) -> ServoResult<Self> {
        if !(0.0..=1.0).contains(&min) || !(0.0..=1.0).contains(&max) {
            return Err(ServoError::invalid_config(format!(
                "limits must be within 0.0..=1.0, got {min}..{max}"
            )));
        }
        if min >= max {
            return Err(ServoError::invalid_config(format!(
                "lower limit {min} must be less than upper limit {max}"
            )));
        }
        Ok(Self { min, max })
    }
}

impl CoordinateTransform for Limit {
    fn name(&self) -> &'static str {
        "limit"
    }

    fn to_lower(&self, position: f64) -> f64 {
        (self.max - self.min).mul_add(position, self.min)
    }

    fn from_lower(&self, position: f64) -> f64 {
        (position - self.min) / (self.max - self.min)
    }
}

/// Turns a rotary servo driving a crank into linear travel.
///
/// The crank sweeps from `start` to `end` degrees; positions of the derived
/// servo are proportional to the linear displacement of the crank pin.
#[derive(Debug, Clone, Copy)]
pub struct Linear {
    start: f64,
    range: f64,
    offset: f64,
    scale: f64,
}

impl Linear {
    /// Full half-turn sweep.
    pub fn half_turn() -> Self {
        Self::from_angles(0.0, 180.0)
    }

    /// # Errors
    ///
    /// Returns `InvalidConfiguration` unless `0 <= start < end <= 180`.
    pub fn new(start: f64, end: f64) -> ServoResult<Self> {
        if !(0.0..=180.0).contains(&start) || !(0.0..=180.0).contains(&end) {
            return Err(ServoError::invalid_config(format!(
                "crank angles must be within 0..=180 degrees, got {start}..{end}"
            )));
        }
        if end <= start {
            return Err(ServoError::invalid_config(format!(
                "end angle {end} must be greater than start angle {start}"
            )));
        }
        Ok(Self::from_angles(start, end))
    }

    fn from_angles(start: f64, end: f64) -> Self {
        let offset = start.to_radians().cos();
        Self {
            start,
            range: end - start,
            offset,
            scale: end.to_radians().cos() - offset,
        }
    }
}

impl CoordinateTransform for Linear {
    fn name(&self) -> &'static str {
        "linear"
    }

    fn to_lower(&self, position: f64) -> f64 {
        let angle = position.mul_add(self.scale, self.offset).clamp(-1.0, 1.0).acos();
        (angle.to_degrees() - self.start) / self.range
    }

    fn from_lower(&self, position: f64) -> f64 {
        let angle = position.mul_add(self.range, self.start).to_radians();
        (angle.cos() - self.offset) / self.scale
    }
}

/// `lower = sin(position)`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sine;

impl CoordinateTransform for Sine {
    fn name(&self) -> &'static str {
        "sine"
    }

    fn to_lower(&self, position: f64) -> f64 {
        position.sin()
    }

    fn from_lower(&self, position: f64) -> f64 {
        position.asin()
    }
}

/// `lower = cos(position)`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Cosine;

impl CoordinateTransform for Cosine {
    fn name(&self) -> &'static str {
        "cosine"
    }

    fn to_lower(&self, position: f64) -> f64 {
        position.cos()
    }

    fn from_lower(&self, position: f64) -> f64 {
        position.acos()
    }
}
