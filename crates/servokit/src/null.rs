//! A software-only controller for demos and tests.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;
use servokit_errors::{ServoError, ServoResult};
use servokit_meta::{Meta, MetaUpdate, keys};

use crate::hardware::ControllerDriver;

/// Number of channels.
pub const NULL_CHANNELS: usize = 8;
/// Lowest pulse value a channel accepts.
pub const NULL_PULSE_MIN: u16 = 0;
/// Highest pulse value a channel accepts.
pub const NULL_PULSE_MAX: u16 = 1023;
/// Commands per second the imaginary link can carry.
pub const NULL_BANDWIDTH: u32 = 300;

#[derive(Debug, Clone, Copy)]
struct Channel {
    min: u16,
    max: u16,
    position: Option<f64>,
    pulse: Option<u16>,
}

impl Channel {
    fn new() -> Self {
        Self {
            min: NULL_PULSE_MIN,
            max: NULL_PULSE_MAX,
            position: None,
            pulse: None,
        }
    }

    fn precision(&self) -> u16 {
        self.max.saturating_sub(self.min)
    }

    #[expect(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        reason = "offset is rounded and clamped to 0..=span, which fits in u16"
    )]
    fn write(&mut self, position: f64) {
        let span = f64::from(self.precision());
        let offset = (span * position).round().clamp(0.0, span);
        self.position = Some(position);
        self.pulse = Some(self.min.saturating_add(offset as u16));
    }
}

/// Eight imaginary channels with a 0..=1023 pulse range.
///
/// Every channel supports silent mode and lets its range be narrowed
/// through the writable `servo/range/min` and `servo/range/max` properties.
/// Writes take as long as the imaginary link needs to carry them.
#[derive(Debug, Clone)]
pub struct NullController {
    channels: Arc<Mutex<Vec<Channel>>>,
    write_delay: Duration,
    port: Option<String>,
}

impl Default for NullController {
    fn default() -> Self {
        Self::new()
    }
}

impl NullController {
    /// Eight channels at full range, with the write latency of the
    /// imaginary link.
    pub fn new() -> Self {
        Self {
            channels: Arc::new(Mutex::new(vec![Channel::new(); NULL_CHANNELS])),
            write_delay: Duration::from_millis(u64::from(1000 / NULL_BANDWIDTH)),
            port: None,
        }
    }

    /// Override the simulated write latency.
    #[must_use]
    pub fn with_write_delay(mut self, delay: Duration) -> Self {
        self.write_delay = delay;
        self
    }

    /// Last pulse value sent to `channel`.
    pub fn pulse(&self, channel: usize) -> Option<u16> {
        self.channels.lock().get(channel).and_then(|c| c.pulse)
    }

    fn range_writer(
        channels: &Arc<Mutex<Vec<Channel>>>,
        channel: usize,
    ) -> impl Fn(&str, &mut MetaUpdate<'_>) -> ServoResult<()> + Send + Sync + 'static {
        let channels = Arc::clone(channels);
        move |value, update| {
            let pulse: u16 = value.trim().parse().map_err(|e| {
                ServoError::invalid_value(update.key(), value, format!("not a pulse value: {e}"))
            })?;
            if pulse > NULL_PULSE_MAX {
                return Err(ServoError::invalid_value(
                    update.key(),
                    value,
                    format!("outside {NULL_PULSE_MIN}..={NULL_PULSE_MAX}"),
                ));
            }

            let mut channels = channels.lock();
            let state = channels
                .get_mut(channel)
                .ok_or_else(|| ServoError::invalid_servo_id(channel.to_string(), "no such channel"))?;
            let (min, max) = if update.key() == keys::SERVO_RANGE_MIN {
                (pulse, state.max)
            } else {
                (state.min, pulse)
            };
            if min >= max {
                return Err(ServoError::invalid_value(
                    update.key(),
                    value,
                    format!("range {min}..{max} is empty"),
                ));
            }

            state.min = min;
            state.max = max;
            if let Some(position) = state.position {
                state.write(position);
            }
            update.set_property(keys::SERVO_PRECISION, state.precision());
            tracing::debug!(channel, min, max, "null channel range changed");
            Ok(())
        }
    }
}

impl ControllerDriver for NullController {
    fn init(&mut self, port: &str) -> ServoResult<()> {
        self.port = Some(port.to_owned());
        tracing::info!(port, "null controller initialized");
        Ok(())
    }

    fn servo_count(&self) -> usize {
        NULL_CHANNELS
    }

    fn meta(&self) -> Meta {
        Meta::builder()
            .feature(keys::CONTROLLER_ALLOW_DISCONNECT, false)
            .property(keys::MANUFACTURER_NAME, "DIY Zoning Project")
            .property(keys::MANUFACTURER_URL, "https://diy-zoning.sourceforge.net/")
            .property(keys::MANUFACTURER_MODEL, "8 Channel Demo Servo Controller")
            .property(keys::CONTROLLER_MAX_SERVOS, NULL_CHANNELS)
            .property(keys::CONTROLLER_BANDWIDTH, NULL_BANDWIDTH)
            .property(keys::CONTROLLER_PRECISION, u32::from(NULL_PULSE_MAX) + 1)
            .property(keys::SERVO_RANGE_MIN, NULL_PULSE_MIN)
            .property(keys::SERVO_RANGE_MAX, NULL_PULSE_MAX)
            .property(keys::SERVO_RANGE_UNITS, "\u{3bc}s")
            .build()
    }

    fn servo_meta(&self, channel: usize) -> Meta {
        let (min, max, precision) = self
            .channels
            .lock()
            .get(channel)
            .map_or((NULL_PULSE_MIN, NULL_PULSE_MAX, NULL_PULSE_MAX), |c| {
                (c.min, c.max, c.precision())
            });
        Meta::builder()
            .feature(keys::SERVO_SILENT, true)
            .property(keys::SERVO_PRECISION, precision)
            .property(keys::SERVO_RANGE_MIN, min)
            .property(keys::SERVO_RANGE_MAX, max)
            .property(keys::SERVO_RANGE_UNITS, "\u{3bc}s")
            .writer(keys::SERVO_RANGE_MIN, Self::range_writer(&self.channels, channel))
            .writer(keys::SERVO_RANGE_MAX, Self::range_writer(&self.channels, channel))
            .build()
    }

    fn write_position(&mut self, channel: usize, position: f64) -> ServoResult<()> {
        let pulse = {
            let mut channels = self.channels.lock();
            let state = channels.get_mut(channel).ok_or_else(|| {
                ServoError::hardware_io(
                    self.port.as_deref().unwrap_or("null"),
                    format!("no channel {channel}"),
                )
            })?;
            state.write(position);
            state.pulse
        };
        tracing::debug!(channel, position, ?pulse, "null write");
        if !self.write_delay.is_zero() {
            thread::sleep(self.write_delay);
        }
        Ok(())
    }

    fn reset(&mut self) -> ServoResult<()> {
        tracing::info!(port = ?self.port, "null controller reset");
        Ok(())
    }

    fn sleep_servo(&mut self, channel: usize) -> ServoResult<()> {
        tracing::info!(channel, "null servo asleep");
        Ok(())
    }

    fn wake_servo(&mut self, channel: usize) -> ServoResult<()> {
        tracing::info!(channel, "null servo awake");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_controller_meta() -> ServoResult<()> {
        let meta = NullController::new().meta();
        assert_eq!(meta.property_as::<u32>(keys::CONTROLLER_PRECISION)?, 1024);
        assert_eq!(meta.property_as::<usize>(keys::CONTROLLER_MAX_SERVOS)?, 8);
        assert!(!meta.feature(keys::CONTROLLER_ALLOW_DISCONNECT)?);
        assert!(!meta.has_feature(keys::CONTROLLER_SILENT));
        Ok(())
    }

    #[test]
    fn test_position_maps_to_pulse() -> ServoResult<()> {
        let mut null = NullController::new().with_write_delay(Duration::ZERO);
        null.write_position(2, 0.0)?;
        assert_eq!(null.pulse(2), Some(0));
        null.write_position(2, 1.0)?;
        assert_eq!(null.pulse(2), Some(1023));
        null.write_position(2, 0.5)?;
        assert_eq!(null.pulse(2), Some(512));
        assert_eq!(null.pulse(3), None);
        Ok(())
    }

    #[test]
    fn test_unknown_channel_fails() {
        let mut null = NullController::new().with_write_delay(Duration::ZERO);
        assert!(matches!(
            null.write_position(8, 0.5),
            Err(ServoError::HardwareIo { .. })
        ));
    }

    #[test]
    fn test_range_writer_updates_precision_and_pulse() -> ServoResult<()> {
        let mut null = NullController::new().with_write_delay(Duration::ZERO);
        let meta = null.servo_meta(0);
        null.write_position(0, 1.0)?;

        meta.set_property(keys::SERVO_RANGE_MAX, "500")?;
        assert_eq!(meta.property_as::<u16>(keys::SERVO_PRECISION)?, 500);
        assert_eq!(meta.property_as::<u16>(keys::SERVO_RANGE_MAX)?, 500);
        assert_eq!(null.pulse(0), Some(500));

        meta.set_property(keys::SERVO_RANGE_MIN, "100")?;
        assert_eq!(meta.property_as::<u16>(keys::SERVO_PRECISION)?, 400);
        Ok(())
    }

    #[test]
    fn test_pulse_stays_inside_narrowed_range() -> ServoResult<()> {
        let mut null = NullController::new().with_write_delay(Duration::ZERO);
        let meta = null.servo_meta(4);
        meta.set_property(keys::SERVO_RANGE_MIN, "100")?;
        meta.set_property(keys::SERVO_RANGE_MAX, "500")?;

        null.write_position(4, 0.0)?;
        assert_eq!(null.pulse(4), Some(100));
        null.write_position(4, 0.25)?;
        assert_eq!(null.pulse(4), Some(200));
        null.write_position(4, 1.0)?;
        assert_eq!(null.pulse(4), Some(500));
        Ok(())
    }

    #[test]
    fn test_range_writer_rejects_bad_values() {
        let null = NullController::new();
        let meta = null.servo_meta(1);
        assert!(matches!(
            meta.set_property(keys::SERVO_RANGE_MAX, "2000"),
            Err(ServoError::InvalidValue { .. })
        ));
        assert!(matches!(
            meta.set_property(keys::SERVO_RANGE_MIN, "1023"),
            Err(ServoError::InvalidValue { .. })
        ));
        assert!(matches!(
            meta.set_property(keys::SERVO_RANGE_MIN, "low"),
            Err(ServoError::InvalidValue { .. })
        ));
        assert!(matches!(
            meta.set_property(keys::SERVO_PRECISION, "7"),
            Err(ServoError::ReadOnly { .. })
        ));
    }
}
