//! The narrow boundary between servokit and a vendor protocol.

use std::fmt;

use servokit_errors::{ServoError, ServoResult};
use servokit_meta::{Meta, keys};

/// Vendor-specific controller driver.
///
/// servokit owns the driver and calls it only while holding the controller
/// lock, so implementations need no internal synchronization. Positions are
/// normalized to `[0.0, 1.0]` and validated before they reach the driver.
pub trait ControllerDriver: Send + fmt::Debug {
    /// Connect to the hardware behind `port`.
    ///
    /// # Errors
    ///
    /// Returns `HardwareIo` if the device cannot be reached.
    fn init(&mut self, port: &str) -> ServoResult<()>;

    /// Number of servo channels.
    fn servo_count(&self) -> usize;

    /// Controller metadata. Called once, right after [`init`](Self::init).
    fn meta(&self) -> Meta;

    /// Metadata for one channel. Called once per channel, when the servo
    /// handle is first created.
    fn servo_meta(&self, channel: usize) -> Meta;

    /// Send a position to one channel.
    ///
    /// # Errors
    ///
    /// Returns `HardwareIo` on communication failure.
    fn write_position(&mut self, channel: usize, position: f64) -> ServoResult<()>;

    /// Bring the controller to its power-on state.
    ///
    /// # Errors
    ///
    /// Returns `HardwareIo` on communication failure.
    fn reset(&mut self) -> ServoResult<()>;

    /// Stop the control signal on every channel.
    ///
    /// # Errors
    ///
    /// Returns `UnsupportedCapability` unless the driver declares
    /// `controller/silent`, or `HardwareIo` on communication failure.
    fn sleep(&mut self) -> ServoResult<()> {
        Err(ServoError::unsupported(keys::CONTROLLER_SILENT))
    }

    /// Resume the control signal on every channel.
    ///
    /// # Errors
    ///
    /// Same as [`sleep`](Self::sleep).
    fn wake(&mut self) -> ServoResult<()> {
        Err(ServoError::unsupported(keys::CONTROLLER_SILENT))
    }

    /// Stop the control signal on one channel.
    ///
    /// # Errors
    ///
    /// Returns `UnsupportedCapability` unless the channel declares
    /// `servo/silent`, or `HardwareIo` on communication failure.
    fn sleep_servo(&mut self, channel: usize) -> ServoResult<()> {
        let _ = channel;
        Err(ServoError::unsupported(keys::SERVO_SILENT))
    }

    /// Resume the control signal on one channel.
    ///
    /// # Errors
    ///
    /// Same as [`sleep_servo`](Self::sleep_servo).
    fn wake_servo(&mut self, channel: usize) -> ServoResult<()> {
        let _ = channel;
        Err(ServoError::unsupported(keys::SERVO_SILENT))
    }

    /// Whether the hardware is still reachable.
    fn is_connected(&self) -> bool {
        true
    }

    /// Release the hardware.
    ///
    /// # Errors
    ///
    /// Returns `HardwareIo` if the device could not be released cleanly.
    fn close(&mut self) -> ServoResult<()> {
        Ok(())
    }
}
