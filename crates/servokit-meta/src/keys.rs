//! Well-known feature and property keys.

/// Feature: the servo can stop its control signal when idle.
pub const SERVO_SILENT: &str = "servo/silent";

/// Feature: the controller can stop all control signals when idle.
pub const CONTROLLER_SILENT: &str = "controller/silent";

/// Feature: the controller can be unplugged and plugged back.
pub const CONTROLLER_ALLOW_DISCONNECT: &str = "controller/allow_disconnect";

/// Property: number of distinct servo positions.
pub const SERVO_PRECISION: &str = "servo/precision";

/// Property: number of distinct positions the controller can produce.
pub const CONTROLLER_PRECISION: &str = "controller/precision";

/// Property: control signal updates per second across all channels.
pub const CONTROLLER_BANDWIDTH: &str = "controller/bandwidth";

/// Property: number of servo channels.
pub const CONTROLLER_MAX_SERVOS: &str = "controller/maxservos";

/// Property: lower end of the servo pulse range.
pub const SERVO_RANGE_MIN: &str = "servo/range/min";

/// Property: upper end of the servo pulse range.
pub const SERVO_RANGE_MAX: &str = "servo/range/max";

/// Property: units of the servo pulse range.
pub const SERVO_RANGE_UNITS: &str = "servo/range/units";

/// Property: hardware manufacturer.
pub const MANUFACTURER_NAME: &str = "manufacturer/name";

/// Property: manufacturer web site.
pub const MANUFACTURER_URL: &str = "manufacturer/URL";

/// Property: hardware model.
pub const MANUFACTURER_MODEL: &str = "manufacturer/model";
