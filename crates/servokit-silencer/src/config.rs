//! Silencer timing configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use servokit_errors::{ServoError, ServoResult};

/// Silent-mode timing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SilencerConfig {
    /// Inactivity period before the control signal is stopped (milliseconds).
    pub timeout_ms: u64,
    /// Time spent silent before the signal is briefly resumed (milliseconds).
    pub heartbeat_ms: u64,
}

impl Default for SilencerConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 10_000,
            heartbeat_ms: 300_000,
        }
    }
}

impl SilencerConfig {
    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if either duration is zero.
    pub fn validate(&self) -> ServoResult<()> {
        if self.timeout_ms == 0 {
            return Err(ServoError::invalid_config(
                "silent timeout_ms must be greater than 0",
            ));
        }
        if self.heartbeat_ms == 0 {
            return Err(ServoError::invalid_config(
                "silent heartbeat_ms must be greater than 0",
            ));
        }
        Ok(())
    }

    /// Inactivity period as a `Duration`.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Heartbeat period as a `Duration`.
    pub fn heartbeat(&self) -> Duration {
        Duration::from_millis(self.heartbeat_ms)
    }

    /// Create a configuration builder.
    #[must_use]
    pub fn builder() -> SilencerConfigBuilder {
        SilencerConfigBuilder::default()
    }
}

/// Builder for `SilencerConfig`.
#[derive(Debug, Default)]
pub struct SilencerConfigBuilder {
    config: SilencerConfig,
}

impl SilencerConfigBuilder {
    /// Set the inactivity timeout.
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout_ms = saturating_millis(timeout);
        self
    }

    /// Set the heartbeat period.
    #[must_use]
    pub fn heartbeat(mut self, heartbeat: Duration) -> Self {
        self.config.heartbeat_ms = saturating_millis(heartbeat);
        self
    }

    /// Build the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn build(self) -> ServoResult<SilencerConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

fn saturating_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
