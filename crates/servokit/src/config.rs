//! Declarative controller setup.
//!
//! ```yaml
//! port: /dev/ttyUSB0
//! lazy_writes: true
//! silent:
//!   enabled: true
//!   timeout_ms: 10000
//!   heartbeat_ms: 300000
//! servos:
//!   - id: "0"
//!     transform:
//!       - kind: reverse
//!       - kind: limit
//!         min: 0.2
//!         max: 0.8
//!     transition:
//!       kind: linear
//!       duration_ms: 500
//!       steps: 20
//! ```

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use servokit_errors::{ServoError, ServoResult};
use servokit_silencer::SilencerConfig;
use servokit_transition::{
    CrawlTransitionController, LinearTransitionController, TransitionController,
};

use crate::controller::ServoController;
use crate::servo::Servo;
use crate::transform::{Cosine, Limit, Linear, Reverser, Scale, Sine};

/// Whole-controller configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    /// Port handed to the driver
    pub port: String,
    /// Skip writes the hardware cannot resolve
    pub lazy_writes: bool,
    /// Controller-wide silent mode
    pub silent: Option<SilentConfig>,
    /// Per-servo setup
    pub servos: Vec<ServoConfig>,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            port: "null".to_owned(),
            lazy_writes: false,
            silent: None,
            servos: Vec::new(),
        }
    }
}

/// Silent mode switch plus timings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SilentConfig {
    /// Turn silent mode on
    #[serde(default)]
    pub enabled: bool,
    /// Timings
    #[serde(flatten)]
    pub timing: SilencerConfig,
}

/// Setup for one servo channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServoConfig {
    /// Channel id
    pub id: String,
    /// Accept positioning requests
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Transformers stacked on the hardware servo, bottom first
    #[serde(default)]
    pub transform: Vec<TransformConfig>,
    /// Transition controller for the top of the stack
    #[serde(default)]
    pub transition: Option<TransitionConfig>,
    /// Queue transitions instead of cancelling
    #[serde(default)]
    pub queue: bool,
    /// Per-servo silent mode
    #[serde(default)]
    pub silent: Option<SilentConfig>,
}

fn default_enabled() -> bool {
    true
}

/// Movement pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TransitionConfig {
    /// One hardware step at a time
    Crawl,
    /// Fixed number of steps over a fixed duration
    Linear {
        /// Total duration
        duration_ms: u64,
        /// Number of positions
        steps: u32,
    },
}

impl TransitionConfig {
    /// # Errors
    ///
    /// Returns `InvalidConfiguration` for invalid parameters.
    pub fn build(&self) -> ServoResult<Arc<dyn TransitionController>> {
        Ok(match *self {
            Self::Crawl => Arc::new(CrawlTransitionController::new()),
            Self::Linear { duration_ms, steps } => Arc::new(LinearTransitionController::new(
                Duration::from_millis(duration_ms),
                steps,
            )?),
        })
    }
}

/// Coordinate transformer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TransformConfig {
    /// `1 - position`
    Reverse,
    /// `position * scale + shift`
    Scale {
        /// Multiplier
        scale: f64,
        /// Offset
        #[serde(default)]
        shift: f64,
    },
    /// Confine to part of the lower range
    Limit {
        /// Lower bound
        min: f64,
        /// Upper bound
        max: f64,
    },
    /// Crank linkage between two angles in degrees
    Linear {
        /// Start angle
        start: f64,
        /// End angle
        end: f64,
    },
    /// `sin(position)`
    Sine,
    /// `cos(position)`
    Cosine,
}

impl TransformConfig {
    /// Derive a servo from `lower`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfiguration` for invalid parameters, or
    /// `NotInitialized` if the controller is not open.
    pub fn apply(&self, lower: &Servo) -> ServoResult<Servo> {
        match *self {
            Self::Reverse => lower.transformed(Reverser),
            Self::Scale { scale, shift } => lower.transformed(Scale::new(scale, shift)?),
            Self::Limit { min, max } => lower.transformed(Limit::new(min, max)?),
            Self::Linear { start, end } => lower.transformed(Linear::new(start, end)?),
            Self::Sine => lower.transformed(Sine),
            Self::Cosine => lower.transformed(Cosine),
        }
    }

    fn validate(&self) -> ServoResult<()> {
        match *self {
            Self::Scale { scale, shift } => Scale::new(scale, shift).map(drop),
            Self::Limit { min, max } => Limit::new(min, max).map(drop),
            Self::Linear { start, end } => Linear::new(start, end).map(drop),
            Self::Reverse | Self::Sine | Self::Cosine => Ok(()),
        }
    }
}

impl ControllerConfig {
    /// # Errors
    ///
    /// Returns `InvalidConfiguration` if the text is not valid YAML for
    /// this structure or fails validation.
    pub fn from_yaml_str(yaml: &str) -> ServoResult<Self> {
        let config: Self = serde_yaml::from_str(yaml)
            .map_err(|e| ServoError::invalid_config(format!("bad controller config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// # Errors
    ///
    /// Same as [`from_yaml_str`](Self::from_yaml_str), plus
    /// `InvalidConfiguration` if the file cannot be read.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> ServoResult<Self> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path).map_err(|e| {
            ServoError::invalid_config(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_yaml_str(&yaml)
    }

    /// # Errors
    ///
    /// Returns `InvalidConfiguration` if serialization fails.
    pub fn to_yaml_string(&self) -> ServoResult<String> {
        serde_yaml::to_string(self)
            .map_err(|e| ServoError::invalid_config(format!("cannot serialize config: {e}")))
    }

    /// # Errors
    ///
    /// Returns `InvalidConfiguration` describing the first problem found.
    pub fn validate(&self) -> ServoResult<()> {
        if self.port.trim().is_empty() {
            return Err(ServoError::invalid_config("port must not be empty"));
        }
        if let Some(silent) = &self.silent {
            silent.timing.validate()?;
        }

        let mut seen = BTreeSet::new();
        for servo in &self.servos {
            if servo.id.trim().parse::<usize>().is_err() {
                return Err(ServoError::invalid_config(format!(
                    "servo id {:?} is not a channel number",
                    servo.id
                )));
            }
            if !seen.insert(servo.id.trim()) {
                return Err(ServoError::invalid_config(format!(
                    "servo {} configured twice",
                    servo.id
                )));
            }
            for transform in &servo.transform {
                transform.validate()?;
            }
            if let Some(transition) = &servo.transition {
                transition.build()?;
            }
            if let Some(silent) = &servo.silent {
                silent.timing.validate()?;
            }
        }
        Ok(())
    }
}

impl ServoController {
    /// Apply `config` to an open controller.
    ///
    /// Returns the top servo of each configured stack, in configuration
    /// order.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfiguration` if `config` is invalid, or any error
    /// from the operations the configuration implies.
    pub fn apply_config(&self, config: &ControllerConfig) -> ServoResult<Vec<Servo>> {
        config.validate()?;
        self.set_lazy_mode(config.lazy_writes)?;

        if let Some(silent) = &config.silent {
            self.set_silent_timeout(silent.timing.timeout(), silent.timing.heartbeat())?;
            self.set_silent_mode(silent.enabled)?;
        }

        let mut stacks = Vec::with_capacity(config.servos.len());
        for servo_config in &config.servos {
            let hardware = self.servo(servo_config.id.trim())?;
            hardware.set_enabled(servo_config.enabled)?;
            if let Some(silent) = &servo_config.silent {
                hardware.set_silent_timeout(silent.timing.timeout(), silent.timing.heartbeat())?;
                hardware.set_silent_mode(silent.enabled)?;
            }

            let mut top = hardware;
            for transform in &servo_config.transform {
                top = transform.apply(&top)?;
            }
            if let Some(transition) = &servo_config.transition {
                top.attach(Some(transition.build()?), servo_config.queue)?;
            }
            tracing::debug!(servo = %top.name(), "servo configured");
            stacks.push(top);
        }

        tracing::info!(port = %self.port(), servos = stacks.len(), "configuration applied");
        Ok(stacks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
port: /dev/ttyUSB0
lazy_writes: true
silent:
  enabled: true
  timeout_ms: 2000
servos:
  - id: "0"
    transform:
      - kind: reverse
      - kind: limit
        min: 0.2
        max: 0.8
    transition:
      kind: linear
      duration_ms: 500
      steps: 20
  - id: "3"
    enabled: false
    transition:
      kind: crawl
    queue: true
"#;

    #[test]
    fn test_parse_sample() -> ServoResult<()> {
        let config = ControllerConfig::from_yaml_str(SAMPLE)?;
        assert_eq!(config.port, "/dev/ttyUSB0");
        assert!(config.lazy_writes);

        let silent = config.silent.ok_or_else(|| ServoError::invalid_config("no silent"))?;
        assert!(silent.enabled);
        assert_eq!(silent.timing.timeout_ms, 2000);
        assert_eq!(silent.timing.heartbeat_ms, SilencerConfig::default().heartbeat_ms);

        let [first, second] = config.servos.as_slice() else {
            return Err(ServoError::invalid_config("expected two servos"));
        };
        assert_eq!(first.transform.len(), 2);
        assert_eq!(
            first.transition,
            Some(TransitionConfig::Linear {
                duration_ms: 500,
                steps: 20
            })
        );
        assert!(first.enabled);
        assert!(!second.enabled);
        assert!(second.queue);
        Ok(())
    }

    #[test]
    fn test_yaml_round_trip() -> ServoResult<()> {
        let config = ControllerConfig::from_yaml_str(SAMPLE)?;
        let again = ControllerConfig::from_yaml_str(&config.to_yaml_string()?)?;
        assert_eq!(config, again);
        Ok(())
    }

    #[test]
    fn test_rejects_duplicate_servo() {
        let yaml = "servos:\n  - id: \"1\"\n  - id: \" 1\"\n";
        assert!(matches!(
            ControllerConfig::from_yaml_str(yaml),
            Err(ServoError::InvalidConfiguration { .. })
        ));
    }

    #[test]
    fn test_rejects_bad_values() {
        for yaml in [
            "port: \"\"\n",
            "servos:\n  - id: left\n",
            "servos:\n  - id: \"0\"\n    transform:\n      - kind: limit\n        min: 0.9\n        max: 0.1\n",
            "servos:\n  - id: \"0\"\n    transition:\n      kind: linear\n      duration_ms: 10\n      steps: 0\n",
            "silent:\n  timeout_ms: 0\n",
            "servos:\n  - id: \"0\"\n    transform:\n      - kind: wobble\n",
        ] {
            assert!(
                matches!(
                    ControllerConfig::from_yaml_str(yaml),
                    Err(ServoError::InvalidConfiguration { .. })
                ),
                "accepted {yaml:?}"
            );
        }
    }

    #[test]
    fn test_defaults() -> ServoResult<()> {
        let config = ControllerConfig::from_yaml_str("{}")?;
        assert_eq!(config, ControllerConfig::default());
        Ok(())
    }
}
