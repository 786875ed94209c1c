//! Command implementations for servoctl

pub mod config;
pub mod meta;
pub mod motion;
pub mod silent;

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, ValueEnum};
use servokit::prelude::*;

use crate::error::CliError;

/// Delivery of listener notifications is asynchronous; give it a moment
/// before reporting.
pub const SETTLE: Duration = Duration::from_millis(50);

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum TransitionKind {
    /// One hardware step at a time
    Crawl,
    /// Fixed number of steps over a fixed duration
    Linear,
}

#[derive(Debug, Args)]
pub struct MoveArgs {
    /// Servo id
    pub servo: String,
    /// Target position in 0.0..=1.0
    pub position: f64,
    /// Transition to attach before moving
    #[arg(short, long, value_enum)]
    pub transition: Option<TransitionKind>,
    /// Duration of a linear transition
    #[arg(long, default_value_t = 500)]
    pub duration_ms: u64,
    /// Steps of a linear transition
    #[arg(long, default_value_t = 20)]
    pub steps: u32,
    /// Drive the servo through a reverser
    #[arg(short, long)]
    pub reverse: bool,
    /// Give up waiting after this long
    #[arg(long, default_value_t = 10_000)]
    pub wait_ms: u64,
}

#[derive(Debug, Args)]
pub struct SilentArgs {
    /// Servo id; controller-wide silent mode when omitted
    #[arg(short, long)]
    pub servo: Option<String>,
    /// Inactivity period before going silent
    #[arg(long, default_value_t = 100)]
    pub timeout_ms: u64,
    /// Period between heartbeat wakes
    #[arg(long, default_value_t = 60_000)]
    pub heartbeat_ms: u64,
    /// How long to observe the silencer
    #[arg(long, default_value_t = 300)]
    pub hold_ms: u64,
}

/// An open controller plus the stacks its configuration created.
pub struct Session {
    pub controller: ServoController,
    pub null: NullController,
    pub stacks: Vec<Servo>,
}

impl Session {
    /// Open the null controller and apply the configuration at `config`.
    pub fn open(config: Option<&Path>) -> Result<Self> {
        let config = match config {
            Some(path) => ControllerConfig::from_yaml_file(path)
                .map_err(CliError::from)
                .with_context(|| format!("loading {}", path.display()))?,
            None => ControllerConfig::default(),
        };

        let null = NullController::new().with_write_delay(Duration::ZERO);
        let controller =
            ServoController::new(config.port.as_str(), null.clone()).map_err(CliError::from)?;
        controller.open().map_err(CliError::from)?;
        let stacks = controller
            .apply_config(&config)
            .map_err(CliError::from)?;
        tracing::info!(port = %controller.port(), stacks = stacks.len(), "session opened");

        Ok(Self {
            controller,
            null,
            stacks,
        })
    }

    /// The configured stack on hardware channel `id`, or the bare hardware
    /// servo if none was configured.
    pub fn servo(&self, id: &str) -> Result<Servo> {
        let id = id.trim();
        if let Some(top) = self.stacks.iter().find(|top| hardware_of(top).name() == id) {
            return Ok(top.clone());
        }
        Ok(self.controller.servo(id).map_err(CliError::from)?)
    }
}

/// The hardware servo at the bottom of `servo`'s stack.
pub fn hardware_of(servo: &Servo) -> Servo {
    let mut current = servo.clone();
    while let Some(lower) = current.lower().cloned() {
        current = lower;
    }
    current
}
