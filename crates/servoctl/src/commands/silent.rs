//! `servoctl silent`

use std::path::Path;
use std::time::Duration;

use anyhow::Result;
use serde::Serialize;

use super::{SETTLE, SilentArgs, Session};
use crate::error::CliError;
use crate::events::{EventLog, LoggedEvent};
use crate::output;

#[derive(Debug, Serialize)]
pub struct SilentReport {
    pub subject: String,
    pub timeout_ms: u64,
    pub heartbeat_ms: u64,
    pub silent_now: bool,
    pub events: Vec<LoggedEvent>,
}

pub fn execute(config: Option<&Path>, args: &SilentArgs, json: bool) -> Result<()> {
    let session = Session::open(config)?;
    let timeout = Duration::from_millis(args.timeout_ms);
    let heartbeat = Duration::from_millis(args.heartbeat_ms);
    let hold = Duration::from_millis(args.hold_ms);
    let log = EventLog::new();

    let (subject, silent_now) = match args.servo.as_deref() {
        Some(id) => {
            let servo = session.servo(id)?;
            servo.add_listener(log.clone());
            servo
                .set_silent_timeout(timeout, heartbeat)
                .map_err(CliError::from)?;
            servo.set_silent_mode(true).map_err(CliError::from)?;
            std::thread::sleep(hold);
            (servo.name().to_owned(), servo.is_silent_now().map_err(CliError::from)?)
        }
        None => {
            let controller = &session.controller;
            controller.add_listener(log.clone());
            controller
                .set_silent_timeout(timeout, heartbeat)
                .map_err(CliError::from)?;
            controller.set_silent_mode(true).map_err(CliError::from)?;
            std::thread::sleep(hold);
            (
                controller.port().to_owned(),
                controller.is_silent_now().map_err(CliError::from)?,
            )
        }
    };
    std::thread::sleep(SETTLE);

    output::print_silent(
        &SilentReport {
            subject,
            timeout_ms: args.timeout_ms,
            heartbeat_ms: args.heartbeat_ms,
            silent_now,
            events: log.events(),
        },
        json,
    );
    Ok(())
}
