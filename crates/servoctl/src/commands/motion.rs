//! `servoctl move`

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use serde::Serialize;
use servokit::prelude::*;

use super::{MoveArgs, SETTLE, Session, TransitionKind, hardware_of};
use crate::error::CliError;
use crate::events::{EventLog, LoggedEvent};
use crate::output;

#[derive(Debug, Serialize)]
pub struct MoveReport {
    pub servo: String,
    pub requested: f64,
    pub actual: f64,
    pub pulse: Option<u16>,
    pub outcome: String,
    pub events: Vec<LoggedEvent>,
}

pub fn execute(config: Option<&Path>, args: &MoveArgs, json: bool) -> Result<()> {
    let session = Session::open(config)?;
    let mut servo = session.servo(&args.servo)?;
    if args.reverse {
        servo = servo.transformed(Reverser).map_err(CliError::from)?;
    }
    if let Some(kind) = args.transition {
        let controller: Arc<dyn TransitionController> = match kind {
            TransitionKind::Crawl => Arc::new(CrawlTransitionController::new()),
            TransitionKind::Linear => Arc::new(
                LinearTransitionController::new(Duration::from_millis(args.duration_ms), args.steps)
                    .map_err(CliError::from)?,
            ),
        };
        servo.attach(Some(controller), false).map_err(CliError::from)?;
    }

    let log = EventLog::new();
    servo.add_listener(log.clone());

    let status = servo.set_position(args.position).map_err(CliError::from)?;
    let outcome = status
        .wait_timeout(Duration::from_millis(args.wait_ms))
        .map_err(CliError::from)?;
    std::thread::sleep(SETTLE);

    let channel = hardware_of(&servo).name().parse::<usize>().ok();
    let report = MoveReport {
        servo: servo.name().to_owned(),
        requested: servo.position(),
        actual: servo.actual_position(),
        pulse: channel.and_then(|channel| session.null.pulse(channel)),
        outcome: match outcome.cause() {
            None => "complete".to_owned(),
            Some(error) => error.to_string(),
        },
        events: log.events(),
    };
    output::print_move(&report, json);

    match outcome.into_result() {
        Ok(()) => Ok(()),
        Err(error) => Err(CliError::from(error).into()),
    }
}
