//! `servoctl meta`

use std::path::Path;

use anyhow::Result;

use super::Session;
use crate::output;

pub fn execute(config: Option<&Path>, servo: Option<&str>, json: bool) -> Result<()> {
    let session = Session::open(config)?;
    let (subject, snapshot) = match servo {
        Some(id) => {
            let servo = session.servo(id)?;
            (servo.name().to_owned(), servo.meta().snapshot())
        }
        None => (
            session.controller.port().to_owned(),
            session.controller.meta()?.snapshot(),
        ),
    };
    output::print_meta(&subject, &snapshot, json);
    Ok(())
}
