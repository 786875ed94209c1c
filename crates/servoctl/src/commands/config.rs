//! `servoctl config-check`

use std::path::Path;

use anyhow::{Context, Result};
use servokit::prelude::ControllerConfig;

use crate::error::CliError;
use crate::output;

pub fn execute(path: &Path, json: bool) -> Result<()> {
    let config = ControllerConfig::from_yaml_file(path)
        .map_err(CliError::from)
        .with_context(|| format!("checking {}", path.display()))?;
    tracing::info!(path = %path.display(), servos = config.servos.len(), "configuration valid");
    output::print_config(&config, json)
}
