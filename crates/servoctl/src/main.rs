//! servoctl - servo controller command-line tool
//!
//! Opens a controller (the built-in null controller unless a configuration
//! names another port), applies an optional YAML configuration, and runs one
//! command against it.

#![deny(static_mut_refs)]
#![deny(unused_must_use)]
#![deny(clippy::unwrap_used)]

mod commands;
mod error;
mod events;
mod output;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::commands::{MoveArgs, SilentArgs};
use crate::error::CliError;

#[derive(Parser)]
#[command(name = "servoctl")]
#[command(about = "Inspect and drive servo controllers")]
#[command(version)]
#[command(long_about = "
servoctl opens a servo controller, optionally applies a YAML configuration
(transformers, transitions, silent mode), and runs a single command.

Without --config the built-in 8 channel null controller is used, which is
handy for trying out transitions and transformers without hardware.
Use --json for machine-readable output.
")]
struct Cli {
    /// Output in JSON format for machine parsing
    #[arg(long, global = true)]
    json: bool,

    /// Verbose logging
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Controller configuration applied after opening
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show controller or servo metadata
    Meta {
        /// Servo id; controller metadata when omitted
        #[arg(short, long)]
        servo: Option<String>,
    },

    /// Move a servo and wait for the transition to finish
    Move(MoveArgs),

    /// Enable silent mode and report what the silencer did
    Silent(SilentArgs),

    /// Validate a configuration file and print it normalized
    ConfigCheck {
        /// Configuration file
        path: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("servoctl={log_level},servokit={log_level}").into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    if let Err(e) = execute_command(&cli) {
        if cli.json {
            output::print_error_json(&e);
        } else {
            output::print_error_human(&e);
        }
        std::process::exit(exit_code(&e));
    }
}

fn exit_code(error: &anyhow::Error) -> i32 {
    match error.downcast_ref::<CliError>() {
        Some(CliError::ServoNotFound(_)) => 2,
        Some(CliError::Validation(_)) => 4,
        Some(CliError::Servo(_)) => 5,
        Some(CliError::Io(_)) | None => 1,
    }
}

fn execute_command(cli: &Cli) -> Result<()> {
    match &cli.command {
        Commands::Meta { servo } => {
            commands::meta::execute(cli.config.as_deref(), servo.as_deref(), cli.json)
        }
        Commands::Move(args) => commands::motion::execute(cli.config.as_deref(), args, cli.json),
        Commands::Silent(args) => commands::silent::execute(cli.config.as_deref(), args, cli.json),
        Commands::ConfigCheck { path } => commands::config::execute(path, cli.json),
    }
}
