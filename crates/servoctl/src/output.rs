//! Output formatting for CLI responses

use anyhow::{Error, Result};
use colored::Colorize;
use serde::Serialize;
use serde_json::json;
use servokit::meta::MetaSnapshot;
use servokit::prelude::ControllerConfig;

use crate::commands::motion::MoveReport;
use crate::commands::silent::SilentReport;
use crate::events::LoggedEvent;

/// Print error in JSON format
pub fn print_error_json(error: &Error) {
    let error_json = json!({
        "success": false,
        "error": {
            "message": error.to_string(),
            "chain": error.chain().skip(1).map(ToString::to_string).collect::<Vec<_>>(),
        }
    });
    match serde_json::to_string_pretty(&error_json) {
        Ok(s) => println!("{s}"),
        Err(e) => eprintln!("Failed to format error as JSON: {e}"),
    }
}

/// Print error in human-readable format
pub fn print_error_human(error: &Error) {
    eprintln!("{} {}", "Error:".red().bold(), error);
    for cause in error.chain().skip(1) {
        eprintln!("  {} {}", "Caused by:".yellow(), cause);
    }
}

fn print_json<T: Serialize>(value: &T) {
    let output = json!({ "success": true, "data": value });
    match serde_json::to_string_pretty(&output) {
        Ok(s) => println!("{s}"),
        Err(e) => eprintln!("Failed to format output as JSON: {e}"),
    }
}

pub fn print_meta(subject: &str, snapshot: &MetaSnapshot, json: bool) {
    if json {
        print_json(&json!({ "subject": subject, "meta": snapshot }));
        return;
    }

    println!("{} {}", "Metadata for".bold(), subject.bold());
    if snapshot.features.is_empty() && snapshot.properties.is_empty() {
        println!("  {}", "nothing declared".dimmed());
        return;
    }
    for (key, value) in &snapshot.features {
        let shown = if *value { "yes".green() } else { "no".red() };
        println!("  {:<32} {}", key, shown);
    }
    for (key, value) in &snapshot.properties {
        println!("  {:<32} {}", key, value);
    }
}

pub fn print_move(report: &MoveReport, json: bool) {
    if json {
        print_json(report);
        return;
    }

    let outcome = if report.outcome == "complete" {
        report.outcome.green()
    } else {
        report.outcome.red()
    };
    println!("{} {}", "Servo".bold(), report.servo.bold());
    println!("  requested  {:.4}", report.requested);
    println!("  actual     {:.4}", report.actual);
    if let Some(pulse) = report.pulse {
        println!("  pulse      {pulse}");
    }
    println!("  outcome    {outcome}");
    print_events(&report.events);
}

pub fn print_silent(report: &SilentReport, json: bool) {
    if json {
        print_json(report);
        return;
    }

    let state = if report.silent_now {
        "silent".yellow()
    } else {
        "energized".green()
    };
    println!("{} {}", "Silent mode on".bold(), report.subject.bold());
    println!(
        "  timeout {} ms, heartbeat {} ms",
        report.timeout_ms, report.heartbeat_ms
    );
    println!("  now      {state}");
    print_events(&report.events);
}

fn print_events(events: &[LoggedEvent]) {
    if events.is_empty() {
        return;
    }
    println!("  {}", "events:".dimmed());
    for event in events {
        match event {
            LoggedEvent::PositionChanged { source, position } => {
                println!("    {source}: requested {position:.4}");
            }
            LoggedEvent::ActualPositionChanged { source, position } => {
                println!("    {source}: reached {position:.4}");
            }
            LoggedEvent::SilentStatusChanged { source, active } => {
                let word = if *active { "energized" } else { "silent" };
                println!("    {source}: {word}");
            }
            LoggedEvent::Exception { source, error } => {
                println!("    {source}: {}", error.red());
            }
        }
    }
}

pub fn print_config(config: &ControllerConfig, json: bool) -> Result<()> {
    if json {
        print_json(config);
        return Ok(());
    }
    println!("{}", "Configuration is valid".green().bold());
    print!("{}", config.to_yaml_string()?);
    Ok(())
}
