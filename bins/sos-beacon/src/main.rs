//! SOS beacon CLI
//!
//! One screen, one button: press Enter and the beacon reports where this
//! device is to the remote store.

use anyhow::Result;
use clap::{Parser, Subcommand};
use serde_json::{json, Value};
use sos_beacon::{
    BeaconError, DeviceInfo, EventSender, PermissionRequestKind, Screen, ScreenEvent,
    ScreenUpdate, SessionContext, SessionSummary, TimestampFormatter,
};
use sos_cli::output::Status;
use sos_cli::progress;
use sos_core::config::{Config, ConfigSchema};
use sos_core::error::exit_codes;
use sos_host::{
    provider_from_config, spawn_input, HostDevice, InputMode, TerminalDisplay,
    TerminalPermissions,
};
use sos_store::{
    ApiError, DatabaseRef, MemoryStore, RemoteStore, RtdbClient, StoreClientConfig, StorePath,
};
use sos_telemetry::{counters, metrics, TelemetryConfig};
use std::ops::ControlFlow;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Parser)]
#[command(name = "sos-beacon")]
#[command(about = "Report this device's location to the SOS database")]
#[command(version)]
struct Cli {
    /// Config file path
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Increase output verbosity
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the SOS screen: Enter sends an SOS, q quits
    Run {
        /// Write to an in-memory store and print the record
        #[arg(long)]
        dry_run: bool,
    },

    /// Send one SOS and exit once it is reported
    Report {
        /// Write to an in-memory store and print the record
        #[arg(long)]
        dry_run: bool,
        /// Output the session summary as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print this device's record from the store
    Show {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Diagnose configuration and device identity
    Doctor {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

/// How the screen is driven
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Interactive,
    Single,
}

impl Mode {
    fn input(self) -> InputMode {
        match self {
            Self::Interactive => InputMode::Interactive,
            Self::Single => InputMode::AnswersOnly,
        }
    }
}

/// Why the screen loop ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Quit,
    Reported,
    Denied,
    ProviderDisabled,
    Interrupted,
}

impl Outcome {
    fn exit_code(self, mode: Mode) -> i32 {
        match self {
            Self::Reported => exit_codes::SUCCESS,
            Self::Quit if mode == Mode::Interactive => exit_codes::SUCCESS,
            Self::Quit => exit_codes::FAILURE,
            Self::Denied => exit_codes::PERMISSION_DENIED,
            Self::ProviderDisabled => exit_codes::PROVIDER_DISABLED,
            Self::Interrupted => exit_codes::INTERRUPTED,
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if cli.no_color {
        owo_colors::set_override(false);
    }

    let mut telemetry = TelemetryConfig::from_verbosity(cli.verbose, cli.quiet);
    telemetry.json = cli.json_logs;
    if let Err(e) = sos_telemetry::init_with_config(telemetry) {
        eprintln!("{e}");
    }

    let exit_code = match execute(cli).await {
        Ok(code) => code,
        Err(e) => {
            Status::error(&format!("{e:#}"));
            exit_code_for(&e)
        }
    };

    std::process::exit(exit_code);
}

async fn execute(cli: Cli) -> Result<i32> {
    let path = cli.config.as_deref();

    match cli.command {
        Commands::Run { dry_run } => run_screen(path, Mode::Interactive, dry_run, false).await,
        Commands::Report { dry_run, json } => run_screen(path, Mode::Single, dry_run, json).await,
        Commands::Show { json } => run_show(path, json).await,
        Commands::Doctor { json } => Ok(run_doctor(path, json)),
    }
}

fn load_config(path: Option<&Path>, dry_run: bool) -> Result<Config> {
    if !dry_run {
        return Ok(Config::load(path)?);
    }

    let config = Config::load_unvalidated(path)?;
    config.schema.validate_local()?;
    Ok(config)
}

async fn run_screen(path: Option<&Path>, mode: Mode, dry_run: bool, json: bool) -> Result<i32> {
    let config = load_config(path, dry_run)?;
    let schema = &config.schema;

    if dry_run {
        let store = MemoryStore::new();
        let (code, summary) = drive(schema, store.clone(), mode).await?;
        print_summary(&summary, Some(&store.snapshot()), json)?;
        return Ok(code);
    }

    let client = RtdbClient::with_config(StoreClientConfig::from_schema(&schema.store))?;
    let (code, summary) = drive(schema, client, mode).await?;
    print_summary(&summary, None, json)?;
    Ok(code)
}

/// Build the screen on host services and run it until `mode` is satisfied
async fn drive<S: RemoteStore>(
    schema: &ConfigSchema,
    store: S,
    mode: Mode,
) -> Result<(i32, SessionSummary)> {
    let (events, receiver) = sos_beacon::channel();
    let permissions = TerminalPermissions::from_config(&schema.permissions);
    let display = TerminalDisplay::new();
    let device = HostDevice::from_config(&schema.general);

    let context = SessionContext::new(
        device.device_id()?,
        store,
        &schema.store.root,
        provider_from_config(&schema.location),
    )?;
    info!(device_id = %context.device_id(), "Session opened");

    let mut screen = Screen::builder(context)
        .permissions(Box::new(permissions.clone()))
        .display(Box::new(display.clone()))
        .device(Box::new(device))
        .strings(schema.strings.clone())
        .formatter(TimestampFormatter::from_config(&schema.report)?)
        .build(events.clone())?;

    let interrupted = watch_ctrl_c(events.clone());
    spawn_input(mode.input(), permissions, events.clone());

    let started = screen.start()?;
    debug!(?started, "Screen start");

    match mode {
        Mode::Interactive => Status::info("Press Enter to send an SOS, q to quit"),
        Mode::Single => {
            events.post(ScreenEvent::SosPressed);
        }
    }

    let mut outcome = Outcome::Quit;
    screen
        .run(receiver, |update| {
            match update {
                ScreenUpdate::LocationRequested => {
                    display.start_spinner("Waiting for a GPS fix...");
                }
                ScreenUpdate::LocationReported(report) => {
                    let message = format!("Fix {} at {}", report.fix.coordinate, report.timestamp);
                    display.finish_spinner(true, &message);
                    if mode == Mode::Single {
                        outcome = Outcome::Reported;
                        return ControlFlow::Break(());
                    }
                }
                ScreenUpdate::PermissionDenied(PermissionRequestKind::LocationAccess)
                    if mode == Mode::Single =>
                {
                    outcome = Outcome::Denied;
                    return ControlFlow::Break(());
                }
                ScreenUpdate::ProviderDisabled(_) => {
                    display.finish_spinner(false, "No GPS fix");
                    if mode == Mode::Single {
                        outcome = Outcome::ProviderDisabled;
                        return ControlFlow::Break(());
                    }
                }
                ScreenUpdate::AlreadyArmed => {
                    display.start_spinner("Still waiting for a GPS fix...");
                }
                ScreenUpdate::LocationRequestEnded(_) => {
                    display.finish_spinner(false, "No GPS fix");
                    if mode == Mode::Single {
                        outcome = Outcome::ProviderDisabled;
                        return ControlFlow::Break(());
                    }
                    Status::warning("GPS is unavailable, press Enter to try again");
                }
                ScreenUpdate::Error(message) => Status::error(message),
                other => debug!(update = ?other, "Screen update"),
            }
            ControlFlow::Continue(())
        })
        .await;

    if interrupted.load(Ordering::SeqCst) {
        outcome = Outcome::Interrupted;
    }
    display.finish_spinner(false, "Cancelled");

    let summary = screen.close().await;
    Ok((outcome.exit_code(mode), summary))
}

/// Turn Ctrl-C into a screen shutdown
fn watch_ctrl_c(events: EventSender) -> Arc<AtomicBool> {
    let flag = Arc::new(AtomicBool::new(false));
    let seen = Arc::clone(&flag);

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            seen.store(true, Ordering::SeqCst);
            events.post(ScreenEvent::Shutdown);
        }
    });

    flag
}

fn print_summary(summary: &SessionSummary, record: Option<&Value>, json: bool) -> Result<()> {
    if json {
        let output = json!({
            "summary": summary,
            "record": record,
            "metrics": metrics().export_json(),
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    Status::header("Session");
    Status::field("Device", &summary.device_id);
    Status::field("Fixes", &summary.fixes_reported.to_string());
    if let Some(report) = &summary.last_report {
        Status::field("Location", &report.fix.coordinate.to_string());
        Status::field("Timestamp", &report.timestamp);
    }
    Status::field(
        "Build number",
        if summary.build_number_submitted { "submitted" } else { "not submitted" },
    );
    Status::field("Writes", &metrics().counter(counters::STORE_WRITES).to_string());

    let failures = metrics().counter(counters::STORE_WRITE_FAILURES);
    if failures > 0 {
        Status::warning(&format!("{failures} store write(s) failed, see logs"));
    }

    if let Some(record) = record {
        Status::header("Dry-run record");
        println!("{}", serde_json::to_string_pretty(record)?);
    }
    Ok(())
}

async fn run_show(path: Option<&Path>, json: bool) -> Result<i32> {
    let config = Config::load(path)?;
    let schema = &config.schema;

    let device_id = HostDevice::from_config(&schema.general).device_id()?;
    let client = RtdbClient::with_config(StoreClientConfig::from_schema(&schema.store))?;
    let record = DatabaseRef::new(client, StorePath::parse(&schema.store.root)?)
        .child(device_id.as_str())?;

    let spinner = progress::spinner("Reading device record...");
    let value = match record.get_value().await {
        Ok(value) => {
            progress::finish_success(&spinner, "Record read");
            value
        }
        Err(e) => {
            progress::finish_error(&spinner, "Store read failed");
            return Err(e.into());
        }
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(if value.is_some() { exit_codes::SUCCESS } else { exit_codes::FAILURE });
    }

    let Some(value) = value else {
        Status::warning(&format!("No record stored at {}", record.path()));
        return Ok(exit_codes::FAILURE);
    };

    Status::header(&record.path().to_string());
    match value.as_object() {
        Some(fields) => {
            for (key, field) in fields {
                let rendered = field.as_str().map_or_else(|| field.to_string(), str::to_string);
                Status::field(key, &rendered);
            }
        }
        None => println!("{value}"),
    }
    Ok(exit_codes::SUCCESS)
}

fn run_doctor(path: Option<&Path>, json: bool) -> i32 {
    let config = match Config::load_unvalidated(path) {
        Ok(config) => config,
        Err(e) => {
            Status::error(&e.to_string());
            return exit_codes::CONFIG_ERROR;
        }
    };
    let schema = &config.schema;

    let validation = schema.validate();
    let device = HostDevice::from_config(&schema.general);
    let device_id = device.device_id();
    let build = device.build_display();
    let gpsd = format!("{}:{}", schema.location.gpsd_host, schema.location.gpsd_port);

    if json {
        let mut errors = Vec::new();
        if let Err(e) = &validation {
            errors.push(e.to_report());
        }
        if let Err(e) = &device_id {
            errors.push(e.to_report());
        }
        if let Err(e) = &build {
            errors.push(e.to_report());
        }

        let report = json!({
            "session_id": sos_telemetry::session_id(),
            "config_path": config.path,
            "database_url": schema.store.database_url,
            "root": schema.store.root,
            "location_source": schema.location.source,
            "gpsd": gpsd,
            "device_id": device_id.as_ref().ok().map(ToString::to_string),
            "build_number": build.as_ref().ok(),
            "valid": validation.is_ok(),
            "errors": errors,
            "metrics": metrics().export_json(),
        });
        match serde_json::to_string_pretty(&report) {
            Ok(text) => println!("{text}"),
            Err(e) => Status::error(&e.to_string()),
        }
    } else {
        Status::header("SOS beacon");
        Status::field(
            "Config",
            &config
                .path
                .as_ref()
                .map_or_else(|| "(defaults)".to_string(), |p| p.display().to_string()),
        );
        Status::field("Database", &schema.store.database_url);
        Status::field("Root", &schema.store.root);
        Status::field("Location", &format!("{:?} ({gpsd})", schema.location.source));
        Status::field(
            "Timestamps",
            &format!("{} UTC{}", schema.report.timestamp_format, schema.report.utc_offset),
        );
        println!();

        match &validation {
            Ok(()) => Status::success("Configuration valid"),
            Err(e) => Status::error(&e.to_string()),
        }
        match &device_id {
            Ok(id) => Status::success(&format!("Device id: {id}")),
            Err(e) => Status::error(&e.to_string()),
        }
        match &build {
            Ok(build) => Status::success(&format!("Build: {build}")),
            Err(e) => Status::warning(&e.to_string()),
        }
    }

    if validation.is_err() {
        exit_codes::CONFIG_ERROR
    } else if device_id.is_err() || build.is_err() {
        exit_codes::FAILURE
    } else {
        exit_codes::SUCCESS
    }
}

fn exit_code_for(err: &anyhow::Error) -> i32 {
    let code = if let Some(e) = err.downcast_ref::<sos_core::Error>() {
        Some(e.code)
    } else if let Some(e) = err.downcast_ref::<BeaconError>() {
        Some(e.code())
    } else {
        err.downcast_ref::<ApiError>().map(ApiError::code)
    };

    match code.map(|c| c.category()) {
        Some("Configuration") => exit_codes::CONFIG_ERROR,
        Some("Store") => exit_codes::STORE_ERROR,
        Some("Permission") => exit_codes::PERMISSION_DENIED,
        _ => exit_codes::FAILURE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses() {
        let cli = Cli::try_parse_from(["sos-beacon", "-vv", "report", "--dry-run", "--json"]).unwrap();
        assert_eq!(cli.verbose, 2);
        assert!(matches!(cli.command, Commands::Report { dry_run: true, json: true }));
    }

    #[test]
    fn test_outcome_exit_codes() {
        assert_eq!(Outcome::Reported.exit_code(Mode::Single), exit_codes::SUCCESS);
        assert_eq!(Outcome::Quit.exit_code(Mode::Interactive), exit_codes::SUCCESS);
        assert_eq!(Outcome::Quit.exit_code(Mode::Single), exit_codes::FAILURE);
        assert_eq!(Outcome::Denied.exit_code(Mode::Single), exit_codes::PERMISSION_DENIED);
        assert_eq!(Outcome::Interrupted.exit_code(Mode::Interactive), exit_codes::INTERRUPTED);
    }

    #[test]
    fn test_error_exit_codes() {
        let config = anyhow::Error::from(sos_core::Error::config("bad"));
        assert_eq!(exit_code_for(&config), exit_codes::CONFIG_ERROR);

        let store = anyhow::Error::from(ApiError::api_response(401, "Permission denied"));
        assert_eq!(exit_code_for(&store), exit_codes::STORE_ERROR);

        let other = anyhow::anyhow!("boom");
        assert_eq!(exit_code_for(&other), exit_codes::FAILURE);
    }
}
