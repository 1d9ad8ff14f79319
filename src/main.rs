//! EP2000 inverter poller CLI
//!
//! A command-line application that polls EP2000 inverters attached to serial
//! ports, one device after another.
//!
//! This tool allows users to:
//! - List the serial ports of the host.
//! - Probe each port for an EP2000 (SENSE).
//! - Read the telemetry (STATUS) and configuration (SETUP) records.
//! - Print the records as tables and/or append them to daily log files.
//! - Change setup words, restore the factory settings, reset or shut down the inverter.
//!
//! The CLI leverages the `ep2000_lib` crate for framing, decoding and the serial transport.

use anyhow::{Context, Result, anyhow};
use chrono::{DateTime, Local};
use clap::Parser;
use dialoguer::Confirm;
use ep2000_lib::client::{CHECKSUM_FAILED, EP2000, Reply};
use ep2000_lib::decoder::RecordKind;
use ep2000_lib::profile;
use ep2000_lib::serial::{self, SerialTransport};
use ep2000_lib::transport::Transport;
use flexi_logger::{Logger, LoggerHandle};
use log::*;
use std::panic;

mod commandline;
mod config;
mod datalog;
mod table;

use commandline::{Actions, WriteAction};
use datalog::Datalog;

fn logging_init(loglevel: LevelFilter) -> LoggerHandle {
    let log_handle = Logger::try_with_env_or_str(loglevel.as_str())
        .expect("Cannot init logging")
        .start()
        .expect("Cannot start logging");

    panic::set_hook(Box::new(|panic_info| {
        let (filename, line, column) = panic_info
            .location()
            .map(|loc| (loc.file(), loc.line(), loc.column()))
            .unwrap_or(("<unknown_file>", 0, 0));

        let cause_str = if let Some(s) = panic_info.payload().downcast_ref::<&str>() {
            *s
        } else if let Some(s) = panic_info.payload().downcast_ref::<String>() {
            s.as_str()
        } else {
            "<unknown_panic_cause>"
        };

        error!(
            target: "panic",
            "Thread '{}' panicked at '{}': {}:{} - Cause: {}",
            std::thread::current().name().unwrap_or("<unnamed>"),
            filename,
            line,
            column,
            cause_str
        );
    }));
    log_handle
}

/// Status fields shown and logged, `None` meaning all of them.
fn status_filter(actions: &Actions) -> Option<&'static [&'static str]> {
    actions.basic.then_some(&profile::BASIC_STATUS_FIELDS[..])
}

/// Prints and logs the replies of one device.
struct Reporter<'a> {
    device: &'a str,
    polled_at: DateTime<Local>,
    actions: Actions,
    datalog: Option<&'a Datalog>,
}

impl Reporter<'_> {
    fn sense(&self, reply: &Reply<ep2000_lib::client::SenseReport>) -> Result<()> {
        if self.actions.print {
            println!("{}", table::sense_table(reply));
        }
        if let Some(datalog) = self.datalog {
            let line = datalog::sense_line(self.polled_at.timestamp(), self.device, reply);
            datalog.append(RecordKind::Sense, self.polled_at.date_naive(), &line)?;
        }
        Ok(())
    }

    fn record(&self, kind: RecordKind, reply: &Reply<ep2000_lib::decoder::Record>) -> Result<()> {
        let filter = match kind {
            RecordKind::Status => status_filter(&self.actions),
            _ => None,
        };
        if self.actions.print {
            println!("{}", table::record_table(reply, filter));
        }
        if let Some(datalog) = self.datalog {
            let line =
                datalog::record_line(self.polled_at.timestamp(), self.device, reply, filter);
            datalog.append(kind, self.polled_at.date_naive(), &line)?;
        }
        Ok(())
    }
}

fn count_failure(device: &str, result: Result<()>) -> usize {
    match result {
        Ok(()) => 0,
        Err(error) => {
            error!("{device}: {error:#}");
            1
        }
    }
}

fn send_write<T: Transport>(inverter: &mut EP2000<T>, device: &str, write: &WriteAction) -> Result<()> {
    info!("{device}: Executing {write}");
    let reply = match write {
        WriteAction::UpdateSetup(changes) => {
            let changes: Vec<_> = changes
                .iter()
                .map(|change| (change.name.clone(), change.raw))
                .collect();
            inverter.update_setup(&changes)
        }
        WriteAction::RestoreFactorySettings => inverter.restore_factory_settings(),
        WriteAction::RemoteReset => inverter.remote_reset(),
        WriteAction::RemoteShutdown => inverter.remote_shutdown(),
    }
    .with_context(|| format!("Cannot {write}"))?;
    match reply {
        Reply::Valid(ack) => {
            println!("{device}: {write} acknowledged [{}]", ack.hex());
            Ok(())
        }
        Reply::ChecksumFailed => Err(anyhow!("{write}: {CHECKSUM_FAILED}")),
    }
}

/// Runs the requested reads, then the writes, against one device.
///
/// Every failing step is logged and skipped. Returns the number of failures.
fn poll_device<T: Transport>(
    inverter: &mut EP2000<T>,
    reporter: &Reporter<'_>,
    writes: &[WriteAction],
) -> usize {
    let device = reporter.device;
    let actions = reporter.actions;
    let mut failures = 0;

    if actions.sense {
        let result = inverter
            .sense()
            .context("Cannot sense device")
            .and_then(|reply| reporter.sense(&reply));
        failures += count_failure(device, result);
    }
    if actions.status {
        let result = inverter
            .status()
            .context("Cannot read status")
            .and_then(|reply| reporter.record(RecordKind::Status, &reply));
        failures += count_failure(device, result);
    }
    if actions.setup {
        let result = inverter
            .read_setup()
            .context("Cannot read setup")
            .and_then(|reply| reporter.record(RecordKind::Setup, &reply));
        failures += count_failure(device, result);
    }
    for write in writes {
        failures += count_failure(device, send_write(inverter, device, write));
    }
    failures
}

/// Polls every port in turn, opening its transport with `open`.
///
/// A port that cannot be opened counts as one failure and the next port is
/// polled. Returns the number of failures over all ports.
fn poll_ports<T, F>(
    ports: &[String],
    mut open: F,
    actions: Actions,
    writes: &[WriteAction],
    datalog: Option<&Datalog>,
) -> usize
where
    T: Transport,
    F: FnMut(&str) -> ep2000_lib::Result<T>,
{
    let mut failures = 0;
    for (index, port) in ports.iter().enumerate() {
        let polled_at = Local::now();
        if actions.print {
            println!("EP2000 #{index} on {port}");
        }
        let transport = match open(port) {
            Ok(transport) => transport,
            Err(error) => {
                error!("{port}: Cannot open serial port: {error}");
                failures += 1;
                continue;
            }
        };
        let mut inverter = EP2000::new(transport);
        let reporter = Reporter {
            device: port,
            polled_at,
            actions,
            datalog,
        };
        failures += poll_device(&mut inverter, &reporter, writes);
    }
    failures
}

/// Asks before any write command is sent.
fn confirm_writes(writes: &[WriteAction], ports: &[String]) -> Result<bool> {
    println!("WARNING: The following commands change the state of the inverter:");
    for write in writes {
        println!("  - {write}");
    }
    println!("They will be sent to: {}", ports.join(", "));
    Confirm::new()
        .with_prompt("Do you want to continue?")
        .default(false)
        .show_default(true)
        .interact()
        .context("Failed to get user confirmation.")
}

fn main() -> Result<()> {
    let args = commandline::CliArgs::parse();

    let _log_handle = logging_init(args.verbose.log_level_filter());
    info!(
        "EP2000 poller started. Log level: {}",
        args.verbose.log_level_filter()
    );

    let actions = args.actions();
    if actions.list {
        let ports = serial::available_ports().context("Cannot enumerate serial ports")?;
        print!("{}", table::ports_listing(&ports));
        return Ok(());
    }

    let config = config::Config::load(args.config.as_deref()).context("Cannot load config file")?;
    let datalog = if actions.log {
        let dir = datalog::check_log_path(&args.log_path)?;
        info!("Logging records below {dir:?}");
        Some(Datalog::new(dir))
    } else {
        None
    };
    let settings = config.line_settings(&args);

    let mut ports = config.ports(&args);
    if ports.is_empty() {
        ports = serial::available_ports()
            .context("Cannot enumerate serial ports")?
            .into_iter()
            .map(|port| port.device)
            .collect();
    }
    if ports.is_empty() {
        warn!("No serial ports found");
        return Ok(());
    }

    let mut writes = args.write_actions();
    if !writes.is_empty() && !args.yes && !confirm_writes(&writes, &ports)? {
        info!("Write commands aborted by user.");
        writes.clear();
    }

    let failures = poll_ports(
        &ports,
        |port| SerialTransport::open(port, settings),
        actions,
        &writes,
        datalog.as_ref(),
    );
    if failures > 0 {
        warn!("{failures} request(s) failed");
    }

    Ok(())
}
