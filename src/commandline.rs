use clap::Parser;
use clap_verbosity_flag::{Verbosity, WarnLevel};
use ep2000_lib::profile;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_LOG_PATH: &str = "log";

/// A single setup word to change, given as `NAME=VALUE`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetupChange {
    pub name: String,
    pub raw: u16,
}

fn parse_setup_change(s: &str) -> Result<SetupChange, String> {
    let (name, value) = s
        .split_once('=')
        .ok_or_else(|| format!("Expected NAME=VALUE, got '{s}'"))?;
    let name = name.trim();
    if profile::setup_word_index(name).is_none() {
        let known: Vec<_> = profile::SETUP.fields.iter().map(|field| field.name).collect();
        return Err(format!(
            "Unknown setup field '{name}', expected one of: {}",
            known.join(", ")
        ));
    }
    let raw = clap_num::maybe_hex::<u16>(value.trim())
        .map_err(|e| format!("Invalid setup value format: {e}"))?;
    Ok(SetupChange {
        name: name.to_string(),
        raw,
    })
}

const fn about_text() -> &'static str {
    "EP2000 inverter poller - Query inverters attached to serial ports and print or log their records."
}

#[derive(Parser, Debug)]
#[command(name = "invpoll", author, version, about = about_text(), long_about = None)]
pub struct CliArgs {
    /// Configure verbosity of logging output.
    /// -v for info, -vv for debug, -vvv for trace. Default is warnings only.
    #[command(flatten)]
    pub verbose: Verbosity<WarnLevel>,

    /// List the available serial ports and exit.
    /// All other actions are ignored.
    #[arg(long, verbatim_doc_comment)]
    pub list: bool,

    /// Condensed status view: implies --status --print and disables --sense and --setup.
    #[arg(long)]
    pub basic: bool,

    /// Probe each port for an EP2000.
    #[arg(long)]
    pub sense: bool,

    /// Read the telemetry record.
    #[arg(long)]
    pub status: bool,

    /// Read the configuration record.
    #[arg(long)]
    pub setup: bool,

    /// Print the records as tables.
    #[arg(long)]
    pub print: bool,

    /// Append the records to the log files below --log-path.
    #[arg(long)]
    pub log: bool,

    /// Existing directory receiving the log files.
    #[arg(long, default_value = DEFAULT_LOG_PATH)]
    pub log_path: PathBuf,

    /// Optional YAML configuration file with the serial line settings.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Serial port to poll, may be repeated.
    /// Without this option every port found on the host is polled.
    /// Examples: "/dev/ttyUSB0" (Linux), "COM3" (Windows).
    #[arg(short, long = "port", verbatim_doc_comment)]
    pub ports: Vec<String>,

    /// Baud rate of the serial line (default 9600).
    #[arg(long)]
    pub baud_rate: Option<u32>,

    /// Read timeout for a reply (default 3s).
    /// Examples: "3s", "500ms".
    #[arg(long, value_parser = humantime::parse_duration, verbatim_doc_comment)]
    pub timeout: Option<Duration>,

    /// Write timeout for a request (default 1s).
    #[arg(long, value_parser = humantime::parse_duration)]
    pub write_timeout: Option<Duration>,

    /// Change a setup word, given as NAME=VALUE, may be repeated.
    /// The value is the raw register value in decimal or hexadecimal (e.g. "0x01").
    /// Example: --set-setup EnableGridCharge=1
    #[arg(long = "set-setup", value_parser = parse_setup_change, verbatim_doc_comment)]
    pub set_setup: Vec<SetupChange>,

    /// Restore the inverter's factory settings.
    #[arg(long)]
    pub restore_factory_settings: bool,

    /// Reset the inverter remotely.
    #[arg(long)]
    pub remote_reset: bool,

    /// Shut the inverter down remotely.
    #[arg(long)]
    pub remote_shutdown: bool,

    /// Do not ask for confirmation before sending write commands.
    #[arg(short, long)]
    pub yes: bool,
}

/// What a run does after the flag interactions are applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Actions {
    pub list: bool,
    pub basic: bool,
    pub sense: bool,
    pub status: bool,
    pub setup: bool,
    pub print: bool,
    pub log: bool,
}

/// Commands that change the inverter's state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteAction {
    UpdateSetup(Vec<SetupChange>),
    RestoreFactorySettings,
    RemoteReset,
    RemoteShutdown,
}

impl std::fmt::Display for WriteAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WriteAction::UpdateSetup(changes) => {
                let changes: Vec<_> = changes
                    .iter()
                    .map(|change| format!("{}={}", change.name, change.raw))
                    .collect();
                write!(f, "write setup ({})", changes.join(", "))
            }
            WriteAction::RestoreFactorySettings => f.write_str("restore factory settings"),
            WriteAction::RemoteReset => f.write_str("remote reset"),
            WriteAction::RemoteShutdown => f.write_str("remote shutdown"),
        }
    }
}

impl CliArgs {
    /// Applies `--list` and `--basic` to the requested actions.
    pub fn actions(&self) -> Actions {
        if self.list {
            return Actions {
                list: true,
                ..Default::default()
            };
        }
        let mut actions = Actions {
            list: false,
            basic: self.basic,
            sense: self.sense,
            status: self.status,
            setup: self.setup,
            print: self.print,
            log: self.log,
        };
        if self.basic {
            actions.sense = false;
            actions.status = true;
            actions.setup = false;
            actions.print = true;
        }
        actions
    }

    /// Write commands in the order they are sent, empty with `--list`.
    pub fn write_actions(&self) -> Vec<WriteAction> {
        if self.list {
            return Vec::new();
        }
        let mut writes = Vec::new();
        if !self.set_setup.is_empty() {
            writes.push(WriteAction::UpdateSetup(self.set_setup.clone()));
        }
        if self.restore_factory_settings {
            writes.push(WriteAction::RestoreFactorySettings);
        }
        if self.remote_reset {
            writes.push(WriteAction::RemoteReset);
        }
        if self.remote_shutdown {
            writes.push(WriteAction::RemoteShutdown);
        }
        writes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> CliArgs {
        CliArgs::try_parse_from(std::iter::once("invpoll").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn list_suppresses_everything() {
        let args = parse(&["--list", "--status", "--print", "--log", "--remote-reset"]);
        assert_eq!(
            args.actions(),
            Actions {
                list: true,
                ..Default::default()
            }
        );
        assert!(args.write_actions().is_empty());
    }

    #[test]
    fn basic_forces_status_and_print() {
        let actions = parse(&["--basic", "--sense", "--setup", "--log"]).actions();
        assert!(actions.basic && actions.status && actions.print && actions.log);
        assert!(!actions.sense && !actions.setup);
    }

    #[test]
    fn plain_flags() {
        let args = parse(&["--sense", "--setup", "-p", "/dev/ttyUSB0", "-p", "/dev/ttyUSB1"]);
        let actions = args.actions();
        assert!(actions.sense && actions.setup && !actions.status && !actions.print);
        assert_eq!(args.ports, ["/dev/ttyUSB0", "/dev/ttyUSB1"]);
        assert_eq!(args.log_path, PathBuf::from(DEFAULT_LOG_PATH));
    }

    #[test]
    fn timeouts() {
        let args = parse(&["--timeout", "500ms", "--write-timeout", "2s"]);
        assert_eq!(args.timeout, Some(Duration::from_millis(500)));
        assert_eq!(args.write_timeout, Some(Duration::from_secs(2)));
    }

    #[test]
    fn setup_changes() {
        let args = parse(&[
            "--set-setup",
            "EnableGridCharge=1",
            "--set-setup",
            "BulkChargeCurrent=0x1E",
            "--remote-shutdown",
        ]);
        assert_eq!(
            args.write_actions(),
            [
                WriteAction::UpdateSetup(vec![
                    SetupChange {
                        name: "EnableGridCharge".to_string(),
                        raw: 1
                    },
                    SetupChange {
                        name: "BulkChargeCurrent".to_string(),
                        raw: 30
                    },
                ]),
                WriteAction::RemoteShutdown,
            ]
        );
    }

    #[test]
    fn invalid_setup_changes() {
        assert!(parse_setup_change("EnableGridCharge").is_err());
        assert!(parse_setup_change("WorkState=1").is_err());
        assert!(parse_setup_change("EnableGridCharge=70000").is_err());
        assert!(CliArgs::try_parse_from(["invpoll", "--set-setup", "Nope=1"]).is_err());
    }

    #[test]
    fn write_action_display() {
        let action = WriteAction::UpdateSetup(vec![SetupChange {
            name: "EnableKeySound".to_string(),
            raw: 0,
        }]);
        assert_eq!(action.to_string(), "write setup (EnableKeySound=0)");
        assert_eq!(WriteAction::RemoteReset.to_string(), "remote reset");
    }
}
