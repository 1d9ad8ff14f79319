use crate::commandline::CliArgs;
use ep2000_lib::serial::{self, LineSettings};
use serde::Deserialize;
use std::fs::File;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SerialConfig {
    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,
    #[serde(default = "default_timeout", with = "humantime_serde")]
    pub timeout: Duration,
    #[serde(default = "default_write_timeout", with = "humantime_serde")]
    pub write_timeout: Duration,
    /// Ports to poll instead of the enumerated ones.
    #[serde(default)]
    pub ports: Vec<String>,
}

fn default_baud_rate() -> u32 {
    serial::DEFAULT_BAUD_RATE
}

fn default_timeout() -> Duration {
    serial::DEFAULT_READ_TIMEOUT
}

fn default_write_timeout() -> Duration {
    serial::DEFAULT_WRITE_TIMEOUT
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            baud_rate: default_baud_rate(),
            timeout: default_timeout(),
            write_timeout: default_write_timeout(),
            ports: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub serial: SerialConfig,
}

impl Config {
    /// Loads the configuration file, or the defaults when no file is given.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Config> {
        let Some(path) = path else {
            return Ok(Config::default());
        };
        log::debug!("Loading config file from {path:?}");
        let config_file = File::open(path)?;
        let config: Config = serde_yaml::from_reader(&config_file)?;
        Ok(config)
    }

    /// Line settings with the command line taking precedence over the file.
    pub fn line_settings(&self, args: &CliArgs) -> LineSettings {
        LineSettings {
            baud_rate: args.baud_rate.unwrap_or(self.serial.baud_rate),
            read_timeout: args.timeout.unwrap_or(self.serial.timeout),
            write_timeout: args.write_timeout.unwrap_or(self.serial.write_timeout),
        }
    }

    /// Ports named on the command line, else those from the file.
    pub fn ports(&self, args: &CliArgs) -> Vec<String> {
        if args.ports.is_empty() {
            self.serial.ports.clone()
        } else {
            args.ports.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::io::Write;

    #[test]
    fn defaults_without_file() {
        let config = Config::load(None).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.serial.baud_rate, 9600);
        assert_eq!(config.serial.timeout, Duration::from_secs(3));
    }

    #[test]
    fn partial_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "serial:\n  timeout: 500ms\n  ports:\n    - /dev/ttyUSB1").unwrap();
        let config = Config::load(Some(file.path())).unwrap();
        assert_eq!(config.serial.baud_rate, 9600);
        assert_eq!(config.serial.timeout, Duration::from_millis(500));
        assert_eq!(config.serial.write_timeout, Duration::from_secs(1));
        assert_eq!(config.serial.ports, ["/dev/ttyUSB1"]);
    }

    #[test]
    fn missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Config::load(Some(&dir.path().join("missing.yml"))).is_err());
    }

    #[test]
    fn command_line_wins() {
        let config: Config = serde_yaml::from_str(
            "serial:\n  baud_rate: 19200\n  write_timeout: 2s\n  ports: [/dev/ttyS0]",
        )
        .unwrap();
        let args =
            CliArgs::try_parse_from(["invpoll", "--baud-rate", "4800", "-p", "/dev/ttyUSB0"])
                .unwrap();
        let settings = config.line_settings(&args);
        assert_eq!(settings.baud_rate, 4800);
        assert_eq!(settings.read_timeout, Duration::from_secs(3));
        assert_eq!(settings.write_timeout, Duration::from_secs(2));
        assert_eq!(config.ports(&args), ["/dev/ttyUSB0"]);

        let args = CliArgs::try_parse_from(["invpoll"]).unwrap();
        assert_eq!(config.ports(&args), ["/dev/ttyS0"]);
    }
}
