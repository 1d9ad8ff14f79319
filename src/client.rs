//! Blocking client for the EP2000 inverter.
//!
//! [`EP2000`] owns a [`Transport`] and implements the protocol operations on top
//! of it: sending the fixed requests, validating the reply frames and decoding
//! them with the device profile.
//!
//! ## Example
//!
//! ```no_run
//! use ep2000_lib::{client::{EP2000, Reply}, serial::{LineSettings, SerialTransport}};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let transport = SerialTransport::open("/dev/ttyUSB0", LineSettings::default())?;
//!     let mut inverter = EP2000::new(transport);
//!
//!     match inverter.status()? {
//!         Reply::Valid(record) => {
//!             for field in &record {
//!                 println!("{}: {} {}", field.name, field.value, field.unit);
//!             }
//!         }
//!         Reply::ChecksumFailed => println!("CRC failed"),
//!     }
//!     Ok(())
//! }
//! ```

use crate::decoder::{Meta, Record, Schema, decode};
use crate::frame;
use crate::profile;
use crate::protocol::{Command, Error, Result, to_hex_string};
use crate::transport::Transport;

/// Text reported instead of a record when a reply fails its checksum.
pub const CHECKSUM_FAILED: &str = "CRC failed";

/// Outcome of an exchange whose reply frame arrived complete.
///
/// A checksum failure is not an error: the exchange worked, but the content
/// cannot be trusted and is reported as such.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply<T> {
    Valid(T),
    ChecksumFailed,
}

impl<T> Reply<T> {
    pub fn valid(self) -> Option<T> {
        match self {
            Reply::Valid(value) => Some(value),
            Reply::ChecksumFailed => None,
        }
    }

    pub fn is_valid(&self) -> bool {
        matches!(self, Reply::Valid(_))
    }
}

/// Result of probing the device with the SENSE command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SenseReport {
    pub detected: bool,
    pub meta: Meta,
}

/// Acknowledgement frame returned by a write command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ack {
    pub command: &'static str,
    pub frame: Vec<u8>,
}

impl Ack {
    pub fn hex(&self) -> String {
        to_hex_string(&self.frame)
    }
}

/// EP2000 inverter reachable over a [`Transport`].
#[derive(Debug)]
pub struct EP2000<T> {
    transport: T,
}

impl<T: Transport> EP2000<T> {
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn into_inner(self) -> T {
        self.transport
    }

    /// Sends `request` and receives the reply announced by `command`.
    fn exchange(&mut self, command: &Command, request: &[u8]) -> Result<Vec<u8>> {
        log::debug!("{} -> {}", command.name, to_hex_string(request));
        self.transport.send(request)?;
        let reply = self.transport.receive(command.reply)?;
        log::debug!("{} <- {}", command.name, to_hex_string(&reply));
        Ok(reply)
    }

    /// Issues a read command and hands the validated payload to `interpret`.
    fn read<R, F>(&mut self, command: &Command, interpret: F) -> Result<Reply<R>>
    where
        F: FnOnce(&[u8]) -> Result<R>,
    {
        let request = command.request_bytes()?;
        let frame = self.exchange(command, &request)?;
        if !frame::checksum_valid(&frame) {
            log::warn!("{}: reply failed its checksum", command.name);
            return Ok(Reply::ChecksumFailed);
        }
        frame::validate_read_header(&frame)?;
        let payload = frame::strip_envelope(&frame)?;
        Ok(Reply::Valid(interpret(payload)?))
    }

    fn read_record(&mut self, command: &Command, schema: &Schema) -> Result<Reply<Record>> {
        self.read(command, |payload| decode(payload, schema, profile::MODEL))
    }

    /// Sends a write frame and checks the basic framing of the acknowledgement.
    fn write(&mut self, command: &Command, request: &[u8]) -> Result<Reply<Ack>> {
        let frame = self.exchange(command, request)?;
        if !frame::checksum_valid(&frame) {
            log::warn!("{}: acknowledgement failed its checksum", command.name);
            return Ok(Reply::ChecksumFailed);
        }
        frame::validate_ack(&frame)?;
        Ok(Reply::Valid(Ack {
            command: command.name,
            frame,
        }))
    }

    /// Probes the device and compares its answer with the EP2000 signature.
    pub fn sense(&mut self) -> Result<Reply<SenseReport>> {
        self.read(&Command::SENSE, |payload| {
            Ok(SenseReport {
                detected: profile::matches_signature(payload),
                meta: Meta::new(payload, profile::MODEL),
            })
        })
    }

    /// Reads the 27 word telemetry record.
    pub fn status(&mut self) -> Result<Reply<Record>> {
        self.read_record(&Command::STATUS, &profile::STATUS)
    }

    /// Reads the 10 word configuration record.
    pub fn read_setup(&mut self) -> Result<Reply<Record>> {
        self.read_record(&Command::READ_SETUP, &profile::SETUP)
    }

    /// Writes a complete configuration record.
    ///
    /// # Errors
    ///
    /// * [`Error::SetupLength`] unless exactly 10 words are given.
    pub fn write_setup(&mut self, words: &[u16]) -> Result<Reply<Ack>> {
        if words.len() != profile::SETUP.words {
            return Err(Error::SetupLength {
                expected: profile::SETUP.words,
                actual: words.len(),
            });
        }
        let prefix = Command::WRITE_SETUP.request_bytes()?;
        let request = frame::build_write_frame(&prefix, words);
        self.write(&Command::WRITE_SETUP, &request)
    }

    /// Reads the configuration, replaces the named words and writes it back.
    ///
    /// Nothing is written if the current configuration cannot be read or fails
    /// its checksum.
    pub fn update_setup(&mut self, changes: &[(String, u16)]) -> Result<Reply<Ack>> {
        let mut indices = Vec::with_capacity(changes.len());
        for (name, raw) in changes {
            let index =
                profile::setup_word_index(name).ok_or_else(|| Error::UnknownField(name.clone()))?;
            indices.push((index, *raw));
        }
        let current = match self.read_setup()? {
            Reply::Valid(record) => record,
            Reply::ChecksumFailed => return Ok(Reply::ChecksumFailed),
        };
        let mut words = current.words()[..profile::SETUP.words].to_vec();
        for (index, raw) in indices {
            log::info!("Setup word {index}: {} -> {raw}", words[index]);
            words[index] = raw;
        }
        self.write_setup(&words)
    }

    pub fn restore_factory_settings(&mut self) -> Result<Reply<Ack>> {
        self.fixed_write(&Command::RESTORE_FACTORY_SETTINGS)
    }

    pub fn remote_reset(&mut self) -> Result<Reply<Ack>> {
        self.fixed_write(&Command::REMOTE_RESET)
    }

    pub fn remote_shutdown(&mut self) -> Result<Reply<Ack>> {
        self.fixed_write(&Command::REMOTE_SHUTDOWN)
    }

    fn fixed_write(&mut self, command: &Command) -> Result<Reply<Ack>> {
        let request = command.request_bytes()?;
        self.write(command, &request)
    }
}
