//! Command registry and error types for the EP2000 serial protocol.
//!
//! Every exchange with the inverter starts from one of the fixed request frames
//! defined here. A [`Command`] pairs the request (kept as the hex string it is
//! documented with) with the length of the reply the device is expected to send
//! back. Write commands do not have a statically known reply length and use
//! [`ReplyLength::Discover`] instead.

use std::fmt;

/// Upper bound of bytes read while probing a reply of unknown length.
pub const DISCOVER_PROBE_CAP: usize = 100;

/// Number of header bytes in a reply: address, function code and byte count.
pub const HEADER_LENGTH: usize = 3;
/// Number of trailing checksum bytes in every frame.
pub const CHECKSUM_LENGTH: usize = 2;

/// Modbus slave address the inverter answers on.
pub const DEVICE_ADDRESS: u8 = 0x0A;
/// Function code for reading holding registers.
pub const FUNCTION_READ: u8 = 0x03;
/// Function code for writing multiple registers.
pub const FUNCTION_WRITE: u8 = 0x10;

/// Represents all errors raised by the protocol core.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Bytes written ({expected}) and written count ({written}) mismatch")]
    WriteMismatch { expected: usize, written: usize },

    #[error("Bytes read ({received}) and expected reply length ({expected}) mismatch")]
    ReadMismatch {
        expected: ReplyLength,
        received: usize,
    },

    #[error("Frame of {0} bytes is too short to carry a header and checksum")]
    FrameTooShort(usize),

    #[error("Reply header {received:02X?} does not match the request, expected {expected:02X?}")]
    HeaderMismatch {
        expected: [u8; HEADER_LENGTH],
        received: [u8; HEADER_LENGTH],
    },

    #[error("Malformed payload of {length} bytes, an even length of at least {required} bytes is required")]
    MalformedPayload { length: usize, required: usize },

    #[error("Setup requires exactly {expected} words, got {actual}")]
    SetupLength { expected: usize, actual: usize },

    #[error("Unknown setup field: {0}")]
    UnknownField(String),

    #[error("Invalid hex request: {0}")]
    Hex(#[from] hex::FromHexError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[cfg(feature = "serial")]
    #[error(transparent)]
    Serial(#[from] tokio_serial::Error),
}

/// The result type of the protocol core.
pub type Result<T> = std::result::Result<T, Error>;

/// How many bytes a command's reply is expected to contain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyLength {
    /// The reply has exactly this many bytes.
    Exact(usize),
    /// The length is not known up front; read up to [`DISCOVER_PROBE_CAP`] bytes
    /// and use whatever arrived.
    Discover,
}

impl fmt::Display for ReplyLength {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReplyLength::Exact(length) => write!(f, "{length}"),
            ReplyLength::Discover => write!(f, "DISCOVER"),
        }
    }
}

/// A fixed request understood by the inverter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Command {
    pub name: &'static str,
    /// Request frame as uppercase, space separated hex.
    pub request: &'static str,
    pub reply: ReplyLength,
}

impl Command {
    pub const SENSE: Command = Command {
        name: "SENSE",
        request: "0A 03 79 18 00 07 9C 28",
        reply: ReplyLength::Exact(19),
    };
    pub const STATUS: Command = Command {
        name: "STATUS",
        request: "0A 03 75 30 00 1B 1E B9",
        reply: ReplyLength::Exact(59),
    };
    pub const READ_SETUP: Command = Command {
        name: "READ_SETUP",
        request: "0A 03 79 18 00 0A 5D ED",
        reply: ReplyLength::Exact(25),
    };
    /// Only the prefix of the write frame, the setup words and checksum are appended.
    pub const WRITE_SETUP: Command = Command {
        name: "WRITE_SETUP",
        request: "0A 10 79 18 00 0A 14",
        reply: ReplyLength::Discover,
    };
    pub const RESTORE_FACTORY_SETTINGS: Command = Command {
        name: "RESTORE_FACTORY_SETTINGS",
        request: "0A 10 7D 00 00 01 02 00 01 B9 A7",
        reply: ReplyLength::Discover,
    };
    pub const REMOTE_RESET: Command = Command {
        name: "REMOTE_RESET",
        request: "0A 10 7D 01 00 01 02 00 01 B8 76",
        reply: ReplyLength::Discover,
    };
    pub const REMOTE_SHUTDOWN: Command = Command {
        name: "REMOTE_SHUTDOWN",
        request: "0A 10 7D 02 00 01 02 00 01 B8 45",
        reply: ReplyLength::Discover,
    };

    pub const ALL: [Command; 7] = [
        Self::SENSE,
        Self::STATUS,
        Self::READ_SETUP,
        Self::WRITE_SETUP,
        Self::RESTORE_FACTORY_SETTINGS,
        Self::REMOTE_RESET,
        Self::REMOTE_SHUTDOWN,
    ];

    /// Looks a command up by its registry name.
    pub fn by_name(name: &str) -> Option<Command> {
        Self::ALL.into_iter().find(|command| command.name == name)
    }

    /// Converts the request hex string into the bytes sent on the wire.
    pub fn request_bytes(&self) -> Result<Vec<u8>> {
        from_hex_string(self.request)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]", self.name, self.request)
    }
}

/// Parses hex with optional whitespace between the bytes.
pub fn from_hex_string(value: &str) -> Result<Vec<u8>> {
    let compact: String = value.split_whitespace().collect();
    Ok(hex::decode(compact)?)
}

/// Formats bytes as uppercase hex, one space between bytes.
pub fn to_hex_string(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|byte| format!("{byte:02X}"))
        .collect::<Vec<_>>()
        .join(" ")
}
