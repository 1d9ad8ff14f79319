//! A library for polling EP2000 battery/solar inverters over a serial line.
//!
//! The inverter answers a small set of fixed Modbus-RTU style requests. This
//! crate builds those requests, validates the reply frames and turns the
//! payload words into named, typed records.
//!
//! ## Layout
//!
//! - [`protocol`]: command registry, hex helpers and the error type.
//! - [`frame`]: checksum and envelope handling.
//! - [`decoder`]: declarative schemas and the field decoder.
//! - [`profile`]: EP2000 schemas and code tables.
//! - [`transport`]: the [`transport::Transport`] seam and stream helpers.
//! - [`serial`]: serial port transport and port enumeration.
//! - [`client`]: the [`client::EP2000`] device.
//!
//! ## Quick Start
//!
//! ```no_run
//! use ep2000_lib::{
//!     client::{EP2000, Reply},
//!     serial::{LineSettings, SerialTransport},
//! };
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let transport = SerialTransport::open("/dev/ttyUSB0", LineSettings::default())?;
//!     let mut inverter = EP2000::new(transport);
//!
//!     if let Reply::Valid(report) = inverter.sense()? {
//!         println!("EP2000 detected: {}", report.detected);
//!     }
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod decoder;
pub mod frame;
pub mod profile;
pub mod protocol;
pub mod transport;

#[cfg_attr(docsrs, doc(cfg(feature = "serial")))]
#[cfg(feature = "serial")]
pub mod serial;

pub use protocol::{Error, Result};
