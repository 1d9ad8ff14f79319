//! Serial line settings and the serial [`Transport`].
//!
//! The inverter talks 8N1 without flow control. `serialport` only keeps a single
//! timeout per port, so [`SerialTransport`] switches between the configured
//! write and read timeouts around each operation.

use crate::protocol::{ReplyLength, Result};
use crate::transport::{Transport, read_reply, write_once};
use std::fmt;
use std::time::Duration;
use tokio_serial::{ClearBuffer, SerialPort, SerialPortType};

/// The parity used for serial communication.
pub const PARITY: &tokio_serial::Parity = &tokio_serial::Parity::None;
/// The number of stop bits used for serial communication.
pub const STOP_BITS: &tokio_serial::StopBits = &tokio_serial::StopBits::One;
/// The number of data bits used for serial communication.
pub const DATA_BITS: &tokio_serial::DataBits = &tokio_serial::DataBits::Eight;

pub const DEFAULT_BAUD_RATE: u32 = 9600;
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(3);
pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(1);

/// Creates a `tokio_serial::SerialPortBuilder` with the line settings of the inverter.
///
/// # Arguments
///
/// * `device` - The path to the serial port device (e.g., `/dev/ttyUSB0`).
/// * `baud_rate` - The baud rate for the serial communication.
pub fn serial_port_builder(device: &str, baud_rate: u32) -> tokio_serial::SerialPortBuilder {
    tokio_serial::new(device, baud_rate)
        .parity(*PARITY)
        .stop_bits(*STOP_BITS)
        .data_bits(*DATA_BITS)
        .flow_control(tokio_serial::FlowControl::None)
}

/// Timeouts and speed used when opening a port.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineSettings {
    pub baud_rate: u32,
    pub read_timeout: Duration,
    pub write_timeout: Duration,
}

impl Default for LineSettings {
    fn default() -> Self {
        Self {
            baud_rate: DEFAULT_BAUD_RATE,
            read_timeout: DEFAULT_READ_TIMEOUT,
            write_timeout: DEFAULT_WRITE_TIMEOUT,
        }
    }
}

/// Blocking [`Transport`] over a serial port.
pub struct SerialTransport {
    port: Box<dyn SerialPort>,
    settings: LineSettings,
}

impl fmt::Debug for SerialTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SerialTransport")
            .field("port", &self.port.name())
            .field("settings", &self.settings)
            .finish()
    }
}

impl SerialTransport {
    /// Opens `device` with the given line settings.
    pub fn open(device: &str, settings: LineSettings) -> Result<Self> {
        let port = serial_port_builder(device, settings.baud_rate)
            .timeout(settings.read_timeout)
            .open()?;
        log::debug!("Opened {device} at {} baud", settings.baud_rate);
        Ok(Self { port, settings })
    }

    pub fn name(&self) -> Option<String> {
        self.port.name()
    }

    pub fn settings(&self) -> &LineSettings {
        &self.settings
    }
}

impl Transport for SerialTransport {
    fn send(&mut self, bytes: &[u8]) -> Result<()> {
        self.port.clear(ClearBuffer::Input)?;
        self.port.set_timeout(self.settings.write_timeout)?;
        write_once(&mut self.port, bytes)
    }

    fn receive(&mut self, expected: ReplyLength) -> Result<Vec<u8>> {
        self.port.set_timeout(self.settings.read_timeout)?;
        read_reply(&mut self.port, expected)
    }
}

/// Description of a serial port found on the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortInfo {
    pub device: String,
    pub kind: &'static str,
    pub manufacturer: Option<String>,
    pub product: Option<String>,
    pub serial_number: Option<String>,
    pub vid: Option<u16>,
    pub pid: Option<u16>,
}

impl PortInfo {
    /// Attribute name and value pairs, absent values omitted.
    pub fn attributes(&self) -> Vec<(&'static str, String)> {
        let mut attributes = vec![("device", self.device.clone()), ("type", self.kind.to_string())];
        let optional = [
            ("manufacturer", self.manufacturer.clone()),
            ("product", self.product.clone()),
            ("serial_number", self.serial_number.clone()),
            ("vid", self.vid.map(|vid| format!("{vid:04X}"))),
            ("pid", self.pid.map(|pid| format!("{pid:04X}"))),
        ];
        attributes.extend(
            optional
                .into_iter()
                .filter_map(|(name, value)| value.map(|value| (name, value))),
        );
        attributes
    }
}

impl From<tokio_serial::SerialPortInfo> for PortInfo {
    fn from(info: tokio_serial::SerialPortInfo) -> Self {
        let mut port = PortInfo {
            device: info.port_name,
            kind: "Unknown",
            manufacturer: None,
            product: None,
            serial_number: None,
            vid: None,
            pid: None,
        };
        match info.port_type {
            SerialPortType::UsbPort(usb) => {
                port.kind = "USB";
                port.manufacturer = usb.manufacturer;
                port.product = usb.product;
                port.serial_number = usb.serial_number;
                port.vid = Some(usb.vid);
                port.pid = Some(usb.pid);
            }
            SerialPortType::PciPort => port.kind = "PCI",
            SerialPortType::BluetoothPort => port.kind = "Bluetooth",
            SerialPortType::Unknown => {}
        }
        port
    }
}

/// Enumerates the serial ports present on the host.
pub fn available_ports() -> Result<Vec<PortInfo>> {
    Ok(tokio_serial::available_ports()?
        .into_iter()
        .map(PortInfo::from)
        .collect())
}
