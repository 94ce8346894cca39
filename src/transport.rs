//! Serial transport for the compressor link.
//!
//! The client is generic over [`Transport`], which extends the
//! [embedded_io::Read] & [embedded_io::Write] pair with buffer discarding and a
//! bounded line read. [`SerialTransport`] implements it on top of `serialport`.

use std::time::{Duration, Instant};

use embedded_io::{Error as _, ErrorKind};
use serialport::{ClearBuffer, DataBits, FlowControl, Parity, SerialPort, SerialPortType, StopBits};
use thiserror::Error;

use crate::error::{Error, Result};
use crate::frame::TERMINATOR;

/// Line speed of the COOLPAK RS-232/485 interface.
pub const DEFAULT_BAUD_RATE: u32 = 4800;

/// Pause after opening the port before the first command.
const OPEN_SETTLE: Duration = Duration::from_millis(100);

/// Per-read timeout the port is opened with; [`Transport::read_line`] narrows it.
const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(1);

/// Byte link to the compressor.
pub trait Transport: embedded_io::Read + embedded_io::Write {
    /// Discard anything received but not yet read.
    fn flush_input(&mut self) -> core::result::Result<(), Self::Error>;

    /// Discard anything queued but not yet transmitted.
    fn flush_output(&mut self) -> core::result::Result<(), Self::Error>;

    /// Bound how long a single `read` may block.
    fn set_read_timeout(&mut self, timeout: Duration) -> core::result::Result<(), Self::Error>;

    /// Write one complete frame.
    fn write_frame(&mut self, frame: &[u8]) -> Result<(), Self::Error> {
        self.write_all(frame).map_err(Error::WriteError)?;
        self.flush().map_err(Error::WriteError)
    }

    /// Read bytes up to and including the terminator, giving up after `timeout`.
    ///
    /// A timeout is not an error: whatever arrived so far is returned, which is
    /// an empty buffer when the device stayed silent.
    fn read_line<const L: usize>(
        &mut self,
        timeout: Duration,
    ) -> Result<heapless::Vec<u8, L>, Self::Error> {
        let deadline = Instant::now() + timeout;
        let mut line: heapless::Vec<u8, L> = heapless::Vec::new();
        let mut byte = [0u8; 1];

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            self.set_read_timeout(remaining).map_err(Error::ReadError)?;

            match self.read(&mut byte) {
                Ok(0) => break,
                Ok(_) => {
                    line.push(byte[0]).map_err(|_| Error::BufferError)?;
                    if byte[0] == TERMINATOR {
                        break;
                    }
                }
                Err(e) if matches!(e.kind(), ErrorKind::TimedOut) => break,
                Err(e) if matches!(e.kind(), ErrorKind::Interrupted) => continue,
                Err(e) => return Err(Error::ReadError(e)),
            }
        }

        Ok(line)
    }

    /// Release the link.
    fn close(self)
    where
        Self: Sized,
    {
        drop(self);
    }
}

/// Failure to open the serial device.
#[derive(Error, Debug)]
pub enum PortError {
    #[error("Serial port {port} unavailable: {source}")]
    PortUnavailable {
        port: String,
        #[source]
        source: serialport::Error,
    },
}

/// [std::io::Error] wrapped so it can be used as an [embedded_io::Error].
#[derive(Debug)]
pub struct IoError(pub std::io::Error);

impl core::fmt::Display for IoError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for IoError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.0)
    }
}

impl embedded_io::Error for IoError {
    fn kind(&self) -> ErrorKind {
        match self.0.kind() {
            std::io::ErrorKind::NotFound => ErrorKind::NotFound,
            std::io::ErrorKind::PermissionDenied => ErrorKind::PermissionDenied,
            std::io::ErrorKind::BrokenPipe => ErrorKind::BrokenPipe,
            std::io::ErrorKind::InvalidInput => ErrorKind::InvalidInput,
            std::io::ErrorKind::InvalidData => ErrorKind::InvalidData,
            std::io::ErrorKind::TimedOut => ErrorKind::TimedOut,
            std::io::ErrorKind::WouldBlock => ErrorKind::TimedOut,
            std::io::ErrorKind::Interrupted => ErrorKind::Interrupted,
            std::io::ErrorKind::Unsupported => ErrorKind::Unsupported,
            std::io::ErrorKind::OutOfMemory => ErrorKind::OutOfMemory,
            _ => ErrorKind::Other,
        }
    }
}

impl From<serialport::Error> for IoError {
    fn from(err: serialport::Error) -> Self {
        IoError(err.into())
    }
}

/// An open serial device configured 8N1 with no flow control.
///
/// The OS handle is released when the transport is dropped, so every exit path
/// of a session closes the port.
pub struct SerialTransport {
    port: Box<dyn SerialPort>,
    name: String,
}

impl SerialTransport {
    /// Open `port_name` at `baud_rate`, wait for the line to settle and discard
    /// anything left in the buffers.
    pub fn open(port_name: &str, baud_rate: u32) -> core::result::Result<Self, PortError> {
        let unavailable = |source| PortError::PortUnavailable {
            port: port_name.to_owned(),
            source,
        };

        let port = serialport::new(port_name, baud_rate)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .timeout(DEFAULT_READ_TIMEOUT)
            .open()
            .map_err(unavailable)?;
        log::debug!("Serial port {} opened at {} baud", port_name, baud_rate);

        std::thread::sleep(OPEN_SETTLE);
        port.clear(ClearBuffer::All).map_err(unavailable)?;

        Ok(Self {
            port,
            name: port_name.to_owned(),
        })
    }
}

impl Drop for SerialTransport {
    fn drop(&mut self) {
        log::debug!("Closing serial port {}", self.name);
    }
}

impl embedded_io::ErrorType for SerialTransport {
    type Error = IoError;
}

impl embedded_io::Read for SerialTransport {
    fn read(&mut self, buf: &mut [u8]) -> core::result::Result<usize, Self::Error> {
        std::io::Read::read(&mut self.port, buf).map_err(IoError)
    }
}

impl embedded_io::Write for SerialTransport {
    fn write(&mut self, buf: &[u8]) -> core::result::Result<usize, Self::Error> {
        std::io::Write::write(&mut self.port, buf).map_err(IoError)
    }

    fn flush(&mut self) -> core::result::Result<(), Self::Error> {
        std::io::Write::flush(&mut self.port).map_err(IoError)
    }
}

impl Transport for SerialTransport {
    fn flush_input(&mut self) -> core::result::Result<(), Self::Error> {
        self.port.clear(ClearBuffer::Input).map_err(IoError::from)
    }

    fn flush_output(&mut self) -> core::result::Result<(), Self::Error> {
        self.port.clear(ClearBuffer::Output).map_err(IoError::from)
    }

    fn set_read_timeout(&mut self, timeout: Duration) -> core::result::Result<(), Self::Error> {
        self.port.set_timeout(timeout).map_err(IoError::from)
    }
}

/// Find the first USB serial adapter whose manufacturer string contains `manufacturer`.
///
/// `Ok(None)` means no matching adapter is plugged in.
pub fn discover_port(manufacturer: &str) -> serialport::Result<Option<String>> {
    let ports = serialport::available_ports()?;
    let found = ports.into_iter().find_map(|port| match port.port_type {
        SerialPortType::UsbPort(info)
            if info
                .manufacturer
                .as_deref()
                .is_some_and(|name| name.contains(manufacturer)) =>
        {
            Some(port.port_name)
        }
        _ => None,
    });

    match &found {
        Some(name) => log::debug!("Found {} adapter on {}", manufacturer, name),
        None => log::debug!("No {} adapter found", manufacturer),
    }
    Ok(found)
}
