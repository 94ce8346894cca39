use std::time::Duration;

use crate::{
    error::{Error, Result},
    frame::{self, Command},
    status::{ActualPower, CommandedPower, DeviceStatus},
    transport::{PortError, SerialTransport, Transport},
};

/// Minimum gap the controller needs between receiving a command and replying.
pub const SETTLE_INTERVAL: Duration = Duration::from_millis(100);

/// How long to wait for a reply line.
pub const READ_TIMEOUT: Duration = Duration::from_secs(2);

/// You can create a CoolpakClient using any interface which implements [Transport].
///
/// Each call is one exchange: discard stale bytes, send one frame, wait the
/// settle interval, read one line. There are no retries. `L` bounds the reply
/// line length.
pub struct CoolpakClient<S: Transport, const L: usize = 128> {
    interface: S,
    settle: Duration,
    read_timeout: Duration,
}

impl CoolpakClient<SerialTransport> {
    /// Open a serial port with the compressor's line settings.
    pub fn open(port_name: &str, baud_rate: u32) -> core::result::Result<Self, PortError> {
        Ok(Self::new(SerialTransport::open(port_name, baud_rate)?))
    }
}

impl<S: Transport, const L: usize> CoolpakClient<S, L> {
    pub fn new(interface: S) -> Self {
        Self {
            interface,
            settle: SETTLE_INTERVAL,
            read_timeout: READ_TIMEOUT,
        }
    }

    pub fn with_settle_interval(mut self, settle: Duration) -> Self {
        self.settle = settle;
        self
    }

    pub fn with_read_timeout(mut self, read_timeout: Duration) -> Self {
        self.read_timeout = read_timeout;
        self
    }

    /// Request and interpret the status line.
    ///
    /// A silent device is [`Error::DeviceUnreachable`]; a reply with the wrong
    /// number of fields is [`Error::MalformedResponse`] carrying what was split.
    pub fn query_status(&mut self) -> Result<DeviceStatus, S::Error> {
        let line = self.exchange(Command::QueryStatus)?;
        match frame::decode(&line) {
            Ok(fields) => Ok(DeviceStatus::interpret(fields)),
            Err(err) => {
                log::warn!("Status request failed: {}", err);
                Err(err.into())
            }
        }
    }

    /// The actual power state, `Unknown` if the status line was malformed.
    pub fn actual_power(&mut self) -> Result<ActualPower, S::Error> {
        match self.query_status() {
            Ok(status) => Ok(status.actual_power),
            Err(Error::MalformedResponse { .. }) => Ok(ActualPower::Unknown),
            Err(err) => Err(err),
        }
    }

    /// The commanded power state, `Unknown` if the status line was malformed.
    pub fn commanded_power(&mut self) -> Result<CommandedPower, S::Error> {
        match self.query_status() {
            Ok(status) => Ok(status.commanded_power),
            Err(Error::MalformedResponse { .. }) => Ok(CommandedPower::Unknown),
            Err(err) => Err(err),
        }
    }

    /// Switch the compressor on or off.
    ///
    /// Depending on its state the controller answers with a status line or not
    /// at all, so only I/O failures are errors. Returns the reply text, if any.
    pub fn set_power(&mut self, on: bool) -> Result<Option<String>, S::Error> {
        let line = self.exchange(Command::power(on))?;
        if line.is_empty() {
            log::debug!("No confirmation for power {}", if on { "on" } else { "off" });
            return Ok(None);
        }
        Ok(Some(reply_text(&line)))
    }

    /// Request the logged error codes, one entry per `/`-separated field.
    pub fn query_errors(&mut self) -> Result<Vec<String>, S::Error> {
        let line = self.exchange(Command::QueryErrors)?;
        Ok(frame::split_fields(&line)?)
    }

    /// Send a textual command token and return the raw reply line.
    pub fn send_token(&mut self, token: &str) -> Result<heapless::Vec<u8, L>, S::Error> {
        let frame = frame::encode_token(token)?;
        self.transact(&frame, token)
    }

    /// Give back the underlying transport.
    pub fn into_inner(self) -> S {
        self.interface
    }

    /// Release the serial connection.
    pub fn close(self) {
        self.interface.close();
    }

    fn exchange(&mut self, command: Command) -> Result<heapless::Vec<u8, L>, S::Error> {
        self.transact(&frame::encode(command), command.token())
    }

    fn transact(&mut self, frame: &[u8], token: &str) -> Result<heapless::Vec<u8, L>, S::Error> {
        self.interface.flush_input().map_err(Error::ReadError)?;
        self.interface.flush_output().map_err(Error::WriteError)?;

        self.interface.write_frame(frame)?;
        log::debug!("Command sent to the unit: {}", token);

        std::thread::sleep(self.settle);

        let line = self.interface.read_line::<L>(self.read_timeout)?;
        log::debug!("Response from unit: {:?}", String::from_utf8_lossy(&line));
        Ok(line)
    }
}

fn reply_text(line: &[u8]) -> String {
    String::from_utf8_lossy(line)
        .trim_end_matches(['\r', '\n'])
        .to_string()
}
