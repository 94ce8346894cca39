//! We use this mocking module in unit tests to emulate the compressor's serial port.

use std::time::Duration;

use crate::transport::Transport;

/// Our mock type used to emulate a serial port.
pub struct MockSerial {
    /// Buffer to store data written to the mock serial port
    write_buffer: heapless::Vec<u8, 256>,
    /// Leftover bytes from an earlier exchange, dropped by `flush_input`
    stale_buffer: heapless::Vec<u8, 256>,
    /// Buffer containing pre-configured response data to be read
    read_buffer: heapless::Vec<u8, 256>,
    /// Current position in the read buffer
    read_position: usize,
    /// Flag to simulate write errors
    should_error_on_write: bool,
    /// Flag to simulate read errors
    should_error_on_read: bool,
    input_flushes: usize,
    output_flushes: usize,
    last_read_timeout: Option<Duration>,
    /// Port operations in call order, consecutive repeats collapsed
    events: Vec<MockEvent>,
}

/// One kind of operation performed on the mock port.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockEvent {
    FlushInput,
    FlushOutput,
    Write,
    Read,
}

#[derive(Debug, thiserror::Error)]
pub enum MockSerialError {
    /// No more data; what a real port reports when its read timeout expires
    #[error("Mock read timed out")]
    Timeout,
    /// Simulated buffer overflow
    #[error("Mock buffer overflow")]
    BufferOverflow,
    /// Generic simulated error for testing
    #[error("Simulated serial error")]
    SimulatedError,
}

impl embedded_io::Error for MockSerialError {
    fn kind(&self) -> embedded_io::ErrorKind {
        match self {
            MockSerialError::Timeout => embedded_io::ErrorKind::TimedOut,
            MockSerialError::BufferOverflow => embedded_io::ErrorKind::OutOfMemory,
            MockSerialError::SimulatedError => embedded_io::ErrorKind::Other,
        }
    }
}

impl embedded_io::ErrorType for MockSerial {
    type Error = MockSerialError;
}

impl embedded_io::Write for MockSerial {
    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        if self.should_error_on_write {
            return Err(MockSerialError::SimulatedError);
        }
        self.record(MockEvent::Write);

        self.write_buffer
            .extend_from_slice(buf)
            .map_err(|_| MockSerialError::BufferOverflow)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        if self.should_error_on_write {
            return Err(MockSerialError::SimulatedError);
        }
        Ok(())
    }
}

impl embedded_io::Read for MockSerial {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        if self.should_error_on_read {
            return Err(MockSerialError::SimulatedError);
        }
        if buf.is_empty() {
            return Ok(0);
        }
        self.record(MockEvent::Read);

        if !self.stale_buffer.is_empty() {
            buf[0] = self.stale_buffer.remove(0);
            return Ok(1);
        }

        if self.read_position >= self.read_buffer.len() {
            return Err(MockSerialError::Timeout);
        }

        let available_bytes = self.read_buffer.len() - self.read_position;
        let bytes_to_read = core::cmp::min(buf.len(), available_bytes);
        let end = self.read_position + bytes_to_read;
        buf[..bytes_to_read].copy_from_slice(&self.read_buffer[self.read_position..end]);

        self.read_position += bytes_to_read;
        Ok(bytes_to_read)
    }
}

impl Transport for MockSerial {
    fn flush_input(&mut self) -> Result<(), Self::Error> {
        self.input_flushes += 1;
        self.record(MockEvent::FlushInput);
        self.stale_buffer.clear();
        Ok(())
    }

    fn flush_output(&mut self) -> Result<(), Self::Error> {
        self.output_flushes += 1;
        self.record(MockEvent::FlushOutput);
        Ok(())
    }

    fn set_read_timeout(&mut self, timeout: Duration) -> Result<(), Self::Error> {
        self.last_read_timeout = Some(timeout);
        Ok(())
    }
}

impl MockSerial {
    /// Create a new MockSerial instance with empty buffers
    pub fn new() -> Self {
        Self {
            write_buffer: heapless::Vec::new(),
            stale_buffer: heapless::Vec::new(),
            read_buffer: heapless::Vec::new(),
            read_position: 0,
            should_error_on_write: false,
            should_error_on_read: false,
            input_flushes: 0,
            output_flushes: 0,
            last_read_timeout: None,
            events: Vec::new(),
        }
    }

    fn record(&mut self, event: MockEvent) {
        if self.events.last() != Some(&event) {
            self.events.push(event);
        }
    }

    /// Operations seen so far, in order
    pub fn events(&self) -> &[MockEvent] {
        &self.events
    }

    /// Set the data that will be returned when read() is called
    pub fn set_read_data(&mut self, data: &[u8]) -> Result<(), MockSerialError> {
        self.read_buffer.clear();
        self.read_position = 0;
        self.read_buffer
            .extend_from_slice(data)
            .map_err(|_| MockSerialError::BufferOverflow)
    }

    /// Queue bytes that precede the reply unless the input buffer is flushed first
    pub fn set_stale_data(&mut self, data: &[u8]) -> Result<(), MockSerialError> {
        self.stale_buffer.clear();
        self.stale_buffer
            .extend_from_slice(data)
            .map_err(|_| MockSerialError::BufferOverflow)
    }

    /// Get a reference to the data that was written to this mock serial port
    pub fn written_data(&self) -> &[u8] {
        &self.write_buffer
    }

    /// Clear the write buffer
    pub fn clear_written_data(&mut self) {
        self.write_buffer.clear();
    }

    /// Configure whether write operations should fail with an error
    pub fn set_write_error(&mut self, should_error: bool) {
        self.should_error_on_write = should_error;
    }

    /// Configure whether read operations should fail with an error
    pub fn set_read_error(&mut self, should_error: bool) {
        self.should_error_on_read = should_error;
    }

    pub fn input_flushes(&self) -> usize {
        self.input_flushes
    }

    pub fn output_flushes(&self) -> usize {
        self.output_flushes
    }

    pub fn last_read_timeout(&self) -> Option<Duration> {
        self.last_read_timeout
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_io::{Error, Read, Write};

    #[test]
    fn test_new_mock_serial() {
        let mock = MockSerial::new();
        assert_eq!(mock.written_data().len(), 0);
        assert_eq!(mock.read_position, 0);
        assert_eq!(mock.input_flushes(), 0);
        assert_eq!(mock.output_flushes(), 0);
    }

    #[test]
    fn test_write_multiple_times() {
        let mut mock = MockSerial::new();
        mock.write(b"\x02SYS").unwrap();
        mock.write(b"1\r").unwrap();
        assert_eq!(mock.written_data(), b"\x02SYS1\r");

        mock.clear_written_data();
        assert!(mock.written_data().is_empty());
    }

    #[test]
    fn test_write_buffer_overflow() {
        let mut mock = MockSerial::new();
        let large_data = vec![0u8; 300]; // Larger than 256 byte capacity

        let result = mock.write(&large_data);
        assert!(matches!(result.unwrap_err(), MockSerialError::BufferOverflow));
    }

    #[test]
    fn test_read_partial_data() {
        let mut mock = MockSerial::new();
        mock.set_read_data(b"0.1/0/123\r").unwrap();

        let mut buffer = [0u8; 4];
        assert_eq!(mock.read(&mut buffer).unwrap(), 4);
        assert_eq!(&buffer, b"0.1/");
    }

    #[test]
    fn test_read_timeout_after_data_exhausted() {
        let mut mock = MockSerial::new();
        mock.set_read_data(b"Hi").unwrap();

        let mut buffer = [0u8; 10];
        assert!(mock.read(&mut buffer).is_ok());

        let result = mock.read(&mut buffer);
        assert!(matches!(result.unwrap_err(), MockSerialError::Timeout));
    }

    #[test]
    fn test_stale_data_read_first_until_flushed() {
        let mut mock = MockSerial::new();
        mock.set_stale_data(b"xy").unwrap();
        mock.set_read_data(b"ok").unwrap();

        let mut byte = [0u8; 1];
        mock.read(&mut byte).unwrap();
        assert_eq!(&byte, b"x");

        mock.flush_input().unwrap();
        mock.read(&mut byte).unwrap();
        assert_eq!(&byte, b"o");
        assert_eq!(mock.input_flushes(), 1);
    }

    #[test]
    fn test_error_simulation() {
        let mut mock = MockSerial::new();
        mock.set_write_error(true);
        assert!(matches!(mock.write(b"test").unwrap_err(), MockSerialError::SimulatedError));
        assert!(matches!(mock.flush().unwrap_err(), MockSerialError::SimulatedError));
        assert!(mock.written_data().is_empty());

        mock.set_read_data(b"test data").unwrap();
        mock.set_read_error(true);
        let mut buffer = [0u8; 10];
        assert!(matches!(mock.read(&mut buffer).unwrap_err(), MockSerialError::SimulatedError));

        mock.set_read_error(false);
        assert!(mock.read(&mut buffer).is_ok());
    }

    #[test]
    fn test_error_kinds() {
        use embedded_io::ErrorKind;

        assert!(matches!(MockSerialError::Timeout.kind(), ErrorKind::TimedOut));
        assert!(matches!(MockSerialError::BufferOverflow.kind(), ErrorKind::OutOfMemory));
        assert!(matches!(MockSerialError::SimulatedError.kind(), ErrorKind::Other));
    }
}
