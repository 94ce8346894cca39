//! Our error types for the COOLPAK command interface.

use thiserror::Error;

use crate::frame::{InvalidCommand, ParseError};

pub type Result<T, I> = core::result::Result<T, Error<I>>;

/// Errors from a single command/response exchange, generic over the transport's I/O error.
#[derive(Error, Debug)]
pub enum Error<I: embedded_io::Error> {
    #[error("Serial write failed: {0}")]
    WriteError(I),
    #[error("Serial read failed: {0}")]
    ReadError(I),
    /// The device is connected but did not answer within the read timeout.
    #[error("Device did not respond")]
    DeviceUnreachable,
    /// The status reply had the wrong number of fields. The split fields are
    /// kept for diagnostics.
    #[error("Malformed response with {} fields", .fields.len())]
    MalformedResponse { fields: Vec<String> },
    #[error("Invalid response received: {0}")]
    InvalidResponse(ParseError),
    /// The reply did not fit in the line buffer before a terminator arrived.
    #[error("Response exceeded line buffer")]
    BufferError,
    #[error(transparent)]
    InvalidCommand(InvalidCommand),
}

impl<I: embedded_io::Error> From<InvalidCommand> for Error<I> {
    fn from(err: InvalidCommand) -> Self {
        Error::InvalidCommand(err)
    }
}

impl<I: embedded_io::Error> From<ParseError> for Error<I> {
    fn from(err: ParseError) -> Self {
        match err {
            ParseError::NoResponse => Error::DeviceUnreachable,
            ParseError::UnexpectedFieldCount { fields } => Error::MalformedResponse { fields },
            other => Error::InvalidResponse(other),
        }
    }
}

impl<I: embedded_io::Error> Error<I> {
    /// Whether the exchange failed at the serial I/O level rather than in the reply.
    pub fn is_io(&self) -> bool {
        matches!(self, Error::WriteError(_) | Error::ReadError(_))
    }
}
