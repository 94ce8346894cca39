//! Framing for the COOLPAK serial command interface.
//!
//! Every command is sent as `STX` + ASCII token + `CR`. Status replies may echo
//! `STX` + `DAT` before the `/`-separated fields and end with `CR`.

use core::str::FromStr;

use strum_macros::{EnumIter, EnumString, IntoStaticStr};
use thiserror::Error;

use crate::status::{STATUS_FIELD_COUNT, StatusFields};

/// Start-of-text marker prefixed to every command.
pub const START_MARKER: u8 = 0x02;
/// Carriage return terminating commands and replies.
pub const TERMINATOR: u8 = 0x0D;
/// Separator between reply fields.
pub const FIELD_SEPARATOR: char = '/';

const STATUS_ECHO: &str = "\x02DAT";

/// The fixed command vocabulary understood by the compressor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, EnumString, IntoStaticStr)]
pub enum Command {
    /// Request the 14 field status line.
    #[strum(serialize = "DAT")]
    QueryStatus,
    /// Switch the compressor on.
    #[strum(serialize = "SYS1")]
    PowerOn,
    /// Switch the compressor off.
    #[strum(serialize = "SYS0")]
    PowerOff,
    /// Request the logged error codes.
    #[strum(serialize = "ERR")]
    QueryErrors,
}

impl Command {
    /// ASCII token sent on the wire for this command.
    pub fn token(self) -> &'static str {
        self.into()
    }

    /// The power switching command for the requested state.
    pub fn power(on: bool) -> Self {
        if on { Command::PowerOn } else { Command::PowerOff }
    }
}

/// A command token outside the device vocabulary.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Invalid command token {0:?}")]
pub struct InvalidCommand(pub String);

/// Reasons a raw reply could not be turned into [`StatusFields`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// Nothing was read before the timeout expired.
    #[error("No response received")]
    NoResponse,
    #[error("Response contains non-ASCII bytes")]
    NonAscii,
    /// The reply split into the wrong number of fields. The fields are kept for
    /// best-effort use by the caller.
    #[error("Unexpected field count: expected 14, got {}", .fields.len())]
    UnexpectedFieldCount { fields: Vec<String> },
}

impl ParseError {
    /// Number of fields found, if the reply got as far as being split.
    pub fn field_count(&self) -> Option<usize> {
        match self {
            ParseError::UnexpectedFieldCount { fields } => Some(fields.len()),
            _ => None,
        }
    }
}

/// Build the frame for `command`.
pub fn encode(command: Command) -> Vec<u8> {
    let token = command.token();
    let mut frame = Vec::with_capacity(token.len() + 2);
    frame.push(START_MARKER);
    frame.extend_from_slice(token.as_bytes());
    frame.push(TERMINATOR);
    frame
}

/// Build the frame for a textual command token such as `"DAT"` or `"SYS1"`.
pub fn encode_token(token: &str) -> Result<Vec<u8>, InvalidCommand> {
    let command = Command::from_str(token).map_err(|_| InvalidCommand(token.to_owned()))?;
    Ok(encode(command))
}

/// Strip the echo prefix and terminator from a reply and split it into fields
/// without checking how many there are.
///
/// An empty reply is [`ParseError::NoResponse`].
pub fn split_fields(raw: &[u8]) -> Result<Vec<String>, ParseError> {
    if raw.is_empty() {
        return Err(ParseError::NoResponse);
    }
    if !raw.is_ascii() {
        return Err(ParseError::NonAscii);
    }
    let text = core::str::from_utf8(raw).map_err(|_| ParseError::NonAscii)?;

    let body = text
        .strip_prefix(STATUS_ECHO)
        .or_else(|| text.strip_prefix(START_MARKER as char))
        .unwrap_or(text);
    let body = body.trim_end_matches(['\r', '\n']);

    Ok(body.split(FIELD_SEPARATOR).map(str::to_owned).collect())
}

/// Validate a status reply against the 14 field schema.
pub fn decode(raw: &[u8]) -> Result<StatusFields, ParseError> {
    let fields = split_fields(raw)?;
    if fields.len() != STATUS_FIELD_COUNT {
        return Err(ParseError::UnexpectedFieldCount { fields });
    }
    StatusFields::try_from(fields).map_err(|fields| ParseError::UnexpectedFieldCount { fields })
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    const STATUS_LINE: &[u8] = b"\x02DAT0.1/0/123/0/0/0/0/1/1/0/0/0/0/2\r";

    #[test]
    fn encodes_fixed_frames() {
        assert_eq!(encode(Command::QueryStatus), b"\x02DAT\x0D");
        assert_eq!(encode(Command::PowerOn), b"\x02SYS1\x0D");
        assert_eq!(encode(Command::PowerOff), b"\x02SYS0\x0D");
        assert_eq!(encode(Command::QueryErrors), b"\x02ERR\x0D");
    }

    #[test]
    fn every_token_encodes_through_text() {
        for command in Command::iter() {
            let frame = encode_token(command.token()).unwrap();
            assert_eq!(frame, encode(command));
            assert_eq!(frame.first(), Some(&START_MARKER));
            assert_eq!(frame.last(), Some(&TERMINATOR));
        }
    }

    #[test]
    fn unknown_token_is_rejected() {
        assert_eq!(
            encode_token("SYS2"),
            Err(InvalidCommand("SYS2".to_string()))
        );
        assert!(encode_token("dat").is_err());
        assert!(encode_token("").is_err());
    }

    #[test]
    fn power_command_selection() {
        assert_eq!(Command::power(true), Command::PowerOn);
        assert_eq!(Command::power(false), Command::PowerOff);
    }

    #[test]
    fn decodes_status_line_with_echo() {
        let fields = decode(STATUS_LINE).unwrap();
        assert_eq!(fields.as_slice().len(), 14);
        assert_eq!(fields.as_slice()[0], "0.1");
        assert_eq!(fields.as_slice()[2], "123");
        assert_eq!(fields.as_slice()[13], "2");
    }

    #[test]
    fn decodes_status_line_without_echo() {
        let fields = decode(b"2.3/0/4567/0/0/0/30/0/0/0/0/1/0000000010000000/5\r").unwrap();
        assert_eq!(fields.as_slice()[0], "2.3");
        assert_eq!(fields.as_slice()[13], "5");
    }

    #[test]
    fn strips_lone_start_marker_and_line_feed() {
        let fields = split_fields(b"\x02E01/E07\r\n").unwrap();
        assert_eq!(fields, vec!["E01".to_string(), "E07".to_string()]);
    }

    #[test]
    fn empty_reply_is_no_response() {
        assert_eq!(decode(b""), Err(ParseError::NoResponse));
        assert_eq!(split_fields(b""), Err(ParseError::NoResponse));
    }

    #[test]
    fn non_ascii_reply_is_rejected() {
        assert_eq!(decode(b"\x02DAT\xFF/1\r"), Err(ParseError::NonAscii));
    }

    #[test]
    fn wrong_field_count_keeps_fields() {
        let err = decode(b"\x02DAT0.1/0/123\r").unwrap_err();
        assert_eq!(err.field_count(), Some(3));
        match err {
            ParseError::UnexpectedFieldCount { fields } => {
                assert_eq!(fields, vec!["0.1", "0", "123"]);
            }
            other => panic!("Unexpected error: {:?}", other),
        }
    }

    #[test]
    fn too_many_fields_is_malformed() {
        let err = decode(b"0/1/2/3/4/5/6/7/8/9/10/11/12/13/14\r").unwrap_err();
        assert_eq!(err.field_count(), Some(15));
    }

    #[test]
    fn bare_terminator_is_malformed_not_silent() {
        let err = decode(b"\r").unwrap_err();
        assert_eq!(err.field_count(), Some(1));
    }
}
