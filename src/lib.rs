//! This crate provides an interface for monitoring and controlling Leybold COOLPAK 6000 helium
//! compressors over their RS-232/485 command interface, plus a watchdog that detects power state
//! changes between runs.
//!
//! The protocol is a short ASCII exchange: the host sends `STX` + command + `CR` and the unit
//! answers with one `/`-separated line.
//!
//! | Command | Meaning |
//! |---------|---------|
//! | `DAT`   | Status line (14 fields) |
//! | `SYS1`  | Switch on |
//! | `SYS0`  | Switch off |
//! | `ERR`   | Logged error codes |
//!
//! The serial port used for compressor comms should be configured like so:
//! * Baud rate: 4800
//! * Data bits: 8
//! * Stop bits: 1
//! * Parity: None
//! * No handshake
//!
//! The controller needs roughly 100 ms between a command and its reply, and only one command
//! may be in flight at a time.

pub mod client;
pub mod config;
pub mod error;
pub mod frame;
pub mod status;
pub mod tracker;
pub mod transport;
pub mod watchdog;

#[cfg(test)]
mod mock_serial;
