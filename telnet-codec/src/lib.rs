//! # Telnet Codec
//!
//! A library implementing the wire-level half of the Telnet protocol as
//! defined in:
//! - RFC 854: Telnet Protocol Specification (https://tools.ietf.org/html/rfc854)
//! - RFC 857: Telnet Echo Option
//! - RFC 1073: Telnet Window Size Option (NAWS)
//! - RFC 1091: Telnet Terminal-Type Option
//!
//! This library is designed to be:
//! - **I/O-free**: bytes in, events and reply bytes out; callers own sockets
//! - **Incremental**: command sequences may arrive split across any number
//!   of reads and the parser picks up where it left off
//! - **Snapshot-friendly**: the full negotiation state can be captured and
//!   restored, so a connection survives a process handoff mid-negotiation
//!
//! ## Architecture Overview
//!
//! The library is organized into several modules:
//! - `protocol`: Telnet protocol constants and types (RFC 854)
//! - `parser`: stateful IAC sequence detection over a byte stream
//! - `negotiation`: per-option negotiation state and reply policy
//! - `options`: payload helpers for Terminal Type and NAWS

pub mod negotiation;
pub mod options;
pub mod parser;
pub mod protocol;

// Re-export main types for convenience
pub use negotiation::{NegotiationAction, NegotiatorSnapshot, OptionState, OptionStatus, TelnetNegotiator};
pub use options::{naws::WindowSize, OptionError};
pub use parser::{ParserSnapshot, TelnetEvent, TelnetParser, SUBNEG_MAX};
pub use protocol::{TelnetCommand, TelnetOption, IAC};

/// Library version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_available() {
        assert!(!VERSION.is_empty());
    }
}
