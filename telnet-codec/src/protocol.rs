//! # Telnet Protocol Constants and Types
//!
//! This module implements the core Telnet protocol vocabulary as defined in:
//! - **RFC 854**: Telnet Protocol Specification
//! - **RFC 855**: Telnet Option Specifications
//!
//! ## Key Concepts from RFC 854:
//!
//! ### IAC (Interpret As Command) - Byte 255
//! The IAC byte (255/0xFF) signals that the following bytes should be
//! interpreted as Telnet commands rather than data. Any data byte with value
//! 255 must be escaped as IAC IAC (255 255).
//!
//! ### Command Structure
//! Telnet commands follow the pattern: `IAC <command> [option]`
//! - For negotiation: `IAC WILL/WONT/DO/DONT <option>`
//! - For actions: `IAC <command>` (like IAC AYT for Are You There)
//!
//! ### Sub-negotiation Structure (RFC 855)
//! Sub-negotiations use: `IAC SB <option> <parameters...> IAC SE`.
//! Option bytes are carried as raw `u8` values throughout this crate, since
//! negotiation must answer *any* option code a peer throws at us, not only
//! the ones we recognize by name.

/// IAC - Interpret As Command (RFC 854, Section 4)
///
/// Indicates that the next byte(s) form a Telnet command sequence rather
/// than regular data. A data byte with value 255 is escaped as IAC IAC.
pub const IAC: u8 = 255;

/// Telnet Commands (RFC 854, Section 4)
///
/// These commands follow the IAC byte to indicate specific protocol
/// operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum TelnetCommand {
    /// End of subnegotiation parameters (RFC 855)
    /// Format: IAC SB <option> <data...> IAC SE
    SE = 240,

    /// No Operation - can be used as keepalive
    NOP = 241,

    /// Data Mark - position of a Synch event in the data stream
    DM = 242,

    /// Break - indicates Break or Attention signal
    BRK = 243,

    /// Interrupt Process - equivalent to Ctrl+C on many systems
    IP = 244,

    /// Abort Output - run to completion but discard output
    AO = 245,

    /// Are You There - request visible evidence the system is alive
    AYT = 246,

    /// Erase Character - delete the last character entered
    EC = 247,

    /// Erase Line - delete the current line being entered
    EL = 248,

    /// Go Ahead - half-duplex turn-taking, rarely used today
    GA = 249,

    /// Subnegotiation Begin (RFC 855)
    SB = 250,

    /// WILL - sender wants to enable an option on its side
    WILL = 251,

    /// WON'T - sender refuses or disables an option on its side
    WONT = 252,

    /// DO - sender wants receiver to enable an option
    DO = 253,

    /// DON'T - sender wants receiver to disable an option
    DONT = 254,
}

impl TelnetCommand {
    /// Convert a byte to a TelnetCommand if it represents a valid command
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            240 => Some(TelnetCommand::SE),
            241 => Some(TelnetCommand::NOP),
            242 => Some(TelnetCommand::DM),
            243 => Some(TelnetCommand::BRK),
            244 => Some(TelnetCommand::IP),
            245 => Some(TelnetCommand::AO),
            246 => Some(TelnetCommand::AYT),
            247 => Some(TelnetCommand::EC),
            248 => Some(TelnetCommand::EL),
            249 => Some(TelnetCommand::GA),
            250 => Some(TelnetCommand::SB),
            251 => Some(TelnetCommand::WILL),
            252 => Some(TelnetCommand::WONT),
            253 => Some(TelnetCommand::DO),
            254 => Some(TelnetCommand::DONT),
            _ => None,
        }
    }

    /// Convert command to its byte representation
    pub fn to_byte(self) -> u8 {
        self as u8
    }

    /// Check if this command is part of option negotiation
    ///
    /// Returns true for WILL, WONT, DO, DONT - the commands that must be
    /// followed by an option byte and feed the negotiation state machine.
    pub fn is_negotiation_command(self) -> bool {
        matches!(
            self,
            TelnetCommand::WILL | TelnetCommand::WONT | TelnetCommand::DO | TelnetCommand::DONT
        )
    }

    /// Check if this is a complete two-byte command (`IAC <cmd>`)
    ///
    /// These carry no option byte and are consumed without further input.
    /// SE is *not* in this set: outside a sub-negotiation a bare SE is a
    /// protocol violation.
    pub fn is_standalone(self) -> bool {
        matches!(
            self,
            TelnetCommand::NOP
                | TelnetCommand::DM
                | TelnetCommand::BRK
                | TelnetCommand::IP
                | TelnetCommand::AO
                | TelnetCommand::AYT
                | TelnetCommand::EC
                | TelnetCommand::EL
                | TelnetCommand::GA
        )
    }
}

/// Telnet options this crate knows by name
///
/// Only a handful of options are ever *accepted* (see the negotiation
/// module's allow-lists); everything else is refused on first sight. The
/// enum exists for readable dispatch and logging - option state itself is
/// keyed on the raw byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
#[allow(non_camel_case_types)] // Protocol constants traditionally use SCREAMING_SNAKE_CASE
pub enum TelnetOption {
    /// Binary Transmission (RFC 856)
    BINARY = 0,

    /// Echo (RFC 857) - controls which side echoes typed characters.
    /// Critical for password input.
    ECHO = 1,

    /// Suppress Go Ahead (RFC 858) - full-duplex operation
    SUPPRESS_GO_AHEAD = 3,

    /// Terminal Type (RFC 1091) - client reports its terminal type
    TERMINAL_TYPE = 24,

    /// Negotiate About Window Size (RFC 1073) - client reports columns/rows
    NAWS = 31,

    /// Linemode (RFC 1184)
    LINEMODE = 34,
}

impl TelnetOption {
    /// Convert a byte to a TelnetOption if it represents a known option
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(TelnetOption::BINARY),
            1 => Some(TelnetOption::ECHO),
            3 => Some(TelnetOption::SUPPRESS_GO_AHEAD),
            24 => Some(TelnetOption::TERMINAL_TYPE),
            31 => Some(TelnetOption::NAWS),
            34 => Some(TelnetOption::LINEMODE),
            _ => None,
        }
    }

    /// Convert option to its byte representation
    pub fn to_byte(self) -> u8 {
        self as u8
    }
}

/// Encode an option negotiation command: `IAC <command> <option>`
pub fn negotiation_bytes(command: TelnetCommand, option: u8) -> [u8; 3] {
    [IAC, command.to_byte(), option]
}

/// Encode a sub-negotiation block: `IAC SB <option> <data> IAC SE`
///
/// Data bytes with value 255 are escaped as IAC IAC per RFC 855.
pub fn subnegotiation_bytes(option: u8, data: &[u8]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(data.len() + 5);
    bytes.push(IAC);
    bytes.push(TelnetCommand::SB.to_byte());
    bytes.push(option);
    for &byte in data {
        if byte == IAC {
            bytes.push(IAC);
        }
        bytes.push(byte);
    }
    bytes.push(IAC);
    bytes.push(TelnetCommand::SE.to_byte());
    bytes
}
