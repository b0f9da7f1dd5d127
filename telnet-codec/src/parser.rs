//! # Telnet Stream Parser
//!
//! This module implements parsing of Telnet command sequences out of a raw
//! byte stream according to **RFC 854** (Telnet Protocol Specification).
//!
//! ## Key Concepts:
//!
//! ### IAC State Machine (RFC 854, Section 4)
//! - **Normal**: regular data bytes flow through untouched
//! - **SawIac**: previous byte was IAC (255); next byte selects the action
//! - **SawOption**: a WILL/WONT/DO/DONT is waiting for its option byte
//! - **SubNegotiation**: accumulating `IAC SB <option> ... IAC SE`
//!
//! ### Sequences:
//! - Simple: `IAC <command>` (e.g. IAC NOP) - consumed and surfaced as events
//! - Negotiation: `IAC <command> <option>` (e.g. IAC WILL ECHO)
//! - Sub-negotiation: `IAC SB <option> <data...> IAC SE`
//! - Escaped data: `IAC IAC` yields one literal 255 data byte, both in the
//!   normal stream and inside a sub-negotiation block
//!
//! The parser is deliberately forgiving: malformed sequences are logged and
//! dropped, never fatal, and the stream resynchronizes at the next byte.

use crate::protocol::{TelnetCommand, IAC};
use log::{debug, warn};
use serde::{Deserialize, Serialize};

/// Hard cap on the accumulated sub-negotiation payload.
///
/// A block that reaches this size without its `IAC SE` terminator is
/// considered runaway: the whole block is discarded and the parser returns
/// to the normal data state. None of the recognized sub-negotiations (a
/// terminal type name, four NAWS bytes) come anywhere near this limit.
pub const SUBNEG_MAX: usize = 64;

/// Parser state for IAC sequence detection
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
enum ParserState {
    /// Expecting normal data or an IAC byte
    #[default]
    Normal,
    /// Found IAC (255), expecting a command byte
    SawIac,
    /// Found a negotiation command, expecting its option byte
    SawOption(u8),
    /// Found IAC SB, expecting the sub-negotiation option byte
    SubNegStart,
    /// Accumulating sub-negotiation data until IAC SE
    SubNegotiation {
        option: u8,
        data: Vec<u8>,
        /// True if the last byte was IAC (SE or escape pending)
        saw_iac: bool,
    },
}

/// One parsed element of the inbound stream, in arrival order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TelnetEvent {
    /// Application data with all escapes resolved
    Data(Vec<u8>),
    /// A complete two-byte command (IAC NOP, IAC AYT, ...)
    Command(TelnetCommand),
    /// An option negotiation request or answer
    Negotiation { command: TelnetCommand, option: u8 },
    /// A complete sub-negotiation block (payload with escapes resolved)
    SubNegotiation { option: u8, data: Vec<u8> },
}

/// Serializable snapshot of the parser's mid-stream state
///
/// Captures an in-flight sub-negotiation (or a half-received command) so a
/// stream can be handed to another process between any two bytes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParserSnapshot {
    state: ParserState,
}

/// Stateful telnet parser; feed it chunks as they arrive off the wire
#[derive(Debug, Clone)]
pub struct TelnetParser {
    state: ParserState,
}

impl Default for TelnetParser {
    fn default() -> Self {
        Self::new()
    }
}

impl TelnetParser {
    /// Create a new parser in the initial data state
    pub fn new() -> Self {
        Self {
            state: ParserState::Normal,
        }
    }

    /// Parse a chunk of bytes into an ordered list of events
    ///
    /// May be called repeatedly with arbitrary chunks from a TCP stream;
    /// sequences split across chunks are completed on later calls. Data
    /// bytes preceding a command are flushed as a `Data` event before the
    /// command's own event, so relative ordering is preserved.
    pub fn parse(&mut self, input: &[u8]) -> Vec<TelnetEvent> {
        let mut events = Vec::new();
        let mut data = Vec::new();

        for &byte in input {
            match &mut self.state {
                ParserState::Normal => {
                    if byte == IAC {
                        if !data.is_empty() {
                            events.push(TelnetEvent::Data(std::mem::take(&mut data)));
                        }
                        self.state = ParserState::SawIac;
                    } else {
                        data.push(byte);
                    }
                }

                ParserState::SawIac => {
                    if byte == IAC {
                        // IAC IAC = escaped literal 255
                        data.push(IAC);
                        self.state = ParserState::Normal;
                    } else if byte == TelnetCommand::SB.to_byte() {
                        self.state = ParserState::SubNegStart;
                    } else {
                        match TelnetCommand::from_byte(byte) {
                            Some(command) if command.is_negotiation_command() => {
                                self.state = ParserState::SawOption(byte);
                            }
                            Some(command) if command.is_standalone() => {
                                events.push(TelnetEvent::Command(command));
                                self.state = ParserState::Normal;
                            }
                            _ => {
                                warn!("discarding unrecognized telnet command IAC {}", byte);
                                self.state = ParserState::Normal;
                            }
                        }
                    }
                }

                ParserState::SawOption(command_byte) => {
                    // from_byte cannot fail here; only negotiation command
                    // bytes enter this state
                    let command = TelnetCommand::from_byte(*command_byte)
                        .unwrap_or(TelnetCommand::NOP);
                    events.push(TelnetEvent::Negotiation {
                        command,
                        option: byte,
                    });
                    self.state = ParserState::Normal;
                }

                ParserState::SubNegStart => {
                    self.state = ParserState::SubNegotiation {
                        option: byte,
                        data: Vec::new(),
                        saw_iac: false,
                    };
                }

                ParserState::SubNegotiation {
                    option,
                    data: sub_data,
                    saw_iac,
                } => {
                    if *saw_iac {
                        if byte == TelnetCommand::SE.to_byte() {
                            events.push(TelnetEvent::SubNegotiation {
                                option: *option,
                                data: std::mem::take(sub_data),
                            });
                            self.state = ParserState::Normal;
                            continue;
                        } else if byte == IAC {
                            // IAC IAC inside the block = escaped literal 255
                            sub_data.push(IAC);
                            *saw_iac = false;
                        } else {
                            // IAC followed by neither SE nor IAC: drop the
                            // stray IAC and keep scanning for the terminator
                            debug!(
                                "stray IAC {} inside subnegotiation of option {}",
                                byte, option
                            );
                            sub_data.push(byte);
                            *saw_iac = false;
                        }
                    } else if byte == IAC {
                        *saw_iac = true;
                        continue;
                    } else {
                        sub_data.push(byte);
                    }

                    if sub_data.len() > SUBNEG_MAX {
                        warn!(
                            "runaway subnegotiation for option {} exceeded {} bytes, discarding",
                            option, SUBNEG_MAX
                        );
                        self.state = ParserState::Normal;
                    }
                }
            }
        }

        if !data.is_empty() {
            events.push(TelnetEvent::Data(data));
        }
        events
    }

    /// Check if the parser is mid-sequence (not in the plain data state)
    pub fn is_mid_sequence(&self) -> bool {
        !matches!(self.state, ParserState::Normal)
    }

    /// Reset parser to its initial state
    pub fn reset(&mut self) {
        self.state = ParserState::Normal;
    }

    /// Capture the current state for a process handoff
    pub fn snapshot(&self) -> ParserSnapshot {
        ParserSnapshot {
            state: self.state.clone(),
        }
    }

    /// Rebuild a parser from a snapshot
    pub fn from_snapshot(snapshot: ParserSnapshot) -> Self {
        Self {
            state: snapshot.state,
        }
    }
}
