//! # Telnet Protocol
//!
//! The full RFC 854 server-side protocol: option negotiation (delegated to
//! `telnet-codec`) layered with line buffering. Decoded units are complete
//! lines with their terminators stripped.
//!
//! ## Line discipline
//!
//! - `CR LF` and `CR NUL` both normalize to a single newline (RFC 854's
//!   two legal encodings of end-of-line); a bare `LF` or stray `CR` is
//!   accepted as a newline as well, because real clients send both
//! - Input accumulates until a newline; over-long lines are dropped and the
//!   client is told once per overflow
//! - Outbound text gets `\n` expanded to `CR LF` and literal 255 bytes
//!   escaped as IAC IAC
//!
//! On connect the server asks for the peer's terminal type and window size
//! (`DO TERMINAL-TYPE`, `DO NAWS`); the answers land in `terminal_type`,
//! `columns` and `rows` as they arrive.

use super::{Protocol, ProtocolRead, ProtocolState};
use crate::errors::{SeaportError, SeaportResult};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use telnet_codec::options::{naws, terminal_type};
use telnet_codec::protocol::{negotiation_bytes, TelnetOption};
use telnet_codec::{
    NegotiationAction, NegotiatorSnapshot, ParserSnapshot, TelnetEvent, TelnetNegotiator,
    TelnetParser, IAC,
};

const CR: u8 = b'\r';
const LF: u8 = b'\n';
const NUL: u8 = 0;

/// Notice sent when a line outgrows the configured limit
const LINE_TOO_LONG: &str = "Line too long. Input discarded.\r\n";

/// Result of pushing one byte into the line buffer
enum Push {
    Pending,
    Line(Vec<u8>),
    Overflow,
}

/// Newline-normalizing input accumulator
#[derive(Debug, Default)]
struct LineBuffer {
    buf: Vec<u8>,
    saw_cr: bool,
    max_len: usize,
}

impl LineBuffer {
    fn new(max_len: usize) -> Self {
        Self {
            buf: Vec::new(),
            saw_cr: false,
            max_len,
        }
    }

    fn push(&mut self, byte: u8) -> Push {
        if self.saw_cr {
            self.saw_cr = false;
            // CR LF and CR NUL are both one newline; the CR already ended
            // the line, so swallow the second half and emit
            if byte == LF || byte == NUL {
                return Push::Line(std::mem::take(&mut self.buf));
            }
            // Stray CR also ends the line; the current byte starts the next
            let line = std::mem::take(&mut self.buf);
            let _ = self.push(byte);
            return Push::Line(line);
        }

        match byte {
            CR => {
                self.saw_cr = true;
                Push::Pending
            }
            LF => Push::Line(std::mem::take(&mut self.buf)),
            _ => {
                self.buf.push(byte);
                if self.max_len > 0 && self.buf.len() > self.max_len {
                    self.buf.clear();
                    Push::Overflow
                } else {
                    Push::Pending
                }
            }
        }
    }
}

/// Serializable telnet protocol state for a process handoff
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TelnetState {
    pub negotiator: NegotiatorSnapshot,
    pub parser: ParserSnapshot,
    pub line_buffer: Vec<u8>,
    pub line_saw_cr: bool,
    pub terminal_type: Option<String>,
    pub columns: u16,
    pub rows: u16,
    pub wrote_cr: bool,
}

/// RFC 854 telnet with option negotiation and line buffering
pub struct TelnetProtocol {
    parser: TelnetParser,
    negotiator: TelnetNegotiator,
    line: LineBuffer,
    terminal_type: Option<String>,
    columns: u16,
    rows: u16,
    /// True when the last encoded output byte was CR, so a LF arriving in
    /// the next chunk or call is not expanded into a second CR
    wrote_cr: bool,
}

impl TelnetProtocol {
    pub fn new(max_line_length: usize) -> Self {
        Self {
            parser: TelnetParser::new(),
            negotiator: TelnetNegotiator::new(),
            line: LineBuffer::new(max_line_length),
            terminal_type: None,
            columns: 0,
            rows: 0,
            wrote_cr: false,
        }
    }

    /// Whether we are currently negotiated to echo for the peer
    pub fn echo_enabled(&self) -> bool {
        self.negotiator.echo_enabled()
    }

    /// Terminal name reported by the peer, if any
    pub fn terminal_type(&self) -> Option<&str> {
        self.terminal_type.as_deref()
    }

    /// Window dimensions reported by the peer (0 until NAWS arrives)
    pub fn window_size(&self) -> (u16, u16) {
        (self.columns, self.rows)
    }

    fn handle_subnegotiation(&mut self, option: u8, data: &[u8]) {
        if option == TelnetOption::TERMINAL_TYPE.to_byte() {
            match terminal_type::parse_is(data) {
                Ok(name) => {
                    info!("peer terminal type: {}", name);
                    self.terminal_type = Some(name);
                }
                Err(e) => warn!("bad terminal-type subnegotiation: {}", e),
            }
        } else if option == TelnetOption::NAWS.to_byte() {
            match naws::parse(data) {
                Ok(size) => {
                    debug!("peer window size: {}x{}", size.columns, size.rows);
                    self.columns = size.columns;
                    self.rows = size.rows;
                }
                Err(e) => warn!("bad NAWS subnegotiation: {}", e),
            }
        } else {
            debug!("ignoring subnegotiation for option {}", option);
        }
    }

    /// Escape and newline-expand one outbound chunk
    fn encode_into(&mut self, out: &mut Vec<u8>, chunk: &[u8]) {
        for &byte in chunk {
            match byte {
                IAC => {
                    out.push(IAC);
                    out.push(IAC);
                }
                LF if !self.wrote_cr => {
                    out.push(CR);
                    out.push(LF);
                }
                _ => out.push(byte),
            }
            self.wrote_cr = byte == CR;
        }
    }
}

impl Protocol for TelnetProtocol {
    fn name(&self) -> &'static str {
        "telnet"
    }

    fn connect(&mut self) -> Vec<u8> {
        // Ask the peer for its terminal type and window size up front;
        // pending is set before the bytes exist so the answers resolve
        let mut out = Vec::new();
        for option in [TelnetOption::TERMINAL_TYPE, TelnetOption::NAWS] {
            if let Some(NegotiationAction::Reply { command, option }) =
                self.negotiator.request_remote_enable(option.to_byte())
            {
                out.extend_from_slice(&negotiation_bytes(command, option));
            }
        }
        out
    }

    fn read(&mut self, input: &[u8]) -> SeaportResult<ProtocolRead> {
        let mut result = ProtocolRead::default();

        for event in self.parser.parse(input) {
            match event {
                TelnetEvent::Data(bytes) => {
                    for byte in bytes {
                        match self.line.push(byte) {
                            Push::Pending => {}
                            Push::Line(line) => result.units.push(line),
                            Push::Overflow => {
                                warn!("input line exceeded limit, discarding");
                                self.encode_into(&mut result.reply, LINE_TOO_LONG.as_bytes());
                            }
                        }
                    }
                }
                TelnetEvent::Command(command) => {
                    debug!("consumed telnet command {:?}", command);
                }
                TelnetEvent::Negotiation { command, option } => {
                    for action in self.negotiator.handle(command, option) {
                        match action {
                            NegotiationAction::Reply { command, option } => {
                                result
                                    .reply
                                    .extend_from_slice(&negotiation_bytes(command, option));
                            }
                            NegotiationAction::RequestTerminalType => {
                                result.reply.extend_from_slice(&terminal_type::send_request());
                            }
                        }
                    }
                }
                TelnetEvent::SubNegotiation { option, data } => {
                    self.handle_subnegotiation(option, &data);
                }
            }
        }

        Ok(result)
    }

    fn write(&mut self, chunks: &[&[u8]]) -> SeaportResult<Vec<u8>> {
        let mut out = Vec::new();
        for chunk in chunks {
            self.encode_into(&mut out, chunk);
        }
        Ok(out)
    }

    fn snapshot(&self) -> ProtocolState {
        ProtocolState::Telnet(TelnetState {
            negotiator: self.negotiator.snapshot(),
            parser: self.parser.snapshot(),
            line_buffer: self.line.buf.clone(),
            line_saw_cr: self.line.saw_cr,
            terminal_type: self.terminal_type.clone(),
            columns: self.columns,
            rows: self.rows,
            wrote_cr: self.wrote_cr,
        })
    }

    fn restore(&mut self, state: ProtocolState) -> SeaportResult<()> {
        let ProtocolState::Telnet(state) = state else {
            return Err(SeaportError::InvalidInput(
                "cannot restore non-telnet state into the telnet protocol".to_string(),
            ));
        };
        self.negotiator = TelnetNegotiator::from_snapshot(state.negotiator);
        self.parser = TelnetParser::from_snapshot(state.parser);
        self.line.buf = state.line_buffer;
        self.line.saw_cr = state.line_saw_cr;
        self.terminal_type = state.terminal_type;
        self.columns = state.columns;
        self.rows = state.rows;
        self.wrote_cr = state.wrote_cr;
        Ok(())
    }
}
