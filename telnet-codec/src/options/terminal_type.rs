//! # Terminal Type Payload Handling (RFC 1091)
//!
//! The Terminal Type option lets the server learn what kind of terminal the
//! client is driving, so output can be adapted to its capabilities.
//!
//! ## Sub-negotiation Protocol
//!
//! ### Query (server to client)
//! ```text
//! IAC SB TERMINAL-TYPE SEND IAC SE
//! ```
//!
//! ### Response (client to server)
//! ```text
//! IAC SB TERMINAL-TYPE IS <terminal-type-string> IAC SE
//! ```
//!
//! Terminal names are case-insensitive NVT ASCII; they are normalized to
//! upper case here ("xterm-256color" and "XTERM-256COLOR" are the same
//! terminal).

use super::OptionError;
use crate::protocol::{subnegotiation_bytes, TelnetOption};

/// Qualifier byte: payload carries the terminal name
pub const IS: u8 = 0;
/// Qualifier byte: request that the peer send its terminal name
pub const SEND: u8 = 1;

/// Build the `IAC SB TERMINAL-TYPE SEND IAC SE` query
pub fn send_request() -> Vec<u8> {
    subnegotiation_bytes(TelnetOption::TERMINAL_TYPE.to_byte(), &[SEND])
}

/// Parse an `IS <name>` response payload into the terminal name
pub fn parse_is(data: &[u8]) -> Result<String, OptionError> {
    let (&qualifier, name) = data
        .split_first()
        .ok_or_else(|| OptionError::InvalidData("empty terminal-type payload".to_string()))?;

    if qualifier != IS {
        return Err(OptionError::UnsupportedCommand(qualifier));
    }

    let name = String::from_utf8_lossy(name).trim().to_uppercase();
    if name.is_empty() {
        return Err(OptionError::InvalidData(
            "terminal-type IS with empty name".to_string(),
        ));
    }
    Ok(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_send_request_bytes() {
        // IAC SB TERMINAL-TYPE SEND IAC SE
        assert_eq!(send_request(), vec![255, 250, 24, 1, 255, 240]);
    }

    #[test]
    fn test_parse_is_response() {
        let mut payload = vec![IS];
        payload.extend(b"xterm-256color");
        assert_eq!(parse_is(&payload).unwrap(), "XTERM-256COLOR");
    }

    #[test]
    fn test_parse_rejects_empty_payload() {
        assert!(parse_is(&[]).is_err());
    }

    #[test]
    fn test_parse_rejects_send_qualifier() {
        // A client must answer IS, not echo our SEND back
        assert_eq!(
            parse_is(&[SEND, b'A']),
            Err(OptionError::UnsupportedCommand(SEND))
        );
    }

    #[test]
    fn test_parse_rejects_empty_name() {
        assert!(parse_is(&[IS]).is_err());
        assert!(parse_is(&[IS, b' ', b' ']).is_err());
    }
}
