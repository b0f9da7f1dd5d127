//! # NAWS Payload Handling (RFC 1073)
//!
//! The Negotiate About Window Size option lets the client report its
//! terminal dimensions so the server can format output to fit.
//!
//! ## Sub-negotiation Protocol
//!
//! ```text
//! IAC SB NAWS <width-high> <width-low> <height-high> <height-low> IAC SE
//! ```
//!
//! Width and height are 16-bit values in network byte order (big-endian).
//! A value of 0 means "unknown". The payload is exactly 4 bytes - anything
//! else is malformed and must be ignored, not acted on.

use super::OptionError;

/// Terminal window dimensions reported by the peer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowSize {
    /// Terminal width in characters
    pub columns: u16,
    /// Terminal height in lines
    pub rows: u16,
}

/// Parse a NAWS sub-negotiation payload
///
/// The payload must be exactly 4 bytes: `<w-hi> <w-lo> <h-hi> <h-lo>`.
pub fn parse(data: &[u8]) -> Result<WindowSize, OptionError> {
    if data.len() != 4 {
        return Err(OptionError::InvalidData(format!(
            "NAWS payload must be exactly 4 bytes, got {}",
            data.len()
        )));
    }

    let columns = u16::from_be_bytes([data[0], data[1]]);
    let rows = u16::from_be_bytes([data[2], data[3]]);

    Ok(WindowSize { columns, rows })
}

/// Encode window dimensions as a NAWS payload
pub fn encode(size: WindowSize) -> [u8; 4] {
    let [w_hi, w_lo] = size.columns.to_be_bytes();
    let [h_hi, h_lo] = size.rows.to_be_bytes();
    [w_hi, w_lo, h_hi, h_lo]
}
