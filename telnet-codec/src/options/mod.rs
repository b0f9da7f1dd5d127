//! # Telnet Option Payload Helpers
//!
//! Sub-negotiation payload handling for the options this crate negotiates
//! remotely:
//!
//! ### Terminal Type (RFC 1091)
//! The peer reports its terminal name (`IS`) after we ask for it (`SEND`).
//!
//! ### NAWS - Negotiate About Window Size (RFC 1073)
//! The peer reports window dimensions as four big-endian payload bytes, on
//! enablement and again whenever the terminal is resized.
//!
//! Both parsers are strict about shape and loose about content: a malformed
//! payload is a recoverable error the caller logs and drops, never a reason
//! to close the connection.

pub mod naws;
pub mod terminal_type;

// Re-export main types for convenience
pub use naws::WindowSize;

/// Errors that can occur while interpreting option payloads
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OptionError {
    /// Payload does not have the shape the option's RFC requires
    InvalidData(String),
    /// First payload byte is not a qualifier we understand
    UnsupportedCommand(u8),
}

impl std::fmt::Display for OptionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OptionError::InvalidData(msg) => write!(f, "Invalid option data: {}", msg),
            OptionError::UnsupportedCommand(cmd) => write!(f, "Unsupported command: {}", cmd),
        }
    }
}

impl std::error::Error for OptionError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_option_error_display() {
        let error = OptionError::InvalidData("test".to_string());
        assert_eq!(error.to_string(), "Invalid option data: test");
        let error = OptionError::UnsupportedCommand(7);
        assert_eq!(error.to_string(), "Unsupported command: 7");
    }
}
