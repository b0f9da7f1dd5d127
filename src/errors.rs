use std::fmt;

/// Custom error types for the seaport framework
#[derive(Debug)]
pub enum SeaportError {
    /// I/O related errors (sockets, file operations, etc.)
    Io(std::io::Error),

    /// Invalid data handed to a protocol or framework API
    InvalidInput(String),

    /// A wire-protocol contract was violated in a way we cannot recover from
    Protocol(String),

    /// A captured input handler reported failure while resuming
    HandlerFailed(String),

    /// Client disconnected unexpectedly
    ClientDisconnected,

    /// Configuration error
    Configuration(String),

    /// Process-handoff state could not be captured or restored
    Handoff(String),
}

impl fmt::Display for SeaportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SeaportError::Io(err) => write!(f, "I/O error: {}", err),
            SeaportError::InvalidInput(msg) => write!(f, "Invalid input: {}", msg),
            SeaportError::Protocol(msg) => write!(f, "Protocol error: {}", msg),
            SeaportError::HandlerFailed(msg) => write!(f, "Input handler failed: {}", msg),
            SeaportError::ClientDisconnected => write!(f, "Client disconnected"),
            SeaportError::Configuration(msg) => write!(f, "Configuration error: {}", msg),
            SeaportError::Handoff(msg) => write!(f, "Handoff error: {}", msg),
        }
    }
}

impl std::error::Error for SeaportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SeaportError::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for SeaportError {
    fn from(err: std::io::Error) -> Self {
        use std::io::ErrorKind;

        match err.kind() {
            ErrorKind::UnexpectedEof | ErrorKind::ConnectionReset | ErrorKind::ConnectionAborted => {
                SeaportError::ClientDisconnected
            }
            _ => SeaportError::Io(err),
        }
    }
}

impl From<crate::config::ConfigError> for SeaportError {
    fn from(err: crate::config::ConfigError) -> Self {
        SeaportError::Configuration(err.to_string())
    }
}

impl From<serde_json::Error> for SeaportError {
    fn from(err: serde_json::Error) -> Self {
        SeaportError::Handoff(err.to_string())
    }
}

/// Result type alias for seaport operations
pub type SeaportResult<T> = Result<T, SeaportError>;
