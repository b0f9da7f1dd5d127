//! # Process Handoff
//!
//! State containers for a zero-downtime restart. An external supervisor
//! asks the reactor to `serialize()`, passes the JSON blob and the raw
//! socket handles to a freshly exec'd process, and the new process calls
//! `restore()`. Clients keep their connections; negotiation state and
//! partial lines carry over with nothing renegotiated or dropped.
//!
//! Handle transfer is inherently platform-specific, so it lives behind
//! [`TransferableHandle`] and the rest of the crate never touches raw
//! descriptors directly. Only Unix is implemented; the handle survives
//! an `exec` as long as the supervisor clears `FD_CLOEXEC` on it.

use crate::errors::SeaportResult;
use crate::protocol::ProtocolState;
use crate::registry::ConnectionId;
use jiff::Timestamp;
use serde::{Deserialize, Serialize};
use std::io;
use std::net::SocketAddr;
#[cfg(unix)]
use std::os::fd::{AsRawFd, FromRawFd, RawFd};

/// An OS socket handle in a form that can cross a process boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferableHandle {
    raw: i64,
}

#[cfg(unix)]
impl TransferableHandle {
    /// Capture the handle of a live socket without closing it
    pub fn capture<T: AsRawFd>(source: &T) -> Self {
        Self {
            raw: source.as_raw_fd() as i64,
        }
    }

    pub fn raw_fd(&self) -> RawFd {
        self.raw as RawFd
    }

    /// Reclaim the handle as a non-blocking connection socket.
    ///
    /// Takes ownership of the descriptor; calling this twice on the same
    /// handle value is undefined, so each handle is reclaimed exactly once
    /// during `restore()`.
    pub fn into_stream(self) -> io::Result<mio::net::TcpStream> {
        let stream = unsafe { std::net::TcpStream::from_raw_fd(self.raw_fd()) };
        stream.set_nonblocking(true)?;
        Ok(mio::net::TcpStream::from_std(stream))
    }

    /// Reclaim the handle as a non-blocking listening socket
    pub fn into_listener(self) -> io::Result<mio::net::TcpListener> {
        let listener = unsafe { std::net::TcpListener::from_raw_fd(self.raw_fd()) };
        listener.set_nonblocking(true)?;
        Ok(mio::net::TcpListener::from_std(listener))
    }
}

/// Everything one connection needs to continue in another process
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionState {
    pub id: ConnectionId,
    pub peer_addr: SocketAddr,
    pub connected_at: Timestamp,
    pub last_active: Timestamp,
    pub is_connected: bool,
    pub is_closing: bool,
    pub recv_buffer: Vec<u8>,
    pub send_buffer: Vec<u8>,
    /// Decoded units awaiting dispatch (stranded by a handler failure)
    pub held_units: Vec<Vec<u8>>,
    pub protocol: ProtocolState,
    pub socket: TransferableHandle,
}

/// The reactor's full transferable state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReactorState {
    pub listener: TransferableHandle,
    pub next_id: ConnectionId,
    pub connections: Vec<ConnectionState>,
}

/// Encode reactor state as the JSON blob handed to the supervisor
pub fn encode(state: &ReactorState) -> SeaportResult<String> {
    Ok(serde_json::to_string(state)?)
}

/// Decode the JSON blob produced by [`encode`]
pub fn decode(blob: &str) -> SeaportResult<ReactorState> {
    Ok(serde_json::from_str(blob)?)
}
