//! # Connection
//!
//! One accepted client socket with its buffers, lifecycle flags, exactly
//! one wire protocol instance, and at most one attached input handler.
//!
//! Lifecycle: CONNECTED, then either CLOSING (close requested with output
//! still queued; delivery continues until the send buffer drains) or
//! straight to closed on a socket error. `is_connected = false` means the
//! reactor reaps the connection on its next sweep, fires Disconnect, and
//! releases the socket.
//!
//! An optional grace window gates the very first bytes: until it elapses,
//! input is checked verbatim against a legacy cross-domain policy request.
//! A match queues the policy document and closes; anything else waits in
//! the receive buffer and goes through the protocol when the window ends.

use crate::config::SeaportConfig;
use crate::errors::SeaportResult;
use crate::handler::{HandlerStep, InputHandler};
#[cfg(unix)]
use crate::handoff::{ConnectionState, TransferableHandle};
use crate::protocol::Protocol;
#[cfg(unix)]
use crate::protocol::ProtocolTable;
use crate::registry::ConnectionId;
use jiff::Timestamp;
use log::{debug, warn};
use mio::net::TcpStream;
use mio::{Interest, Token};
use std::collections::VecDeque;
use std::io::{self, Read, Write};
use std::net::SocketAddr;
use std::time::Duration;

/// Write as much of `buffer` as the sink accepts right now; a short write
/// leaves the remainder in place, in order
pub(crate) fn drain_into<W: Write>(sink: &mut W, buffer: &mut Vec<u8>) -> io::Result<usize> {
    let mut written = 0;
    while written < buffer.len() {
        match sink.write(&buffer[written..]) {
            Ok(0) => return Err(io::ErrorKind::WriteZero.into()),
            Ok(n) => written += n,
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    buffer.drain(..written);
    Ok(written)
}

pub struct Connection {
    id: ConnectionId,
    socket: TcpStream,
    peer_addr: SocketAddr,
    connected_at: Timestamp,
    last_active: Timestamp,
    recv_buffer: Vec<u8>,
    send_buffer: Vec<u8>,
    /// Decoded units not yet dispatched (stranded by a handler failure);
    /// they lead the next delivery so no input is ever dropped
    held_units: Vec<Vec<u8>>,
    is_connected: bool,
    is_closing: bool,
    protocol: Box<dyn Protocol>,
    handler: Option<Box<dyn InputHandler>>,
    in_grace: bool,
    grace_window: Duration,
    policy_request: String,
    policy_response: String,
    registered: bool,
}

impl Connection {
    pub fn new(
        id: ConnectionId,
        socket: TcpStream,
        peer_addr: SocketAddr,
        mut protocol: Box<dyn Protocol>,
        config: &SeaportConfig,
    ) -> Self {
        let now = Timestamp::now();
        let handshake = protocol.connect();
        Self {
            id,
            socket,
            peer_addr,
            connected_at: now,
            last_active: now,
            recv_buffer: Vec::new(),
            send_buffer: handshake,
            held_units: Vec::new(),
            is_connected: true,
            is_closing: false,
            protocol,
            handler: None,
            in_grace: !config.timeouts.grace_window.is_zero(),
            grace_window: config.timeouts.grace_window,
            policy_request: config.policy.request.clone(),
            policy_response: config.policy.response.clone(),
            registered: false,
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    pub fn is_connected(&self) -> bool {
        self.is_connected
    }

    pub fn is_closing(&self) -> bool {
        self.is_closing
    }

    pub fn protocol(&self) -> &dyn Protocol {
        self.protocol.as_ref()
    }

    /// Bytes queued but not yet written to the socket
    pub fn pending_send(&self) -> &[u8] {
        &self.send_buffer
    }

    pub fn has_handler(&self) -> bool {
        self.handler.is_some()
    }

    /// Attach an input handler; decoded units feed it instead of the bus
    /// until it reports completion
    pub fn attach_handler(&mut self, mut handler: Box<dyn InputHandler>) {
        handler.begin(self);
        self.handler = Some(handler);
    }

    /// Encode `data` through the protocol and queue it for sending
    pub fn send(&mut self, data: &[u8]) -> SeaportResult<()> {
        let encoded = self.protocol.write(&[data])?;
        self.send_buffer.extend_from_slice(&encoded);
        Ok(())
    }

    /// Queue a text string, logging instead of failing on encode errors
    pub fn send_text(&mut self, text: &str) {
        if let Err(e) = self.send(text.as_bytes()) {
            warn!("connection {}: dropping outbound text: {}", self.id, e);
        }
    }

    /// Drain the socket of everything readable right now.
    ///
    /// Returns the bytes read and whether the peer closed its end.
    pub fn read_ready(&mut self, recv_size: usize) -> io::Result<(Vec<u8>, bool)> {
        let mut out = Vec::new();
        let mut chunk = vec![0u8; recv_size.max(1)];
        loop {
            match self.socket.read(&mut chunk) {
                Ok(0) => return Ok((out, true)),
                Ok(n) => out.extend_from_slice(&chunk[..n]),
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        Ok((out, false))
    }

    /// Process received bytes, returning the decoded units to publish.
    ///
    /// Units consumed by an attached handler are not returned. During the
    /// grace window nothing is decoded; bytes wait for the policy check.
    pub fn receive(&mut self, bytes: &[u8], now: Timestamp) -> SeaportResult<Vec<Vec<u8>>> {
        self.last_active = now;

        if self.in_grace {
            if !self.grace_elapsed(now) {
                self.recv_buffer.extend_from_slice(bytes);
                self.check_policy_request();
                return Ok(Vec::new());
            }
            // Window just elapsed; fold the held bytes into this read
            self.in_grace = false;
            let mut held = std::mem::take(&mut self.recv_buffer);
            held.extend_from_slice(bytes);
            return self.decode(&held);
        }

        self.decode(bytes)
    }

    /// Grace-window bookkeeping with no socket activity.
    ///
    /// Returns units decoded from bytes that were held during the window.
    pub fn poll_grace(&mut self, now: Timestamp) -> SeaportResult<Vec<Vec<u8>>> {
        if !self.in_grace || !self.grace_elapsed(now) {
            return Ok(Vec::new());
        }
        self.in_grace = false;
        let held = std::mem::take(&mut self.recv_buffer);
        if held.is_empty() {
            return Ok(Vec::new());
        }
        self.decode(&held)
    }

    fn grace_elapsed(&self, now: Timestamp) -> bool {
        now.duration_since(self.connected_at).as_secs_f64() >= self.grace_window.as_secs_f64()
    }

    fn check_policy_request(&mut self) {
        let held = String::from_utf8_lossy(&self.recv_buffer);
        if held.trim_end_matches(['\0', '\r', '\n', ' ', '\t']) == self.policy_request {
            debug!("connection {}: answering cross-domain policy request", self.id);
            // The policy document goes out verbatim, no protocol encoding
            self.send_buffer
                .extend_from_slice(self.policy_response.as_bytes());
            self.recv_buffer.clear();
            self.in_grace = false;
            self.close();
        }
    }

    fn decode(&mut self, bytes: &[u8]) -> SeaportResult<Vec<Vec<u8>>> {
        let result = self.protocol.read(bytes)?;
        self.send_buffer.extend_from_slice(&result.reply);
        self.deliver(result.units)
    }

    /// Route units through the attached handler, if any.
    ///
    /// A handler failure detaches the handler and surfaces the error, but
    /// loses no input: every unit not consumed by the failing resume is
    /// held and leads the next delivery.
    fn deliver(&mut self, units: Vec<Vec<u8>>) -> SeaportResult<Vec<Vec<u8>>> {
        let mut queue: VecDeque<Vec<u8>> = std::mem::take(&mut self.held_units)
            .into_iter()
            .chain(units)
            .collect();
        let mut published = Vec::new();
        while let Some(unit) = queue.pop_front() {
            match self.handler.take() {
                None => published.push(unit),
                Some(mut handler) => match handler.resume(self, &unit) {
                    HandlerStep::Continue => self.handler = Some(handler),
                    HandlerStep::Done => {}
                    HandlerStep::Failed(e) => {
                        self.held_units = published;
                        self.held_units.extend(queue);
                        return Err(e);
                    }
                },
            }
        }
        Ok(published)
    }

    /// Write as much pending output as the socket accepts.
    ///
    /// A drained buffer on a closing connection releases the connection.
    pub fn flush(&mut self) -> io::Result<()> {
        let written = drain_into(&mut self.socket, &mut self.send_buffer)?;
        if written > 0 && self.is_closing {
            // Drain progress counts as activity, so a slow but live peer
            // is not cut off mid-goodbye by the idle timeout
            self.last_active = Timestamp::now();
        }
        if self.send_buffer.is_empty() && self.is_closing {
            self.finalize();
        }
        Ok(())
    }

    /// Soft close: queued output still goes out before the socket is
    /// released
    pub fn close(&mut self) {
        if self.send_buffer.is_empty() {
            self.finalize();
        } else {
            self.is_closing = true;
        }
    }

    /// Hard close: the reactor reaps this connection on its next sweep
    pub fn mark_disconnected(&mut self) {
        self.finalize();
    }

    fn finalize(&mut self) {
        self.is_connected = false;
        self.is_closing = false;
    }

    /// True when the idle timeout is set and strictly exceeded
    pub fn idle_expired(&self, now: Timestamp, timeout: Duration) -> bool {
        if timeout.is_zero() {
            return false;
        }
        now.duration_since(self.last_active).as_secs_f64() > timeout.as_secs_f64()
    }

    /// (Re)register this socket with the poll registry, asking for write
    /// readiness only while output is pending
    pub fn register_interest(&mut self, registry: &mio::Registry, token: Token) -> io::Result<()> {
        let interest = if self.send_buffer.is_empty() {
            Interest::READABLE
        } else {
            Interest::READABLE | Interest::WRITABLE
        };
        if self.registered {
            registry.reregister(&mut self.socket, token, interest)
        } else {
            registry.register(&mut self.socket, token, interest)?;
            self.registered = true;
            Ok(())
        }
    }

    pub fn deregister(&mut self, registry: &mio::Registry) -> io::Result<()> {
        if self.registered {
            self.registered = false;
            registry.deregister(&mut self.socket)?;
        }
        Ok(())
    }

    /// Capture this connection's transferable state, or `None` when an
    /// attached handler makes it non-transferable
    #[cfg(unix)]
    pub fn serialize(&self) -> Option<ConnectionState> {
        if self.handler.is_some() {
            return None;
        }
        Some(ConnectionState {
            id: self.id,
            peer_addr: self.peer_addr,
            connected_at: self.connected_at,
            last_active: self.last_active,
            is_connected: self.is_connected,
            is_closing: self.is_closing,
            recv_buffer: self.recv_buffer.clone(),
            send_buffer: self.send_buffer.clone(),
            held_units: self.held_units.clone(),
            protocol: self.protocol.snapshot(),
            socket: TransferableHandle::capture(&self.socket),
        })
    }

    /// Rebuild a connection in a new process from its serialized state
    #[cfg(unix)]
    pub fn restore(
        state: ConnectionState,
        protocols: &ProtocolTable,
        config: &SeaportConfig,
    ) -> SeaportResult<Self> {
        let socket = state.socket.into_stream()?;
        let protocol = protocols.rebuild(state.protocol, config)?;
        Ok(Self {
            id: state.id,
            socket,
            peer_addr: state.peer_addr,
            connected_at: state.connected_at,
            last_active: state.last_active,
            recv_buffer: state.recv_buffer,
            send_buffer: state.send_buffer,
            held_units: state.held_units,
            is_connected: state.is_connected,
            is_closing: state.is_closing,
            protocol,
            handler: None,
            // The grace window belongs to a connection's first moments,
            // never to one old enough to have been handed off
            in_grace: false,
            grace_window: config.timeouts.grace_window,
            policy_request: config.policy.request.clone(),
            policy_response: config.policy.response.clone(),
            registered: false,
        })
    }
}
