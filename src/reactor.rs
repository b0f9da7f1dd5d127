//! # Reactor
//!
//! The single-threaded, non-blocking multiplex loop. One thread owns the
//! listening socket, every live [`Connection`], the poll instance, and the
//! event bus; nothing in here is shared across threads, so there is no
//! locking anywhere in the core.
//!
//! Each iteration runs in a fixed order: sweep (grace windows, idle
//! timeouts, reaping dead connections, interest registration), a bounded
//! readiness wait, the periodic tick hook, all reads, event dispatch, then
//! all writes. Timeouts resolve before new reads, and reads resolve before
//! writes, so input drives output within the same tick.
//!
//! `suspend()` pauses the loop with every connection and registration kept
//! intact; `listen()` picks up where it left off. `shutdown()` closes
//! everything for good.

use crate::config::SeaportConfig;
use crate::connection::Connection;
use crate::errors::{SeaportError, SeaportResult};
use crate::events::{EventBus, SessionEvent};
#[cfg(unix)]
use crate::handoff::{self, ReactorState, TransferableHandle};
use crate::protocol::ProtocolTable;
use crate::registry::{ConnectionId, ConnectionRegistry};
use jiff::Timestamp;
use log::{debug, info, warn};
use mio::net::TcpListener;
use mio::{Events, Interest, Poll, Token};
use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Poll token reserved for the listening socket
const LISTENER: Token = Token(0);

const IDLE_NOTICE: &str = "Idle timeout: closing connection.\n";
const RESTART_NOTICE: &str = "Server restarting, please reconnect.\n";

/// Thread-safe control surface for a running reactor
#[derive(Clone)]
pub struct ReactorHandle {
    running: Arc<AtomicBool>,
}

impl ReactorHandle {
    /// Stop iterating after the current tick; connections stay intact
    pub fn suspend(&self) {
        self.running.store(false, Ordering::Relaxed);
    }
}

pub struct Reactor {
    config: SeaportConfig,
    poll: Poll,
    events: Events,
    listener: Option<TcpListener>,
    registry: ConnectionRegistry,
    bus: EventBus,
    protocols: ProtocolTable,
    running: Arc<AtomicBool>,
    next_token: usize,
    next_id: ConnectionId,
    tick: Option<Box<dyn FnMut()>>,
}

impl Reactor {
    pub fn new(config: SeaportConfig, protocols: ProtocolTable) -> SeaportResult<Self> {
        Ok(Self {
            config,
            poll: Poll::new()?,
            events: Events::with_capacity(256),
            listener: None,
            registry: ConnectionRegistry::new(),
            bus: EventBus::new(),
            protocols,
            running: Arc::new(AtomicBool::new(false)),
            next_token: 1,
            next_id: 1,
            tick: None,
        })
    }

    /// Register service handlers here before calling `listen()`
    pub fn bus_mut(&mut self) -> &mut EventBus {
        &mut self.bus
    }

    pub fn connections(&self) -> &ConnectionRegistry {
        &self.registry
    }

    pub fn handle(&self) -> ReactorHandle {
        ReactorHandle {
            running: Arc::clone(&self.running),
        }
    }

    /// Install the periodic hook, invoked exactly once per iteration
    pub fn on_tick(&mut self, hook: Box<dyn FnMut()>) {
        self.tick = Some(hook);
    }

    /// Bind the listening socket, returning the bound address
    pub fn bind(&mut self) -> SeaportResult<SocketAddr> {
        let requested: SocketAddr = format!(
            "{}:{}",
            self.config.server.bind_address, self.config.server.port
        )
        .parse()
        .map_err(|_| {
            SeaportError::Configuration(format!(
                "invalid bind address '{}:{}'",
                self.config.server.bind_address, self.config.server.port
            ))
        })?;

        let mut listener = TcpListener::bind(requested)?;
        self.poll
            .registry()
            .register(&mut listener, LISTENER, Interest::READABLE)?;
        let local = listener.local_addr()?;
        self.listener = Some(listener);
        info!(
            "listening on {} ({} mode)",
            local,
            self.config.server.mode.name()
        );
        Ok(local)
    }

    /// Run the loop until suspended or shut down
    pub fn listen(&mut self) -> SeaportResult<()> {
        if self.listener.is_none() {
            self.bind()?;
        }
        self.running.store(true, Ordering::Relaxed);
        while self.running.load(Ordering::Relaxed) {
            self.iterate()?;
        }
        info!("reactor suspended, {} connections held", self.registry.len());
        Ok(())
    }

    /// One full tick of the loop; public so embedders and tests can drive
    /// the reactor manually
    pub fn iterate(&mut self) -> SeaportResult<()> {
        self.sweep();

        let timeout = self.config.timeouts.poll_interval;
        if let Err(e) = self.poll.poll(&mut self.events, Some(timeout)) {
            if e.kind() != io::ErrorKind::Interrupted {
                warn!("readiness wait failed: {}", e);
            }
        }

        if let Some(hook) = self.tick.as_mut() {
            hook();
        }

        let ready: Vec<(Token, bool)> = self
            .events
            .iter()
            .map(|event| (event.token(), event.is_readable()))
            .collect();

        let now = Timestamp::now();
        let mut connects = Vec::new();
        let mut received = Vec::new();
        for (token, readable) in ready {
            if !readable {
                continue;
            }
            if token == LISTENER {
                self.accept_ready(&mut connects);
            } else {
                self.read_ready(token, now, &mut received);
            }
        }

        for id in connects {
            self.dispatch(id, SessionEvent::Connect);
        }
        for (id, unit) in received {
            self.dispatch(id, SessionEvent::Receive(unit));
        }

        self.write_pending();
        Ok(())
    }

    pub fn suspend(&mut self) {
        self.running.store(false, Ordering::Relaxed);
    }

    /// Close the listening socket and every connection, firing Disconnect
    /// for each
    pub fn shutdown(&mut self) {
        info!("shutting down, closing {} connections", self.registry.len());
        self.running.store(false, Ordering::Relaxed);
        for token in self.registry.tokens_rev() {
            if let Some(conn) = self.registry.get_mut(token) {
                conn.mark_disconnected();
            }
            self.reap(token);
        }
        self.listener = None;
    }

    /// Timeouts and cleanup, resolved before any new I/O
    fn sweep(&mut self) {
        let now = Timestamp::now();
        let idle_timeout = self.config.timeouts.idle_timeout;
        let mut grace_units = Vec::new();
        let mut gone = Vec::new();

        for token in self.registry.tokens_rev() {
            let Some(conn) = self.registry.get_mut(token) else {
                continue;
            };
            let id = conn.id();

            match conn.poll_grace(now) {
                Ok(units) => grace_units.extend(units.into_iter().map(|u| (id, u))),
                Err(e) => warn!("connection {}: {}", id, e),
            }

            if conn.is_connected() && conn.idle_expired(now, idle_timeout) {
                if conn.is_closing() {
                    // Already told to go and the peer stopped draining our
                    // output; stop waiting for it
                    info!("connection {} stalled while closing", id);
                    conn.mark_disconnected();
                } else {
                    info!("connection {} idle timeout", id);
                    conn.send_text(IDLE_NOTICE);
                    conn.close();
                }
            }

            if !conn.is_connected() {
                gone.push(token);
                continue;
            }

            if let Err(e) = conn.register_interest(self.poll.registry(), token) {
                warn!("connection {}: registration failed: {}", id, e);
                conn.mark_disconnected();
                gone.push(token);
            }
        }

        for token in gone {
            self.reap(token);
        }
        for (id, unit) in grace_units {
            self.dispatch(id, SessionEvent::Receive(unit));
        }
    }

    fn accept_ready(&mut self, connects: &mut Vec<ConnectionId>) {
        loop {
            let Some(listener) = self.listener.as_ref() else {
                return;
            };
            match listener.accept() {
                Ok((socket, peer_addr)) => {
                    let protocol = match self
                        .protocols
                        .build(self.config.server.mode.name(), &self.config)
                    {
                        Ok(protocol) => protocol,
                        Err(e) => {
                            warn!("rejecting {}: {}", peer_addr, e);
                            continue;
                        }
                    };

                    let token = Token(self.next_token);
                    self.next_token += 1;
                    let id = self.next_id;
                    self.next_id += 1;

                    let mut conn = Connection::new(id, socket, peer_addr, protocol, &self.config);
                    if let Err(e) = conn.register_interest(self.poll.registry(), token) {
                        warn!("connection {}: registration failed: {}", id, e);
                        continue;
                    }
                    info!("connection {} accepted from {}", id, peer_addr);
                    self.registry.insert(token, conn);
                    connects.push(id);
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    // Transient accept failures never stop the loop
                    warn!("accept failed: {}", e);
                    break;
                }
            }
        }
    }

    fn read_ready(&mut self, token: Token, now: Timestamp, received: &mut Vec<(ConnectionId, Vec<u8>)>) {
        let recv_size = self.config.buffers.recv_buffer_size;
        let Some(conn) = self.registry.get_mut(token) else {
            return;
        };
        let id = conn.id();

        match conn.read_ready(recv_size) {
            Ok((bytes, eof)) => {
                if !bytes.is_empty() {
                    match conn.receive(&bytes, now) {
                        Ok(units) => received.extend(units.into_iter().map(|u| (id, u))),
                        Err(SeaportError::ClientDisconnected) => conn.mark_disconnected(),
                        Err(e) => warn!("connection {}: {}", id, e),
                    }
                }
                if eof {
                    debug!("connection {} closed by peer", id);
                    conn.mark_disconnected();
                }
            }
            Err(e) => {
                debug!("connection {} read error: {}", id, e);
                conn.mark_disconnected();
            }
        }
    }

    fn write_pending(&mut self) {
        for token in self.registry.tokens_rev() {
            let Some(conn) = self.registry.get_mut(token) else {
                continue;
            };
            if conn.pending_send().is_empty() {
                continue;
            }
            if let Err(e) = conn.flush() {
                debug!("connection {} write error: {}", conn.id(), e);
                conn.mark_disconnected();
            }
        }
    }

    /// Remove a dead connection and announce it
    fn reap(&mut self, token: Token) {
        if let Some(mut conn) = self.registry.remove(token) {
            let _ = conn.deregister(self.poll.registry());
            info!("connection {} from {} closed", conn.id(), conn.peer_addr());
            let id = conn.id();
            drop(conn);
            self.dispatch(id, SessionEvent::Disconnect);
        }
    }

    fn dispatch(&mut self, id: ConnectionId, event: SessionEvent) {
        let Reactor { registry, bus, .. } = self;
        bus.dispatch(registry, id, &event);
    }

    /// Capture the full reactor state for a process handoff.
    ///
    /// Connections with an attached handler are not transferable; they are
    /// told a restart is happening and closed before capture.
    #[cfg(unix)]
    pub fn serialize(&mut self) -> SeaportResult<String> {
        let listener = self.listener.as_ref().ok_or_else(|| {
            SeaportError::Handoff("no listening socket to hand off".to_string())
        })?;
        let listener_handle = TransferableHandle::capture(listener);

        let mut gone = Vec::new();
        for token in self.registry.tokens_rev() {
            let Some(conn) = self.registry.get_mut(token) else {
                continue;
            };
            if conn.has_handler() {
                info!("connection {} not transferable, closing", conn.id());
                conn.send_text(RESTART_NOTICE);
                let _ = conn.flush();
                conn.mark_disconnected();
                gone.push(token);
            }
        }
        for token in gone {
            self.reap(token);
        }

        let mut connections = Vec::new();
        for token in self.registry.tokens_rev() {
            if let Some(state) = self.registry.get(token).and_then(Connection::serialize) {
                connections.push(state);
            }
        }

        handoff::encode(&ReactorState {
            listener: listener_handle,
            next_id: self.next_id,
            connections,
        })
    }

    /// Rebuild a reactor in a new process from a serialized blob
    #[cfg(unix)]
    pub fn restore(
        config: SeaportConfig,
        protocols: ProtocolTable,
        blob: &str,
    ) -> SeaportResult<Self> {
        let state = handoff::decode(blob)?;
        let mut reactor = Self::new(config, protocols)?;

        let mut listener = state.listener.into_listener()?;
        reactor
            .poll
            .registry()
            .register(&mut listener, LISTENER, Interest::READABLE)?;
        reactor.listener = Some(listener);
        reactor.next_id = state.next_id;

        for conn_state in state.connections {
            if !conn_state.is_connected {
                continue;
            }
            let token = Token(reactor.next_token);
            reactor.next_token += 1;
            let mut conn =
                Connection::restore(conn_state, &reactor.protocols, &reactor.config)?;
            conn.register_interest(reactor.poll.registry(), token)?;
            reactor.registry.insert(token, conn);
        }
        info!("restored {} connections", reactor.registry.len());
        Ok(reactor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProtocolMode;
    use crate::events::Propagation;
    use std::io::{Read, Write};
    use std::time::Duration;

    fn raw_reactor() -> Reactor {
        let mut config = SeaportConfig::default();
        config.server.port = 0;
        config.server.mode = ProtocolMode::Raw;
        config.timeouts.poll_interval = Duration::from_millis(10);
        Reactor::new(config, ProtocolTable::standard()).unwrap()
    }

    #[test]
    fn test_bind_reports_the_assigned_address() {
        let mut reactor = raw_reactor();
        let addr = reactor.bind().unwrap();
        assert_ne!(addr.port(), 0);
    }

    #[test]
    fn test_accept_receive_and_reply_round_trip() {
        let mut reactor = raw_reactor();
        let addr = reactor.bind().unwrap();
        reactor.bus_mut().on_receive(Box::new(|registry, id, event| {
            if let SessionEvent::Receive(data) = event {
                if let Some(conn) = registry.by_id_mut(id) {
                    let mut reply = b"echo: ".to_vec();
                    reply.extend_from_slice(data);
                    let _ = conn.send(&reply);
                }
            }
            Propagation::Continue
        }));

        let mut client = std::net::TcpStream::connect(addr).unwrap();
        client
            .set_read_timeout(Some(Duration::from_millis(20)))
            .unwrap();
        client.write_all(b"hello").unwrap();

        let mut buf = [0u8; 64];
        let mut received = Vec::new();
        for _ in 0..200 {
            reactor.iterate().unwrap();
            match client.read(&mut buf) {
                Ok(n) if n > 0 => {
                    received.extend_from_slice(&buf[..n]);
                    if received.ends_with(b"hello") {
                        break;
                    }
                }
                _ => {}
            }
        }
        assert_eq!(received, b"echo: hello");
        assert_eq!(reactor.connections().len(), 1);
    }

    #[test]
    fn test_peer_close_reaps_and_fires_disconnect() {
        use std::cell::RefCell;
        use std::rc::Rc;

        let mut reactor = raw_reactor();
        let addr = reactor.bind().unwrap();
        let disconnects = Rc::new(RefCell::new(0));
        let counter = Rc::clone(&disconnects);
        reactor.bus_mut().on_disconnect(Box::new(move |_, _, _| {
            *counter.borrow_mut() += 1;
            Propagation::Continue
        }));

        let client = std::net::TcpStream::connect(addr).unwrap();
        for _ in 0..50 {
            reactor.iterate().unwrap();
            if reactor.connections().len() == 1 {
                break;
            }
        }
        assert_eq!(reactor.connections().len(), 1);

        drop(client);
        for _ in 0..50 {
            reactor.iterate().unwrap();
            if reactor.connections().is_empty() {
                break;
            }
        }
        assert_eq!(reactor.connections().len(), 0);
        assert_eq!(*disconnects.borrow(), 1);
    }

    #[test]
    fn test_suspend_handle_stops_listen() {
        let (tx, rx) = std::sync::mpsc::channel();
        let worker = std::thread::spawn(move || {
            let mut reactor = raw_reactor();
            reactor.bind().unwrap();
            tx.send(reactor.handle()).unwrap();
            reactor.listen().unwrap();
            reactor.connections().len()
        });

        let handle = rx.recv().unwrap();
        std::thread::sleep(Duration::from_millis(50));
        handle.suspend();
        let held = worker.join().unwrap();
        assert_eq!(held, 0);
    }

    #[test]
    fn test_stalled_closing_connection_hits_idle_timeout() {
        let mut config = SeaportConfig::default();
        config.server.port = 0;
        config.server.mode = ProtocolMode::Raw;
        config.timeouts.poll_interval = Duration::from_millis(10);
        config.timeouts.idle_timeout = Duration::from_millis(50);
        let mut reactor = Reactor::new(config, ProtocolTable::standard()).unwrap();
        let addr = reactor.bind().unwrap();

        // On any input, queue far more output than the loopback socket
        // buffers will absorb and request a close
        reactor.bus_mut().on_receive(Box::new(|registry, id, _| {
            if let Some(conn) = registry.by_id_mut(id) {
                let _ = conn.send(&vec![b'x'; 16 * 1024 * 1024]);
                conn.close();
            }
            Propagation::Continue
        }));

        let mut client = std::net::TcpStream::connect(addr).unwrap();
        for _ in 0..50 {
            reactor.iterate().unwrap();
            if reactor.connections().len() == 1 {
                break;
            }
        }
        assert_eq!(reactor.connections().len(), 1);
        client.write_all(b"bye").unwrap();

        // The client never reads, so the drain stalls once the kernel
        // buffers fill; the connection must still be reaped
        let mut reaped = false;
        for _ in 0..200 {
            reactor.iterate().unwrap();
            if reactor.connections().is_empty() {
                reaped = true;
                break;
            }
        }
        assert!(reaped);
        drop(client);
    }

    #[test]
    fn test_shutdown_closes_everything() {
        let mut reactor = raw_reactor();
        let addr = reactor.bind().unwrap();
        let _client = std::net::TcpStream::connect(addr).unwrap();
        for _ in 0..50 {
            reactor.iterate().unwrap();
            if reactor.connections().len() == 1 {
                break;
            }
        }
        reactor.shutdown();
        assert!(reactor.connections().is_empty());
    }
}
