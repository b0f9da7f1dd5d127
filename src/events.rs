//! # Session Events
//!
//! Decoupled pub/sub between the reactor and the service built on top of
//! it. The reactor publishes one event per connection lifecycle change and
//! one per decoded application unit; handlers registered on the bus react
//! to them, typically by writing back through the registry.
//!
//! Handlers for an event type run in registration order. A handler may stop
//! the remaining handlers for the current event by returning
//! [`Propagation::Stop`]; the next event starts with a clean slate.

use crate::registry::{ConnectionId, ConnectionRegistry};
use log::trace;

/// Handler verdict for the rest of the current event's handler chain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Propagation {
    /// Run the remaining handlers
    Continue,
    /// Skip the remaining handlers for this event
    Stop,
}

/// Something that happened on one connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// The connection was accepted and its handshake queued
    Connect,
    /// One complete application unit arrived (a line, under telnet)
    Receive(Vec<u8>),
    /// The connection is gone; it is no longer in the registry
    Disconnect,
}

impl SessionEvent {
    fn kind(&self) -> &'static str {
        match self {
            SessionEvent::Connect => "connect",
            SessionEvent::Receive(_) => "receive",
            SessionEvent::Disconnect => "disconnect",
        }
    }
}

/// Callback signature for all session events
///
/// Handlers get mutable registry access so they can write to any connection,
/// including ones other than the event's subject (broadcasts).
pub type EventHandler =
    Box<dyn FnMut(&mut ConnectionRegistry, ConnectionId, &SessionEvent) -> Propagation>;

/// Registration-ordered handler lists, one per event type
#[derive(Default)]
pub struct EventBus {
    connect: Vec<EventHandler>,
    receive: Vec<EventHandler>,
    disconnect: Vec<EventHandler>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_connect(&mut self, handler: EventHandler) {
        self.connect.push(handler);
    }

    pub fn on_receive(&mut self, handler: EventHandler) {
        self.receive.push(handler);
    }

    pub fn on_disconnect(&mut self, handler: EventHandler) {
        self.disconnect.push(handler);
    }

    /// Run the matching handler chain for one event
    pub fn dispatch(
        &mut self,
        registry: &mut ConnectionRegistry,
        id: ConnectionId,
        event: &SessionEvent,
    ) {
        trace!("dispatching {} event for connection {}", event.kind(), id);
        let handlers = match event {
            SessionEvent::Connect => &mut self.connect,
            SessionEvent::Receive(_) => &mut self.receive,
            SessionEvent::Disconnect => &mut self.disconnect,
        };
        for handler in handlers.iter_mut() {
            if handler(registry, id, event) == Propagation::Stop {
                break;
            }
        }
    }
}
