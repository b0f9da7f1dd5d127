//! # Seaport
//!
//! A framework for line- and byte-oriented TCP services (chat rooms, MUDs,
//! telnet tools). The core is a single-threaded, non-blocking reactor
//! managing many client sockets, each paired with a pluggable wire
//! protocol. The telnet protocol performs byte-exact RFC 854 option
//! negotiation via the `telnet-codec` crate.
//!
//! A service registers closures on the [`events::EventBus`] for connect,
//! receive, and disconnect, then hands the bus-carrying [`reactor::Reactor`]
//! the thread. Multi-step prompts attach an [`handler::InputHandler`] to a
//! connection to capture its input temporarily. On Unix the whole reactor
//! can be serialized and restored across a process boundary for
//! zero-downtime restarts.

pub mod config;
pub mod connection;
pub mod errors;
pub mod events;
pub mod handler;
pub mod handoff;
pub mod protocol;
pub mod reactor;
pub mod registry;

pub use config::{ProtocolMode, SeaportConfig};
pub use connection::Connection;
pub use errors::{SeaportError, SeaportResult};
pub use events::{EventBus, Propagation, SessionEvent};
pub use handler::{HandlerStep, InputHandler, PromptAction, PromptSequence, PromptStep};
pub use protocol::{Protocol, ProtocolTable};
pub use reactor::{Reactor, ReactorHandle};
pub use registry::{ConnectionId, ConnectionRegistry};

/// Library version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
