//! # Wire Protocol Capability
//!
//! A connection owns exactly one `Protocol` object that translates between
//! raw socket bytes and application units (strategy pattern - there is no
//! protocol inheritance and no global protocol registry). Implementations
//! are pure byte transformers: they never touch sockets, which keeps them
//! trivially testable and lets the same code run under any I/O scheme.
//!
//! Construction goes through an explicit [`ProtocolTable`] built once at
//! startup and handed to the reactor, mapping a protocol name to its
//! constructor.

pub mod raw;
pub mod telnet;

pub use raw::RawProtocol;
pub use telnet::{TelnetProtocol, TelnetState};

use crate::config::SeaportConfig;
use crate::errors::{SeaportError, SeaportResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Outcome of feeding received bytes through a protocol
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ProtocolRead {
    /// Complete application units decoded from the input, in order.
    /// For the telnet protocol these are lines; for raw, the input itself.
    pub units: Vec<Vec<u8>>,
    /// Wire-ready bytes the protocol wants sent back (negotiation answers,
    /// notices); the connection appends these to its send buffer.
    pub reply: Vec<u8>,
}

/// Serializable protocol state for a process handoff
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ProtocolState {
    Raw,
    Telnet(TelnetState),
}

/// Capability interface between a connection and its wire protocol
pub trait Protocol {
    /// Table name of this protocol ("raw", "telnet", ...)
    fn name(&self) -> &'static str;

    /// Handshake bytes to queue when the connection opens (may be empty)
    fn connect(&mut self) -> Vec<u8>;

    /// Consume newly received bytes, returning decoded units and any reply
    fn read(&mut self, input: &[u8]) -> SeaportResult<ProtocolRead>;

    /// Encode application chunks into wire-ready bytes
    fn write(&mut self, chunks: &[&[u8]]) -> SeaportResult<Vec<u8>>;

    /// Capture protocol state for a process handoff
    fn snapshot(&self) -> ProtocolState;

    /// Reinstate state captured by `snapshot` on a fresh instance
    fn restore(&mut self, state: ProtocolState) -> SeaportResult<()>;
}

/// Constructor signature stored in the protocol table
pub type ProtocolConstructor = fn(&SeaportConfig) -> Box<dyn Protocol>;

/// Explicit name-to-constructor table, built once at startup
pub struct ProtocolTable {
    constructors: HashMap<String, ProtocolConstructor>,
}

impl ProtocolTable {
    /// An empty table; register constructors before use
    pub fn new() -> Self {
        Self {
            constructors: HashMap::new(),
        }
    }

    /// The stock table with "raw" and "telnet" registered
    pub fn standard() -> Self {
        let mut table = Self::new();
        table.register("raw", |_| Box::new(RawProtocol::new()));
        table.register("telnet", |config| {
            Box::new(TelnetProtocol::new(config.buffers.max_line_length))
        });
        table
    }

    pub fn register(&mut self, name: &str, constructor: ProtocolConstructor) {
        self.constructors.insert(name.to_string(), constructor);
    }

    /// Build a protocol instance by name
    pub fn build(&self, name: &str, config: &SeaportConfig) -> SeaportResult<Box<dyn Protocol>> {
        let constructor = self
            .constructors
            .get(name)
            .ok_or_else(|| SeaportError::Configuration(format!("unknown protocol '{}'", name)))?;
        Ok(constructor(config))
    }

    /// Build a protocol and reinstate a handoff snapshot on it
    pub fn rebuild(
        &self,
        state: ProtocolState,
        config: &SeaportConfig,
    ) -> SeaportResult<Box<dyn Protocol>> {
        let name = match &state {
            ProtocolState::Raw => "raw",
            ProtocolState::Telnet(_) => "telnet",
        };
        let mut protocol = self.build(name, config)?;
        protocol.restore(state)?;
        Ok(protocol)
    }
}

impl Default for ProtocolTable {
    fn default() -> Self {
        Self::standard()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_table_builds_both_protocols() {
        let table = ProtocolTable::standard();
        let config = SeaportConfig::default();
        assert_eq!(table.build("raw", &config).unwrap().name(), "raw");
        assert_eq!(table.build("telnet", &config).unwrap().name(), "telnet");
    }

    #[test]
    fn test_unknown_protocol_is_a_config_error() {
        let table = ProtocolTable::standard();
        let config = SeaportConfig::default();
        assert!(matches!(
            table.build("gopher", &config),
            Err(SeaportError::Configuration(_))
        ));
    }

    #[test]
    fn test_rebuild_dispatches_on_state_variant() {
        let table = ProtocolTable::standard();
        let config = SeaportConfig::default();
        let protocol = table.rebuild(ProtocolState::Raw, &config).unwrap();
        assert_eq!(protocol.name(), "raw");
    }
}
