//! Pass-through protocol: every read is one unit, every write goes out
//! verbatim. Useful for machine peers and for tests that want the reactor
//! without telnet semantics.

use super::{Protocol, ProtocolRead, ProtocolState};
use crate::errors::{SeaportError, SeaportResult};

#[derive(Debug, Default)]
pub struct RawProtocol;

impl RawProtocol {
    pub fn new() -> Self {
        Self
    }
}

impl Protocol for RawProtocol {
    fn name(&self) -> &'static str {
        "raw"
    }

    fn connect(&mut self) -> Vec<u8> {
        Vec::new()
    }

    fn read(&mut self, input: &[u8]) -> SeaportResult<ProtocolRead> {
        if input.is_empty() {
            return Ok(ProtocolRead::default());
        }
        Ok(ProtocolRead {
            units: vec![input.to_vec()],
            reply: Vec::new(),
        })
    }

    fn write(&mut self, chunks: &[&[u8]]) -> SeaportResult<Vec<u8>> {
        let mut out = Vec::with_capacity(chunks.iter().map(|c| c.len()).sum());
        for chunk in chunks {
            out.extend_from_slice(chunk);
        }
        Ok(out)
    }

    fn snapshot(&self) -> ProtocolState {
        ProtocolState::Raw
    }

    fn restore(&mut self, state: ProtocolState) -> SeaportResult<()> {
        match state {
            ProtocolState::Raw => Ok(()),
            other => Err(SeaportError::InvalidInput(format!(
                "cannot restore {:?} state into the raw protocol",
                other
            ))),
        }
    }
}
