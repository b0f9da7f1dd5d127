//! # Telnet Option Negotiation
//!
//! This module implements the server side of RFC 854 option negotiation
//! with an explicit allow-list and loop protection.
//!
//! ## State model
//!
//! Each option (keyed by its raw byte, created lazily on first reference)
//! tracks three things:
//! - **local**: whether *we* perform the option - unknown/enabled/disabled
//! - **remote**: whether the *peer* performs it - unknown/enabled/disabled
//! - **pending**: true while we are awaiting the answer to a request we
//!   sent, so the eventual WILL/WONT is recognized as an answer rather than
//!   a fresh peer-initiated request
//!
//! ## The golden rule
//!
//! Never re-acknowledge a state the peer already knows we hold: if an
//! incoming request matches the committed state and nothing is pending, no
//! reply is sent. This is what prevents two compliant endpoints from
//! ping-ponging WILL/DO forever.
//!
//! ## Policy
//!
//! - Locally we support ECHO and SUPPRESS-GO-AHEAD: we agree to a DO and
//!   stop on a DONT. Local ECHO also toggles the echo flag.
//! - Remotely we want TERMINAL-TYPE and NAWS: we request them at connect
//!   time and accept unsolicited WILLs for them.
//! - Remote ECHO is always refused - a server must never let the peer echo
//!   on its behalf.
//! - Everything else is refused exactly once and then ignored.

use crate::protocol::{TelnetCommand, TelnetOption};
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Tri-state negotiation status for one side of one option
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum OptionStatus {
    /// Never negotiated
    #[default]
    Unknown,
    /// Committed on
    Enabled,
    /// Committed off
    Disabled,
}

/// Per-option negotiation state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionState {
    /// Whether we perform the option
    pub local: OptionStatus,
    /// Whether the peer performs the option
    pub remote: OptionStatus,
    /// True while awaiting the reply to a request we initiated
    pub pending: bool,
}

/// What the caller must do in response to a processed negotiation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NegotiationAction {
    /// Send `IAC <command> <option>` to the peer
    Reply { command: TelnetCommand, option: u8 },
    /// Send `IAC SB TERMINAL-TYPE SEND IAC SE` to ask for the terminal name
    RequestTerminalType,
}

/// Serializable negotiation snapshot for a process handoff
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NegotiatorSnapshot {
    pub options: HashMap<u8, OptionState>,
    pub echo_enabled: bool,
}

/// Option negotiation state machine for one connection
#[derive(Debug, Clone, Default)]
pub struct TelnetNegotiator {
    /// Lazily populated; an option absent from the map is wholly Unknown
    options: HashMap<u8, OptionState>,
    /// Set while local ECHO is negotiated on
    echo_enabled: bool,
}

/// Options we are willing to perform ourselves
fn locally_supported(option: u8) -> bool {
    option == TelnetOption::ECHO.to_byte() || option == TelnetOption::SUPPRESS_GO_AHEAD.to_byte()
}

/// Options we want the peer to perform
fn remotely_supported(option: u8) -> bool {
    option == TelnetOption::TERMINAL_TYPE.to_byte() || option == TelnetOption::NAWS.to_byte()
}

impl TelnetNegotiator {
    /// Create a negotiator with every option in the Unknown state
    pub fn new() -> Self {
        Self::default()
    }

    /// Current state of an option (Unknown if never referenced)
    pub fn state(&self, option: u8) -> OptionState {
        self.options.get(&option).copied().unwrap_or_default()
    }

    /// Whether local ECHO is currently negotiated on
    pub fn echo_enabled(&self) -> bool {
        self.echo_enabled
    }

    fn entry(&mut self, option: u8) -> &mut OptionState {
        self.options.entry(option).or_default()
    }

    /// Ask the peer to enable an option on its side (`IAC DO <option>`)
    ///
    /// Marks the option pending *before* the request goes out, so the
    /// peer's answer is resolved as such. Returns nothing if the option is
    /// already enabled or a request is already in flight.
    pub fn request_remote_enable(&mut self, option: u8) -> Option<NegotiationAction> {
        let state = self.entry(option);
        if state.pending || state.remote == OptionStatus::Enabled {
            return None;
        }
        state.pending = true;
        Some(NegotiationAction::Reply {
            command: TelnetCommand::DO,
            option,
        })
    }

    /// Process one incoming `IAC <command> <option>` from the peer
    pub fn handle(&mut self, command: TelnetCommand, option: u8) -> Vec<NegotiationAction> {
        match command {
            TelnetCommand::DO => self.handle_do(option),
            TelnetCommand::DONT => self.handle_dont(option),
            TelnetCommand::WILL => self.handle_will(option),
            TelnetCommand::WONT => self.handle_wont(option),
            other => {
                debug!("ignoring non-negotiation command {:?} in negotiator", other);
                Vec::new()
            }
        }
    }

    /// Peer asks us to enable an option on our side
    fn handle_do(&mut self, option: u8) -> Vec<NegotiationAction> {
        let echo = option == TelnetOption::ECHO.to_byte();
        let supported = locally_supported(option);
        let state = self.entry(option);

        if supported {
            if state.pending {
                // This DO *is* the answer to our own request
                state.pending = false;
                state.local = OptionStatus::Enabled;
                if echo {
                    self.echo_enabled = true;
                }
                Vec::new()
            } else if state.local != OptionStatus::Enabled {
                state.local = OptionStatus::Enabled;
                if echo {
                    self.echo_enabled = true;
                }
                vec![NegotiationAction::Reply {
                    command: TelnetCommand::WILL,
                    option,
                }]
            } else {
                // Golden rule: the peer already knows we perform this
                Vec::new()
            }
        } else if state.local == OptionStatus::Unknown {
            state.local = OptionStatus::Disabled;
            vec![NegotiationAction::Reply {
                command: TelnetCommand::WONT,
                option,
            }]
        } else {
            // Already refused once; repeats get no second answer
            Vec::new()
        }
    }

    /// Peer asks us to disable an option on our side
    fn handle_dont(&mut self, option: u8) -> Vec<NegotiationAction> {
        let echo = option == TelnetOption::ECHO.to_byte();
        let supported = locally_supported(option);
        let state = self.entry(option);

        if supported {
            if state.pending {
                state.pending = false;
                state.local = OptionStatus::Disabled;
                if echo {
                    self.echo_enabled = false;
                }
                Vec::new()
            } else if state.local != OptionStatus::Disabled {
                state.local = OptionStatus::Disabled;
                if echo {
                    self.echo_enabled = false;
                }
                vec![NegotiationAction::Reply {
                    command: TelnetCommand::WONT,
                    option,
                }]
            } else {
                Vec::new()
            }
        } else {
            // A DONT for something we never do needs no answer
            state.local = OptionStatus::Disabled;
            Vec::new()
        }
    }

    /// Peer announces it will perform an option on its side
    fn handle_will(&mut self, option: u8) -> Vec<NegotiationAction> {
        if option == TelnetOption::ECHO.to_byte() {
            // Never let the remote end echo for us
            let state = self.entry(option);
            return if state.remote == OptionStatus::Unknown {
                state.remote = OptionStatus::Disabled;
                vec![NegotiationAction::Reply {
                    command: TelnetCommand::DONT,
                    option,
                }]
            } else {
                Vec::new()
            };
        }

        let supported = remotely_supported(option);
        let ttype = option == TelnetOption::TERMINAL_TYPE.to_byte();
        let state = self.entry(option);

        if supported {
            if state.pending {
                state.pending = false;
                state.remote = OptionStatus::Enabled;
                if ttype {
                    // The peer agreed to report its terminal; ask right away
                    vec![NegotiationAction::RequestTerminalType]
                } else {
                    Vec::new()
                }
            } else if state.remote != OptionStatus::Enabled {
                state.remote = OptionStatus::Enabled;
                vec![NegotiationAction::Reply {
                    command: TelnetCommand::DO,
                    option,
                }]
            } else {
                Vec::new()
            }
        } else if state.remote == OptionStatus::Unknown {
            state.remote = OptionStatus::Disabled;
            vec![NegotiationAction::Reply {
                command: TelnetCommand::DONT,
                option,
            }]
        } else {
            Vec::new()
        }
    }

    /// Peer announces it will not perform an option on its side
    fn handle_wont(&mut self, option: u8) -> Vec<NegotiationAction> {
        if option == TelnetOption::ECHO.to_byte() {
            let state = self.entry(option);
            return if state.remote == OptionStatus::Unknown {
                state.remote = OptionStatus::Disabled;
                vec![NegotiationAction::Reply {
                    command: TelnetCommand::DONT,
                    option,
                }]
            } else {
                Vec::new()
            };
        }

        let supported = remotely_supported(option);
        let state = self.entry(option);

        if supported {
            if state.pending {
                state.pending = false;
                state.remote = OptionStatus::Disabled;
                Vec::new()
            } else if state.remote != OptionStatus::Disabled {
                state.remote = OptionStatus::Disabled;
                vec![NegotiationAction::Reply {
                    command: TelnetCommand::DONT,
                    option,
                }]
            } else {
                Vec::new()
            }
        } else {
            // A refusal of something we never wanted; note it and move on
            state.remote = OptionStatus::Disabled;
            Vec::new()
        }
    }

    /// Capture full negotiation state for a process handoff
    pub fn snapshot(&self) -> NegotiatorSnapshot {
        NegotiatorSnapshot {
            options: self.options.clone(),
            echo_enabled: self.echo_enabled,
        }
    }

    /// Rebuild a negotiator from a snapshot
    pub fn from_snapshot(snapshot: NegotiatorSnapshot) -> Self {
        Self {
            options: snapshot.options,
            echo_enabled: snapshot.echo_enabled,
        }
    }
}
