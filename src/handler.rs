//! # Input Capture Handlers
//!
//! A connection may temporarily route its decoded input to an attached
//! [`InputHandler`] instead of the event bus, for multi-step interactions
//! such as a login sequence. While a handler is attached, receive events
//! are not published; they feed the handler until it reports completion.
//!
//! Handlers are driven by the connection one unit at a time. A handler that
//! returns [`HandlerStep::Failed`] is detached and the error surfaces to
//! the caller; the connection itself stays open.

use crate::connection::Connection;
use crate::errors::SeaportError;
use std::collections::VecDeque;

/// What the handler wants after consuming one input unit
pub enum HandlerStep {
    /// Keep capturing; feed the next unit to this handler
    Continue,
    /// Interaction finished; detach and resume normal event flow
    Done,
    /// Interaction failed; detach and surface the error
    Failed(SeaportError),
}

/// A multi-step input interaction attached to one connection
pub trait InputHandler {
    /// Called once when the handler is attached; typically writes a prompt
    fn begin(&mut self, conn: &mut Connection);

    /// Consume one decoded input unit
    fn resume(&mut self, conn: &mut Connection, input: &[u8]) -> HandlerStep;
}

/// Verdict from one prompt step's input closure
pub enum PromptAction {
    /// Accept the answer and move to the next step
    Next,
    /// Re-issue this step's prompt and wait again
    Repeat,
    /// Accept the answer and finish the whole sequence early
    Done,
}

/// One prompt plus the closure that judges its answer
pub struct PromptStep {
    pub prompt: String,
    pub on_input: Box<dyn FnMut(&str) -> Result<PromptAction, SeaportError>>,
}

impl PromptStep {
    pub fn new(
        prompt: impl Into<String>,
        on_input: impl FnMut(&str) -> Result<PromptAction, SeaportError> + 'static,
    ) -> Self {
        Self {
            prompt: prompt.into(),
            on_input: Box::new(on_input),
        }
    }
}

/// A ready-made [`InputHandler`]: a queue of prompt steps run in order
///
/// Each step writes its prompt, waits for one line, and lets its closure
/// decide whether to advance, repeat, or finish. Input arrives trimmed and
/// lossily decoded to UTF-8.
#[derive(Default)]
pub struct PromptSequence {
    steps: VecDeque<PromptStep>,
}

impl PromptSequence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(mut self, step: PromptStep) -> Self {
        self.steps.push_back(step);
        self
    }

    fn send_current_prompt(&mut self, conn: &mut Connection) {
        if let Some(step) = self.steps.front() {
            conn.send_text(&step.prompt);
        }
    }
}

impl InputHandler for PromptSequence {
    fn begin(&mut self, conn: &mut Connection) {
        self.send_current_prompt(conn);
    }

    fn resume(&mut self, conn: &mut Connection, input: &[u8]) -> HandlerStep {
        let Some(step) = self.steps.front_mut() else {
            return HandlerStep::Done;
        };
        let text = String::from_utf8_lossy(input);
        match (step.on_input)(text.trim()) {
            Ok(PromptAction::Next) => {
                self.steps.pop_front();
                if self.steps.is_empty() {
                    HandlerStep::Done
                } else {
                    self.send_current_prompt(conn);
                    HandlerStep::Continue
                }
            }
            Ok(PromptAction::Repeat) => {
                self.send_current_prompt(conn);
                HandlerStep::Continue
            }
            Ok(PromptAction::Done) => HandlerStep::Done,
            Err(e) => HandlerStep::Failed(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SeaportConfig;
    use crate::protocol::RawProtocol;
    use std::cell::RefCell;
    use std::net::TcpListener as StdTcpListener;
    use std::rc::Rc;

    fn test_connection() -> Connection {
        // A loopback socket pair; the listener side is dropped with the
        // accept left unfinished, which is fine for buffer-level tests
        let listener = StdTcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let std_stream = std::net::TcpStream::connect(addr).unwrap();
        std_stream.set_nonblocking(true).unwrap();
        let stream = mio::net::TcpStream::from_std(std_stream);
        Connection::new(1, stream, addr, Box::new(RawProtocol::new()), &SeaportConfig::default())
    }

    #[test]
    fn test_sequence_prompts_and_advances() {
        let answers = Rc::new(RefCell::new(Vec::new()));
        let a = Rc::clone(&answers);
        let b = Rc::clone(&answers);
        let mut seq = PromptSequence::new()
            .push(PromptStep::new("Name? ", move |input| {
                a.borrow_mut().push(input.to_string());
                Ok(PromptAction::Next)
            }))
            .push(PromptStep::new("Quest? ", move |input| {
                b.borrow_mut().push(input.to_string());
                Ok(PromptAction::Next)
            }));

        let mut conn = test_connection();
        seq.begin(&mut conn);
        assert!(conn.pending_send().ends_with(b"Name? "));

        assert!(matches!(seq.resume(&mut conn, b"arthur"), HandlerStep::Continue));
        assert!(conn.pending_send().ends_with(b"Quest? "));

        assert!(matches!(seq.resume(&mut conn, b"grail\t "), HandlerStep::Done));
        assert_eq!(*answers.borrow(), vec!["arthur", "grail"]);
    }

    #[test]
    fn test_repeat_reissues_the_same_prompt() {
        let mut seq = PromptSequence::new().push(PromptStep::new("Password: ", |input| {
            if input == "sesame" {
                Ok(PromptAction::Next)
            } else {
                Ok(PromptAction::Repeat)
            }
        }));

        let mut conn = test_connection();
        seq.begin(&mut conn);
        assert!(matches!(seq.resume(&mut conn, b"wrong"), HandlerStep::Continue));
        assert!(conn.pending_send().ends_with(b"Password: "));
        assert!(matches!(seq.resume(&mut conn, b"sesame"), HandlerStep::Done));
    }

    #[test]
    fn test_failure_surfaces_error() {
        let mut seq = PromptSequence::new().push(PromptStep::new("? ", |_| {
            Err(SeaportError::HandlerFailed("gave up".to_string()))
        }));

        let mut conn = test_connection();
        seq.begin(&mut conn);
        assert!(matches!(
            seq.resume(&mut conn, b"anything"),
            HandlerStep::Failed(SeaportError::HandlerFailed(_))
        ));
    }

    #[test]
    fn test_done_short_circuits_remaining_steps() {
        let mut seq = PromptSequence::new()
            .push(PromptStep::new("One? ", |_| Ok(PromptAction::Done)))
            .push(PromptStep::new("Never? ", |_| Ok(PromptAction::Next)));

        let mut conn = test_connection();
        seq.begin(&mut conn);
        assert!(matches!(seq.resume(&mut conn, b"x"), HandlerStep::Done));
        assert!(!conn.pending_send().ends_with(b"Never? "));
    }
}
