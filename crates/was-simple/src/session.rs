//! The descriptor triple shared by client and server sessions, and the
//! single select loop that drives it.

use tokio::net::UnixStream;
use was_frame::{payload, Command};
use was_transport::WasSocket;

use crate::config::SessionConfig;
use crate::control::{Control, ControlEvent};
use crate::error::{Result, WasError};
use crate::input::{Input, InputEvent};
use crate::output::{Output, WriteProgress};

/// Something happened on one of the three descriptors.
#[derive(Debug)]
pub(crate) enum SessionEvent {
    Control(ControlEvent),
    Input(InputEvent),
    Output(WriteProgress),
}

pub(crate) struct Channels {
    pub(crate) control: Control,
    pub(crate) input: Input,
    pub(crate) output: Output,
}

impl Channels {
    pub(crate) fn new(socket: WasSocket, config: &SessionConfig) -> Result<Self> {
        let (control, input, output) = socket.into_parts();
        control.set_nonblocking(true)?;
        Ok(Self {
            control: Control::new(UnixStream::from_std(control)?, &config.frame),
            input: Input::new(input, config.max_body_size)?,
            output: Output::new(output)?,
        })
    }

    /// Wait for the next event on any descriptor that has work.
    ///
    /// Control frames are held back while a cut-off body is being skipped,
    /// so the frames that follow never overtake the pipe. `read_input`
    /// pauses an active body that is not being skipped.
    pub(crate) async fn next_event(&mut self, read_input: bool) -> Result<SessionEvent> {
        let discarding = self.input.is_discarding();
        let read_input = discarding || (read_input && self.input.is_active());
        let write_output = self.output.is_active();

        tokio::select! {
            event = self.control.next_event(), if !discarding => Ok(SessionEvent::Control(event?)),
            event = self.input.receive(), if read_input => Ok(SessionEvent::Input(event?)),
            progress = self.output.write_some(), if write_output => {
                Ok(SessionEvent::Output(progress?))
            }
        }
    }

    /// Returns true while queued frames or body bytes wait to be written.
    pub(crate) fn has_pending_output(&self) -> bool {
        self.control.has_pending() || self.output.is_active()
    }
}

/// Decode a UTF-8 string payload.
pub(crate) fn decode_text(command: Command, payload: &[u8]) -> Result<&str> {
    Ok(payload::decode_str(command, payload)?)
}

/// Decode a `name=value` payload into two UTF-8 strings.
pub(crate) fn decode_text_pair(command: Command, payload: &[u8]) -> Result<(&str, &str)> {
    let (name, value) = payload::decode_pair(command, payload)?;
    Ok((decode_text(command, name)?, decode_text(command, value)?))
}

pub(crate) fn unexpected(command: Command, phase: impl std::fmt::Debug) -> WasError {
    WasError::protocol(format!("unexpected {command} in phase {phase:?}"))
}
