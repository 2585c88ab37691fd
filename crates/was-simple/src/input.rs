//! Inbound body pipe.

use std::os::fd::OwnedFd;

use bytes::{BufMut, Bytes, BytesMut};
use tokio::io::AsyncReadExt;
use tokio::net::unix::pipe;
use tracing::{debug, trace};

use crate::error::{Result, WasError};

const DISCARD_CHUNK_SIZE: usize = 4096;
const READ_RESERVE_SIZE: usize = 64 * 1024;

/// What one [`Input::receive`] call achieved.
#[derive(Debug, PartialEq, Eq)]
pub enum InputEvent {
    /// Bytes were buffered; the body is not complete yet.
    Progress,
    /// The whole body arrived.
    Complete(Bytes),
    /// A cut-off body was fully skipped.
    Discarded,
}

#[derive(Debug)]
enum State {
    Inactive,
    Receiving { buf: BytesMut, length: Option<u64> },
    Discarding { remaining: u64 },
}

/// Assembles one body at a time from a pipe into a bounded buffer.
pub struct Input {
    pipe: pipe::Receiver,
    capacity: usize,
    state: State,
}

impl Input {
    /// Wrap the read end of a pipe. Must be called inside a tokio runtime.
    pub fn new(fd: OwnedFd, capacity: usize) -> Result<Self> {
        Ok(Self {
            pipe: pipe::Receiver::from_owned_fd(fd)?,
            capacity,
            state: State::Inactive,
        })
    }

    /// Start accepting a body of not yet known length.
    pub fn activate(&mut self) {
        self.state = State::Receiving {
            buf: BytesMut::new(),
            length: None,
        };
    }

    pub fn is_active(&self) -> bool {
        !matches!(self.state, State::Inactive)
    }

    /// Returns true while a body is being assembled (not discarded).
    pub fn is_receiving(&self) -> bool {
        matches!(self.state, State::Receiving { .. })
    }

    pub fn is_discarding(&self) -> bool {
        matches!(self.state, State::Discarding { .. })
    }

    /// Bytes buffered for the current body.
    pub fn received(&self) -> u64 {
        match &self.state {
            State::Receiving { buf, .. } => buf.len() as u64,
            _ => 0,
        }
    }

    /// Announce the total body length.
    pub fn set_length(&mut self, length: u64) -> Result<()> {
        let State::Receiving {
            buf,
            length: current,
        } = &mut self.state
        else {
            return Err(WasError::protocol("LENGTH without a body in progress"));
        };

        if current.is_some() {
            return Err(WasError::protocol("duplicate LENGTH"));
        }
        if length > self.capacity as u64 {
            return Err(WasError::BodyTooLarge {
                size: length,
                max: self.capacity,
            });
        }
        if length < buf.len() as u64 {
            return Err(WasError::protocol(format!(
                "LENGTH {length} is below the {} bytes already received",
                buf.len()
            )));
        }

        *current = Some(length);
        Ok(())
    }

    /// Take the body if every announced byte has arrived.
    pub fn check_complete(&mut self) -> Option<Bytes> {
        let complete = matches!(
            &self.state,
            State::Receiving { buf, length: Some(length) } if buf.len() as u64 == *length
        );
        if !complete {
            return None;
        }

        match std::mem::replace(&mut self.state, State::Inactive) {
            State::Receiving { buf, .. } => Some(buf.freeze()),
            _ => None,
        }
    }

    /// The peer cut the body off after `length` bytes in total.
    ///
    /// The bytes still in the pipe are skipped by later [`receive`](Self::receive)
    /// calls; no body is delivered. Valid on an inactive input too, where
    /// nothing was buffered yet.
    pub fn premature(&mut self, length: u64) -> Result<()> {
        let received = match &self.state {
            State::Inactive => 0,
            State::Receiving { buf, .. } => buf.len() as u64,
            State::Discarding { .. } => return Err(WasError::protocol("duplicate PREMATURE")),
        };
        if length < received {
            return Err(WasError::protocol(format!(
                "PREMATURE {length} is below the {received} bytes already received"
            )));
        }

        let remaining = length - received;
        debug!(length, received, remaining, "discarding premature body");
        self.state = if remaining == 0 {
            State::Inactive
        } else {
            State::Discarding { remaining }
        };
        Ok(())
    }

    /// Skip whatever is left of a body whose length is known.
    ///
    /// Returns false, leaving the input untouched, while the length is
    /// still unknown.
    pub fn discard_rest(&mut self) -> bool {
        let remaining = match &self.state {
            State::Inactive | State::Discarding { .. } => return true,
            State::Receiving { length: None, .. } => return false,
            State::Receiving {
                buf,
                length: Some(length),
            } => length - buf.len() as u64,
        };

        debug!(remaining, "discarding rest of body");
        self.state = if remaining == 0 {
            State::Inactive
        } else {
            State::Discarding { remaining }
        };
        true
    }

    /// Forget the current body without touching the pipe.
    pub fn abort(&mut self) {
        self.state = State::Inactive;
    }

    /// Read once from the pipe.
    ///
    /// Never reads past the announced length or the capacity, so bytes of a
    /// following body stay in the pipe. Cancel safe. Must not be called on
    /// an inactive input.
    pub async fn receive(&mut self) -> Result<InputEvent> {
        match &mut self.state {
            State::Inactive => Err(WasError::InvalidState("input is not active")),
            State::Receiving { buf, length } => {
                let limit = length.map_or(self.capacity, |length| length as usize);
                let wanted = limit.saturating_sub(buf.len());
                if wanted == 0 {
                    // Full before LENGTH arrived: only a further byte is an error.
                    let mut extra = [0u8; 1];
                    if self.pipe.read(&mut extra).await? == 0 {
                        return Err(hangup());
                    }
                    return Err(WasError::BodyTooLarge {
                        size: buf.len() as u64 + 1,
                        max: self.capacity,
                    });
                }

                buf.reserve(wanted.min(READ_RESERVE_SIZE));
                let n = self.pipe.read_buf(&mut (&mut *buf).limit(wanted)).await?;
                if n == 0 {
                    return Err(hangup());
                }
                trace!(n, received = buf.len(), "body bytes");

                if length.is_some_and(|length| buf.len() as u64 == length) {
                    let body = buf.split().freeze();
                    self.state = State::Inactive;
                    return Ok(InputEvent::Complete(body));
                }
                Ok(InputEvent::Progress)
            }
            State::Discarding { remaining } => {
                let mut scratch = [0u8; DISCARD_CHUNK_SIZE];
                let wanted = usize::try_from(*remaining)
                    .unwrap_or(usize::MAX)
                    .min(DISCARD_CHUNK_SIZE);
                let n = self.pipe.read(&mut scratch[..wanted]).await?;
                if n == 0 {
                    return Err(hangup());
                }

                *remaining -= n as u64;
                if *remaining == 0 {
                    self.state = State::Inactive;
                    return Ok(InputEvent::Discarded);
                }
                Ok(InputEvent::Progress)
            }
        }
    }
}

fn hangup() -> WasError {
    std::io::Error::new(
        std::io::ErrorKind::UnexpectedEof,
        "body pipe closed before the body was complete",
    )
    .into()
}
