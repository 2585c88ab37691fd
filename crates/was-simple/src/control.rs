//! The framed control channel.
//!
//! Outbound frames are queued synchronously and flushed while the channel
//! is being polled for inbound frames, so a session can enqueue a whole
//! request or response from non-async code.

use bytes::{Buf, BytesMut};
use futures_util::StreamExt;
use tokio::io::AsyncWriteExt;
use tokio::net::unix::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::UnixStream;
use tokio_util::codec::FramedRead;
use tracing::trace;
use was_frame::{
    encode_frame, payload, Command, Frame, FrameConfig, FrameError, WasCodec, HEADER_SIZE,
};

use crate::error::{Result, WasError};

/// What [`Control::next_event`] observed.
#[derive(Debug, PartialEq, Eq)]
pub enum ControlEvent {
    /// One complete inbound frame.
    Frame(Frame),
    /// The outbound queue became empty.
    Drained,
    /// The peer closed the channel on a frame boundary.
    Closed,
}

/// One side of a WAS control socket.
pub struct Control {
    reader: FramedRead<OwnedReadHalf, WasCodec>,
    writer: OwnedWriteHalf,
    output: BytesMut,
    capacity: usize,
    max_payload: usize,
    drained: bool,
    eof: bool,
    done: bool,
}

impl Control {
    /// Wrap a connected socket. Must be called inside a tokio runtime.
    pub fn new(stream: UnixStream, config: &FrameConfig) -> Self {
        let (read_half, write_half) = stream.into_split();
        Self {
            reader: FramedRead::new(read_half, WasCodec::with_config(config.clone())),
            writer: write_half,
            output: BytesMut::with_capacity(config.output_capacity),
            capacity: config.output_capacity,
            max_payload: config.max_payload_size,
            drained: false,
            eof: false,
            done: false,
        }
    }

    /// Queue one frame. Nothing is queued on error.
    pub fn send(&mut self, command: Command, payload: &[u8]) -> Result<()> {
        self.reserve(command, payload.len())?;
        encode_frame(command, payload, &mut self.output)?;
        Ok(())
    }

    pub fn send_empty(&mut self, command: Command) -> Result<()> {
        self.send(command, &[])
    }

    pub fn send_u16(&mut self, command: Command, value: u16) -> Result<()> {
        self.send(command, &value.to_ne_bytes())
    }

    pub fn send_u32(&mut self, command: Command, value: u32) -> Result<()> {
        self.send(command, &value.to_ne_bytes())
    }

    pub fn send_u64(&mut self, command: Command, value: u64) -> Result<()> {
        self.send(command, &payload::encode_u64(value))
    }

    pub fn send_string(&mut self, command: Command, value: &str) -> Result<()> {
        self.send(command, value.as_bytes())
    }

    /// Queue a `name=value` frame.
    pub fn send_pair(&mut self, command: Command, name: &str, value: &str) -> Result<()> {
        self.reserve(command, name.len() + 1 + value.len())?;
        payload::encode_pair(command, name.as_bytes(), value.as_bytes(), &mut self.output)?;
        Ok(())
    }

    pub fn send_metric(&mut self, name: &str, value: f32) -> Result<()> {
        self.reserve(Command::Metric, 4 + name.len())?;
        payload::encode_metric(name, value, &mut self.output)?;
        Ok(())
    }

    fn reserve(&self, command: Command, payload_len: usize) -> Result<()> {
        if self.done {
            return Err(WasError::InvalidState("control channel is done"));
        }
        if payload_len > self.max_payload {
            return Err(FrameError::PayloadTooLarge {
                size: payload_len,
                max: self.max_payload,
            }
            .into());
        }

        let size = HEADER_SIZE + payload_len;
        let available = self.capacity.saturating_sub(self.output.len());
        if size > available {
            return Err(WasError::QueueFull { size, available });
        }

        trace!(%command, size, "queue control frame");
        Ok(())
    }

    /// Returns true while queued frames have not been written yet.
    pub fn has_pending(&self) -> bool {
        !self.output.is_empty()
    }

    /// No more frames will be queued.
    pub fn done(&mut self) {
        self.done = true;
    }

    /// Returns true once [`done`](Self::done) was called and the queue drained.
    pub fn is_done(&self) -> bool {
        self.done && self.output.is_empty()
    }

    /// Wait for the next inbound frame, flushing the queue meanwhile.
    ///
    /// Cancel safe: a partially received frame stays buffered and queued
    /// bytes are only consumed once written.
    pub async fn next_event(&mut self) -> Result<ControlEvent> {
        loop {
            if self.drained {
                self.drained = false;
                return Ok(ControlEvent::Drained);
            }
            if self.eof {
                return Ok(ControlEvent::Closed);
            }

            tokio::select! {
                frame = self.reader.next() => {
                    return match frame {
                        Some(frame) => {
                            let frame = frame?;
                            trace!(command = %frame.command, len = frame.payload.len(), "control frame");
                            Ok(ControlEvent::Frame(frame))
                        }
                        None => {
                            self.eof = true;
                            Ok(ControlEvent::Closed)
                        }
                    };
                }
                written = self.writer.write(&self.output), if !self.output.is_empty() => {
                    self.consume(written?)?;
                    if self.output.is_empty() {
                        self.drained = true;
                    }
                }
            }
        }
    }

    fn consume(&mut self, written: usize) -> Result<()> {
        if written == 0 {
            return Err(std::io::Error::from(std::io::ErrorKind::WriteZero).into());
        }
        self.output.advance(written);
        Ok(())
    }

    /// Write out the whole queue.
    pub async fn flush(&mut self) -> Result<()> {
        while !self.output.is_empty() {
            let written = self.writer.write(&self.output).await?;
            self.consume(written)?;
        }
        Ok(())
    }

    /// Mark the channel done, flush it and shut down the write direction.
    pub async fn close(&mut self) -> Result<()> {
        self.done();
        self.flush().await?;
        self.writer.shutdown().await?;
        Ok(())
    }
}
