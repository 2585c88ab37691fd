//! Outbound body pipe.

use std::os::fd::OwnedFd;

use bytes::{Buf, Bytes};
use tokio::io::AsyncWriteExt;
use tokio::net::unix::pipe;
use tracing::trace;

use crate::error::Result;

/// Result of one [`Output::write_some`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteProgress {
    Pending,
    Finished,
}

/// Writes one body at a time to a pipe.
pub struct Output {
    pipe: pipe::Sender,
    remaining: Option<Bytes>,
    position: u64,
}

impl Output {
    /// Wrap the write end of a pipe. Must be called inside a tokio runtime.
    pub fn new(fd: OwnedFd) -> Result<Self> {
        Ok(Self {
            pipe: pipe::Sender::from_owned_fd(fd)?,
            remaining: None,
            position: 0,
        })
    }

    /// Start writing `body`. An empty body leaves the output inactive.
    pub fn activate(&mut self, body: Bytes) {
        self.position = 0;
        self.remaining = (!body.is_empty()).then_some(body);
    }

    pub fn is_active(&self) -> bool {
        self.remaining.is_some()
    }

    /// Bytes of the current transfer written so far.
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Abandon the transfer; returns how many bytes were written, which is
    /// the full length if it already finished.
    pub fn stop(&mut self) -> u64 {
        self.remaining = None;
        self.position
    }

    /// Forget the last transfer.
    pub fn reset(&mut self) {
        self.remaining = None;
        self.position = 0;
    }

    /// Write as much as the pipe takes in one go. Cancel safe.
    pub async fn write_some(&mut self) -> Result<WriteProgress> {
        let Some(remaining) = self.remaining.as_mut() else {
            return Ok(WriteProgress::Finished);
        };

        let n = self.pipe.write(&remaining[..]).await?;
        if n == 0 {
            return Err(std::io::Error::from(std::io::ErrorKind::WriteZero).into());
        }
        remaining.advance(n);
        self.position += n as u64;
        trace!(n, position = self.position, "body bytes written");

        if remaining.is_empty() {
            self.remaining = None;
            return Ok(WriteProgress::Finished);
        }
        Ok(WriteProgress::Pending)
    }
}

#[cfg(test)]
mod tests {
    use std::fs::File;
    use std::io::Read;

    use super::*;

    fn output() -> (Output, File) {
        let (read, write) = was_transport::pipe().unwrap();
        (Output::new(write).unwrap(), File::from(read))
    }

    #[tokio::test]
    async fn empty_body_stays_inactive() {
        let (mut output, _pipe) = output();
        output.activate(Bytes::new());
        assert!(!output.is_active());
        assert_eq!(output.stop(), 0);
    }

    #[tokio::test]
    async fn body_is_written_and_position_kept() {
        let (mut output, mut pipe) = output();
        output.activate(Bytes::from_static(b"hello"));
        assert!(output.is_active());

        while output.write_some().await.unwrap() == WriteProgress::Pending {}
        assert!(!output.is_active());
        assert_eq!(output.stop(), 5);

        let mut buf = [0u8; 5];
        pipe.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"hello");

        output.reset();
        assert_eq!(output.position(), 0);
    }

    #[tokio::test]
    async fn stop_reports_partial_position() {
        let (mut output, mut pipe) = output();
        let body = Bytes::from(vec![1u8; 1 << 20]);
        output.activate(body);

        assert_eq!(output.write_some().await.unwrap(), WriteProgress::Pending);
        let written = output.stop();
        assert!(written > 0 && written < 1 << 20);
        assert!(!output.is_active());

        let mut drained = vec![0u8; written as usize];
        pipe.read_exact(&mut drained).unwrap();
    }

    #[tokio::test]
    async fn closed_reader_is_an_error() {
        let (mut output, pipe) = output();
        drop(pipe);
        output.activate(Bytes::from_static(b"lost"));
        assert!(output.write_some().await.is_err());
    }
}
