use std::io::{ErrorKind, Write};

use bytes::BytesMut;

use crate::codec::{encode_frame, Frame, FrameConfig};
use crate::command::Command;
use crate::error::{FrameError, Result};
use crate::payload::{encode_metric, encode_pair, encode_u64};

const INITIAL_BUFFER_CAPACITY: usize = 8 * 1024;

/// Writes complete frames to a blocking `Write` stream.
pub struct FrameWriter<T> {
    inner: T,
    buf: BytesMut,
    config: FrameConfig,
}

impl<T: Write> FrameWriter<T> {
    /// Create a new frame writer with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    /// Create a new frame writer with explicit configuration.
    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            config,
        }
    }

    /// Write a complete frame (blocking).
    pub fn write_frame(&mut self, frame: &Frame) -> Result<()> {
        self.send(frame.command, frame.payload.as_ref())
    }

    /// Encode and send one frame.
    pub fn send(&mut self, command: Command, payload: &[u8]) -> Result<()> {
        if payload.len() > self.config.max_payload_size {
            return Err(FrameError::PayloadTooLarge {
                size: payload.len(),
                max: self.config.max_payload_size,
            });
        }

        self.buf.clear();
        encode_frame(command, payload, &mut self.buf)?;
        self.write_buffered()
    }

    /// Send a `name=value` frame (`HEADER`, `PARAMETER`).
    pub fn send_pair(&mut self, command: Command, name: &str, value: &str) -> Result<()> {
        self.buf.clear();
        encode_pair(command, name.as_bytes(), value.as_bytes(), &mut self.buf)?;
        self.write_buffered()
    }

    /// Send an 8-byte count (`LENGTH`, `PREMATURE`).
    pub fn send_u64(&mut self, command: Command, value: u64) -> Result<()> {
        self.send(command, &encode_u64(value))
    }

    /// Send a `METRIC` frame.
    pub fn send_metric(&mut self, name: &str, value: f32) -> Result<()> {
        self.buf.clear();
        encode_metric(name, value, &mut self.buf)?;
        self.write_buffered()
    }

    fn write_buffered(&mut self) -> Result<()> {
        // write_all retries `Interrupted` and turns a zero-length write into `WriteZero`.
        if let Err(err) = self.inner.write_all(&self.buf) {
            return Err(match err.kind() {
                ErrorKind::WriteZero => FrameError::ConnectionClosed,
                _ => FrameError::Io(err),
            });
        }
        self.flush()
    }

    /// Flush the underlying stream.
    pub fn flush(&mut self) -> Result<()> {
        loop {
            match self.inner.flush() {
                Ok(()) => return Ok(()),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
        }
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the writer and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use bytes::BytesMut;

    use super::*;
    use crate::codec::decode_frame;
    use crate::payload::{decode_pair, decode_u64};

    fn written_frames(writer: FrameWriter<Cursor<Vec<u8>>>) -> Vec<Frame> {
        let mut wire = BytesMut::from(writer.into_inner().into_inner().as_slice());
        let mut frames = Vec::new();
        while let Some(frame) = decode_frame(&mut wire, usize::MAX).unwrap() {
            frames.push(frame);
        }
        assert!(wire.is_empty());
        frames
    }

    #[test]
    fn write_single_frame() {
        let mut writer = FrameWriter::new(Cursor::new(Vec::<u8>::new()));
        writer.send(Command::Uri, b"/hello").unwrap();

        let frames = written_frames(writer);
        assert_eq!(frames, vec![Frame::new(Command::Uri, "/hello")]);
    }

    #[test]
    fn write_typed_frames() {
        let mut writer = FrameWriter::new(Cursor::new(Vec::<u8>::new()));
        writer.send_pair(Command::Header, "hello", "world").unwrap();
        writer.send_u64(Command::Length, 42).unwrap();
        writer.write_frame(&Frame::empty(Command::Data)).unwrap();

        let frames = written_frames(writer);
        assert_eq!(frames.len(), 3);
        assert_eq!(
            decode_pair(Command::Header, &frames[0].payload).unwrap(),
            (b"hello".as_ref(), b"world".as_ref())
        );
        assert_eq!(decode_u64(Command::Length, &frames[1].payload).unwrap(), 42);
        assert_eq!(frames[2].command, Command::Data);
    }

    #[test]
    fn payload_too_large_rejected() {
        let cfg = FrameConfig {
            max_payload_size: 4,
            ..FrameConfig::default()
        };
        let mut writer = FrameWriter::with_config(Cursor::new(Vec::<u8>::new()), cfg);

        let err = writer.send(Command::Uri, b"/oversized").unwrap_err();
        assert!(matches!(err, FrameError::PayloadTooLarge { .. }));
    }

    #[test]
    fn handles_interrupted_write_and_flush() {
        let writer_impl = InterruptedWriteThenFlush {
            wrote_once: false,
            flush_interrupted: false,
            data: Vec::new(),
        };

        let mut writer = FrameWriter::new(writer_impl);
        writer.send(Command::Stop, b"").unwrap();

        let inner = writer.into_inner();
        assert_eq!(inner.data.len(), crate::codec::HEADER_SIZE);
    }

    #[test]
    fn connection_closed_when_write_returns_zero() {
        let mut writer = FrameWriter::new(ZeroWriter);
        let err = writer.send(Command::Nop, b"").unwrap_err();
        assert!(matches!(err, FrameError::ConnectionClosed));
    }

    struct InterruptedWriteThenFlush {
        wrote_once: bool,
        flush_interrupted: bool,
        data: Vec<u8>,
    }

    impl Write for InterruptedWriteThenFlush {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            if !self.wrote_once {
                self.wrote_once = true;
                return Err(std::io::Error::from(ErrorKind::Interrupted));
            }
            self.data.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            if !self.flush_interrupted {
                self.flush_interrupted = true;
                return Err(std::io::Error::from(ErrorKind::Interrupted));
            }
            Ok(())
        }
    }

    struct ZeroWriter;

    impl Write for ZeroWriter {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            Ok(0)
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }
}
