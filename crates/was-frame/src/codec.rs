use bytes::{Buf, BufMut, Bytes, BytesMut};
use tracing::{trace, warn};

use crate::command::Command;
use crate::error::{FrameError, Result};

/// Frame header: length (2) + command (2) = 4 bytes.
pub const HEADER_SIZE: usize = 4;

/// Largest payload the 16-bit length field can describe.
pub const MAX_PAYLOAD: usize = u16::MAX as usize;

/// Default capacity of a control channel output queue.
pub const DEFAULT_OUTPUT_CAPACITY: usize = 64 * 1024 + HEADER_SIZE;

/// One control channel message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// The command.
    pub command: Command,
    /// Command-specific payload.
    pub payload: Bytes,
}

impl Frame {
    /// Create a new frame.
    pub fn new(command: Command, payload: impl Into<Bytes>) -> Self {
        Self {
            command,
            payload: payload.into(),
        }
    }

    /// Create a frame without payload.
    pub fn empty(command: Command) -> Self {
        Self::new(command, Bytes::new())
    }

    /// The total wire size of this frame (header + payload).
    pub fn wire_size(&self) -> usize {
        HEADER_SIZE + self.payload.len()
    }
}

/// Append the header of a frame with a `length`-byte payload.
///
/// Wire format (host byte order, this is local IPC only):
/// ```text
/// ┌─────────────┬─────────────┬──────────────────┐
/// │ Length (2B) │ Command (2B)│ Payload          │
/// │ u16         │ u16         │ (Length bytes)   │
/// └─────────────┴─────────────┴──────────────────┘
/// ```
pub fn encode_header(command: Command, length: usize, dst: &mut BytesMut) -> Result<()> {
    if length > MAX_PAYLOAD {
        return Err(FrameError::PayloadTooLarge {
            size: length,
            max: MAX_PAYLOAD,
        });
    }
    dst.reserve(HEADER_SIZE + length);
    dst.put_u16_ne(length as u16);
    dst.put_u16_ne(command.code());
    Ok(())
}

/// Encode a frame into the wire format.
pub fn encode_frame(command: Command, payload: &[u8], dst: &mut BytesMut) -> Result<()> {
    encode_header(command, payload.len(), dst)?;
    dst.put_slice(payload);
    Ok(())
}

/// Decode a frame from a buffer.
///
/// Returns `Ok(None)` if the buffer doesn't contain a complete frame yet.
/// On success, consumes exactly the frame bytes from the buffer.
pub fn decode_frame(src: &mut BytesMut, max_payload: usize) -> Result<Option<Frame>> {
    if src.len() < HEADER_SIZE {
        return Ok(None);
    }

    let payload_len = usize::from(u16::from_ne_bytes([src[0], src[1]]));
    let command = Command::try_from(u16::from_ne_bytes([src[2], src[3]]))?;

    if payload_len > max_payload {
        warn!(%command, size = payload_len, max = max_payload, "oversized frame");
        return Err(FrameError::PayloadTooLarge {
            size: payload_len,
            max: max_payload,
        });
    }

    if src.len() < HEADER_SIZE + payload_len {
        return Ok(None);
    }

    src.advance(HEADER_SIZE);
    let payload = src.split_to(payload_len).freeze();
    trace!(%command, len = payload_len, "decoded frame");

    Ok(Some(Frame { command, payload }))
}

/// Decode a frame after the stream has ended.
///
/// Leftover bytes that do not form a complete frame are a
/// [`FrameError::Truncated`] error; an empty buffer is `Ok(None)`.
pub fn decode_frame_eof(src: &mut BytesMut, max_payload: usize) -> Result<Option<Frame>> {
    if let Some(frame) = decode_frame(src, max_payload)? {
        return Ok(Some(frame));
    }
    if src.is_empty() {
        return Ok(None);
    }

    let expected = if src.len() >= 2 {
        HEADER_SIZE + usize::from(u16::from_ne_bytes([src[0], src[1]]))
    } else {
        HEADER_SIZE
    };
    Err(FrameError::Truncated {
        expected,
        available: src.len(),
    })
}

/// Configuration for the frame codec.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Maximum accepted payload size in bytes. Default: 65535.
    pub max_payload_size: usize,
    /// Capacity of the outbound queue in bytes; a frame that does not fit
    /// is rejected instead of growing the queue.
    pub output_capacity: usize,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_payload_size: MAX_PAYLOAD,
            output_capacity: DEFAULT_OUTPUT_CAPACITY,
        }
    }
}
