//! `tokio_util::codec` adapter for the control channel.

use bytes::BytesMut;
use tokio_util::codec::{Decoder, Encoder};

use crate::codec::{decode_frame, decode_frame_eof, encode_frame, Frame, FrameConfig};
use crate::error::{FrameError, Result};

/// Control channel codec for `FramedRead`/`FramedWrite`.
#[derive(Debug, Clone, Default)]
pub struct WasCodec {
    config: FrameConfig,
}

impl WasCodec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: FrameConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &FrameConfig {
        &self.config
    }
}

impl Decoder for WasCodec {
    type Item = Frame;
    type Error = FrameError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Frame>> {
        decode_frame(src, self.config.max_payload_size)
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Frame>> {
        decode_frame_eof(src, self.config.max_payload_size)
    }
}

impl Encoder<Frame> for WasCodec {
    type Error = FrameError;

    fn encode(&mut self, frame: Frame, dst: &mut BytesMut) -> Result<()> {
        if frame.payload.len() > self.config.max_payload_size {
            return Err(FrameError::PayloadTooLarge {
                size: frame.payload.len(),
                max: self.config.max_payload_size,
            });
        }
        encode_frame(frame.command, &frame.payload, dst)
    }
}
