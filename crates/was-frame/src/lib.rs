//! Control channel framing for the Web Application Socket protocol.
//!
//! Every control message is one frame:
//! - A 2-byte payload length
//! - A 2-byte command code
//! - Up to 65535 bytes of command-specific payload
//!
//! Both header fields are in host byte order; WAS never leaves the machine.

#[cfg(feature = "async")]
pub mod async_codec;
pub mod codec;
pub mod command;
pub mod error;
pub mod payload;
pub mod reader;
pub mod writer;

#[cfg(feature = "async")]
pub use async_codec::WasCodec;
pub use codec::{
    decode_frame, decode_frame_eof, encode_frame, encode_header, Frame, FrameConfig,
    DEFAULT_OUTPUT_CAPACITY, HEADER_SIZE, MAX_PAYLOAD,
};
pub use command::Command;
pub use error::{FrameError, Result};
pub use reader::FrameReader;
pub use writer::FrameWriter;
