use crate::command::Command;

/// Errors that can occur during frame encoding/decoding.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The frame header names a command this implementation does not know.
    #[error("unknown command code {0}")]
    UnknownCommand(u16),

    /// The payload exceeds the configured maximum size.
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// The stream ended inside a frame.
    #[error("truncated frame ({available} of {expected} bytes)")]
    Truncated { expected: usize, available: usize },

    /// The payload does not match the encoding its command requires.
    #[error("malformed {command} payload: {reason}")]
    MalformedPayload {
        command: Command,
        reason: &'static str,
    },

    /// An I/O error occurred while reading or writing frames.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The connection was closed on a frame boundary.
    #[error("connection closed")]
    ConnectionClosed,
}

impl FrameError {
    pub(crate) fn malformed(command: Command, reason: &'static str) -> Self {
        Self::MalformedPayload { command, reason }
    }
}

pub type Result<T> = std::result::Result<T, FrameError>;
