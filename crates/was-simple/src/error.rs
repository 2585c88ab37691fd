/// Errors that can occur in a WAS session.
#[derive(Debug, thiserror::Error)]
pub enum WasError {
    /// Descriptor setup failed.
    #[error("transport error: {0}")]
    Transport(#[from] was_transport::TransportError),

    /// A control frame could not be encoded or decoded.
    #[error("frame error: {0}")]
    Frame(#[from] was_frame::FrameError),

    /// The peer violated the protocol.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// A descriptor failed or hung up.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A body exceeds the configured cap.
    #[error("body too large ({size} bytes, max {max})")]
    BodyTooLarge { size: u64, max: usize },

    /// A frame does not fit in the control output queue.
    #[error("control queue full ({size} byte frame, {available} bytes free)")]
    QueueFull { size: usize, available: usize },

    /// The peer closed the control channel in the middle of an exchange.
    #[error("peer disconnected: {0}")]
    Disconnected(&'static str),

    /// The peer cut the response body short.
    #[error("premature end of response body")]
    PrematureBody,

    /// The call is not valid in the current session state.
    #[error("invalid state: {0}")]
    InvalidState(&'static str),

    /// The session failed earlier or was closed.
    #[error("session closed")]
    Closed,
}

impl WasError {
    pub(crate) fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol(message.into())
    }

    /// Returns true if the session cannot continue after this error.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::PrematureBody | Self::InvalidState(_))
    }
}

pub type Result<T> = std::result::Result<T, WasError>;
