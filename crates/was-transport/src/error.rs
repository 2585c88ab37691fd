use std::os::fd::RawFd;

/// Errors that can occur while setting up WAS descriptors.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Failed to create a socket pair or pipe.
    #[error("failed to create {what}: {source}")]
    Create {
        what: &'static str,
        source: std::io::Error,
    },

    /// An inherited descriptor is not open in this process.
    #[error("descriptor {fd} is not open: {source}")]
    NotOpen { fd: RawFd, source: std::io::Error },

    /// Failed to launch the application process.
    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },

    /// An I/O error occurred on one of the descriptors.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, TransportError>;
