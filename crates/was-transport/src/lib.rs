//! Descriptor setup for WAS connections.
//!
//! A WAS connection is three already-open descriptors:
//! - a bidirectional control socket carrying framed commands
//! - a pipe this side reads body bytes from
//! - a pipe this side writes body bytes to
//!
//! This is the lowest layer. It creates and adopts descriptors; it never
//! reads or writes protocol data. Everything else builds on [`WasSocket`].

pub mod error;

#[cfg(unix)]
pub mod launch;
#[cfg(unix)]
pub mod pipe;
#[cfg(unix)]
pub mod socket;

pub use error::{Result, TransportError};

#[cfg(unix)]
pub use launch::spawn;
#[cfg(unix)]
pub use pipe::pipe;
#[cfg(unix)]
pub use socket::{WasSocket, CONTROL_FD, INPUT_FD, OUTPUT_FD};
