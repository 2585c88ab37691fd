use std::os::fd::{FromRawFd, OwnedFd, RawFd};
use std::os::unix::net::UnixStream;

use tracing::debug;

use crate::error::{Result, TransportError};
use crate::pipe::{check_open, pipe};

/// Descriptor an application process inherits its control socket on.
pub const CONTROL_FD: RawFd = 3;
/// Descriptor an application process reads the request body from (stdin).
pub const INPUT_FD: RawFd = 0;
/// Descriptor an application process writes the response body to (stdout).
pub const OUTPUT_FD: RawFd = 1;

/// The three descriptors of one WAS connection, as seen from one side.
///
/// `input` and `output` are relative to the owner: a client reads the
/// response body from `input`, a server reads the request body from it.
#[derive(Debug)]
pub struct WasSocket {
    /// Bidirectional control socket.
    pub control: UnixStream,
    /// Read end of the pipe carrying inbound body bytes.
    pub input: OwnedFd,
    /// Write end of the pipe carrying outbound body bytes.
    pub output: OwnedFd,
}

impl WasSocket {
    /// Assemble a socket from already-open descriptors.
    pub fn new(control: UnixStream, input: OwnedFd, output: OwnedFd) -> Self {
        Self {
            control,
            input,
            output,
        }
    }

    /// Create a connected `(client, server)` pair within this process.
    ///
    /// The client's `output` feeds the server's `input` (request body) and
    /// the server's `output` feeds the client's `input` (response body).
    pub fn pair() -> Result<(Self, Self)> {
        let (client_control, server_control) =
            UnixStream::pair().map_err(|source| TransportError::Create {
                what: "control socket pair",
                source,
            })?;
        let (request_read, request_write) = pipe()?;
        let (response_read, response_write) = pipe()?;

        debug!("created WAS socket pair");

        Ok((
            Self::new(client_control, response_read, request_write),
            Self::new(server_control, request_read, response_write),
        ))
    }

    /// Adopt the descriptors a WAS application inherits from its parent:
    /// control on fd 3, request body on fd 0, response body on fd 1.
    ///
    /// # Safety
    ///
    /// The caller must guarantee that nothing else in the process owns or
    /// uses fds 0, 1 and 3, and that this is called at most once.
    pub unsafe fn from_inherited() -> Result<Self> {
        // SAFETY: forwarded to the caller.
        unsafe { Self::from_raw_fds(CONTROL_FD, INPUT_FD, OUTPUT_FD) }
    }

    /// Adopt three raw descriptors after checking that each one is open.
    ///
    /// # Safety
    ///
    /// The descriptors must be owned by the caller and not closed or used
    /// elsewhere afterwards; ownership moves into the returned value.
    pub unsafe fn from_raw_fds(control: RawFd, input: RawFd, output: RawFd) -> Result<Self> {
        check_open(control)?;
        check_open(input)?;
        check_open(output)?;

        debug!(control, input, output, "adopting WAS descriptors");

        // SAFETY: each descriptor is open and the caller transfers ownership.
        unsafe {
            Ok(Self::new(
                UnixStream::from_raw_fd(control),
                OwnedFd::from_raw_fd(input),
                OwnedFd::from_raw_fd(output),
            ))
        }
    }

    /// Split into `(control, input, output)`.
    pub fn into_parts(self) -> (UnixStream, OwnedFd, OwnedFd) {
        (self.control, self.input, self.output)
    }
}
