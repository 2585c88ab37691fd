use std::fmt;
use std::io;

use was_frame::FrameError;
use was_simple::WasError;
use was_transport::TransportError;

pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const TRANSPORT_ERROR: i32 = 3;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn io_error(context: &str, err: io::Error) -> CliError {
    let code = match err.kind() {
        io::ErrorKind::BrokenPipe
        | io::ErrorKind::ConnectionReset
        | io::ErrorKind::UnexpectedEof => FAILURE,
        _ => INTERNAL,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn transport_error(context: &str, err: TransportError) -> CliError {
    CliError::new(TRANSPORT_ERROR, format!("{context}: {err}"))
}

pub fn was_error(context: &str, err: WasError) -> CliError {
    match err {
        WasError::Transport(err) => transport_error(context, err),
        WasError::Io(source) | WasError::Frame(FrameError::Io(source)) => {
            io_error(context, source)
        }
        WasError::Frame(_)
        | WasError::Protocol(_)
        | WasError::BodyTooLarge { .. }
        | WasError::PrematureBody => CliError::new(DATA_INVALID, format!("{context}: {err}")),
        WasError::Disconnected(_) | WasError::Closed => {
            CliError::new(FAILURE, format!("{context}: {err}"))
        }
        other => CliError::new(INTERNAL, format!("{context}: {other}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_errors_map_to_exit_codes() {
        assert_eq!(
            was_error("x", WasError::Protocol("bad".into())).code,
            DATA_INVALID
        );
        assert_eq!(was_error("x", WasError::PrematureBody).code, DATA_INVALID);
        assert_eq!(was_error("x", WasError::Disconnected("gone")).code, FAILURE);
        assert_eq!(was_error("x", WasError::InvalidState("busy")).code, INTERNAL);
        assert_eq!(
            was_error("x", WasError::Io(io::ErrorKind::BrokenPipe.into())).code,
            FAILURE
        );
        let reset = FrameError::Io(io::ErrorKind::ConnectionReset.into());
        assert_eq!(was_error("x", WasError::Frame(reset)).code, FAILURE);
        let unknown = FrameError::UnknownCommand(99);
        assert_eq!(was_error("x", WasError::Frame(unknown)).code, DATA_INVALID);
    }

    #[test]
    fn transport_errors_keep_context() {
        let err = transport_error(
            "spawn failed",
            TransportError::Spawn {
                program: "app".into(),
                source: io::ErrorKind::NotFound.into(),
            },
        );
        assert_eq!(err.code, TRANSPORT_ERROR);
        assert!(err.message.starts_with("spawn failed: failed to spawn app"));
    }
}
