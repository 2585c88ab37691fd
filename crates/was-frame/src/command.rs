//! Control channel commands.
//!
//! The numeric codes are part of the wire format and must never change.

use std::fmt;

use crate::error::FrameError;

/// A WAS control command.
#[repr(u16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    /// No operation; ignored by both sides.
    Nop = 0,
    /// Starts a new request.
    Request = 1,
    /// Request method (4-byte method code); omitted for GET.
    Method = 2,
    /// Request URI.
    Uri = 3,
    /// Script name (optional).
    ScriptName = 4,
    /// Path info (optional).
    PathInfo = 5,
    /// Query string (optional).
    QueryString = 6,
    /// One `name=value` header.
    Header = 7,
    /// One `name=value` parameter.
    Parameter = 8,
    /// Response status (2-byte status code).
    Status = 9,
    /// No body follows; ends the header phase.
    NoData = 10,
    /// A body follows on the pipe; ends the header phase.
    Data = 11,
    /// Total body length (8 bytes).
    Length = 12,
    /// Cancel the request in flight.
    Stop = 13,
    /// The body ended early after this many bytes (8 bytes).
    Premature = 14,
    /// Address of the remote HTTP client.
    RemoteHost = 15,
    /// Application metric: 4-byte float followed by the name.
    Metric = 16,
}

impl Command {
    /// All commands, in code order.
    pub const ALL: [Command; 17] = [
        Command::Nop,
        Command::Request,
        Command::Method,
        Command::Uri,
        Command::ScriptName,
        Command::PathInfo,
        Command::QueryString,
        Command::Header,
        Command::Parameter,
        Command::Status,
        Command::NoData,
        Command::Data,
        Command::Length,
        Command::Stop,
        Command::Premature,
        Command::RemoteHost,
        Command::Metric,
    ];

    /// The wire code.
    pub fn code(self) -> u16 {
        self as u16
    }

    /// Look up a command by wire code.
    pub fn from_code(code: u16) -> Option<Self> {
        Self::ALL.get(usize::from(code)).copied()
    }

    /// Protocol name of the command.
    pub fn name(self) -> &'static str {
        match self {
            Command::Nop => "NOP",
            Command::Request => "REQUEST",
            Command::Method => "METHOD",
            Command::Uri => "URI",
            Command::ScriptName => "SCRIPT_NAME",
            Command::PathInfo => "PATH_INFO",
            Command::QueryString => "QUERY_STRING",
            Command::Header => "HEADER",
            Command::Parameter => "PARAMETER",
            Command::Status => "STATUS",
            Command::NoData => "NO_DATA",
            Command::Data => "DATA",
            Command::Length => "LENGTH",
            Command::Stop => "STOP",
            Command::Premature => "PREMATURE",
            Command::RemoteHost => "REMOTE_HOST",
            Command::Metric => "METRIC",
        }
    }

    /// Returns true if the command never carries a payload.
    pub fn is_empty_payload(self) -> bool {
        matches!(
            self,
            Command::Nop | Command::Request | Command::NoData | Command::Data | Command::Stop
        )
    }
}

impl TryFrom<u16> for Command {
    type Error = FrameError;

    fn try_from(code: u16) -> Result<Self, Self::Error> {
        Self::from_code(code).ok_or(FrameError::UnknownCommand(code))
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_match_table_position() {
        for (index, command) in Command::ALL.iter().enumerate() {
            assert_eq!(usize::from(command.code()), index);
            assert_eq!(Command::from_code(command.code()), Some(*command));
        }
    }

    #[test]
    fn wire_codes_are_stable() {
        assert_eq!(Command::Request.code(), 1);
        assert_eq!(Command::Status.code(), 9);
        assert_eq!(Command::Premature.code(), 14);
        assert_eq!(Command::RemoteHost.code(), 15);
        assert_eq!(Command::Metric.code(), 16);
    }

    #[test]
    fn unknown_code_is_rejected() {
        assert!(Command::from_code(17).is_none());
        assert!(matches!(
            Command::try_from(0xFFFF),
            Err(FrameError::UnknownCommand(0xFFFF))
        ));
    }

    #[test]
    fn display_uses_protocol_name() {
        assert_eq!(Command::ScriptName.to_string(), "SCRIPT_NAME");
        assert_eq!(Command::NoData.to_string(), "NO_DATA");
    }
}
