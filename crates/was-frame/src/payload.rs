//! Per-command payload encodings.
//!
//! Numbers are host byte order like the frame header. `HEADER` and
//! `PARAMETER` carry `name '=' value` without escaping; decoding splits on
//! the first separator only, so values may contain `=` but names may not.

use bytes::{BufMut, BytesMut};

use crate::codec::encode_header;
use crate::command::Command;
use crate::error::{FrameError, Result};

/// Separator between name and value in `HEADER`/`PARAMETER` payloads.
pub const PAIR_SEPARATOR: u8 = b'=';

/// Encode a complete `name=value` frame.
pub fn encode_pair(command: Command, name: &[u8], value: &[u8], dst: &mut BytesMut) -> Result<()> {
    if name.is_empty() {
        return Err(FrameError::malformed(command, "empty name"));
    }
    if name.contains(&PAIR_SEPARATOR) {
        return Err(FrameError::malformed(command, "name contains '='"));
    }
    encode_header(command, name.len() + 1 + value.len(), dst)?;
    dst.put_slice(name);
    dst.put_u8(PAIR_SEPARATOR);
    dst.put_slice(value);
    Ok(())
}

/// Split a `name=value` payload on its first separator.
pub fn decode_pair(command: Command, payload: &[u8]) -> Result<(&[u8], &[u8])> {
    let pos = payload
        .iter()
        .position(|&b| b == PAIR_SEPARATOR)
        .ok_or_else(|| FrameError::malformed(command, "missing '='"))?;
    if pos == 0 {
        return Err(FrameError::malformed(command, "empty name"));
    }
    Ok((&payload[..pos], &payload[pos + 1..]))
}

/// Encode an 8-byte count (`LENGTH`, `PREMATURE`).
pub fn encode_u64(value: u64) -> [u8; 8] {
    value.to_ne_bytes()
}

/// Decode an 8-byte count.
pub fn decode_u64(command: Command, payload: &[u8]) -> Result<u64> {
    let bytes: [u8; 8] = payload
        .try_into()
        .map_err(|_| FrameError::malformed(command, "expected 8 bytes"))?;
    Ok(u64::from_ne_bytes(bytes))
}

/// Decode a 4-byte value (`METHOD`).
pub fn decode_u32(command: Command, payload: &[u8]) -> Result<u32> {
    let bytes: [u8; 4] = payload
        .try_into()
        .map_err(|_| FrameError::malformed(command, "expected 4 bytes"))?;
    Ok(u32::from_ne_bytes(bytes))
}

/// Decode a 2-byte value (`STATUS`).
pub fn decode_u16(command: Command, payload: &[u8]) -> Result<u16> {
    let bytes: [u8; 2] = payload
        .try_into()
        .map_err(|_| FrameError::malformed(command, "expected 2 bytes"))?;
    Ok(u16::from_ne_bytes(bytes))
}

/// Decode a UTF-8 string payload.
pub fn decode_str(command: Command, payload: &[u8]) -> Result<&str> {
    std::str::from_utf8(payload).map_err(|_| FrameError::malformed(command, "invalid UTF-8"))
}

/// Reject a payload on a command that must not carry one.
pub fn expect_empty(command: Command, payload: &[u8]) -> Result<()> {
    if payload.is_empty() {
        Ok(())
    } else {
        Err(FrameError::malformed(command, "unexpected payload"))
    }
}

/// Encode a complete `METRIC` frame: 4-byte float value, then the name.
pub fn encode_metric(name: &str, value: f32, dst: &mut BytesMut) -> Result<()> {
    if name.is_empty() {
        return Err(FrameError::malformed(Command::Metric, "empty name"));
    }
    encode_header(Command::Metric, 4 + name.len(), dst)?;
    dst.put_slice(&value.to_ne_bytes());
    dst.put_slice(name.as_bytes());
    Ok(())
}

/// Decode a `METRIC` payload into `(name, value)`.
pub fn decode_metric(payload: &[u8]) -> Result<(&str, f32)> {
    if payload.len() <= 4 {
        return Err(FrameError::malformed(Command::Metric, "missing name"));
    }
    let (value, name) = payload.split_at(4);
    let value = f32::from_ne_bytes([value[0], value[1], value[2], value[3]]);
    Ok((decode_str(Command::Metric, name)?, value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{decode_frame, MAX_PAYLOAD};

    fn pair_roundtrip(name: &str, value: &str) -> (String, String) {
        let mut buf = BytesMut::new();
        encode_pair(Command::Header, name.as_bytes(), value.as_bytes(), &mut buf).unwrap();
        let frame = decode_frame(&mut buf, MAX_PAYLOAD).unwrap().unwrap();
        assert_eq!(frame.command, Command::Header);
        let (n, v) = decode_pair(frame.command, &frame.payload).unwrap();
        (
            String::from_utf8(n.to_vec()).unwrap(),
            String::from_utf8(v.to_vec()).unwrap(),
        )
    }

    #[test]
    fn pair_roundtrip_simple() {
        assert_eq!(pair_roundtrip("k", "v"), ("k".into(), "v".into()));
    }

    #[test]
    fn pair_value_may_be_empty() {
        assert_eq!(pair_roundtrip("k", ""), ("k".into(), "".into()));
    }

    #[test]
    fn pair_value_keeps_separators() {
        assert_eq!(
            pair_roundtrip("cookie", "a=1; b=2"),
            ("cookie".into(), "a=1; b=2".into())
        );
    }

    #[test]
    fn pair_without_separator_is_rejected() {
        let err = decode_pair(Command::Parameter, b"novalue").unwrap_err();
        assert!(matches!(
            err,
            FrameError::MalformedPayload {
                command: Command::Parameter,
                ..
            }
        ));
    }

    #[test]
    fn pair_with_empty_name_is_rejected() {
        assert!(decode_pair(Command::Header, b"=value").is_err());
        let mut buf = BytesMut::new();
        assert!(encode_pair(Command::Header, b"", b"v", &mut buf).is_err());
    }

    #[test]
    fn pair_name_with_separator_is_not_encoded() {
        let mut buf = BytesMut::new();
        let err = encode_pair(Command::Header, b"a=b", b"c", &mut buf).unwrap_err();
        assert!(matches!(err, FrameError::MalformedPayload { .. }));
        assert!(buf.is_empty());
    }

    #[test]
    fn u64_roundtrip_and_size_check() {
        let encoded = encode_u64(262_144);
        assert_eq!(decode_u64(Command::Length, &encoded).unwrap(), 262_144);
        assert!(decode_u64(Command::Length, &encoded[..7]).is_err());
    }

    #[test]
    fn fixed_size_numbers_reject_wrong_length() {
        assert_eq!(
            decode_u32(Command::Method, &3u32.to_ne_bytes()).unwrap(),
            3
        );
        assert!(decode_u32(Command::Method, &[1, 2]).is_err());
        assert_eq!(
            decode_u16(Command::Status, &200u16.to_ne_bytes()).unwrap(),
            200
        );
        assert!(decode_u16(Command::Status, &[0, 0, 0]).is_err());
    }

    #[test]
    fn empty_commands_reject_payload() {
        assert!(expect_empty(Command::Stop, b"").is_ok());
        assert!(expect_empty(Command::Stop, b"x").is_err());
    }

    #[test]
    fn strings_must_be_utf8() {
        assert_eq!(decode_str(Command::Uri, b"/foo").unwrap(), "/foo");
        assert!(decode_str(Command::Uri, &[0xFF, 0xFE]).is_err());
    }

    #[test]
    fn metric_roundtrip() {
        let mut buf = BytesMut::new();
        encode_metric("db_time", 1.5, &mut buf).unwrap();
        let frame = decode_frame(&mut buf, MAX_PAYLOAD).unwrap().unwrap();
        assert_eq!(frame.command, Command::Metric);
        let (name, value) = decode_metric(&frame.payload).unwrap();
        assert_eq!(name, "db_time");
        assert_eq!(value, 1.5);
    }

    #[test]
    fn metric_without_name_is_rejected() {
        assert!(decode_metric(&1.0f32.to_ne_bytes()).is_err());
    }
}
