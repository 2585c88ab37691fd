use std::fmt;
use std::str::FromStr;

/// HTTP request method as carried by `METHOD`.
///
/// Only the methods with a wire code exist; code 0 is never valid.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Method {
    Head = 1,
    #[default]
    Get = 2,
    Post = 3,
    Put = 4,
    Delete = 5,
    Options = 6,
    Trace = 7,
    Propfind = 8,
    Proppatch = 9,
    Mkcol = 10,
    Copy = 11,
    Move = 12,
    Lock = 13,
    Unlock = 14,
    Patch = 15,
    Report = 16,
}

/// A method name that has no wire code.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unsupported method {0:?}")]
pub struct UnknownMethod(pub String);

impl Method {
    const ALL: [Method; 16] = [
        Method::Head,
        Method::Get,
        Method::Post,
        Method::Put,
        Method::Delete,
        Method::Options,
        Method::Trace,
        Method::Propfind,
        Method::Proppatch,
        Method::Mkcol,
        Method::Copy,
        Method::Move,
        Method::Lock,
        Method::Unlock,
        Method::Patch,
        Method::Report,
    ];

    pub fn code(self) -> u32 {
        self as u32
    }

    pub fn from_code(code: u32) -> Option<Self> {
        let index = usize::try_from(code).ok()?.checked_sub(1)?;
        Self::ALL.get(index).copied()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Method::Head => "HEAD",
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
            Method::Options => "OPTIONS",
            Method::Trace => "TRACE",
            Method::Propfind => "PROPFIND",
            Method::Proppatch => "PROPPATCH",
            Method::Mkcol => "MKCOL",
            Method::Copy => "COPY",
            Method::Move => "MOVE",
            Method::Lock => "LOCK",
            Method::Unlock => "UNLOCK",
            Method::Patch => "PATCH",
            Method::Report => "REPORT",
        }
    }
}

impl FromStr for Method {
    type Err = UnknownMethod;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|method| method.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| UnknownMethod(s.to_string()))
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_roundtrip() {
        for method in Method::ALL {
            assert_eq!(Method::from_code(method.code()), Some(method));
        }
        assert_eq!(Method::Head.code(), 1);
        assert_eq!(Method::Report.code(), 16);
    }

    #[test]
    fn invalid_codes() {
        assert_eq!(Method::from_code(0), None);
        assert_eq!(Method::from_code(17), None);
        assert_eq!(Method::from_code(u32::MAX), None);
    }

    #[test]
    fn parse_is_case_insensitive() {
        assert_eq!("post".parse::<Method>().unwrap(), Method::Post);
        assert_eq!("PROPFIND".parse::<Method>().unwrap(), Method::Propfind);
        assert!("BREW".parse::<Method>().is_err());
    }

    #[test]
    fn default_is_get() {
        assert_eq!(Method::default(), Method::Get);
    }
}
