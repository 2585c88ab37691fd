use std::fmt;

/// A recognized HTTP status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Status(u16);

impl Status {
    pub const CONTINUE: Status = Status(100);
    pub const OK: Status = Status(200);
    pub const NO_CONTENT: Status = Status(204);
    pub const RESET_CONTENT: Status = Status(205);
    pub const NOT_MODIFIED: Status = Status(304);
    pub const BAD_REQUEST: Status = Status(400);
    pub const NOT_FOUND: Status = Status(404);
    pub const METHOD_NOT_ALLOWED: Status = Status(405);
    pub const INTERNAL_SERVER_ERROR: Status = Status(500);

    /// Look up a status code; `None` if it is not a known HTTP status.
    pub fn from_code(code: u16) -> Option<Self> {
        reason_phrase(code).map(|_| Status(code))
    }

    pub fn code(self) -> u16 {
        self.0
    }

    pub fn reason(self) -> &'static str {
        reason_phrase(self.0).unwrap_or("")
    }

    /// Returns false for statuses whose responses never carry a body:
    /// 1xx, 204, 205 and 304.
    pub fn permits_body(self) -> bool {
        !matches!(self.0, 100..=199 | 204 | 205 | 304)
    }
}

impl Default for Status {
    fn default() -> Self {
        Status::OK
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.0, self.reason())
    }
}

fn reason_phrase(code: u16) -> Option<&'static str> {
    let reason = match code {
        100 => "Continue",
        101 => "Switching Protocols",
        102 => "Processing",
        103 => "Early Hints",
        200 => "OK",
        201 => "Created",
        202 => "Accepted",
        203 => "Non-Authoritative Information",
        204 => "No Content",
        205 => "Reset Content",
        206 => "Partial Content",
        207 => "Multi-Status",
        208 => "Already Reported",
        226 => "IM Used",
        300 => "Multiple Choices",
        301 => "Moved Permanently",
        302 => "Found",
        303 => "See Other",
        304 => "Not Modified",
        305 => "Use Proxy",
        307 => "Temporary Redirect",
        308 => "Permanent Redirect",
        400 => "Bad Request",
        401 => "Unauthorized",
        402 => "Payment Required",
        403 => "Forbidden",
        404 => "Not Found",
        405 => "Method Not Allowed",
        406 => "Not Acceptable",
        407 => "Proxy Authentication Required",
        408 => "Request Timeout",
        409 => "Conflict",
        410 => "Gone",
        411 => "Length Required",
        412 => "Precondition Failed",
        413 => "Content Too Large",
        414 => "URI Too Long",
        415 => "Unsupported Media Type",
        416 => "Range Not Satisfiable",
        417 => "Expectation Failed",
        418 => "I'm a teapot",
        421 => "Misdirected Request",
        422 => "Unprocessable Content",
        423 => "Locked",
        424 => "Failed Dependency",
        425 => "Too Early",
        426 => "Upgrade Required",
        428 => "Precondition Required",
        429 => "Too Many Requests",
        431 => "Request Header Fields Too Large",
        451 => "Unavailable For Legal Reasons",
        500 => "Internal Server Error",
        501 => "Not Implemented",
        502 => "Bad Gateway",
        503 => "Service Unavailable",
        504 => "Gateway Timeout",
        505 => "HTTP Version Not Supported",
        506 => "Variant Also Negotiates",
        507 => "Insufficient Storage",
        508 => "Loop Detected",
        510 => "Not Extended",
        511 => "Network Authentication Required",
        _ => return None,
    };
    Some(reason)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognizes_known_codes_only() {
        assert_eq!(Status::from_code(200), Some(Status::OK));
        assert_eq!(Status::from_code(404).unwrap().reason(), "Not Found");
        assert!(Status::from_code(0).is_none());
        assert!(Status::from_code(299).is_none());
        assert!(Status::from_code(999).is_none());
    }

    #[test]
    fn bodyless_statuses() {
        for code in [100, 101, 204, 205, 304] {
            assert!(!Status::from_code(code).unwrap().permits_body(), "{code}");
        }
        for code in [200, 206, 404, 500] {
            assert!(Status::from_code(code).unwrap().permits_body(), "{code}");
        }
    }

    #[test]
    fn display_includes_reason() {
        assert_eq!(Status::NOT_MODIFIED.to_string(), "304 Not Modified");
    }
}
