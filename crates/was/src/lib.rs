//! Web Application Socket (WAS) protocol.
//!
//! WAS connects a web server to an application process through a control
//! socket and two body pipes. One request is in flight per connection.
//!
//! # Crate Structure
//!
//! - [`transport`]: descriptor setup (socket pairs, pipes, inherited fds, child launch)
//! - [`frame`]: control channel framing and payload encodings
//! - [`simple`]: asynchronous client and server sessions
//!
//! The most used session types are re-exported at the crate root.

/// Re-export transport types.
pub mod transport {
    pub use was_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use was_frame::*;
}

/// Re-export session types.
pub mod simple {
    pub use was_simple::*;
}

pub use was_simple::{
    Headers, Method, Request, RequestHandler, Response, SessionConfig, SimpleClient,
    SimpleServer, Status, WasError,
};
pub use was_transport::WasSocket;
