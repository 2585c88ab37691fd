//! Asynchronous Web Application Socket sessions.
//!
//! A WAS connection is one control socket plus two body pipes. The
//! [`SimpleClient`] (the web server side) sends a request and receives the
//! response; the [`SimpleServer`] (the application side) does the reverse.
//! One request is in flight at a time, and either side can cut an exchange
//! short with `STOP`/`PREMATURE` without losing the connection.
//!
//! Everything runs on the caller's tokio task: queueing frames is
//! synchronous, and the descriptors make progress while a session future
//! is awaited.

pub mod client;
pub mod config;
pub mod control;
pub mod error;
pub mod input;
pub mod message;
pub mod method;
pub mod output;
pub mod server;
mod session;
pub mod status;

pub use client::SimpleClient;
pub use config::{SessionConfig, DEFAULT_MAX_BODY_SIZE};
pub use control::{Control, ControlEvent};
pub use error::{Result, WasError};
pub use input::{Input, InputEvent};
pub use message::{Headers, Metric, Request, Response};
pub use method::{Method, UnknownMethod};
pub use output::{Output, WriteProgress};
pub use server::{RequestHandler, SimpleServer};
pub use status::Status;
