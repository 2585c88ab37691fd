use std::path::PathBuf;

use clap::{Args, Subcommand};

use crate::exit::{io_error, CliResult};
use crate::output::OutputFormat;

pub mod request;
pub mod serve;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a mirroring WAS application on the inherited descriptors.
    Serve(ServeArgs),
    /// Launch a WAS application and send it one request.
    Request(RequestArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Serve(args) => serve::run(args),
        Command::Request(args) => request::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

/// Sessions are single-task; a current-thread runtime is enough.
fn runtime() -> CliResult<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|err| io_error("failed to start runtime", err))
}

#[derive(Args, Debug, Default)]
pub struct ServeArgs {
    /// Echo the request body back in the response.
    #[arg(long)]
    pub echo_body: bool,
}

#[derive(Args, Debug)]
pub struct RequestArgs {
    /// Request method.
    #[arg(long, short = 'X', default_value = "GET")]
    pub method: String,
    /// Request URI.
    #[arg(long, default_value = "/")]
    pub uri: String,
    #[arg(long)]
    pub script_name: Option<String>,
    #[arg(long)]
    pub path_info: Option<String>,
    #[arg(long)]
    pub query_string: Option<String>,
    #[arg(long)]
    pub remote_host: Option<String>,
    /// Request header as NAME=VALUE (repeatable).
    #[arg(long = "header", short = 'H', value_name = "NAME=VALUE")]
    pub headers: Vec<String>,
    /// Request parameter as NAME=VALUE (repeatable).
    #[arg(long = "param", short = 'p', value_name = "NAME=VALUE")]
    pub params: Vec<String>,
    /// Request body as a string.
    #[arg(long, conflicts_with = "file")]
    pub data: Option<String>,
    /// Read the request body from a file.
    #[arg(long, conflicts_with = "data")]
    pub file: Option<PathBuf>,
    /// Cancel the request if no response arrived after this many milliseconds.
    #[arg(long, value_name = "MS")]
    pub cancel_after: Option<u64>,
    /// Application command line.
    #[arg(last = true, required = true, value_name = "PROGRAM")]
    pub command: Vec<String>,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}
