mod cmd;
mod exit;
mod logging;
mod output;

use clap::Parser;

use crate::cmd::Command;
use crate::logging::{init_logging, LogFormat, LogLevel};
use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(name = "was", version, about = "Web Application Socket client and test application")]
struct Cli {
    /// Output format.
    #[arg(long, value_name = "FORMAT", global = true)]
    format: Option<OutputFormat>,

    /// Log output format (stderr).
    #[arg(long, value_name = "FORMAT", default_value = "text", global = true)]
    log_format: LogFormat,

    /// Minimum log level (stderr).
    #[arg(long, value_name = "LEVEL", default_value = "info", global = true)]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Command,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_format, cli.log_level);

    let format = cli.format.unwrap_or_else(OutputFormat::default_for_stdout);
    match cmd::run(cli.command, format) {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(err.code);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_request_with_application_command() {
        let cli = Cli::try_parse_from([
            "was",
            "request",
            "--uri",
            "/x",
            "--header",
            "a=b",
            "--",
            "was",
            "--log-level",
            "error",
            "serve",
        ])
        .expect("request args should parse");

        let Command::Request(args) = cli.command else {
            panic!("expected request subcommand");
        };
        assert_eq!(args.uri, "/x");
        assert_eq!(args.headers, vec!["a=b"]);
        assert_eq!(args.command, vec!["was", "--log-level", "error", "serve"]);
    }

    #[test]
    fn request_requires_application_command() {
        let err = Cli::try_parse_from(["was", "request", "--uri", "/"])
            .expect_err("missing command should fail");
        assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);
    }

    #[test]
    fn rejects_conflicting_body_args() {
        let err = Cli::try_parse_from([
            "was", "request", "--data", "x", "--file", "/tmp/body", "--", "app",
        ])
        .expect_err("conflicting args should fail");
        assert_eq!(err.kind(), clap::error::ErrorKind::ArgumentConflict);
    }

    #[test]
    fn parses_serve_subcommand() {
        let cli = Cli::try_parse_from(["was", "serve", "--echo-body"]).expect("serve should parse");
        assert!(matches!(cli.command, Command::Serve(args) if args.echo_body));
    }
}
