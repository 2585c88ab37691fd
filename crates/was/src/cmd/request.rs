use std::fs;
use std::time::Duration;

use bytes::Bytes;
use tracing::{debug, info, warn};
use was_simple::{Method, Request, Response, SimpleClient};
use was_transport::WasSocket;

use crate::cmd::{runtime, RequestArgs};
use crate::exit::{io_error, transport_error, was_error, CliError, CliResult, SUCCESS, USAGE};
use crate::output::{print_cancelled, print_response, OutputFormat};

pub fn run(args: RequestArgs, format: OutputFormat) -> CliResult<i32> {
    let request = build_request(&args)?;
    let (program, program_args) = args
        .command
        .split_first()
        .ok_or_else(|| CliError::new(USAGE, "missing application command"))?;

    let runtime = runtime()?;
    let mut command = std::process::Command::new(program);
    command.args(program_args);
    let (mut child, socket) = was_transport::spawn(&mut command)
        .map_err(|err| transport_error("failed to launch application", err))?;

    let outcome = runtime.block_on(exchange(socket, request, args.cancel_after));
    // The client side is closed by now, so the application sees EOF.
    match child.wait() {
        Ok(status) => debug!(%status, "application exited"),
        Err(err) => warn!(error = %err, "failed to wait for application"),
    }

    match outcome? {
        Some(response) => print_response(&response, format),
        None => print_cancelled(args.cancel_after.unwrap_or_default(), format),
    }
    Ok(SUCCESS)
}

fn build_request(args: &RequestArgs) -> CliResult<Request> {
    let method: Method = args
        .method
        .parse()
        .map_err(|err| CliError::new(USAGE, format!("--method: {err}")))?;

    let mut request = Request::new(method, args.uri.clone());
    request.script_name = args.script_name.clone();
    request.path_info = args.path_info.clone();
    request.query_string = args.query_string.clone();
    request.remote_host = args.remote_host.clone();
    for header in &args.headers {
        let (name, value) = split_pair("--header", header)?;
        request.headers.append(name, value);
    }
    for param in &args.params {
        let (name, value) = split_pair("--param", param)?;
        request.parameters.insert(name.to_string(), value.to_string());
    }

    if let Some(data) = &args.data {
        request.body = Some(Bytes::copy_from_slice(data.as_bytes()));
    } else if let Some(path) = &args.file {
        let body = fs::read(path)
            .map_err(|err| io_error(&format!("failed reading {}", path.display()), err))?;
        request.body = Some(Bytes::from(body));
    }
    Ok(request)
}

fn split_pair<'a>(flag: &str, pair: &'a str) -> CliResult<(&'a str, &'a str)> {
    match pair.split_once('=') {
        Some((name, value)) if !name.is_empty() => Ok((name, value)),
        _ => Err(CliError::new(
            USAGE,
            format!("{flag} expects NAME=VALUE, got {pair:?}"),
        )),
    }
}

/// Run one exchange. `Ok(None)` means the request was cancelled locally.
async fn exchange(
    socket: WasSocket,
    request: Request,
    cancel_after: Option<u64>,
) -> CliResult<Option<Response>> {
    let mut client =
        SimpleClient::new(socket).map_err(|err| was_error("session setup failed", err))?;
    info!(method = %request.method, uri = %request.uri, "sending request");
    client
        .send_request(request)
        .map_err(|err| was_error("failed to send request", err))?;

    let response = match cancel_after {
        Some(ms) => tokio::select! {
            response = client.response() => Some(response),
            () = tokio::time::sleep(Duration::from_millis(ms)) => None,
        },
        None => Some(client.response().await),
    };

    match response {
        Some(response) => response
            .map(Some)
            .map_err(|err| was_error("request failed", err)),
        None => {
            info!(after_ms = cancel_after, "cancelling request");
            client
                .cancel()
                .map_err(|err| was_error("failed to cancel request", err))?;
            client
                .flush()
                .await
                .map_err(|err| was_error("failed to cancel request", err))?;
            Ok(None)
        }
    }
}
