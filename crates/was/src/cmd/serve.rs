use tracing::{debug, info};
use was_simple::{Request, Response, SimpleServer};
use was_transport::WasSocket;

use crate::cmd::{runtime, ServeArgs};
use crate::exit::{io_error, transport_error, was_error, CliResult, SUCCESS};

pub fn run(args: ServeArgs) -> CliResult<i32> {
    runtime()?.block_on(serve(args.echo_body))
}

async fn serve(echo_body: bool) -> CliResult<i32> {
    // SAFETY: `serve` runs as a launched WAS application. Descriptors 3, 0
    // and 1 are its connection and nothing else in this process uses them;
    // logging writes to stderr.
    let socket = unsafe { WasSocket::from_inherited() }
        .map_err(|err| transport_error("no WAS connection on fds 3/0/1", err))?;
    let mut server =
        SimpleServer::new(socket).map_err(|err| was_error("session setup failed", err))?;
    info!(echo_body, "serving");

    let handler = move |request: Request| async move { mirror(request, echo_body) };
    tokio::select! {
        served = server.run(handler) => {
            served.map_err(|err| was_error("serve failed", err))?;
            info!("peer closed the connection");
        }
        signal = tokio::signal::ctrl_c() => {
            signal.map_err(|err| io_error("failed to listen for Ctrl-C", err))?;
            info!("interrupted");
        }
    }
    Ok(SUCCESS)
}

fn mirror(request: Request, echo_body: bool) -> Response {
    debug!(method = %request.method, uri = %request.uri, "mirroring");
    let mut response = Response::ok();
    response.headers = request.headers;
    if echo_body {
        response.body = request.body;
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mirror_copies_headers_and_optionally_body() {
        let request = Request::get("/")
            .with_header("x-one", "1")
            .with_header("x-two", "2")
            .with_body("data");

        let plain = mirror(request.clone(), false);
        assert_eq!(plain.status, was_simple::Status::OK);
        assert_eq!(plain.headers.len(), 2);
        assert!(plain.body.is_none());

        let echoed = mirror(request, true);
        assert_eq!(echoed.body.as_deref(), Some(b"data".as_ref()));
    }
}
