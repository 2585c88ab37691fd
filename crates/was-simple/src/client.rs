//! The client side of a WAS connection: the web server's view.
//!
//! A [`SimpleClient`] sends one request at a time and collects the
//! response. Sending only queues frames; the exchange makes progress while
//! [`SimpleClient::response`] (or [`SimpleClient::flush`]) is awaited.

use bytes::Bytes;
use tracing::{debug, trace, warn};
use was_frame::{payload, Command, Frame};
use was_transport::WasSocket;

use crate::config::SessionConfig;
use crate::control::ControlEvent;
use crate::error::{Result, WasError};
use crate::input::InputEvent;
use crate::message::{Metric, Request, Response};
use crate::method::Method;
use crate::output::WriteProgress;
use crate::session::{decode_text_pair, unexpected, Channels, SessionEvent};
use crate::status::Status;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum Phase {
    #[default]
    Idle,
    Headers,
    Body,
}

#[derive(Debug, Default)]
struct Exchange {
    phase: Phase,
    in_flight: bool,
    response: Response,
    outcome: Option<Result<Response>>,
    /// Cancelled responses whose `PREMATURE` acknowledgement is outstanding.
    stopping: u32,
    /// The oldest cancelled response announced a body after it was cancelled.
    stopped_body: bool,
}

/// Sends requests to a WAS application and receives its responses.
pub struct SimpleClient {
    channels: Option<Channels>,
    exchange: Exchange,
}

impl SimpleClient {
    /// Create a client with default configuration. Must be called inside a
    /// tokio runtime.
    pub fn new(socket: WasSocket) -> Result<Self> {
        Self::with_config(socket, SessionConfig::default())
    }

    pub fn with_config(socket: WasSocket, config: SessionConfig) -> Result<Self> {
        Ok(Self {
            channels: Some(Channels::new(socket, &config)?),
            exchange: Exchange::default(),
        })
    }

    /// Returns false after a fatal error.
    pub fn is_open(&self) -> bool {
        self.channels.is_some()
    }

    /// Returns true between [`send_request`](Self::send_request) and the
    /// outcome of that request.
    pub fn is_busy(&self) -> bool {
        self.exchange.in_flight
    }

    /// Queue a request.
    pub fn send_request(&mut self, request: Request) -> Result<()> {
        let channels = self.channels.as_mut().ok_or(WasError::Closed)?;
        if self.exchange.in_flight {
            return Err(WasError::InvalidState("a request is already in flight"));
        }

        debug!(method = %request.method, uri = %request.uri, "sending request");
        match write_request(channels, request) {
            Ok(()) => {
                self.exchange.begin();
                Ok(())
            }
            Err(err) => Err(self.fail(err)),
        }
    }

    /// Drive the connection until the response to the request in flight is
    /// complete.
    ///
    /// Cancel safe: dropping the future keeps all progress, so it can be
    /// raced against a timer and followed by [`cancel`](Self::cancel).
    pub async fn response(&mut self) -> Result<Response> {
        if self.channels.is_none() {
            return Err(WasError::Closed);
        }
        if !self.exchange.in_flight {
            return Err(WasError::InvalidState("no request in flight"));
        }

        loop {
            let channels = self.channels.as_mut().ok_or(WasError::Closed)?;
            if !channels.output.is_active() {
                if let Some(outcome) = self.exchange.outcome.take() {
                    self.exchange.in_flight = false;
                    return outcome;
                }
            }

            let read_input = self.exchange.stopping == 0;
            let result = match channels.next_event(read_input).await {
                Ok(event) => self.exchange.handle(channels, event),
                Err(err) => Err(err),
            };
            if let Err(err) = result {
                return Err(self.fail(err));
            }
        }
    }

    /// Send a request and wait for its response.
    pub async fn request(&mut self, request: Request) -> Result<Response> {
        self.send_request(request)?;
        self.response().await
    }

    /// Abandon the request in flight.
    ///
    /// Queues `STOP` (and `PREMATURE` for a request body still being sent)
    /// and returns at once. The cancelled response is skipped while later
    /// requests are driven, so the connection stays usable.
    pub fn cancel(&mut self) -> Result<()> {
        let channels = self.channels.as_mut().ok_or(WasError::Closed)?;
        if !self.exchange.in_flight {
            return Err(WasError::InvalidState("no request in flight"));
        }

        match self.exchange.cancel(channels) {
            Ok(()) => Ok(()),
            Err(err) => Err(self.fail(err)),
        }
    }

    /// Drive the connection until everything queued is written and every
    /// cancellation is acknowledged.
    pub async fn flush(&mut self) -> Result<()> {
        loop {
            let channels = self.channels.as_mut().ok_or(WasError::Closed)?;
            let settled = !channels.has_pending_output()
                && !channels.input.is_discarding()
                && self.exchange.stopping == 0;
            if settled {
                return Ok(());
            }

            let read_input = self.exchange.stopping == 0;
            let result = match channels.next_event(read_input).await {
                Ok(event) => self.exchange.handle(channels, event),
                Err(err) => Err(err),
            };
            if let Err(err) = result {
                return Err(self.fail(err));
            }
        }
    }

    fn fail(&mut self, err: WasError) -> WasError {
        if err.is_fatal() {
            warn!(error = %err, "WAS client failed, closing connection");
            self.channels = None;
            self.exchange = Exchange::default();
        }
        err
    }
}

fn write_request(channels: &mut Channels, request: Request) -> Result<()> {
    let Request {
        method,
        uri,
        script_name,
        path_info,
        query_string,
        headers,
        parameters,
        remote_host,
        body,
    } = request;
    let control = &mut channels.control;

    control.send_empty(Command::Request)?;
    if method != Method::Get {
        control.send_u32(Command::Method, method.code())?;
    }
    control.send_string(Command::Uri, &uri)?;
    for (command, value) in [
        (Command::ScriptName, &script_name),
        (Command::PathInfo, &path_info),
        (Command::QueryString, &query_string),
    ] {
        if let Some(value) = value {
            control.send_string(command, value)?;
        }
    }
    for (name, value) in headers.iter() {
        control.send_pair(Command::Header, name, value)?;
    }
    for (name, value) in &parameters {
        control.send_pair(Command::Parameter, name, value)?;
    }
    if let Some(remote_host) = &remote_host {
        control.send_string(Command::RemoteHost, remote_host)?;
    }

    match body {
        Some(body) => {
            control.send_empty(Command::Data)?;
            control.send_u64(Command::Length, body.len() as u64)?;
            channels.output.activate(body);
        }
        None => control.send_empty(Command::NoData)?,
    }
    Ok(())
}

impl Exchange {
    fn begin(&mut self) {
        self.phase = Phase::Headers;
        self.in_flight = true;
        self.response = Response::default();
        self.outcome = None;
    }

    fn finish(&mut self, body: Option<Bytes>) {
        let mut response = std::mem::take(&mut self.response);
        response.body = body;
        debug!(
            status = response.status.code(),
            headers = response.headers.len(),
            body = response.body.as_ref().map_or(0, Bytes::len),
            "response complete"
        );
        self.phase = Phase::Idle;
        self.outcome = Some(Ok(response));
    }

    fn handle(&mut self, channels: &mut Channels, event: SessionEvent) -> Result<()> {
        match event {
            SessionEvent::Control(ControlEvent::Frame(frame)) => self.handle_frame(channels, frame),
            SessionEvent::Control(ControlEvent::Drained) => {
                self.poll_body(channels);
                Ok(())
            }
            SessionEvent::Control(ControlEvent::Closed) => {
                Err(WasError::Disconnected("control channel closed"))
            }
            SessionEvent::Input(InputEvent::Complete(body)) => {
                if self.phase == Phase::Body {
                    self.finish(Some(body));
                }
                Ok(())
            }
            SessionEvent::Output(WriteProgress::Finished) => {
                trace!("request body written");
                Ok(())
            }
            SessionEvent::Input(_) | SessionEvent::Output(WriteProgress::Pending) => Ok(()),
        }
    }

    fn poll_body(&mut self, channels: &mut Channels) {
        if self.phase == Phase::Body {
            if let Some(body) = channels.input.check_complete() {
                self.finish(Some(body));
            }
        }
    }

    fn expect_phase(&self, command: Command, phase: Phase) -> Result<()> {
        if self.phase == phase {
            Ok(())
        } else {
            Err(unexpected(command, self.phase))
        }
    }

    fn handle_frame(&mut self, channels: &mut Channels, frame: Frame) -> Result<()> {
        let Frame { command, payload } = frame;
        if self.stopping > 0 {
            return self.handle_cancelled(channels, command, &payload);
        }

        match command {
            Command::Nop => {}
            Command::Status => {
                self.expect_phase(command, Phase::Headers)?;
                let code = payload::decode_u16(command, &payload)?;
                self.response.status = Status::from_code(code)
                    .ok_or_else(|| WasError::protocol(format!("unrecognized status {code}")))?;
            }
            Command::Header => {
                self.expect_phase(command, Phase::Headers)?;
                let (name, value) = decode_text_pair(command, &payload)?;
                self.response.headers.append(name, value);
            }
            Command::Metric => {
                if self.phase == Phase::Idle {
                    return Err(unexpected(command, self.phase));
                }
                let (name, value) = payload::decode_metric(&payload)?;
                self.response.metrics.push(Metric {
                    name: name.to_string(),
                    value,
                });
            }
            Command::NoData => {
                payload::expect_empty(command, &payload)?;
                self.expect_phase(command, Phase::Headers)?;
                self.finish(None);
            }
            Command::Data => {
                payload::expect_empty(command, &payload)?;
                self.expect_phase(command, Phase::Headers)?;
                self.phase = Phase::Body;
                channels.input.activate();
            }
            Command::Length => {
                self.expect_phase(command, Phase::Body)?;
                channels
                    .input
                    .set_length(payload::decode_u64(command, &payload)?)?;
                self.poll_body(channels);
            }
            Command::Premature => {
                self.expect_phase(command, Phase::Body)?;
                let length = payload::decode_u64(command, &payload)?;
                channels.input.premature(length)?;
                debug!(length, "response body cut short by peer");
                self.phase = Phase::Idle;
                self.response = Response::default();
                self.outcome = Some(Err(WasError::PrematureBody));
            }
            Command::Stop => {
                // The application does not want the rest of the request body.
                payload::expect_empty(command, &payload)?;
                if channels.output.is_active() {
                    let sent = channels.output.stop();
                    channels.control.send_u64(Command::Premature, sent)?;
                    debug!(sent, "request body stopped by peer");
                }
            }
            _ => return Err(unexpected(command, self.phase)),
        }
        Ok(())
    }

    /// Frames of a cancelled response are dropped until its `PREMATURE`
    /// says how much of its body is left in the pipe.
    fn handle_cancelled(
        &mut self,
        channels: &mut Channels,
        command: Command,
        payload: &[u8],
    ) -> Result<()> {
        match command {
            Command::Data => self.stopped_body = true,
            Command::Premature => {
                let length = payload::decode_u64(command, payload)?;
                if channels.input.is_active() || self.stopped_body {
                    channels.input.premature(length)?;
                } else if length != 0 {
                    return Err(WasError::protocol(format!(
                        "PREMATURE {length} for a response without body"
                    )));
                }
                self.stopped_body = false;
                self.stopping -= 1;
                debug!(length, outstanding = self.stopping, "cancellation acknowledged");
            }
            _ => trace!(%command, "dropping frame of cancelled response"),
        }
        Ok(())
    }

    fn cancel(&mut self, channels: &mut Channels) -> Result<()> {
        if channels.output.is_active() {
            let sent = channels.output.stop();
            channels.control.send_u64(Command::Premature, sent)?;
            debug!(sent, "request body abandoned");
        }
        // A complete response needs no STOP.
        if self.phase != Phase::Idle {
            channels.control.send_empty(Command::Stop)?;
            self.stopping += 1;
            debug!(phase = ?self.phase, "request cancelled");
        }

        self.phase = Phase::Idle;
        self.in_flight = false;
        self.response = Response::default();
        self.outcome = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> (SimpleClient, WasSocket) {
        let (client, server) = WasSocket::pair().unwrap();
        (SimpleClient::new(client).unwrap(), server)
    }

    #[tokio::test]
    async fn response_without_request_is_invalid() {
        let (mut client, _server) = client();
        assert!(matches!(
            client.response().await,
            Err(WasError::InvalidState(_))
        ));
        assert!(matches!(client.cancel(), Err(WasError::InvalidState(_))));
        assert!(client.is_open());
    }

    #[tokio::test]
    async fn one_request_at_a_time() {
        let (mut client, _server) = client();
        client.send_request(Request::get("/a")).unwrap();
        assert!(client.is_busy());
        assert!(matches!(
            client.send_request(Request::get("/b")),
            Err(WasError::InvalidState(_))
        ));
        assert!(client.is_open());
    }

    #[tokio::test]
    async fn cancel_frees_the_client() {
        let (mut client, _server) = client();
        client.send_request(Request::get("/a")).unwrap();
        client.cancel().unwrap();
        assert!(!client.is_busy());
        client.send_request(Request::get("/b")).unwrap();
    }

    #[tokio::test]
    async fn peer_close_fails_once_then_closed() {
        let (mut client, server) = client();
        client.send_request(Request::get("/a")).unwrap();
        drop(server);

        let err = client.response().await.unwrap_err();
        assert!(err.is_fatal());
        assert!(!client.is_open());
        assert!(matches!(
            client.response().await,
            Err(WasError::Closed)
        ));
    }
}
