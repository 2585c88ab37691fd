//! The server side of a WAS connection: the application's view.

use std::future::Future;

use tracing::{debug, trace, warn};
use was_frame::{payload, Command, Frame};
use was_transport::WasSocket;

use crate::config::SessionConfig;
use crate::control::ControlEvent;
use crate::error::{Result, WasError};
use crate::input::InputEvent;
use crate::message::{Request, Response};
use crate::method::Method;
use crate::output::WriteProgress;
use crate::session::{decode_text, decode_text_pair, unexpected, Channels, SessionEvent};

/// Produces the response to one request.
///
/// Implemented for every `Fn(Request) -> impl Future<Output = Response>`.
/// The returned future is dropped if the peer cancels the request.
pub trait RequestHandler {
    fn handle(&self, request: Request) -> impl Future<Output = Response>;
}

impl<F, Fut> RequestHandler for F
where
    F: Fn(Request) -> Fut,
    Fut: Future<Output = Response>,
{
    fn handle(&self, request: Request) -> impl Future<Output = Response> {
        self(request)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum Phase {
    #[default]
    Idle,
    Headers,
    Body,
    /// The request is complete and not yet handed out.
    Pending,
    /// The request was handed out; its response is outstanding.
    Submitted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    Continue,
    /// The peer cancelled the submitted request.
    Stopped,
    /// The peer closed the connection between requests.
    Closed,
}

#[derive(Debug, Default)]
struct Incoming {
    phase: Phase,
    request: Request,
    method_set: bool,
    uri_set: bool,
    /// Method of the submitted request.
    submitted: Option<Method>,
}

/// Receives requests from a WAS client and sends responses.
pub struct SimpleServer {
    channels: Option<Channels>,
    incoming: Incoming,
}

impl SimpleServer {
    /// Create a server with default configuration. Must be called inside a
    /// tokio runtime.
    pub fn new(socket: WasSocket) -> Result<Self> {
        Self::with_config(socket, SessionConfig::default())
    }

    pub fn with_config(socket: WasSocket, config: SessionConfig) -> Result<Self> {
        Ok(Self {
            channels: Some(Channels::new(socket, &config)?),
            incoming: Incoming::default(),
        })
    }

    /// Returns false after a fatal error or once the peer closed.
    pub fn is_open(&self) -> bool {
        self.channels.is_some()
    }

    /// Wait for the next complete request.
    ///
    /// Returns `Ok(None)` when the peer closes the connection between
    /// requests. Cancel safe.
    pub async fn next_request(&mut self) -> Result<Option<Request>> {
        if self.channels.is_none() {
            return Err(WasError::Closed);
        }
        if self.incoming.phase == Phase::Submitted {
            return Err(WasError::InvalidState(
                "the previous request has no response yet",
            ));
        }

        loop {
            if self.incoming.phase == Phase::Pending {
                return Ok(Some(self.incoming.submit()));
            }
            if self.step().await? == Step::Closed {
                return Ok(None);
            }
        }
    }

    /// Wait while the submitted request is being handled.
    ///
    /// Resolves with `true` when the peer cancels it and `false` when the
    /// peer closes the connection. Cancel safe, so it can be raced against
    /// the handler.
    pub async fn cancelled(&mut self) -> Result<bool> {
        if self.channels.is_none() {
            return Err(WasError::Closed);
        }
        if self.incoming.phase != Phase::Submitted {
            return Err(WasError::InvalidState("no request awaiting a response"));
        }

        loop {
            match self.step().await? {
                Step::Continue => {}
                Step::Stopped => return Ok(true),
                Step::Closed => return Ok(false),
            }
        }
    }

    /// Queue the response to the submitted request.
    ///
    /// The body is dropped for statuses that forbid one; for `HEAD` requests
    /// it is replaced by a `content-length` header. Body bytes are written
    /// while the connection is driven by [`next_request`](Self::next_request)
    /// or [`flush`](Self::flush).
    pub fn send_response(&mut self, response: Response) -> Result<()> {
        let channels = self.channels.as_mut().ok_or(WasError::Closed)?;
        if self.incoming.phase != Phase::Submitted {
            return Err(WasError::InvalidState("no request awaiting a response"));
        }

        let head = self.incoming.submitted == Some(Method::Head);
        debug!(status = response.status.code(), head, "sending response");
        match write_response(channels, response, head) {
            Ok(()) => {
                self.incoming.phase = Phase::Idle;
                self.incoming.submitted = None;
                Ok(())
            }
            Err(err) => Err(self.fail(err)),
        }
    }

    /// Queue a `METRIC` for the submitted request.
    pub fn send_metric(&mut self, name: &str, value: f32) -> Result<()> {
        let channels = self.channels.as_mut().ok_or(WasError::Closed)?;
        if self.incoming.phase != Phase::Submitted {
            return Err(WasError::InvalidState("no request awaiting a response"));
        }
        if name.is_empty() {
            return Err(WasError::InvalidState("metric name is empty"));
        }

        match channels.control.send_metric(name, value) {
            Ok(()) => Ok(()),
            Err(err) => Err(self.fail(err)),
        }
    }

    /// Serve requests until the peer closes the connection.
    ///
    /// Control frames keep being processed while `handler` runs; a `STOP`
    /// from the peer drops the handler future.
    pub async fn run<H: RequestHandler>(&mut self, handler: H) -> Result<()> {
        while let Some(request) = self.next_request().await? {
            let handling = handler.handle(request);
            tokio::pin!(handling);

            let response = tokio::select! {
                response = &mut handling => response,
                cancelled = self.cancelled() => {
                    if cancelled? {
                        debug!("handler cancelled by peer");
                        continue;
                    }
                    return Ok(());
                }
            };
            self.send_response(response)?;
        }
        Ok(())
    }

    /// Drive the connection until every queued frame and body byte is
    /// written.
    pub async fn flush(&mut self) -> Result<()> {
        loop {
            let Some(channels) = self.channels.as_ref() else {
                return Err(WasError::Closed);
            };
            if !channels.has_pending_output() {
                return Ok(());
            }
            if self.step().await? == Step::Closed {
                return Ok(());
            }
        }
    }

    /// Flush and shut down the control channel.
    pub async fn close(mut self) -> Result<()> {
        self.flush().await?;
        if let Some(channels) = self.channels.as_mut() {
            channels.control.close().await?;
        }
        Ok(())
    }

    async fn step(&mut self) -> Result<Step> {
        let channels = self.channels.as_mut().ok_or(WasError::Closed)?;
        let result = match channels.next_event(true).await {
            Ok(event) => self.incoming.handle(channels, event),
            Err(err) => Err(err),
        };

        match result {
            Ok(Step::Closed) => {
                debug!("peer closed the connection");
                self.channels = None;
                Ok(Step::Closed)
            }
            Ok(step) => Ok(step),
            Err(err) => Err(self.fail(err)),
        }
    }

    fn fail(&mut self, err: WasError) -> WasError {
        if err.is_fatal() {
            warn!(error = %err, "WAS server failed, closing connection");
            self.channels = None;
            self.incoming = Incoming::default();
        }
        err
    }
}

fn write_response(channels: &mut Channels, response: Response, head: bool) -> Result<()> {
    let Response {
        status,
        mut headers,
        mut body,
        metrics,
    } = response;

    if !status.permits_body() {
        body = None;
    } else if head {
        if let Some(body) = body.take() {
            headers.set("content-length", body.len().to_string());
        }
    }

    let control = &mut channels.control;
    control.send_u16(Command::Status, status.code())?;
    for (name, value) in headers.iter() {
        control.send_pair(Command::Header, name, value)?;
    }
    for metric in &metrics {
        control.send_metric(&metric.name, metric.value)?;
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

impl Incoming {
    fn submit(&mut self) -> Request {
        let request = std::mem::take(&mut self.request);
        debug!(method = %request.method, uri = %request.uri, "request submitted");
        self.phase = Phase::Submitted;
        self.submitted = Some(request.method);
        request
    }

    fn abort(&mut self) {
        self.phase = Phase::Idle;
        self.request = Request::default();
        self.submitted = None;
    }

    fn handle(&mut self, channels: &mut Channels, event: SessionEvent) -> Result<Step> {
        match event {
            SessionEvent::Control(ControlEvent::Frame(frame)) => {
                return self.handle_frame(channels, frame);
            }
            SessionEvent::Control(ControlEvent::Drained) => self.poll_body(channels),
            SessionEvent::Control(ControlEvent::Closed) => {
                return match self.phase {
                    Phase::Idle | Phase::Submitted => Ok(Step::Closed),
                    _ => Err(WasError::Disconnected(
                        "control channel closed during a request",
                    )),
                };
            }
            SessionEvent::Input(InputEvent::Complete(body)) => {
                if self.phase == Phase::Body {
                    self.request.body = Some(body);
                    self.phase = Phase::Pending;
                }
            }
            SessionEvent::Output(WriteProgress::Finished) => trace!("response body written"),
            SessionEvent::Input(_) | SessionEvent::Output(WriteProgress::Pending) => {}
        }
        Ok(Step::Continue)
    }

    fn poll_body(&mut self, channels: &mut Channels) {
        if self.phase == Phase::Body {
            if let Some(body) = channels.input.check_complete() {
                self.request.body = Some(body);
                self.phase = Phase::Pending;
            }
        }
    }

    fn expect_headers(&self, command: Command) -> Result<()> {
        if self.phase == Phase::Headers {
            Ok(())
        } else {
            Err(unexpected(command, self.phase))
        }
    }

    fn end_headers(&self, command: Command, payload: &[u8]) -> Result<()> {
        payload::expect_empty(command, payload)?;
        self.expect_headers(command)?;
        if !self.uri_set {
            return Err(WasError::protocol(format!("{command} before URI")));
        }
        Ok(())
    }

    fn handle_frame(&mut self, channels: &mut Channels, frame: Frame) -> Result<Step> {
        let Frame { command, payload } = frame;
        match command {
            Command::Nop => {}
            Command::Request => {
                payload::expect_empty(command, &payload)?;
                if self.phase != Phase::Idle || channels.output.is_active() {
                    return Err(unexpected(command, self.phase));
                }
                if channels.input.is_receiving() {
                    return Err(WasError::protocol(
                        "REQUEST before the cancelled body was terminated",
                    ));
                }
                channels.output.reset();
                *self = Incoming {
                    phase: Phase::Headers,
                    ..Incoming::default()
                };
                trace!("request started");
            }
            Command::Method => {
                self.expect_headers(command)?;
                let code = payload::decode_u32(command, &payload)?;
                let method = Method::from_code(code)
                    .ok_or_else(|| WasError::protocol(format!("invalid method code {code}")))?;
                if self.method_set && method != self.request.method {
                    return Err(WasError::protocol(format!(
                        "conflicting METHOD {method} after {}",
                        self.request.method
                    )));
                }
                self.request.method = method;
                self.method_set = true;
            }
            Command::Uri => {
                self.expect_headers(command)?;
                self.request.uri = decode_text(command, &payload)?.to_string();
                self.uri_set = true;
            }
            Command::ScriptName | Command::PathInfo | Command::QueryString | Command::RemoteHost => {
                self.expect_headers(command)?;
                let value = Some(decode_text(command, &payload)?.to_string());
                match command {
                    Command::ScriptName => self.request.script_name = value,
                    Command::PathInfo => self.request.path_info = value,
                    Command::QueryString => self.request.query_string = value,
                    _ => self.request.remote_host = value,
                }
            }
            Command::Header => {
                self.expect_headers(command)?;
                let (name, value) = decode_text_pair(command, &payload)?;
                self.request.headers.append(name, value);
            }
            Command::Parameter => {
                self.expect_headers(command)?;
                let (name, value) = decode_text_pair(command, &payload)?;
                self.request
                    .parameters
                    .insert(name.to_string(), value.to_string());
            }
            Command::NoData => {
                self.end_headers(command, &payload)?;
                self.phase = Phase::Pending;
            }
            Command::Data => {
                self.end_headers(command, &payload)?;
                self.phase = Phase::Body;
                channels.input.activate();
            }
            Command::Length => {
                if self.phase != Phase::Body || !channels.input.is_receiving() {
                    return Err(unexpected(command, self.phase));
                }
                channels
                    .input
                    .set_length(payload::decode_u64(command, &payload)?)?;
                self.poll_body(channels);
            }
            Command::Stop => {
                payload::expect_empty(command, &payload)?;
                return self.stop(channels);
            }
            Command::Premature => {
                let length = payload::decode_u64(command, &payload)?;
                match self.phase {
                    Phase::Body => {
                        channels.input.premature(length)?;
                        debug!(length, "request body cut short by peer, request aborted");
                        self.abort();
                    }
                    Phase::Headers => return Err(unexpected(command, self.phase)),
                    _ if channels.input.is_receiving() => {
                        channels.input.premature(length)?;
                        debug!(length, "cancelled request body cut short by peer");
                    }
                    _ => debug!(length, "ignoring PREMATURE without a request body"),
                }
            }
            Command::Status | Command::Metric => return Err(unexpected(command, self.phase)),
        }
        Ok(Step::Continue)
    }

    fn stop(&mut self, channels: &mut Channels) -> Result<Step> {
        if self.phase == Phase::Idle {
            let sent = channels.output.stop();
            channels.control.send_u64(Command::Premature, sent)?;
            debug!(sent, "response body stopped by peer");
            return Ok(Step::Continue);
        }

        let phase = self.phase;
        if !channels.input.discard_rest() {
            // The peer still owes a PREMATURE telling how much it wrote.
            debug!("request body length unknown, waiting for PREMATURE");
        }
        self.abort();
        channels.control.send_u64(Command::Premature, 0)?;
        debug!(?phase, "request cancelled by peer");
        Ok(if phase == Phase::Submitted {
            Step::Stopped
        } else {
            Step::Continue
        })
    }
}
