// Copyright 2025 jonefeewang@gmail.com
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::pin::Pin;

use bytes::BytesMut;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, BufWriter};
use tokio::net::TcpStream;
use tokio::sync::broadcast;
use tokio::time::{self, Sleep};
use tracing::{debug, warn};

use crate::network::event::{ConnectionEvent, ConnectionState};
use crate::network::frame::FrameReader;
use crate::network::number::NumberGenerator;
use crate::protocol::{Command, Reply};
use crate::service::{ClientConfig, Shutdown, TimingConfig};
use crate::utils::Identity;
use crate::AppError::{ConnectFailure, IllegalStateError};
use crate::{AppError, AppResult};

type BoxReader = Box<dyn AsyncRead + Send + Unpin>;
type BoxWriter = Box<dyn AsyncWrite + Send + Unpin>;

const EVENT_CHANNEL_CAPACITY: usize = 128;

/// One outbound session with the number server.
///
/// The connection owns its socket halves, its single pending timer and its
/// random source. All of them are touched only from the task that drives
/// [`Connection::run`]; the outside world talks to it through the
/// cancellation [`Shutdown`] and listens through [`Connection::subscribe`].
pub struct Connection {
    identity: Identity,
    endpoint: SocketAddr,
    state: ConnectionState,
    timing: TimingConfig,
    max_frame_size: usize,
    rng: NumberGenerator,
    reader: Option<FrameReader<BoxReader>>,
    writer: Option<BufWriter<BoxWriter>>,
    /// Next `num` send; at most one is armed at any time.
    pending_timer: Option<Pin<Box<Sleep>>>,
    /// A `num` was sent and its acknowledgment has not arrived yet.
    awaiting_reply: bool,
    shutdown: Shutdown,
    events: broadcast::Sender<ConnectionEvent>,
}

impl Connection {
    pub fn new(
        identity: Identity,
        endpoint: SocketAddr,
        config: &ClientConfig,
        shutdown: Shutdown,
    ) -> Connection {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Connection {
            identity,
            endpoint,
            state: ConnectionState::Connecting,
            timing: config.timing.clone(),
            max_frame_size: config.network.max_frame_size,
            rng: NumberGenerator::from_entropy(),
            reader: None,
            writer: None,
            pending_timer: None,
            awaiting_reply: false,
            shutdown,
            events,
        }
    }

    /// Replaces the random source, mostly for reproducible runs.
    pub fn with_rng(mut self, rng: NumberGenerator) -> Connection {
        self.rng = rng;
        self
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ConnectionEvent> {
        self.events.subscribe()
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Connects to the endpoint over tcp and runs the protocol until the
    /// connection is stopped.
    pub async fn run(&mut self) -> ConnectionState {
        let endpoint = self.endpoint;
        self.run_with(TcpStream::connect(endpoint)).await
    }

    /// Runs the protocol over the stream produced by `connect`.
    ///
    /// Never fails: every error ends in [`ConnectionState::Stopped`] and is
    /// reported as an event. The returned state is always `Stopped`.
    #[tracing::instrument(name = "connection", skip_all, fields(client = %self.identity))]
    pub async fn run_with<F, S>(&mut self, connect: F) -> ConnectionState
    where
        F: Future<Output = io::Result<S>>,
        S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
    {
        if self.state != ConnectionState::Connecting {
            warn!("connection already ran, current state: {}", self.state);
            return self.state;
        }
        debug!("connecting to {}", self.endpoint);

        let connected = tokio::select! {
            biased;
            _ = self.shutdown.recv() => None,
            res = connect => Some(res),
        };
        let stream = match connected {
            Some(Ok(stream)) => stream,
            Some(Err(err)) => {
                self.fail(ConnectFailure(format!("{}: {}", self.endpoint, err)));
                return self.state;
            }
            None => {
                self.emit(ConnectionEvent::CancelRequested);
                self.stop().await;
                return self.state;
            }
        };

        let (reader, writer) = tokio::io::split(stream);
        self.reader = Some(FrameReader::new(Box::new(reader), self.max_frame_size));
        self.writer = Some(BufWriter::new(Box::new(writer)));
        self.transition(ConnectionState::LoggingIn);

        if self.shutdown.poll_requested() {
            self.on_cancel().await;
            return self.state;
        }
        if let Err(err) = self.send(Command::Login(self.identity.clone())).await {
            self.fail(err);
            return self.state;
        }

        self.event_loop().await;
        self.state
    }

    async fn event_loop(&mut self) {
        while self.state < ConnectionState::Stopping {
            tokio::select! {
                biased;
                _ = self.shutdown.recv() => self.on_cancel().await,
                res = next_frame(&mut self.reader) => self.on_frame(res).await,
                _ = fire(&mut self.pending_timer) => self.on_timer().await,
            }
        }
    }

    async fn on_cancel(&mut self) {
        if self.state >= ConnectionState::Stopping {
            return;
        }
        debug!("cancellation request accepted");
        self.emit(ConnectionEvent::CancelRequested);
        self.stop().await;
    }

    async fn on_frame(&mut self, res: AppResult<BytesMut>) {
        let frame = match res {
            Ok(frame) => frame,
            Err(err) if err.is_protocol_violation() => {
                self.violation(err);
                return;
            }
            Err(err) => {
                // the channel is unusable, no stop handshake
                self.fail(err);
                return;
            }
        };
        let line = String::from_utf8_lossy(&frame);
        match Reply::decode(&line) {
            Ok(Reply::Unknown(line)) => {
                debug!("unknown message: {}", line);
                self.emit(ConnectionEvent::UnknownMessage(line));
            }
            Ok(reply) => {
                self.emit(ConnectionEvent::Received(reply.clone()));
                self.on_reply(reply).await;
            }
            Err(err) => self.violation(err),
        }
    }

    async fn on_reply(&mut self, reply: Reply) {
        match (self.state, reply) {
            (ConnectionState::LoggingIn, Reply::LoginAck) => {
                self.transition(ConnectionState::Active);
                self.schedule_next_number();
            }
            (ConnectionState::LoggingIn | ConnectionState::Active, Reply::StopInstruction) => {
                debug!("stop instruction from server");
                self.emit(ConnectionEvent::StopRequested);
                self.stop().await;
            }
            (ConnectionState::Active, Reply::NumAck(payload)) if self.awaiting_reply => {
                debug!("number acknowledged: {}", payload.value());
                self.awaiting_reply = false;
                self.schedule_next_number();
            }
            (state, reply) => {
                let what = format!("{} while {}", reply, state);
                debug!("ignoring unexpected reply: {}", what);
                self.emit(ConnectionEvent::Unexpected(what));
            }
        }
    }

    async fn on_timer(&mut self) {
        self.pending_timer = None;
        if self.shutdown.poll_requested() {
            self.on_cancel().await;
            return;
        }
        let value = self.rng.next_value();
        match self.send(Command::Num(value)).await {
            Ok(()) => self.awaiting_reply = true,
            Err(err) => self.fail(err),
        }
    }

    /// Arms a fresh single-shot timer for the next `num`, dropping any old one.
    fn schedule_next_number(&mut self) {
        let deadline = time::Instant::now() + self.timing.number_interval();
        self.pending_timer = Some(Box::pin(time::sleep_until(deadline)));
    }

    /// Sends `stop`, waits out the grace interval and closes the socket.
    ///
    /// Does nothing once the connection is stopping or stopped, so the `stop`
    /// line is written at most once. The grace wait is not interruptible.
    pub async fn stop(&mut self) {
        if self.state >= ConnectionState::Stopping {
            return;
        }
        self.transition(ConnectionState::Stopping);
        self.pending_timer = None;
        if self.writer.is_some() {
            match self.send(Command::Stop).await {
                Ok(()) => time::sleep(self.timing.stop_grace()).await,
                Err(err) => warn!("failed to send stop: {}", err),
            }
        }
        self.close();
    }

    fn fail(&mut self, err: AppError) {
        if self.state == ConnectionState::Stopped {
            return;
        }
        debug!("connection failed: {}", err);
        self.emit(ConnectionEvent::Failed(err.to_string()));
        self.close();
    }

    fn violation(&mut self, err: AppError) {
        debug!("protocol violation: {}", err);
        self.emit(ConnectionEvent::ProtocolViolation(err.to_string()));
    }

    /// Releases socket and timer and enters the terminal state.
    fn close(&mut self) {
        self.pending_timer = None;
        self.awaiting_reply = false;
        self.reader = None;
        self.writer = None;
        self.transition(ConnectionState::Stopped);
    }

    async fn send(&mut self, command: Command) -> AppResult<()> {
        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| IllegalStateError(format!("no socket to send '{}'", command)))?;
        writer.write_all(&command.to_bytes()).await?;
        writer.flush().await?;
        debug!("sent '{}'", command);
        self.emit(ConnectionEvent::Sent(command));
        Ok(())
    }

    fn transition(&mut self, to: ConnectionState) {
        if to <= self.state {
            debug!("refusing transition {} -> {}", self.state, to);
            return;
        }
        let from = std::mem::replace(&mut self.state, to);
        debug!("state {} -> {}", from, to);
        self.emit(ConnectionEvent::StateChanged { from, to });
    }

    fn emit(&self, event: ConnectionEvent) {
        // no subscriber is fine
        let _ = self.events.send(event);
    }
}

async fn next_frame(reader: &mut Option<FrameReader<BoxReader>>) -> AppResult<BytesMut> {
    match reader {
        Some(reader) => reader.read_frame().await,
        None => std::future::pending().await,
    }
}

async fn fire(timer: &mut Option<Pin<Box<Sleep>>>) {
    match timer {
        Some(sleep) => sleep.as_mut().await,
        None => std::future::pending().await,
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        debug!("connection {} dropped in state {}", self.identity, self.state);
    }
}
