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

use std::net::SocketAddr;

use tokio::net::lookup_host;
use tokio::sync::broadcast;
use tokio::{runtime, signal};
use tracing::{debug, error, info, warn};

use crate::network::{Connection, ConnectionEvent, ConnectionState, NumberGenerator};
use crate::protocol::{Command, Reply};
use crate::service::watcher::{CancellationSource, CancellationWatcher, KeypressSource};
use crate::service::{ClientConfig, NetworkConfig, Shutdown};
use crate::utils::Identity;
use crate::AppError::{ConnectFailure, IllegalStateError};
use crate::AppResult;

/// Wires one [`Connection`] to its cancellation watcher and event logger.
pub struct Client {
    config: ClientConfig,
    identity: Identity,
    handle_ctrl_c: bool,
    seed: Option<u64>,
}

impl Client {
    pub fn new(config: ClientConfig, identity: Identity) -> Self {
        Client {
            config,
            identity,
            handle_ctrl_c: true,
            seed: None,
        }
    }

    /// Whether Ctrl-C is turned into a cancellation request, on by default.
    pub fn handle_ctrl_c(mut self, enabled: bool) -> Self {
        self.handle_ctrl_c = enabled;
        self
    }

    /// Seeds the number generator of the connection.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    /// Runs the client on `rt` until the connection stops, cancelled by a
    /// keypress on stdin or Ctrl-C.
    pub fn start(&self, rt: &runtime::Runtime) -> AppResult<ConnectionState> {
        info!("client start work with uid: {}", self.identity);
        let source = KeypressSource::new()?;
        let state = rt.block_on(self.run(source))?;
        info!("client {} shutdown complete", self.identity);
        Ok(state)
    }

    /// Runs one connection to completion.
    ///
    /// The connection is driven by its own task; `source` is watched on a
    /// separate thread and may only hand over a cancellation request.
    pub async fn run<C: CancellationSource>(&self, source: C) -> AppResult<ConnectionState> {
        let endpoint = resolve(&self.config.network).await?;

        let (notify_cancel, cancel_rx) = broadcast::channel(1);
        let mut connection = Connection::new(
            self.identity.clone(),
            endpoint,
            &self.config,
            Shutdown::new(cancel_rx),
        );
        if let Some(seed) = self.seed {
            connection = connection.with_rng(NumberGenerator::seeded(seed));
        }
        let logger = tokio::spawn(log_events(
            self.identity.clone(),
            endpoint,
            connection.subscribe(),
        ));

        let watcher = CancellationWatcher::spawn(
            source,
            notify_cancel.clone(),
            self.config.timing.watcher_poll_interval(),
        )?;

        let ctrl_c = if self.handle_ctrl_c {
            let notify = notify_cancel.clone();
            Some(tokio::spawn(async move {
                if signal::ctrl_c().await.is_ok() {
                    info!("get ctrl-c signal, initiating work stoppage");
                    let _ = notify.send(());
                }
            }))
        } else {
            None
        };
        drop(notify_cancel);

        // the task owns the connection; it is released once it reaches Stopped
        let connection_task = tokio::spawn(async move { connection.run().await });
        let state = connection_task
            .await
            .map_err(|e| IllegalStateError(format!("connection task failed: {}", e)))?;

        if let Some(ctrl_c) = ctrl_c {
            ctrl_c.abort();
        }
        if let Err(e) = logger.await {
            error!("event logger failed: {:?}", e);
        }
        match tokio::task::spawn_blocking(move || watcher.join()).await {
            Ok(Ok(outcome)) => debug!("cancellation watcher finished: {:?}", outcome),
            _ => warn!("cancellation watcher panicked"),
        }
        Ok(state)
    }
}

async fn resolve(network: &NetworkConfig) -> AppResult<SocketAddr> {
    let address = network.address();
    let first = lookup_host(&address)
        .await
        .map_err(|e| ConnectFailure(format!("resolve {}: {}", address, e)))?
        .next();
    first.ok_or_else(|| ConnectFailure(format!("no address for {}", address)))
}

/// Renders connection events as operator-facing log lines until the
/// connection is dropped.
async fn log_events(
    identity: Identity,
    endpoint: SocketAddr,
    mut events: broadcast::Receiver<ConnectionEvent>,
) {
    loop {
        let event = match events.recv().await {
            Ok(event) => event,
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!("event logger skipped {} events", skipped);
                continue;
            }
            Err(broadcast::error::RecvError::Closed) => break,
        };
        match event {
            ConnectionEvent::StateChanged { to, .. } => match to {
                ConnectionState::LoggingIn => info!("connected to {}, logging in", endpoint),
                ConnectionState::Active => info!("connected to the server successfully"),
                ConnectionState::Stopped => info!("client '{}' was stopped work", identity),
                _ => debug!("client '{}' is {}", identity, to),
            },
            ConnectionEvent::Sent(Command::Num(value)) => {
                info!("sending a number to the server: '{}'", value)
            }
            ConnectionEvent::Sent(command) => debug!("sent '{}'", command),
            ConnectionEvent::Received(Reply::NumAck(payload)) => {
                info!("received a number from the server: '{}'", payload.value())
            }
            ConnectionEvent::Received(reply) => debug!("received {}", reply),
            ConnectionEvent::CancelRequested => info!("initiating work stoppage"),
            ConnectionEvent::StopRequested => info!("server says to stop working"),
            ConnectionEvent::ProtocolViolation(what) => warn!("protocol violation: {}", what),
            ConnectionEvent::UnknownMessage(line) => warn!("invalid incoming message: {}", line),
            ConnectionEvent::Unexpected(what) => warn!("unexpected message: {}", what),
            ConnectionEvent::Failed(why) => error!("client '{}' failed: {}", identity, why),
        }
    }
}
