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

use std::io::Read;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::{AppError, AppResult};

/// Something an operator can use to ask the client to stop.
pub trait CancellationSource: Send + 'static {
    /// Blocks for at most `timeout`; `Ok(true)` means cancellation was requested.
    fn poll(&mut self, timeout: Duration) -> AppResult<bool>;
}

/// Fires once a key (followed by enter, the terminal is not put in raw mode)
/// is read from stdin. End of input never fires.
pub struct KeypressSource {
    pressed: Receiver<()>,
}

impl KeypressSource {
    pub fn new() -> AppResult<Self> {
        let (tx, pressed) = mpsc::channel();
        // stdin reads cannot be interrupted, the thread is left detached
        thread::Builder::new()
            .name("stdin-keypress".into())
            .spawn(move || {
                let mut byte = [0u8; 1];
                match std::io::stdin().read(&mut byte) {
                    Ok(n) if n > 0 => {
                        let _ = tx.send(());
                    }
                    Ok(_) => debug!("stdin closed, keypress cancellation disabled"),
                    Err(err) => warn!("failed to read stdin: {}", err),
                }
            })?;
        Ok(KeypressSource { pressed })
    }
}

impl CancellationSource for KeypressSource {
    fn poll(&mut self, timeout: Duration) -> AppResult<bool> {
        match self.pressed.recv_timeout(timeout) {
            Ok(()) => Ok(true),
            Err(RecvTimeoutError::Timeout) => Ok(false),
            // the reader thread gave up, nothing will ever arrive
            Err(RecvTimeoutError::Disconnected) => {
                thread::sleep(timeout);
                Ok(false)
            }
        }
    }
}

/// Fires when a message arrives on a std channel. Lets callers and tests
/// trigger cancellation synthetically.
pub struct ChannelSource {
    trigger: Receiver<()>,
}

impl ChannelSource {
    pub fn new(trigger: Receiver<()>) -> Self {
        ChannelSource { trigger }
    }

    pub fn pair() -> (mpsc::Sender<()>, Self) {
        let (tx, rx) = mpsc::channel();
        (tx, ChannelSource::new(rx))
    }
}

impl CancellationSource for ChannelSource {
    fn poll(&mut self, timeout: Duration) -> AppResult<bool> {
        match self.trigger.recv_timeout(timeout) {
            Ok(()) => Ok(true),
            Err(RecvTimeoutError::Timeout) => Ok(false),
            Err(RecvTimeoutError::Disconnected) => Err(AppError::ChannelSendError(
                "cancellation trigger dropped".into(),
            )),
        }
    }
}

/// How a watcher thread ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchOutcome {
    /// The request was handed to the connection.
    Fired,
    /// The connection went away first.
    Abandoned,
    /// The source failed; no request was sent.
    SourceFailed,
}

/// Watches a [`CancellationSource`] on its own thread and hands a single
/// cancellation request to the event loop through `notify`.
///
/// It never touches the connection itself.
pub struct CancellationWatcher;

impl CancellationWatcher {
    pub fn spawn<C: CancellationSource>(
        mut source: C,
        notify: broadcast::Sender<()>,
        poll_interval: Duration,
    ) -> AppResult<JoinHandle<WatchOutcome>> {
        let handle = thread::Builder::new()
            .name("cancel-watcher".into())
            .spawn(move || loop {
                // no receiver left: the connection is done with us
                if notify.receiver_count() == 0 {
                    debug!("connection gone, cancellation watcher exits");
                    return WatchOutcome::Abandoned;
                }
                match source.poll(poll_interval) {
                    Ok(false) => continue,
                    Ok(true) => {
                        info!("operator requested cancellation, initiating work stoppage");
                        return match notify.send(()) {
                            Ok(_) => WatchOutcome::Fired,
                            Err(_) => WatchOutcome::Abandoned,
                        };
                    }
                    Err(err) => {
                        warn!("cancellation source failed: {}", err);
                        return WatchOutcome::SourceFailed;
                    }
                }
            })?;
        Ok(handle)
    }
}
