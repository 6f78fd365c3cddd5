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

use tokio::sync::broadcast;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};

/// Receiving end of the one-shot cancellation request.
///
/// The first message latches `is_shutdown`; everything after it is ignored, so
/// a request fired twice is observed once. A closed channel is not a request:
/// when every sender is gone `recv` simply never completes.
#[derive(Debug)]
pub struct Shutdown {
    is_shutdown: bool,
    notify: broadcast::Receiver<()>,
}

impl Shutdown {
    pub fn new(notify: broadcast::Receiver<()>) -> Shutdown {
        Shutdown {
            is_shutdown: false,
            notify,
        }
    }
    pub fn is_shutdown(&self) -> bool {
        self.is_shutdown
    }

    /// Waits for the request. Cancel-safe, can be used inside `tokio::select!`.
    pub async fn recv(&mut self) {
        if self.is_shutdown {
            return;
        }
        match self.notify.recv().await {
            // a lagged receiver still means at least one request was sent
            Ok(()) | Err(RecvError::Lagged(_)) => self.is_shutdown = true,
            Err(RecvError::Closed) => std::future::pending::<()>().await,
        }
    }

    /// Non-blocking check used before starting a new exchange.
    pub fn poll_requested(&mut self) -> bool {
        if !self.is_shutdown {
            match self.notify.try_recv() {
                Ok(()) | Err(TryRecvError::Lagged(_)) => self.is_shutdown = true,
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => {}
            }
        }
        self.is_shutdown
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn second_request_is_absorbed() {
        let (notify, _) = broadcast::channel(1);
        let mut shutdown = Shutdown::new(notify.subscribe());
        notify.send(()).unwrap();
        notify.send(()).unwrap();

        shutdown.recv().await;
        assert!(shutdown.is_shutdown());
        // latched, returns at once without touching the channel again
        shutdown.recv().await;
        assert!(shutdown.poll_requested());
    }

    #[tokio::test]
    async fn closed_channel_is_not_a_request() {
        let (notify, rx) = broadcast::channel::<()>(1);
        let mut shutdown = Shutdown::new(rx);
        drop(notify);

        assert!(!shutdown.poll_requested());
        let res = tokio::time::timeout(Duration::from_millis(50), shutdown.recv()).await;
        assert!(res.is_err());
        assert!(!shutdown.is_shutdown());
    }
}
