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

use std::fmt;

use crate::protocol::{Command, Reply};

/// Lifecycle of a connection. Variants are ordered; a connection only ever
/// moves to a greater state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ConnectionState {
    Connecting,
    LoggingIn,
    Active,
    Stopping,
    Stopped,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionState::Connecting => "connecting",
            ConnectionState::LoggingIn => "logging in",
            ConnectionState::Active => "active",
            ConnectionState::Stopping => "stopping",
            ConnectionState::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

/// Something observable that happened on a connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
    StateChanged {
        from: ConnectionState,
        to: ConnectionState,
    },
    Sent(Command),
    Received(Reply),
    /// Operator cancellation was accepted.
    CancelRequested,
    /// Server told the client to stop.
    StopRequested,
    /// Oversized frame or bad `num` payload; ignored.
    ProtocolViolation(String),
    /// Line with no known command; ignored.
    UnknownMessage(String),
    /// Known reply that makes no sense in the current state; ignored.
    Unexpected(String),
    /// Connect, read or write failure that ended the connection.
    Failed(String),
}
