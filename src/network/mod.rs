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

//! Network Module Implementation
//!
//! This module drives the single outbound connection of the client: reading
//! newline framed replies, sending commands and moving the connection through
//! its lifecycle.
//!
//! # Components
//!
//! - `Connection`: the protocol state machine, owns the socket and the send timer
//! - `FrameReader`: splits the incoming byte stream into newline frames
//! - `NumberGenerator`: the connection's own random source
//! - `ConnectionEvent`: what observers see of a running connection
//!
//! # Concurrency
//!
//! A connection is driven by exactly one task. Nothing else reads, writes or
//! mutates it; cancellation arrives through a `Shutdown` receiver.

pub use connection::Connection;
pub use event::{ConnectionEvent, ConnectionState};
pub use frame::{frame_ready, FrameReader};
pub use number::{NumberGenerator, NUMBER_RANGE};
mod connection;
mod event;
mod frame;
mod number;
