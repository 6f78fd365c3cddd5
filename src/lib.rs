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

mod network;
mod protocol;
mod service;
mod utils;

pub use network::{
    frame_ready, Connection, ConnectionEvent, ConnectionState, FrameReader, NumberGenerator,
    NUMBER_RANGE,
};
pub use protocol::{parse_number, Command, NumPayload, Reply, CLIENT_LIST_STOPPED};
pub use service::{
    global_config, setup_local_tracing, setup_tracing, verbosity_directive, AppError, AppResult,
    CancellationSource, CancellationWatcher, ChannelSource, Client, ClientConfig, KeypressSource,
    LogConfig, NetworkConfig, Shutdown, TimingConfig, WatchOutcome, ENV_PREFIX, GLOBAL_CONFIG,
};
pub use utils::{Identity, IDENTITY_LEN};
