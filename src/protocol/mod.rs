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

//! Line protocol spoken with the number server.
//!
//! Every message is one ASCII line terminated by `\n`:
//!
//! | direction | line | meaning |
//! |---|---|---|
//! | client → server | `login <identity>` | authenticate |
//! | server → client | `login ...` | login acknowledged |
//! | client → server | `num <u32>` | deliver a generated value |
//! | server → client | `num <ack> [<extra>]` | acknowledgment, `client_list_stopped` means stop |
//! | client → server | `stop` | orderly termination notice |

pub use codec::{parse_number, Command, NumPayload, Reply, CLIENT_LIST_STOPPED};
mod codec;
