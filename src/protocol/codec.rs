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

use bytes::{BufMut, BytesMut};

use crate::utils::Identity;
use crate::AppError::MalformedProtocol;
use crate::AppResult;

pub const LOGIN: &str = "login";
pub const NUM: &str = "num";
pub const STOP: &str = "stop";
/// Ack token the server uses to tell every client to stop.
pub const CLIENT_LIST_STOPPED: &str = "client_list_stopped";

/// Length of `"num "`, stripped before the numeric payload is parsed.
const NUM_PREFIX_LEN: usize = 4;

/// A message sent by the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Login(Identity),
    Num(u32),
    Stop,
}

impl Command {
    pub fn encode(&self, dst: &mut BytesMut) {
        match self {
            Command::Login(id) => {
                dst.put_slice(LOGIN.as_bytes());
                dst.put_u8(b' ');
                dst.put_slice(id.as_str().as_bytes());
            }
            Command::Num(value) => {
                dst.put_slice(NUM.as_bytes());
                dst.put_u8(b' ');
                dst.put_slice(value.to_string().as_bytes());
            }
            Command::Stop => dst.put_slice(STOP.as_bytes()),
        }
        dst.put_u8(b'\n');
    }

    pub fn to_bytes(&self) -> BytesMut {
        let mut buf = BytesMut::with_capacity(16);
        self.encode(&mut buf);
        buf
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Login(id) => write!(f, "{} {}", LOGIN, id),
            Command::Num(value) => write!(f, "{} {}", NUM, value),
            Command::Stop => f.write_str(STOP),
        }
    }
}

/// Numeric payload of a `num` line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumPayload {
    Value(u32),
    /// Nothing after the command; read as 0.
    Empty,
}

impl NumPayload {
    pub fn value(&self) -> u32 {
        match self {
            NumPayload::Value(v) => *v,
            NumPayload::Empty => 0,
        }
    }
}

/// A classified server line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    LoginAck,
    NumAck(NumPayload),
    StopInstruction,
    Unknown(String),
}

impl Reply {
    /// Classifies one frame (without its newline) by its leading token.
    ///
    /// A `num` line whose payload is not a number is a protocol violation
    /// and comes back as [`MalformedProtocol`].
    pub fn decode(line: &str) -> AppResult<Reply> {
        let line = line.trim_end_matches(&['\r', '\n'][..]);
        if line.starts_with(LOGIN) {
            return Ok(Reply::LoginAck);
        }
        if line.starts_with(NUM) {
            if line.split_whitespace().nth(1) == Some(CLIENT_LIST_STOPPED) {
                return Ok(Reply::StopInstruction);
            }
            return parse_number(line).map(Reply::NumAck);
        }
        Ok(Reply::Unknown(line.to_string()))
    }
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reply::LoginAck => f.write_str("login ack"),
            Reply::NumAck(payload) => write!(f, "num ack {}", payload.value()),
            Reply::StopInstruction => write!(f, "{} {}", NUM, CLIENT_LIST_STOPPED),
            Reply::Unknown(line) => write!(f, "unknown '{}'", line),
        }
    }
}

/// Extracts the number of a `num <value>` line: the 4-byte prefix and the
/// newlines are dropped and the rest must be an unsigned decimal.
pub fn parse_number(msg: &str) -> AppResult<NumPayload> {
    let rest = msg.get(NUM_PREFIX_LEN..).unwrap_or("");
    let digits: String = rest.chars().filter(|c| *c != '\n').collect();
    let digits = digits.trim_end_matches('\r');
    if digits.is_empty() {
        return Ok(NumPayload::Empty);
    }
    if !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(MalformedProtocol(format!(
            "num payload '{}' is not an unsigned integer",
            digits
        )));
    }
    digits
        .parse::<u32>()
        .map(NumPayload::Value)
        .map_err(|e| MalformedProtocol(format!("num payload '{}': {}", digits, e)))
}
